// src/config.rs

use std::{env, path::PathBuf};

use once_cell::sync::Lazy;

use crate::{
    constants::{
        APP_DIR_NAME, HIBERNATE_FILE_NAME, MANAGED_SERVICES, SNAPSHOT_FILE_NAME,
        STATUS_SERVICES, UPDATE_TASK_SELECTORS, WINDOWS_UPDATE_AU_POLICY_KEY,
        WINDOWS_UPDATE_POLICY_VALUES,
    },
    selector::TaskSelector,
    snapshot::RegistryTarget,
};

/// `%ProgramData%\UpdateFreeze\snapshot.txt`
pub static DEFAULT_SNAPSHOT_PATH: Lazy<PathBuf> = Lazy::new(|| {
    let program_data =
        env::var_os("ProgramData").map_or_else(|| PathBuf::from("C:\\ProgramData"), PathBuf::from);
    program_data.join(APP_DIR_NAME).join(SNAPSHOT_FILE_NAME)
});

/// `%SystemDrive%\hiberfil.sys`
pub static DEFAULT_HIBERNATE_FILE: Lazy<PathBuf> = Lazy::new(|| {
    let system_drive = env::var("SystemDrive").unwrap_or_else(|_| "C:".to_string());
    PathBuf::from(format!("{}\\{}", system_drive, HIBERNATE_FILE_NAME))
});

/// A registry DWORD written by a freeze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryPolicy {
    pub target: RegistryTarget,
    pub frozen_value: u32,
}

/// The resource set and file locations an orchestrator works with.
#[derive(Debug, Clone)]
pub struct FreezeConfig {
    pub snapshot_path: PathBuf,
    pub hibernate_file: PathBuf,
    pub services: Vec<String>,
    pub registry_policies: Vec<RegistryPolicy>,
    pub task_selectors: Vec<TaskSelector>,
    pub status_services: Vec<String>,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            snapshot_path: DEFAULT_SNAPSHOT_PATH.clone(),
            hibernate_file: DEFAULT_HIBERNATE_FILE.clone(),
            services: MANAGED_SERVICES.iter().map(|s| s.to_string()).collect(),
            registry_policies: WINDOWS_UPDATE_POLICY_VALUES
                .iter()
                .map(|(name, value)| RegistryPolicy {
                    target: RegistryTarget::new(WINDOWS_UPDATE_AU_POLICY_KEY, *name),
                    frozen_value: *value,
                })
                .collect(),
            task_selectors: UPDATE_TASK_SELECTORS
                .iter()
                .map(|(kind, pattern)| TaskSelector::new(*kind, *pattern))
                .collect(),
            status_services: STATUS_SERVICES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FreezeConfig {
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    /// Registry values recorded before a freeze.
    pub fn registry_targets(&self) -> Vec<RegistryTarget> {
        self.registry_policies
            .iter()
            .map(|policy| policy.target.clone())
            .collect()
    }
}
