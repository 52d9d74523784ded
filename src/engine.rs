// src/engine.rs

pub mod apply;
pub mod capture;
pub mod restore;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::{
    errors::{CommandError, RegistryError},
    query::{SC, SCHTASKS},
    snapshot::ServiceStartMode,
    utils::{
        command::{CommandExecutor, CommandOutput, RunMode},
        registry::RegistryAccess,
        FileProbe,
    },
};

/// Everything the engine needs from the machine it manages.
pub trait Host: CommandExecutor + RegistryAccess + FileProbe {}

impl<T> Host for T where T: CommandExecutor + RegistryAccess + FileProbe {}

/// Bundles independent command, registry and filesystem backends into one host.
#[derive(Debug, Default, Clone)]
pub struct HostParts<E, R, F> {
    pub commands: E,
    pub registry: R,
    pub files: F,
}

impl<E: CommandExecutor, R, F> CommandExecutor for HostParts<E, R, F> {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        mode: RunMode,
    ) -> Result<CommandOutput, CommandError> {
        self.commands.run(program, args, mode)
    }
}

impl<E, R: RegistryAccess, F> RegistryAccess for HostParts<E, R, F> {
    fn get_dword(&self, path: &str, name: &str) -> Result<Option<u32>, RegistryError> {
        self.registry.get_dword(path, name)
    }

    fn set_dword(&self, path: &str, name: &str, value: u32) -> Result<(), RegistryError> {
        self.registry.set_dword(path, name, value)
    }

    fn delete_value_if_exists(&self, path: &str, name: &str) -> Result<(), RegistryError> {
        self.registry.delete_value_if_exists(path, name)
    }
}

impl<E, R, F: FileProbe> FileProbe for HostParts<E, R, F> {
    fn exists(&self, path: &Path) -> bool {
        self.files.exists(path)
    }
}

/// Sets a service's start mode with `sc.exe config`. Fails the action on error.
pub(crate) fn set_start_mode<E>(exec: &E, name: &str, mode: ServiceStartMode) -> Result<()>
where
    E: CommandExecutor + ?Sized,
{
    exec.run(
        SC,
        &["config", name, "start=", mode.sc_start_arg()],
        RunMode::Strict,
    )
    .with_context(|| format!("Failed to set service '{}' to {}", name, mode))?;
    debug!("Service '{}' set to {}.", name, mode);
    Ok(())
}

/// Sends a stop or start control to a service, logging instead of failing.
pub(crate) fn control_service_best_effort<E>(exec: &E, name: &str, control: &str)
where
    E: CommandExecutor + ?Sized,
{
    match exec.run(SC, &[control, name], RunMode::Tolerant) {
        Ok(output) if output.success() => debug!("Sent '{}' to service '{}'.", control, name),
        Ok(output) => warn!(
            "sc.exe {} {} exited with code {}; continuing.",
            control, name, output.exit_code
        ),
        Err(e) => warn!("sc.exe {} {} failed: {}; continuing.", control, name, e),
    }
}

/// Enables or disables a scheduled task with `schtasks /Change`. Fails the action on error.
pub(crate) fn set_task_enabled<E>(exec: &E, task_name: &str, enabled: bool) -> Result<()>
where
    E: CommandExecutor + ?Sized,
{
    let flag = if enabled { "/Enable" } else { "/Disable" };
    exec.run(SCHTASKS, &["/Change", "/TN", task_name, flag], RunMode::Strict)
        .with_context(|| format!("Failed to change task '{}' ({})", task_name, flag))?;
    debug!("Task '{}' changed ({}).", task_name, flag);
    Ok(())
}
