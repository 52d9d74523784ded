// src/snapshot.rs

pub mod store;

use indexmap::IndexMap;
use strum_macros::{Display, EnumString};

use crate::constants::{
    DEFAULT_HIBERNATE_AC, DEFAULT_HIBERNATE_DC, DEFAULT_MONITOR_AC, DEFAULT_MONITOR_DC,
    DEFAULT_STANDBY_AC, DEFAULT_STANDBY_DC,
};

/// A service's configured startup policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ServiceStartMode {
    Auto,
    Manual,
    Disabled,
}

impl ServiceStartMode {
    /// The `start=` argument understood by `sc.exe config`.
    pub fn sc_start_arg(self) -> &'static str {
        match self {
            ServiceStartMode::Auto => "auto",
            ServiceStartMode::Manual => "demand",
            ServiceStartMode::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceState {
    pub start_mode: ServiceStartMode,
    pub was_running: bool,
}

/// A registry value identified by its full key path and value name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryTarget {
    pub path: String,
    pub name: String,
}

impl RegistryTarget {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RegistryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\\{}", self.path, self.name)
    }
}

/// Power-plan baseline: hibernate file presence and six timeouts in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerState {
    pub hibernate_enabled: bool,
    pub standby_ac: u32,
    pub monitor_ac: u32,
    pub hibernate_ac: u32,
    pub standby_dc: u32,
    pub monitor_dc: u32,
    pub hibernate_dc: u32,
}

impl PowerState {
    /// Built-in timeouts used when the active power plan cannot be read.
    pub fn defaults(hibernate_enabled: bool) -> Self {
        Self {
            hibernate_enabled,
            standby_ac: DEFAULT_STANDBY_AC,
            monitor_ac: DEFAULT_MONITOR_AC,
            hibernate_ac: DEFAULT_HIBERNATE_AC,
            standby_dc: DEFAULT_STANDBY_DC,
            monitor_dc: DEFAULT_MONITOR_DC,
            hibernate_dc: DEFAULT_HIBERNATE_DC,
        }
    }
}

/// One line of the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotRecord {
    Service {
        name: String,
        state: ServiceState,
    },
    Registry {
        target: RegistryTarget,
        /// `None` when the value did not exist before the freeze.
        value: Option<u32>,
    },
    Task {
        name: String,
        enabled: bool,
    },
    Power(PowerState),
}

/// Pre-mutation baseline of every managed resource.
///
/// Service and task names are compared case-insensitively; entries keep the
/// order in which they were first recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    services: IndexMap<String, ServiceState>,
    registry_values: IndexMap<RegistryTarget, Option<u32>>,
    tasks: IndexMap<String, bool>,
    pub power: Option<PowerState>,
}

fn key_ignore_case<V>(map: &IndexMap<String, V>, name: &str) -> Option<usize> {
    map.keys().position(|key| key.eq_ignore_ascii_case(name))
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_service(&mut self, name: &str, state: ServiceState) {
        match key_ignore_case(&self.services, name) {
            Some(index) => self.services[index] = state,
            None => {
                self.services.insert(name.to_string(), state);
            }
        }
    }

    pub fn record_registry(&mut self, target: RegistryTarget, value: Option<u32>) {
        self.registry_values.insert(target, value);
    }

    pub fn record_task(&mut self, name: &str, enabled: bool) {
        match key_ignore_case(&self.tasks, name) {
            Some(index) => self.tasks[index] = enabled,
            None => {
                self.tasks.insert(name.to_string(), enabled);
            }
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceState> {
        key_ignore_case(&self.services, name).map(|index| &self.services[index])
    }

    pub fn registry_value(&self, target: &RegistryTarget) -> Option<Option<u32>> {
        self.registry_values.get(target).copied()
    }

    pub fn task(&self, name: &str) -> Option<bool> {
        key_ignore_case(&self.tasks, name).map(|index| self.tasks[index])
    }

    pub fn services(&self) -> impl Iterator<Item = (&str, &ServiceState)> {
        self.services.iter().map(|(name, state)| (name.as_str(), state))
    }

    pub fn registry_values(&self) -> impl Iterator<Item = (&RegistryTarget, Option<u32>)> {
        self.registry_values
            .iter()
            .map(|(target, value)| (target, *value))
    }

    pub fn tasks(&self) -> impl Iterator<Item = (&str, bool)> {
        self.tasks.iter().map(|(name, enabled)| (name.as_str(), *enabled))
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
            && self.registry_values.is_empty()
            && self.tasks.is_empty()
            && self.power.is_none()
    }

    /// Flattens the snapshot into records: services, registry, tasks, then power.
    pub fn records(&self) -> Vec<SnapshotRecord> {
        let services = self.services.iter().map(|(name, state)| SnapshotRecord::Service {
            name: name.clone(),
            state: *state,
        });
        let registry = self
            .registry_values
            .iter()
            .map(|(target, value)| SnapshotRecord::Registry {
                target: target.clone(),
                value: *value,
            });
        let tasks = self.tasks.iter().map(|(name, enabled)| SnapshotRecord::Task {
            name: name.clone(),
            enabled: *enabled,
        });

        services
            .chain(registry)
            .chain(tasks)
            .chain(self.power.map(SnapshotRecord::Power))
            .collect()
    }

    pub fn apply_record(&mut self, record: SnapshotRecord) {
        match record {
            SnapshotRecord::Service { name, state } => self.record_service(&name, state),
            SnapshotRecord::Registry { target, value } => self.record_registry(target, value),
            SnapshotRecord::Task { name, enabled } => self.record_task(&name, enabled),
            SnapshotRecord::Power(power) => self.power = Some(power),
        }
    }
}

impl FromIterator<SnapshotRecord> for Snapshot {
    fn from_iter<I: IntoIterator<Item = SnapshotRecord>>(records: I) -> Self {
        let mut snapshot = Snapshot::new();
        for record in records {
            snapshot.apply_record(record);
        }
        snapshot
    }
}
