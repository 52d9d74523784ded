// src/constants.rs

use crate::selector::SelectorKind;

/// Services disabled by a freeze.
pub const MANAGED_SERVICES: [&str; 2] = ["wuauserv", "usosvc"];

/// Services listed by the status report.
pub const STATUS_SERVICES: [&str; 3] = ["wuauserv", "usosvc", "WaaSMedicSvc"];

pub const WINDOWS_UPDATE_AU_POLICY_KEY: &str =
    "HKEY_LOCAL_MACHINE\\SOFTWARE\\Policies\\Microsoft\\Windows\\WindowsUpdate\\AU";

/// Policy DWORDs written by a freeze: (value name, frozen value).
pub const WINDOWS_UPDATE_POLICY_VALUES: [(&str, u32); 5] = [
    ("NoAutoUpdate", 1),
    ("AUOptions", 2), // notify before download
    ("NoAutoRebootWithLoggedOnUsers", 1),
    ("AlwaysAutoRebootAtScheduledTime", 0),
    ("AlwaysAutoRebootAtScheduledTimeMinutes", 0),
];

/// Scheduled tasks disabled by a freeze, in the order they are processed.
pub const UPDATE_TASK_SELECTORS: [(SelectorKind, &str); 8] = [
    (SelectorKind::Prefix, "\\Microsoft\\Windows\\UpdateOrchestrator\\"),
    (SelectorKind::Prefix, "\\Microsoft\\Windows\\WindowsUpdate\\"),
    (SelectorKind::Prefix, "\\Microsoft\\Windows\\InstallService\\"),
    (SelectorKind::Exact, "\\MicrosoftEdgeUpdateTaskMachineCore"),
    (SelectorKind::Exact, "\\MicrosoftEdgeUpdateTaskMachineUA"),
    (SelectorKind::Wildcard, "\\OneDrive Standalone Update Task*"),
    (SelectorKind::Wildcard, "\\Mozilla\\Firefox Background Update*"),
    (SelectorKind::Exact, "\\Microsoft\\Windows\\UNP\\RunUpdateNotificationMgr"),
];

// Power setting identifiers as they appear in `powercfg /q` output.
pub const STANDBY_IDLE_SETTING: &str = "29f6c1db-86da-48c5-9fdb-f2b67b1f44da";
pub const MONITOR_IDLE_SETTING: &str = "3c0bc021-c8a8-4e07-a973-6b14cbcb2b7e";
pub const HIBERNATE_IDLE_SETTING: &str = "9d7815a6-7ee4-497e-8888-515a05f02364";

/// How far past a setting identifier the parser looks for its index lines.
pub const POWER_SETTING_SCAN_WINDOW: usize = 2500;

// Fallback power timeouts, in minutes.
pub const DEFAULT_STANDBY_AC: u32 = 30;
pub const DEFAULT_MONITOR_AC: u32 = 10;
pub const DEFAULT_HIBERNATE_AC: u32 = 0;
pub const DEFAULT_STANDBY_DC: u32 = 15;
pub const DEFAULT_MONITOR_DC: u32 = 5;
pub const DEFAULT_HIBERNATE_DC: u32 = 0;

pub const APP_DIR_NAME: &str = "UpdateFreeze";
pub const SNAPSHOT_FILE_NAME: &str = "snapshot.txt";
pub const HIBERNATE_FILE_NAME: &str = "hiberfil.sys";
