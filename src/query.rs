// src/query.rs

use indexmap::IndexSet;
use tracing::debug;

use crate::{
    errors::CommandError,
    snapshot::ServiceStartMode,
    utils::command::{CommandExecutor, RunMode},
};

pub const SC: &str = "sc.exe";
pub const SCHTASKS: &str = "schtasks";

/// Current state of a service as reported by `sc.exe query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRunState {
    Running,
    StartPending,
    Stopped,
    StopPending,
    Other,
}

impl ServiceRunState {
    /// Running or about to be.
    pub fn is_active(self) -> bool {
        matches!(self, ServiceRunState::Running | ServiceRunState::StartPending)
    }

    /// Stopped or about to be.
    pub fn is_inactive(self) -> bool {
        matches!(self, ServiceRunState::Stopped | ServiceRunState::StopPending)
    }
}

impl std::fmt::Display for ServiceRunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ServiceRunState::Running => "Running",
            ServiceRunState::StartPending => "StartPending",
            ServiceRunState::Stopped => "Stopped",
            ServiceRunState::StopPending => "StopPending",
            ServiceRunState::Other => "Other",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    pub run_state: ServiceRunState,
    /// `None` when `sc.exe qc` failed for a service that `sc.exe query` found.
    pub start_mode: Option<ServiceStartMode>,
}

/// Reads the run state of a service.
///
/// # Returns
///
/// - `Ok(Some(ServiceRunState))` if the service exists.
/// - `Ok(None)` if `sc.exe` reports an error (typically: no such service).
/// - `Err(CommandError)` if `sc.exe` could not be run at all.
pub fn service_run_state<E>(exec: &E, name: &str) -> Result<Option<ServiceRunState>, CommandError>
where
    E: CommandExecutor + ?Sized,
{
    let output = exec.run(SC, &["query", name], RunMode::Tolerant)?;
    if !output.success() {
        debug!("Service '{}' not found (exit code {}).", name, output.exit_code);
        return Ok(None);
    }
    Ok(Some(parse_run_state(&output.stdout)))
}

/// Reads run state and start mode of a service; `Ok(None)` if it does not exist.
pub fn query_service<E>(exec: &E, name: &str) -> Result<Option<ServiceStatus>, CommandError>
where
    E: CommandExecutor + ?Sized,
{
    let Some(run_state) = service_run_state(exec, name)? else {
        return Ok(None);
    };
    let output = exec.run(SC, &["qc", name], RunMode::Tolerant)?;
    let start_mode = if output.success() {
        Some(parse_start_mode(&output.stdout))
    } else {
        debug!(
            "Start mode of service '{}' unreadable (exit code {}).",
            name, output.exit_code
        );
        None
    };
    Ok(Some(ServiceStatus {
        run_state,
        start_mode,
    }))
}

/// Checks whether a scheduled task exists.
pub fn task_exists<E>(exec: &E, task_name: &str) -> Result<bool, CommandError>
where
    E: CommandExecutor + ?Sized,
{
    let output = exec.run(SCHTASKS, &["/Query", "/TN", task_name], RunMode::Tolerant)?;
    Ok(output.success())
}

/// Reads the enabled flag of a scheduled task.
///
/// `Ok(None)` means the output named neither state.
pub fn task_enabled<E>(exec: &E, task_name: &str) -> Result<Option<bool>, CommandError>
where
    E: CommandExecutor + ?Sized,
{
    let output = exec.run(
        SCHTASKS,
        &["/Query", "/TN", task_name, "/FO", "LIST", "/V"],
        RunMode::Tolerant,
    )?;
    Ok(parse_task_enabled(&output.stdout))
}

/// Lists the fully qualified names of all scheduled tasks.
pub fn list_all_tasks<E>(exec: &E) -> Result<Vec<String>, CommandError>
where
    E: CommandExecutor + ?Sized,
{
    let output = exec.run(SCHTASKS, &["/Query", "/FO", "LIST"], RunMode::Tolerant)?;
    let tasks = parse_task_names(&output.stdout);
    debug!("Enumerated {} scheduled tasks.", tasks.len());
    Ok(tasks)
}

fn field_line<'a>(output: &'a str, field: &str) -> Option<&'a str> {
    output.lines().find(|line| {
        line.trim_start()
            .to_ascii_uppercase()
            .starts_with(field)
    })
}

/// Parses the `STATE` line of `sc.exe query` output.
pub fn parse_run_state(output: &str) -> ServiceRunState {
    let Some(line) = field_line(output, "STATE") else {
        return ServiceRunState::Other;
    };
    let line = line.to_ascii_uppercase();
    if line.contains("START_PENDING") {
        ServiceRunState::StartPending
    } else if line.contains("STOP_PENDING") {
        ServiceRunState::StopPending
    } else if line.contains("RUNNING") {
        ServiceRunState::Running
    } else if line.contains("STOPPED") {
        ServiceRunState::Stopped
    } else {
        ServiceRunState::Other
    }
}

/// Parses the `START_TYPE` line of `sc.exe qc` output. Anything unrecognised reads as Manual.
pub fn parse_start_mode(output: &str) -> ServiceStartMode {
    let Some(line) = field_line(output, "START_TYPE") else {
        return ServiceStartMode::Manual;
    };
    let line = line.to_ascii_uppercase();
    if line.contains("DISABLED") {
        ServiceStartMode::Disabled
    } else if line.contains("AUTO_START") {
        ServiceStartMode::Auto
    } else {
        ServiceStartMode::Manual
    }
}

/// Determines a task's enabled flag from verbose `schtasks /Query` output.
///
/// The `Scheduled Task State:` line decides when present. Otherwise any
/// "Disabled" token means disabled, then any "Enabled" token means enabled.
pub fn parse_task_enabled(output: &str) -> Option<bool> {
    if let Some(line) = output.lines().find(|line| {
        line.trim_start()
            .to_ascii_lowercase()
            .starts_with("scheduled task state:")
    }) {
        let state = line.to_ascii_lowercase();
        if state.contains("disabled") {
            return Some(false);
        }
        if state.contains("enabled") {
            return Some(true);
        }
    }

    let output = output.to_ascii_lowercase();
    if output.contains("disabled") {
        Some(false)
    } else if output.contains("enabled") {
        Some(true)
    } else {
        None
    }
}

/// Extracts `TaskName:` entries from `schtasks /Query /FO LIST`, first occurrence wins.
pub fn parse_task_names(output: &str) -> Vec<String> {
    const TASK_NAME: &str = "taskname:";

    let names: IndexSet<String> = output
        .lines()
        .filter(|line| {
            line.len() >= TASK_NAME.len()
                && line.is_char_boundary(TASK_NAME.len())
                && line[..TASK_NAME.len()].eq_ignore_ascii_case(TASK_NAME)
        })
        .map(|line| line[TASK_NAME.len()..].trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    names.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSystem;

    const SC_QUERY_RUNNING: &str = "\r\nSERVICE_NAME: wuauserv \r\n        TYPE               : 20  WIN32_SHARE_PROCESS  \r\n        STATE              : 4  RUNNING \r\n                                (STOPPABLE, NOT_PAUSABLE, ACCEPTS_SHUTDOWN)\r\n        WIN32_EXIT_CODE    : 0  (0x0)\r\n";

    #[test]
    fn run_state_is_read_from_state_line() {
        assert_eq!(parse_run_state(SC_QUERY_RUNNING), ServiceRunState::Running);
        assert_eq!(
            parse_run_state("        STATE              : 1  STOPPED \r\n"),
            ServiceRunState::Stopped
        );
        assert_eq!(
            parse_run_state("        STATE              : 2  START_PENDING \r\n"),
            ServiceRunState::StartPending
        );
        assert_eq!(parse_run_state(""), ServiceRunState::Other);
        assert!(ServiceRunState::StartPending.is_active());
        assert!(ServiceRunState::StopPending.is_inactive());
    }

    #[test]
    fn start_mode_is_read_from_start_type_line() {
        assert_eq!(
            parse_start_mode("        START_TYPE         : 4   DISABLED\r\n"),
            ServiceStartMode::Disabled
        );
        assert_eq!(
            parse_start_mode("        START_TYPE         : 2   AUTO_START  (DELAYED)\r\n"),
            ServiceStartMode::Auto
        );
        assert_eq!(
            parse_start_mode("        START_TYPE         : 3   DEMAND_START\r\n"),
            ServiceStartMode::Manual
        );
        assert_eq!(parse_start_mode("garbage"), ServiceStartMode::Manual);
    }

    #[test]
    fn failed_start_mode_query_is_left_unknown() {
        let system = FakeSystem::new();
        system.add_service("wuauserv", ServiceStartMode::Auto, ServiceRunState::Running);
        system.fail_command("sc.exe qc wuauserv");

        assert_eq!(
            query_service(&system, "wuauserv").unwrap(),
            Some(ServiceStatus {
                run_state: ServiceRunState::Running,
                start_mode: None,
            })
        );
    }

    #[test]
    fn task_state_line_wins_over_other_disabled_tokens() {
        let output = "TaskName:                             \\Microsoft\\Windows\\WindowsUpdate\\Scheduled Start\r\n\
                      Status:                               Ready\r\n\
                      Scheduled Task State:                 Enabled\r\n\
                      Idle Time:                            Disabled\r\n";
        assert_eq!(parse_task_enabled(output), Some(true));

        let output = "Scheduled Task State:                 Disabled\r\n";
        assert_eq!(parse_task_enabled(output), Some(false));
    }

    #[test]
    fn task_state_falls_back_to_tokens_then_ambiguous() {
        assert_eq!(parse_task_enabled("Status: Disabled\r\n"), Some(false));
        assert_eq!(parse_task_enabled("Enabled: Yes\r\n"), Some(true));
        assert_eq!(parse_task_enabled("Status: Ready\r\n"), None);
    }

    #[test]
    fn task_names_are_listed_once_in_order() {
        let output = "\r\nFolder: \\\r\nHostName:      PC\r\nTaskName:      \\MicrosoftEdgeUpdateTaskMachineCore\r\nNext Run Time: N/A\r\n\r\n\
                      TaskName:      \\OneDrive Standalone Update Task-S-1-5-21\r\n\
                      TaskName:      \\MicrosoftEdgeUpdateTaskMachineCore\r\n\
                      TaskName:      \r\n";
        assert_eq!(
            parse_task_names(output),
            vec![
                "\\MicrosoftEdgeUpdateTaskMachineCore".to_string(),
                "\\OneDrive Standalone Update Task-S-1-5-21".to_string(),
            ]
        );
    }
}
