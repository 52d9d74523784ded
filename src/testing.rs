// src/testing.rs

//! In-memory Windows host for tests: interprets the `sc.exe`, `schtasks` and
//! `powercfg` invocations the engine issues and keeps a log of them.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;

use crate::{
    constants::{HIBERNATE_IDLE_SETTING, MONITOR_IDLE_SETTING, STANDBY_IDLE_SETTING},
    errors::{CommandError, RegistryError},
    query::ServiceRunState,
    snapshot::ServiceStartMode,
    utils::{
        command::{check_exit, CommandExecutor, CommandOutput, RunMode},
        registry::RegistryAccess,
        FileProbe,
    },
};

const BALANCED_SCHEME: &str = "381b4222-f694-41f0-9685-ff5bb260df2e";

/// Renders `powercfg /q` style output for `(setting, ac_seconds, dc_seconds)` entries.
pub fn power_detail(settings: &[(&str, u32, u32)]) -> String {
    let mut out = format!(
        "Power Scheme GUID: {}  (Balanced)\r\n  Subgroup GUID: 238c9fa8-0aad-41ed-83f4-97be242c8f20  (Sleep)\r\n",
        BALANCED_SCHEME
    );
    for (setting, ac, dc) in settings {
        out.push_str(&format!(
            "    Power Setting GUID: {}  (Idle timeout)\r\n\
             \x20     Minimum Possible Setting:        0x00000000\r\n\
             \x20     Maximum Possible Setting:        0xffffffff\r\n\
             \x20     Possible Settings increment:     0x00000001\r\n\
             \x20     Possible Settings units:         Seconds\r\n\
             \x20   Current AC Power Setting Index: 0x{:08x}\r\n\
             \x20   Current DC Power Setting Index: 0x{:08x}\r\n\r\n",
            setting, ac, dc
        ));
    }
    out
}

#[derive(Debug, Clone, Copy)]
struct FakeService {
    start_mode: ServiceStartMode,
    run_state: ServiceRunState,
}

#[derive(Debug, Default)]
struct State {
    services: IndexMap<String, FakeService>,
    tasks: IndexMap<String, bool>,
    ambiguous_tasks: HashSet<String>,
    registry: HashMap<(String, String), u32>,
    unreadable_registry: HashSet<(String, String)>,
    hibernate_on: bool,
    power: IndexMap<String, (u32, u32)>,
    active_scheme_output: Option<String>,
    commands: Vec<String>,
    failing: HashSet<String>,
    missing_programs: HashSet<String>,
}

impl State {
    fn service_key(&self, name: &str) -> Option<String> {
        self.services
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
    }

    fn task_key(&self, name: &str) -> Option<String> {
        self.tasks
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
    }
}

fn registry_key(path: &str, name: &str) -> (String, String) {
    (path.to_ascii_lowercase(), name.to_ascii_lowercase())
}

fn output(exit_code: i32, stdout: impl Into<String>) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: stdout.into(),
        stderr: String::new(),
    }
}

fn failure(exit_code: i32, message: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: message.to_string(),
        stderr: message.to_string(),
    }
}

fn run_state_line(state: ServiceRunState) -> &'static str {
    match state {
        ServiceRunState::Running => "4  RUNNING",
        ServiceRunState::StartPending => "2  START_PENDING",
        ServiceRunState::Stopped => "1  STOPPED",
        ServiceRunState::StopPending => "3  STOP_PENDING",
        ServiceRunState::Other => "7  PAUSED",
    }
}

fn start_type_line(mode: ServiceStartMode) -> &'static str {
    match mode {
        ServiceStartMode::Auto => "2   AUTO_START",
        ServiceStartMode::Manual => "3   DEMAND_START",
        ServiceStartMode::Disabled => "4   DISABLED",
    }
}

fn timeout_setting(change_name: &str) -> Option<(&'static str, bool)> {
    let (name, source) = change_name.rsplit_once("-timeout-")?;
    let setting = match name {
        "standby" => STANDBY_IDLE_SETTING,
        "monitor" => MONITOR_IDLE_SETTING,
        "hibernate" => HIBERNATE_IDLE_SETTING,
        _ => return None,
    };
    match source {
        "ac" => Some((setting, true)),
        "dc" => Some((setting, false)),
        _ => None,
    }
}

/// Deterministic stand-in for a Windows machine.
#[derive(Debug)]
pub struct FakeSystem {
    state: RefCell<State>,
}

impl Default for FakeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSystem {
    /// A machine with a balanced power plan, hibernation off and nothing else.
    pub fn new() -> Self {
        let mut state = State::default();
        state.power.insert(STANDBY_IDLE_SETTING.to_string(), (1800, 900));
        state.power.insert(MONITOR_IDLE_SETTING.to_string(), (600, 300));
        state.power.insert(HIBERNATE_IDLE_SETTING.to_string(), (0, 0));
        Self {
            state: RefCell::new(state),
        }
    }

    pub fn with_hibernate_file(self) -> Self {
        self.state.borrow_mut().hibernate_on = true;
        self
    }

    pub fn hibernate_file(&self) -> PathBuf {
        PathBuf::from("C:\\hiberfil.sys")
    }

    pub fn hibernate_on(&self) -> bool {
        self.state.borrow().hibernate_on
    }

    pub fn add_service(&self, name: &str, start_mode: ServiceStartMode, run_state: ServiceRunState) {
        self.state.borrow_mut().services.insert(
            name.to_string(),
            FakeService {
                start_mode,
                run_state,
            },
        );
    }

    pub fn service(&self, name: &str) -> Option<(ServiceStartMode, ServiceRunState)> {
        let state = self.state.borrow();
        let key = state.service_key(name)?;
        state.services.get(&key).map(|s| (s.start_mode, s.run_state))
    }

    pub fn remove_service(&self, name: &str) {
        let mut state = self.state.borrow_mut();
        if let Some(key) = state.service_key(name) {
            state.services.shift_remove(&key);
        }
    }

    pub fn add_task(&self, name: &str, enabled: bool) {
        self.state.borrow_mut().tasks.insert(name.to_string(), enabled);
    }

    pub fn remove_task(&self, name: &str) {
        let mut state = self.state.borrow_mut();
        if let Some(key) = state.task_key(name) {
            state.tasks.shift_remove(&key);
        }
    }

    /// Verbose queries for this task will name neither state.
    pub fn make_task_ambiguous(&self, name: &str) {
        self.state
            .borrow_mut()
            .ambiguous_tasks
            .insert(name.to_ascii_lowercase());
    }

    pub fn task_enabled(&self, name: &str) -> Option<bool> {
        let state = self.state.borrow();
        let key = state.task_key(name)?;
        state.tasks.get(&key).copied()
    }

    pub fn set_registry(&self, path: &str, name: &str, value: u32) {
        self.state
            .borrow_mut()
            .registry
            .insert(registry_key(path, name), value);
    }

    pub fn registry_value(&self, path: &str, name: &str) -> Option<u32> {
        self.state
            .borrow()
            .registry
            .get(&registry_key(path, name))
            .copied()
    }

    pub fn fail_registry_read(&self, path: &str, name: &str) {
        self.state
            .borrow_mut()
            .unreadable_registry
            .insert(registry_key(path, name));
    }

    pub fn set_power_seconds(&self, setting: &str, ac_seconds: u32, dc_seconds: u32) {
        self.state
            .borrow_mut()
            .power
            .insert(setting.to_string(), (ac_seconds, dc_seconds));
    }

    pub fn remove_power_setting(&self, setting: &str) {
        self.state.borrow_mut().power.shift_remove(setting);
    }

    /// Current `(ac, dc)` timeouts of a setting in minutes.
    pub fn power_minutes(&self, setting: &str) -> (u32, u32) {
        let state = self.state.borrow();
        let (ac, dc) = state.power.get(setting).copied().unwrap_or((0, 0));
        (ac / 60, dc / 60)
    }

    pub fn set_active_scheme_output(&self, text: &str) {
        self.state.borrow_mut().active_scheme_output = Some(text.to_string());
    }

    /// The exact command line (program and arguments joined by spaces) will exit with code 1.
    pub fn fail_command(&self, command_line: &str) {
        self.state
            .borrow_mut()
            .failing
            .insert(command_line.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.borrow_mut().failing.clear();
    }

    /// Launching `program` will fail as if it were not installed.
    pub fn remove_program(&self, program: &str) {
        self.state
            .borrow_mut()
            .missing_programs
            .insert(program.to_string());
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.borrow().commands.clone()
    }

    pub fn commands_for(&self, program: &str) -> Vec<String> {
        let prefix = format!("{} ", program);
        self.state
            .borrow()
            .commands
            .iter()
            .filter(|command| command.starts_with(&prefix))
            .cloned()
            .collect()
    }

    pub fn clear_commands(&self) {
        self.state.borrow_mut().commands.clear();
    }

    fn sc(&self, args: &[&str]) -> CommandOutput {
        let mut state = self.state.borrow_mut();
        let (verb, name) = match args {
            [verb, name, ..] => (*verb, *name),
            _ => return failure(1639, "[SC] invalid command line"),
        };
        let Some(key) = state.service_key(name) else {
            return failure(
                1060,
                "[SC] OpenService FAILED 1060:\r\n\r\nThe specified service does not exist as an installed service.\r\n",
            );
        };
        let Some(service) = state.services.get_mut(&key) else {
            return failure(1060, "[SC] OpenService FAILED 1060");
        };

        match (verb, &args[2..]) {
            ("query", []) => output(
                0,
                format!(
                    "\r\nSERVICE_NAME: {}\r\n        TYPE               : 20  WIN32_SHARE_PROCESS\r\n        STATE              : {}\r\n        WIN32_EXIT_CODE    : 0  (0x0)\r\n",
                    key,
                    run_state_line(service.run_state)
                ),
            ),
            ("qc", []) => output(
                0,
                format!(
                    "[SC] QueryServiceConfig SUCCESS\r\n\r\nSERVICE_NAME: {}\r\n        TYPE               : 20  WIN32_SHARE_PROCESS\r\n        START_TYPE         : {}\r\n",
                    key,
                    start_type_line(service.start_mode)
                ),
            ),
            ("stop", []) => {
                if service.run_state.is_active() {
                    service.run_state = ServiceRunState::Stopped;
                    output(0, "")
                } else {
                    failure(1062, "[SC] ControlService FAILED 1062:\r\n\r\nThe service has not been started.\r\n")
                }
            }
            ("start", []) => {
                if service.start_mode == ServiceStartMode::Disabled {
                    failure(1058, "[SC] StartService FAILED 1058:\r\n\r\nThe service cannot be started.\r\n")
                } else if service.run_state.is_active() {
                    failure(1056, "[SC] StartService FAILED 1056:\r\n\r\nAn instance of the service is already running.\r\n")
                } else {
                    service.run_state = ServiceRunState::Running;
                    output(0, "")
                }
            }
            ("config", ["start=", mode]) => {
                let start_mode = match *mode {
                    "auto" => ServiceStartMode::Auto,
                    "demand" => ServiceStartMode::Manual,
                    "disabled" => ServiceStartMode::Disabled,
                    _ => return failure(87, "[SC] ChangeServiceConfig FAILED 87"),
                };
                service.start_mode = start_mode;
                output(0, "[SC] ChangeServiceConfig SUCCESS\r\n")
            }
            _ => failure(1639, "[SC] invalid command line"),
        }
    }

    fn schtasks(&self, args: &[&str]) -> CommandOutput {
        let mut state = self.state.borrow_mut();
        match args {
            ["/Query", "/FO", "LIST"] => {
                let mut out = String::from("\r\nFolder: \\\r\n");
                for name in state.tasks.keys() {
                    out.push_str(&format!(
                        "HostName:      TESTPC\r\nTaskName:      {}\r\nNext Run Time: N/A\r\nStatus:        Ready\r\n\r\n",
                        name
                    ));
                }
                output(0, out)
            }
            ["/Query", "/TN", name] => match state.task_key(name) {
                Some(key) => output(0, format!("TaskName: {}\r\n", key)),
                None => failure(1, "ERROR: The system cannot find the file specified.\r\n"),
            },
            ["/Query", "/TN", name, "/FO", "LIST", "/V"] => {
                let Some(key) = state.task_key(name) else {
                    return failure(1, "ERROR: The system cannot find the file specified.\r\n");
                };
                let enabled = state.tasks[&key];
                let mut out = format!(
                    "\r\nTaskName:                             {}\r\nStatus:                               Ready\r\n",
                    key
                );
                if !state.ambiguous_tasks.contains(&key.to_ascii_lowercase()) {
                    out.push_str(&format!(
                        "Scheduled Task State:                 {}\r\nIdle Time:                            Disabled\r\n",
                        if enabled { "Enabled" } else { "Disabled" }
                    ));
                }
                output(0, out)
            }
            ["/Change", "/TN", name, flag @ ("/Enable" | "/Disable")] => {
                let Some(key) = state.task_key(name) else {
                    return failure(1, "ERROR: The system cannot find the file specified.\r\n");
                };
                state.tasks.insert(key.clone(), *flag == "/Enable");
                output(
                    0,
                    format!("SUCCESS: The parameters of scheduled task \"{}\" have been changed.\r\n", key),
                )
            }
            _ => failure(1, "ERROR: Invalid syntax.\r\n"),
        }
    }

    fn powercfg(&self, args: &[&str]) -> CommandOutput {
        let mut state = self.state.borrow_mut();
        match args {
            ["/getactivescheme"] => match &state.active_scheme_output {
                Some(text) => output(0, text.clone()),
                None => output(
                    0,
                    format!("Power Scheme GUID: {}  (Balanced)\r\n", BALANCED_SCHEME),
                ),
            },
            ["/q", _scheme] => {
                let settings: Vec<(&str, u32, u32)> = state
                    .power
                    .iter()
                    .map(|(setting, (ac, dc))| (setting.as_str(), *ac, *dc))
                    .collect();
                output(0, power_detail(&settings))
            }
            ["-h", "on"] => {
                state.hibernate_on = true;
                output(0, "")
            }
            ["-h", "off"] => {
                state.hibernate_on = false;
                output(0, "")
            }
            ["/change", name, minutes] => {
                let (Some((setting, is_ac)), Ok(minutes)) =
                    (timeout_setting(name), minutes.parse::<u32>())
                else {
                    return failure(1, "Invalid Parameters -- try \"/?\" for help\r\n");
                };
                let entry = state.power.entry(setting.to_string()).or_insert((0, 0));
                if is_ac {
                    entry.0 = minutes * 60;
                } else {
                    entry.1 = minutes * 60;
                }
                output(0, "")
            }
            _ => failure(1, "Invalid Parameters -- try \"/?\" for help\r\n"),
        }
    }
}

impl CommandExecutor for FakeSystem {
    fn run(&self, program: &str, args: &[&str], mode: RunMode) -> Result<CommandOutput, CommandError> {
        let command_line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.state.borrow_mut().commands.push(command_line.clone());

        if self.state.borrow().missing_programs.contains(program) {
            return Err(CommandError::Spawn {
                program: program.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "program not found"),
            });
        }

        let result = if self.state.borrow().failing.contains(&command_line) {
            failure(1, "simulated failure")
        } else {
            match program {
                "sc.exe" => self.sc(args),
                "schtasks" => self.schtasks(args),
                "powercfg" => self.powercfg(args),
                _ => failure(9009, "is not recognized as an internal or external command"),
            }
        };
        check_exit(program, args, mode, result)
    }
}

impl RegistryAccess for FakeSystem {
    fn get_dword(&self, path: &str, name: &str) -> Result<Option<u32>, RegistryError> {
        let state = self.state.borrow();
        let key = registry_key(path, name);
        if state.unreadable_registry.contains(&key) {
            return Err(RegistryError::Read {
                path: path.to_string(),
                name: name.to_string(),
                reason: "Access is denied.".to_string(),
            });
        }
        Ok(state.registry.get(&key).copied())
    }

    fn set_dword(&self, path: &str, name: &str, value: u32) -> Result<(), RegistryError> {
        self.set_registry(path, name, value);
        Ok(())
    }

    fn delete_value_if_exists(&self, path: &str, name: &str) -> Result<(), RegistryError> {
        self.state
            .borrow_mut()
            .registry
            .remove(&registry_key(path, name));
        Ok(())
    }
}

impl FileProbe for FakeSystem {
    fn exists(&self, path: &Path) -> bool {
        path == self.hibernate_file().as_path() && self.hibernate_on()
    }
}
