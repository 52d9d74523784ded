// src/power.rs

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::{
    constants::{
        HIBERNATE_IDLE_SETTING, MONITOR_IDLE_SETTING, POWER_SETTING_SCAN_WINDOW,
        STANDBY_IDLE_SETTING,
    },
    snapshot::PowerState,
    utils::{
        command::{CommandExecutor, RunMode},
        FileProbe,
    },
};

pub const POWERCFG: &str = "powercfg";

/// Which power source an index line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSource {
    Ac,
    Dc,
}

impl PowerSource {
    fn index_label(self) -> &'static str {
        match self {
            PowerSource::Ac => "current ac power setting index",
            PowerSource::Dc => "current dc power setting index",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            PowerSource::Ac => "ac",
            PowerSource::Dc => "dc",
        }
    }
}

/// The timeouts `powercfg /change` understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    Standby,
    Monitor,
    Hibernate,
}

impl Timeout {
    fn change_name(self, source: PowerSource) -> String {
        let name = match self {
            Timeout::Standby => "standby",
            Timeout::Monitor => "monitor",
            Timeout::Hibernate => "hibernate",
        };
        format!("{}-timeout-{}", name, source.suffix())
    }
}

/// Baseline used whenever the active power plan cannot be read.
pub fn capture_defaults(hibernate_enabled: bool) -> PowerState {
    PowerState::defaults(hibernate_enabled)
}

/// Best-effort capture of the current power baseline.
///
/// Hibernate is read from the presence of `hibernate_file`. If the active scheme
/// cannot be determined or queried, the fixed defaults are returned. Otherwise
/// each timeout is parsed independently and reads as 0 when its section or
/// index line is missing.
pub fn capture<E, F>(exec: &E, files: &F, hibernate_file: &Path) -> PowerState
where
    E: CommandExecutor + ?Sized,
    F: FileProbe + ?Sized,
{
    let hibernate_enabled = files.exists(hibernate_file);
    let defaults = capture_defaults(hibernate_enabled);

    let active = match exec.run(POWERCFG, &["/getactivescheme"], RunMode::Tolerant) {
        Ok(output) => output.stdout,
        Err(e) => {
            warn!("Failed to query active power scheme: {}. Using defaults.", e);
            return defaults;
        }
    };
    let Some(scheme) = first_guid(&active) else {
        warn!("No power scheme GUID in powercfg output. Using defaults.");
        return defaults;
    };

    let detail = match exec.run(POWERCFG, &["/q", scheme], RunMode::Tolerant) {
        Ok(output) => output.stdout,
        Err(e) => {
            warn!("Failed to query power scheme {}: {}. Using defaults.", scheme, e);
            return defaults;
        }
    };

    let minutes = |setting: &str, source: PowerSource| {
        parse_setting_seconds(&detail, setting, source).map_or(0, |seconds| seconds / 60)
    };

    let state = PowerState {
        hibernate_enabled,
        standby_ac: minutes(STANDBY_IDLE_SETTING, PowerSource::Ac),
        monitor_ac: minutes(MONITOR_IDLE_SETTING, PowerSource::Ac),
        hibernate_ac: minutes(HIBERNATE_IDLE_SETTING, PowerSource::Ac),
        standby_dc: minutes(STANDBY_IDLE_SETTING, PowerSource::Dc),
        monitor_dc: minutes(MONITOR_IDLE_SETTING, PowerSource::Dc),
        hibernate_dc: minutes(HIBERNATE_IDLE_SETTING, PowerSource::Dc),
    };
    debug!("Captured power state from scheme {}: {:?}", scheme, state);
    state
}

fn is_guid(candidate: &[u8]) -> bool {
    candidate.len() == 36
        && candidate.iter().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => *b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

/// Finds the first GUID-shaped token (`xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`).
pub fn first_guid(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.len() < 36 {
        return None;
    }
    (0..=bytes.len() - 36)
        .find(|&start| {
            is_guid(&bytes[start..start + 36])
                && (start == 0 || !bytes[start - 1].is_ascii_hexdigit())
        })
        .map(|start| &text[start..start + 36])
}

/// Reads one setting's index value (seconds) for a power source from `powercfg /q` output.
///
/// Looks for `setting` (case-insensitive), then for the source's index line
/// within the next `POWER_SETTING_SCAN_WINDOW` characters, and parses the hex
/// value on it.
pub fn parse_setting_seconds(detail: &str, setting: &str, source: PowerSource) -> Option<u32> {
    // ASCII lowercasing keeps byte offsets aligned with `detail`.
    let lowered = detail.to_ascii_lowercase();
    let start = lowered.find(&setting.to_ascii_lowercase())?;

    let end = lowered[start..]
        .char_indices()
        .nth(POWER_SETTING_SCAN_WINDOW)
        .map_or(lowered.len(), |(offset, _)| start + offset);
    let window = &lowered[start..end];

    let line = window
        .lines()
        .find(|line| line.contains(source.index_label()))?;
    let hex = &line[line.find("0x")? + 2..];
    let digits: String = hex.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
    u32::from_str_radix(&digits, 16).ok()
}

fn powercfg_change<E>(
    exec: &E,
    timeout: Timeout,
    source: PowerSource,
    minutes: u32,
    mode: RunMode,
) -> Result<()>
where
    E: CommandExecutor + ?Sized,
{
    let setting = timeout.change_name(source);
    let minutes = minutes.to_string();
    exec.run(POWERCFG, &["/change", &setting, &minutes], mode)
        .with_context(|| format!("Failed to set {} to {} minutes", setting, minutes))?;
    Ok(())
}

const ALL_TIMEOUTS: [(Timeout, PowerSource); 6] = [
    (Timeout::Standby, PowerSource::Ac),
    (Timeout::Monitor, PowerSource::Ac),
    (Timeout::Hibernate, PowerSource::Ac),
    (Timeout::Standby, PowerSource::Dc),
    (Timeout::Monitor, PowerSource::Dc),
    (Timeout::Hibernate, PowerSource::Dc),
];

/// Turns hibernation off and disables every sleep/display/hibernate timeout.
/// The first failing command aborts the rest.
pub fn apply_always_on<E>(exec: &E) -> Result<()>
where
    E: CommandExecutor + ?Sized,
{
    exec.run(POWERCFG, &["-h", "off"], RunMode::Strict)
        .context("Failed to turn hibernation off")?;
    for (timeout, source) in ALL_TIMEOUTS {
        powercfg_change(exec, timeout, source, 0, RunMode::Strict)?;
    }
    info!("Always-on power settings applied.");
    Ok(())
}

/// Replays a power baseline. Each command is tolerant of failure.
pub fn restore_power<E>(exec: &E, power: &PowerState) -> Result<()>
where
    E: CommandExecutor + ?Sized,
{
    let hibernate = if power.hibernate_enabled { "on" } else { "off" };
    let output = exec
        .run(POWERCFG, &["-h", hibernate], RunMode::Tolerant)
        .context("Failed to run powercfg")?;
    if !output.success() {
        warn!("powercfg -h {} exited with code {}.", hibernate, output.exit_code);
    }

    let values = [
        power.standby_ac,
        power.monitor_ac,
        power.hibernate_ac,
        power.standby_dc,
        power.monitor_dc,
        power.hibernate_dc,
    ];
    for ((timeout, source), minutes) in ALL_TIMEOUTS.into_iter().zip(values) {
        powercfg_change(exec, timeout, source, minutes, RunMode::Tolerant)?;
    }
    info!("Power settings restored.");
    Ok(())
}
