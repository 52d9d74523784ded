// src/engine/restore.rs

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::{
    engine::{control_service_best_effort, set_start_mode, set_task_enabled, Host},
    power,
    query::{service_run_state, task_exists},
    snapshot::{ServiceStartMode, ServiceState, Snapshot},
};

/// What a restore put back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub services_restored: usize,
    pub registry_set: usize,
    pub registry_deleted: usize,
    pub tasks_restored: usize,
    pub power_restored: bool,
    /// Services and tasks in the snapshot that no longer exist.
    pub skipped: Vec<String>,
}

/// Replays a snapshot: services, registry values, tasks, then power.
///
/// # Returns
///
/// - `Ok(RestoreSummary)` once every recorded resource has been handled.
/// - `Err(anyhow::Error)` on the first mutation that fails; later records
///   are not touched.
pub fn restore<H>(host: &H, snapshot: &Snapshot) -> Result<RestoreSummary>
where
    H: Host + ?Sized,
{
    let mut summary = RestoreSummary::default();

    for (name, state) in snapshot.services() {
        if restore_service(host, name, state)? {
            summary.services_restored += 1;
        } else {
            summary.skipped.push(name.to_string());
        }
    }

    for (target, value) in snapshot.registry_values() {
        match value {
            Some(value) => {
                host.set_dword(&target.path, &target.name, value)
                    .with_context(|| format!("Failed to restore registry value '{}'", target))?;
                debug!("Restored '{}' to {}.", target, value);
                summary.registry_set += 1;
            }
            None => {
                host.delete_value_if_exists(&target.path, &target.name)
                    .with_context(|| format!("Failed to delete registry value '{}'", target))?;
                debug!("Removed '{}' (absent before freeze).", target);
                summary.registry_deleted += 1;
            }
        }
    }

    for (name, enabled) in snapshot.tasks() {
        if !task_exists(host, name).with_context(|| format!("Failed to query task '{}'", name))? {
            warn!("Task '{}' no longer exists; skipping.", name);
            summary.skipped.push(name.to_string());
            continue;
        }
        set_task_enabled(host, name, enabled)?;
        summary.tasks_restored += 1;
    }

    summary.power_restored = restore_power(host, snapshot)?;

    info!(
        "Restored {} services, {} registry values and {} tasks.",
        summary.services_restored,
        summary.registry_set + summary.registry_deleted,
        summary.tasks_restored
    );
    Ok(summary)
}

/// Replays only the power baseline.
///
/// # Returns
///
/// - `Ok(true)` if the snapshot carried a power baseline and it was replayed.
/// - `Ok(false)` if there was nothing to replay.
pub fn restore_power<H>(host: &H, snapshot: &Snapshot) -> Result<bool>
where
    H: Host + ?Sized,
{
    match &snapshot.power {
        Some(baseline) => {
            power::restore_power(host, baseline)?;
            Ok(true)
        }
        None => {
            debug!("No power baseline recorded.");
            Ok(false)
        }
    }
}

/// Puts a service's start mode back and restarts it if it was running.
///
/// Returns `Ok(false)` when the service no longer exists.
fn restore_service<H>(host: &H, name: &str, state: &ServiceState) -> Result<bool>
where
    H: Host + ?Sized,
{
    let query = |name: &str| {
        service_run_state(host, name).with_context(|| format!("Failed to query service '{}'", name))
    };
    if query(name)?.is_none() {
        warn!("Service '{}' no longer exists; skipping.", name);
        return Ok(false);
    }

    set_start_mode(host, name, state.start_mode)?;

    if state.was_running && state.start_mode != ServiceStartMode::Disabled {
        match query(name)? {
            Some(run_state) if run_state.is_inactive() => {
                control_service_best_effort(host, name, "start");
            }
            Some(run_state) => debug!("Service '{}' is {}; not starting.", name, run_state),
            None => warn!("Service '{}' disappeared during restore.", name),
        }
    }
    info!("Service '{}' restored to {}.", name, state.start_mode);
    Ok(true)
}
