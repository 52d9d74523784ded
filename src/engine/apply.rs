// src/engine/apply.rs

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::{
    config::RegistryPolicy,
    engine::{
        capture::resolve_selectors, control_service_best_effort, set_start_mode,
        set_task_enabled, Host,
    },
    query::{service_run_state, task_exists},
    selector::TaskSelector,
    snapshot::ServiceStartMode,
};

/// What a freeze changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreezeSummary {
    pub services_disabled: usize,
    pub services_missing: usize,
    pub policies_written: usize,
    pub tasks_disabled: usize,
}

/// Applies the freeze: services, then registry policies, then tasks.
///
/// Missing services and tasks are skipped. A failing mutation aborts the
/// remaining steps; whatever already ran stays applied.
pub fn freeze<H>(
    host: &H,
    services: &[String],
    policies: &[RegistryPolicy],
    task_selectors: &[TaskSelector],
) -> Result<FreezeSummary>
where
    H: Host + ?Sized,
{
    let mut summary = FreezeSummary::default();
    for name in services {
        if disable_service(host, name)? {
            summary.services_disabled += 1;
        } else {
            summary.services_missing += 1;
        }
    }
    summary.policies_written = write_policies(host, policies)?;
    summary.tasks_disabled = disable_tasks(host, task_selectors)?;
    debug!("Freeze applied: {:?}", summary);
    Ok(summary)
}

/// Stops a service if it is active, then disables it.
///
/// # Returns
///
/// - `Ok(true)` if the service was disabled.
/// - `Ok(false)` if the service does not exist.
/// - `Err(anyhow::Error)` if the start mode could not be changed.
pub fn disable_service<H>(host: &H, name: &str) -> Result<bool>
where
    H: Host + ?Sized,
{
    let Some(run_state) = service_run_state(host, name)
        .with_context(|| format!("Failed to query service '{}'", name))?
    else {
        warn!("Service '{}' not found; skipping.", name);
        return Ok(false);
    };
    if run_state.is_active() {
        control_service_best_effort(host, name, "stop");
    }
    set_start_mode(host, name, ServiceStartMode::Disabled)?;
    info!("Service '{}' disabled.", name);
    Ok(true)
}

fn write_policies<H>(host: &H, policies: &[RegistryPolicy]) -> Result<usize>
where
    H: Host + ?Sized,
{
    for policy in policies {
        host.set_dword(&policy.target.path, &policy.target.name, policy.frozen_value)
            .with_context(|| format!("Failed to set registry value '{}'", policy.target))?;
        debug!("Set '{}' to {}.", policy.target, policy.frozen_value);
    }
    info!("Wrote {} update policy values.", policies.len());
    Ok(policies.len())
}

fn disable_tasks<H>(host: &H, selectors: &[TaskSelector]) -> Result<usize>
where
    H: Host + ?Sized,
{
    let mut disabled = 0;
    for (selector, names) in resolve_selectors(host, selectors)? {
        let mut matched = 0;
        for name in names {
            if !task_exists(host, &name)
                .with_context(|| format!("Failed to query task '{}'", name))?
            {
                debug!("Task '{}' not found; skipping.", name);
                continue;
            }
            set_task_enabled(host, &name, false)?;
            matched += 1;
        }
        info!(
            "Disabled {} tasks for {} selector '{}'.",
            matched, selector.kind, selector.pattern
        );
        disabled += matched;
    }
    Ok(disabled)
}
