// src/engine/capture.rs

use anyhow::{Context, Result};
use tracing::{debug, trace, warn};

use crate::{
    engine::Host,
    query::{list_all_tasks, query_service, task_enabled, task_exists, ServiceStatus},
    selector::TaskSelector,
    snapshot::{RegistryTarget, ServiceState, Snapshot},
    utils::command::CommandExecutor,
};

/// A managed resource named in a capture issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Service(String),
    Registry(RegistryTarget),
    Task(String),
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Service(name) => write!(f, "service '{}'", name),
            Resource::Registry(target) => write!(f, "registry value '{}'", target),
            Resource::Task(name) => write!(f, "task '{}'", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureIssueKind {
    /// The resource does not exist and was left out of the snapshot.
    NotFound,
    /// The state could not be determined. A task is recorded as enabled; a
    /// service with an unreadable start mode is left out of the snapshot.
    Ambiguous,
}

/// Something capture could not record faithfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureIssue {
    pub resource: Resource,
    pub kind: CaptureIssueKind,
}

/// Result of a capture: the snapshot plus every resource it skipped or guessed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureReport {
    pub snapshot: Snapshot,
    pub issues: Vec<CaptureIssue>,
}

impl CaptureReport {
    fn issue(&mut self, resource: Resource, kind: CaptureIssueKind) {
        debug!("Capture issue for {}: {:?}", resource, kind);
        self.issues.push(CaptureIssue { resource, kind });
    }

    fn has_task_issue(&self, name: &str) -> bool {
        self.issues.iter().any(|issue| {
            matches!(&issue.resource, Resource::Task(task) if task.eq_ignore_ascii_case(name))
        })
    }
}

/// Records the current state of the given services, registry values and tasks.
///
/// Missing services and tasks are skipped and reported in `issues`. Absent
/// registry values are recorded as absent. A task whose enabled flag cannot be
/// determined is recorded as enabled and reported as ambiguous. A service whose
/// start mode cannot be read is reported as ambiguous and not recorded.
///
/// # Returns
///
/// - `Ok(CaptureReport)` with the snapshot and the issues met along the way.
/// - `Err(anyhow::Error)` if a query tool cannot be launched or the registry
///   cannot be read.
pub fn capture<H>(
    host: &H,
    services: &[String],
    registry_targets: &[RegistryTarget],
    task_selectors: &[TaskSelector],
) -> Result<CaptureReport>
where
    H: Host + ?Sized,
{
    let mut report = CaptureReport::default();
    capture_services(host, services, &mut report)?;
    capture_registry(host, registry_targets, &mut report)?;
    capture_tasks(host, task_selectors, &mut report)?;
    debug!(
        "Captured {} services, {} registry values and {} tasks ({} issues).",
        report.snapshot.services().count(),
        report.snapshot.registry_values().count(),
        report.snapshot.tasks().count(),
        report.issues.len()
    );
    Ok(report)
}

fn capture_services<H>(host: &H, services: &[String], report: &mut CaptureReport) -> Result<()>
where
    H: Host + ?Sized,
{
    for name in services {
        let status = query_service(host, name)
            .with_context(|| format!("Failed to query service '{}'", name))?;
        match status {
            Some(ServiceStatus {
                run_state,
                start_mode: Some(start_mode),
            }) => {
                trace!("Service '{}' is {} ({}).", name, run_state, start_mode);
                report.snapshot.record_service(
                    name,
                    ServiceState {
                        start_mode,
                        was_running: run_state.is_active(),
                    },
                );
            }
            Some(ServiceStatus { start_mode: None, .. }) => {
                warn!("Could not read start mode of service '{}'; not recording it.", name);
                report.issue(Resource::Service(name.clone()), CaptureIssueKind::Ambiguous);
            }
            None => report.issue(Resource::Service(name.clone()), CaptureIssueKind::NotFound),
        }
    }
    Ok(())
}

fn capture_registry<H>(
    host: &H,
    targets: &[RegistryTarget],
    report: &mut CaptureReport,
) -> Result<()>
where
    H: Host + ?Sized,
{
    for target in targets {
        let value = host
            .get_dword(&target.path, &target.name)
            .with_context(|| format!("Failed to read registry value '{}'", target))?;
        trace!("Registry value '{}' is {:?}.", target, value);
        report.snapshot.record_registry(target.clone(), value);
    }
    Ok(())
}

/// Expands selectors into concrete task names, listing all tasks at most once.
pub(crate) fn resolve_selectors<E>(
    exec: &E,
    selectors: &[TaskSelector],
) -> Result<Vec<(TaskSelector, Vec<String>)>>
where
    E: CommandExecutor + ?Sized,
{
    let mut all_tasks: Option<Vec<String>> = None;
    let mut resolved = Vec::with_capacity(selectors.len());
    for selector in selectors {
        if selector.needs_enumeration() && all_tasks.is_none() {
            all_tasks = Some(list_all_tasks(exec).context("Failed to list scheduled tasks")?);
        }
        let names = selector.resolve(all_tasks.as_deref().unwrap_or_default());
        trace!("Selector {:?} matched {} tasks.", selector, names.len());
        resolved.push((selector.clone(), names));
    }
    Ok(resolved)
}

fn capture_tasks<H>(host: &H, selectors: &[TaskSelector], report: &mut CaptureReport) -> Result<()>
where
    H: Host + ?Sized,
{
    for (_, names) in resolve_selectors(host, selectors)? {
        for name in names {
            if report.snapshot.task(&name).is_some() || report.has_task_issue(&name) {
                continue;
            }
            if !task_exists(host, &name)
                .with_context(|| format!("Failed to query task '{}'", name))?
            {
                report.issue(Resource::Task(name), CaptureIssueKind::NotFound);
                continue;
            }
            let enabled = match task_enabled(host, &name)
                .with_context(|| format!("Failed to query task '{}'", name))?
            {
                Some(enabled) => enabled,
                None => {
                    warn!("Could not determine state of task '{}'; assuming enabled.", name);
                    report.issue(Resource::Task(name.clone()), CaptureIssueKind::Ambiguous);
                    true
                }
            };
            report.snapshot.record_task(&name, enabled);
        }
    }
    Ok(())
}
