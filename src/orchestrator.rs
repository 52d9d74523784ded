// src/orchestrator.rs

use std::{fmt, path::PathBuf};

use anyhow::{Context, Result};
use strum_macros::{Display, EnumIter};
use tracing::{debug, error, info, warn};

use crate::{
    config::FreezeConfig,
    engine::{
        apply::{self, FreezeSummary},
        capture::{capture, CaptureIssue},
        restore::{self, RestoreSummary},
        Host,
    },
    power,
    query::{query_service, ServiceStatus},
    snapshot::{store::SnapshotStore, Snapshot},
};

/// Top-level operator actions. Used as the prefix of every log line an action emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum ActionId {
    Freeze,
    Unfreeze,
    PowerOn,
    PowerRestore,
    Status,
}

/// Result of a successful freeze.
#[derive(Debug, Clone)]
pub struct FreezeOutcome {
    /// The baseline that was persisted before anything changed.
    pub snapshot: Snapshot,
    pub issues: Vec<CaptureIssue>,
    pub summary: FreezeSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// No snapshot file exists.
    NothingToRestore,
    Restored(RestoreSummary),
}

/// Run state and start mode of one service, `None` when it does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    pub name: String,
    pub status: Option<ServiceStatus>,
}

/// Record counts of the stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub services: usize,
    pub registry_values: usize,
    pub tasks: usize,
    pub has_power: bool,
}

impl From<&Snapshot> for SnapshotSummary {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            services: snapshot.services().count(),
            registry_values: snapshot.registry_values().count(),
            tasks: snapshot.tasks().count(),
            has_power: snapshot.power.is_some(),
        }
    }
}

/// Read-only overview of the managed services and the snapshot file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub services: Vec<ServiceReport>,
    pub snapshot_path: PathBuf,
    pub snapshot: Option<SnapshotSummary>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for service in &self.services {
            match &service.status {
                Some(status) => writeln!(
                    f,
                    "{:<14} {:<13} start={}",
                    service.name,
                    status.run_state,
                    status
                        .start_mode
                        .map_or_else(|| "unknown".to_string(), |mode| mode.to_string())
                )?,
                None => writeln!(f, "{:<14} not found", service.name)?,
            }
        }
        match &self.snapshot {
            Some(summary) => write!(
                f,
                "snapshot: {} ({} services, {} registry values, {} tasks, power baseline: {})",
                self.snapshot_path.display(),
                summary.services,
                summary.registry_values,
                summary.tasks,
                if summary.has_power { "yes" } else { "no" }
            ),
            None => write!(f, "snapshot: none at {}", self.snapshot_path.display()),
        }
    }
}

/// Drives the freeze, unfreeze and power actions against one host and one snapshot file.
pub struct FreezeOrchestrator<H: Host> {
    host: H,
    config: FreezeConfig,
    store: SnapshotStore,
}

impl<H: Host> FreezeOrchestrator<H> {
    pub fn new(host: H, config: FreezeConfig) -> Self {
        let store = SnapshotStore::new(config.snapshot_path.clone());
        Self {
            host,
            config,
            store,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    fn load(&self, id: ActionId) -> Result<Option<Snapshot>> {
        self.store
            .load()
            .with_context(|| format!("{} -> Failed to load snapshot", id))
    }

    fn save(&self, id: ActionId, snapshot: &Snapshot) -> Result<()> {
        self.store
            .save(snapshot)
            .with_context(|| format!("{} -> Failed to save snapshot", id))?;
        info!(
            "{} -> Snapshot saved to '{}'.",
            id,
            self.store.path().display()
        );
        Ok(())
    }

    /// Captures the current state, persists it, then applies the freeze.
    ///
    /// The new snapshot replaces the stored one, except that an existing power
    /// baseline is carried over.
    ///
    /// # Returns
    ///
    /// - `Ok(FreezeOutcome)` if the freeze was applied.
    /// - `Err(anyhow::Error)` if capture, persistence or a mutation failed. A
    ///   snapshot written before the failure stays on disk.
    pub fn freeze(&self) -> Result<FreezeOutcome> {
        let id = ActionId::Freeze;
        info!("{} -> Capturing current state.", id);

        let previous_power = self.load(id)?.and_then(|snapshot| snapshot.power);

        let report = capture(
            &self.host,
            &self.config.services,
            &self.config.registry_targets(),
            &self.config.task_selectors,
        )
        .with_context(|| format!("{} -> Capture failed", id))?;
        for issue in &report.issues {
            warn!("{} -> {}: {:?}", id, issue.resource, issue.kind);
        }

        let mut snapshot = report.snapshot;
        if previous_power.is_some() {
            debug!("{} -> Keeping existing power baseline.", id);
        }
        snapshot.power = previous_power;
        self.save(id, &snapshot)?;

        let summary = apply::freeze(
            &self.host,
            &self.config.services,
            &self.config.registry_policies,
            &self.config.task_selectors,
        )
        .map_err(|e| {
            error!("{} -> Freeze aborted: {:#}", id, e);
            e
        })?;

        info!(
            "{} -> Done: {} services disabled, {} policies written, {} tasks disabled.",
            id, summary.services_disabled, summary.policies_written, summary.tasks_disabled
        );
        Ok(FreezeOutcome {
            snapshot,
            issues: report.issues,
            summary,
        })
    }

    /// Restores everything recorded in the stored snapshot. The file is kept.
    pub fn unfreeze(&self) -> Result<RestoreOutcome> {
        let id = ActionId::Unfreeze;
        let Some(snapshot) = self.load(id)? else {
            info!("{} -> No snapshot found; nothing to restore.", id);
            return Ok(RestoreOutcome::NothingToRestore);
        };
        if snapshot.is_empty() {
            info!(
                "{} -> Snapshot at '{}' records nothing; nothing to restore.",
                id,
                self.store.path().display()
            );
            return Ok(RestoreOutcome::NothingToRestore);
        }

        let summary = restore::restore(&self.host, &snapshot).map_err(|e| {
            error!("{} -> Restore aborted: {:#}", id, e);
            e
        })?;
        for name in &summary.skipped {
            warn!("{} -> '{}' no longer exists and was skipped.", id, name);
        }
        info!("{} -> Done.", id);
        Ok(RestoreOutcome::Restored(summary))
    }

    /// Disables hibernation and every sleep, display and hibernate timeout.
    ///
    /// The current power settings are captured and persisted first, unless
    /// the stored snapshot already holds a power baseline.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if a new power baseline was captured by this call.
    /// - `Ok(false)` if an existing baseline was kept.
    pub fn power_always_on(&self) -> Result<bool> {
        let id = ActionId::PowerOn;
        let mut snapshot = self.load(id)?.unwrap_or_default();

        let captured = snapshot.power.is_none();
        if captured {
            let baseline = power::capture(&self.host, &self.host, &self.config.hibernate_file);
            info!("{} -> Captured power baseline: {:?}", id, baseline);
            snapshot.power = Some(baseline);
            self.save(id, &snapshot)?;
        } else {
            debug!("{} -> Power baseline already recorded; keeping it.", id);
        }

        power::apply_always_on(&self.host)
            .with_context(|| format!("{} -> Failed to apply always-on power settings", id))?;
        info!("{} -> Done.", id);
        Ok(captured)
    }

    /// Replays only the stored power baseline.
    ///
    /// Returns `Ok(false)` when there is no snapshot or it has no power baseline.
    pub fn restore_power(&self) -> Result<bool> {
        let id = ActionId::PowerRestore;
        let Some(snapshot) = self.load(id)? else {
            info!("{} -> No snapshot found; nothing to restore.", id);
            return Ok(false);
        };
        let restored = restore::restore_power(&self.host, &snapshot)
            .with_context(|| format!("{} -> Failed to restore power settings", id))?;
        if restored {
            info!("{} -> Done.", id);
        } else {
            info!("{} -> No power baseline recorded; nothing to restore.", id);
        }
        Ok(restored)
    }

    /// Reports the status services and the stored snapshot without changing anything.
    pub fn status(&self) -> Result<StatusReport> {
        let id = ActionId::Status;
        let services = self
            .config
            .status_services
            .iter()
            .map(|name| {
                let status = query_service(&self.host, name)
                    .with_context(|| format!("{} -> Failed to query service '{}'", id, name))?;
                Ok(ServiceReport {
                    name: name.clone(),
                    status,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let snapshot = self.load(id)?;
        Ok(StatusReport {
            services,
            snapshot_path: self.store.path().to_path_buf(),
            snapshot: snapshot.as_ref().map(SnapshotSummary::from),
        })
    }
}
