// src/main.rs

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[cfg_attr(not(windows), allow(dead_code))]
#[command(name = "update-freeze")]
#[command(about = "Freeze and restore Windows Update services, policies, tasks and power settings", long_about = None)]
struct Cli {
    /// Snapshot file (default: %ProgramData%\UpdateFreeze\snapshot.txt)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,
    /// Log every external command
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[cfg_attr(not(windows), allow(dead_code))]
enum Commands {
    /// Record the current state, then disable Windows Update
    Freeze,
    /// Restore everything recorded by the last freeze
    Unfreeze,
    /// Disable sleep, display and hibernate timeouts
    PowerOn,
    /// Restore the power settings recorded before `power-on`
    PowerRestore,
    /// Show update services and the stored snapshot
    Status,
}

impl Commands {
    #[cfg(windows)]
    fn mutates(&self) -> bool {
        !matches!(self, Commands::Status)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(windows)]
fn run(cli: Cli) -> anyhow::Result<()> {
    use update_freeze::{
        config::FreezeConfig,
        engine::HostParts,
        orchestrator::{FreezeOrchestrator, RestoreOutcome},
        utils::{
            command::SystemCommandExecutor, registry::WindowsRegistry, windows::is_elevated,
            LocalFiles,
        },
    };

    if cli.command.mutates() && !is_elevated() {
        tracing::warn!("Not running as administrator; most changes will be refused.");
    }

    let mut config = FreezeConfig::default();
    if let Some(path) = cli.snapshot {
        config = config.with_snapshot_path(path);
    }
    let host = HostParts {
        commands: SystemCommandExecutor,
        registry: WindowsRegistry,
        files: LocalFiles,
    };
    let orchestrator = FreezeOrchestrator::new(host, config);

    match cli.command {
        Commands::Freeze => {
            let outcome = orchestrator.freeze()?;
            println!(
                "Frozen: {} services, {} policies, {} tasks. Snapshot: {}",
                outcome.summary.services_disabled,
                outcome.summary.policies_written,
                outcome.summary.tasks_disabled,
                orchestrator.store().path().display()
            );
        }
        Commands::Unfreeze => match orchestrator.unfreeze()? {
            RestoreOutcome::NothingToRestore => println!("Nothing to restore."),
            RestoreOutcome::Restored(summary) => println!(
                "Restored: {} services, {} registry values, {} tasks{}.",
                summary.services_restored,
                summary.registry_set + summary.registry_deleted,
                summary.tasks_restored,
                if summary.power_restored { ", power settings" } else { "" }
            ),
        },
        Commands::PowerOn => {
            orchestrator.power_always_on()?;
            println!("Always-on power settings applied.");
        }
        Commands::PowerRestore => {
            if orchestrator.restore_power()? {
                println!("Power settings restored.");
            } else {
                println!("No power baseline recorded; nothing to restore.");
            }
        }
        Commands::Status => println!("{}", orchestrator.status()?),
    }
    Ok(())
}

#[cfg(not(windows))]
fn run(_cli: Cli) -> anyhow::Result<()> {
    anyhow::bail!("update-freeze manages Windows services and only runs on Windows")
}
