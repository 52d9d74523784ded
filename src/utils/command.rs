// src/utils/command.rs

use std::process::{Command, Stdio};

use tracing::{debug, trace};

use crate::errors::CommandError;

/// Whether a nonzero exit code is reported as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Nonzero exit codes become `CommandError::NonZeroExit`.
    Strict,
    /// Nonzero exit codes are returned to the caller as data.
    Tolerant,
}

/// Captured result of one external program run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external command-line tools (`sc.exe`, `schtasks`, `powercfg`).
///
/// Every capture, freeze and restore step is expressed through this trait so the
/// engine can be driven by a deterministic fake.
pub trait CommandExecutor {
    /// Runs `program` with `args` and blocks until it exits.
    ///
    /// # Returns
    ///
    /// - `Ok(CommandOutput)` once the program has exited (any exit code in
    ///   `Tolerant` mode, zero in `Strict` mode).
    /// - `Err(CommandError::Spawn)` if the program could not be launched.
    /// - `Err(CommandError::NonZeroExit)` for a failing exit code in `Strict` mode.
    fn run(&self, program: &str, args: &[&str], mode: RunMode)
        -> Result<CommandOutput, CommandError>;
}

/// Converts a nonzero exit into an error when running in `Strict` mode.
pub fn check_exit(
    program: &str,
    args: &[&str],
    mode: RunMode,
    output: CommandOutput,
) -> Result<CommandOutput, CommandError> {
    if mode == RunMode::Strict && !output.success() {
        return Err(CommandError::NonZeroExit {
            program: program.to_string(),
            args: args.join(" "),
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}

/// Executes programs on the local machine with stdout and stderr captured.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        mode: RunMode,
    ) -> Result<CommandOutput, CommandError> {
        debug!("> {} {}", program, args.join(" "));

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let output = command.output().map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

        let output = CommandOutput {
            // Terminated by a signal: no code, treat as failure.
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.stdout.trim().is_empty() {
            trace!("{}", output.stdout.trim_end());
        }
        if !output.stderr.trim().is_empty() {
            debug!("{} stderr: {}", program, output.stderr.trim_end());
        }

        check_exit(program, args, mode, output)
    }
}
