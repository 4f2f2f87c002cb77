//! Helpers for running short-lived external commands
//!
//! Used for scheduler and environment tooling (salloc, scancel, seff, sbatch,
//! the module shell) whose output the runner needs to inspect. The
//! preprocessing program itself is not run through here; its output is
//! inherited.

use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished command
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or -1 when terminated by a signal
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }
}

/// Runs a command to completion, capturing stdout and stderr
pub async fn capture(command: &mut Command) -> std::io::Result<CommandOutput> {
    command.stdin(Stdio::null());
    let output = command.output().await?;
    let captured = CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };
    log_output(command, &captured);
    Ok(captured)
}

/// Runs a command with `input` written to its stdin
pub async fn capture_with_input(
    command: &mut Command,
    input: &[u8],
) -> std::io::Result<CommandOutput> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input).await?;
        // Dropping closes the pipe so the child sees EOF
        drop(stdin);
    }

    let output = child.wait_with_output().await?;
    let captured = CommandOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };
    log_output(command, &captured);
    Ok(captured)
}

fn log_output(command: &Command, output: &CommandOutput) {
    let program = command.as_std().get_program().to_string_lossy().to_string();
    if !output.stdout.trim().is_empty() {
        debug!("{} stdout: {}", program, output.stdout.trim());
    }
    if !output.stderr.trim().is_empty() {
        debug!("{} stderr: {}", program, output.stderr.trim());
    }
}
