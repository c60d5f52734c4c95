//! Bounded subprocess execution.
//!
//! Every external process the handlers touch (git, gh, the validation gate,
//! the content pipeline) runs through [`run_captured`]: output captured,
//! wall-clock bounded. Exit status is returned for the caller to judge, so
//! gates can treat non-zero as a verdict rather than an error.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Command;

use pagesmith_core::{Error, Result};

/// Captured output of a finished subprocess.
#[derive(Debug)]
pub(crate) struct CmdOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Run a command with a timeout, capturing stdout and stderr.
///
/// Spawn failures and timeouts are errors; a non-zero exit is not. On
/// timeout the child is killed, not orphaned.
pub(crate) async fn run_captured(cmd: &mut Command, timeout: Duration) -> Result<CmdOutput> {
    cmd.kill_on_drop(true);
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| {
            Error::Internal(format!(
                "External command timed out after {}s",
                timeout.as_secs()
            ))
        })?
        .map_err(|e| Error::Internal(format!("Failed to execute command: {}", e)))?;

    Ok(CmdOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
