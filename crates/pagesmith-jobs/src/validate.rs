//! Site validation gate.
//!
//! Deployments configure a shell command (`PAGESMITH_VALIDATE_CMD`) that
//! lints or auto-fixes the working tree: a link checker, a formatter, a
//! build smoke test. Batch commits run it advisorily between applying
//! changes and staging them (so auto-fixes get committed); `verify` jobs
//! treat its verdict as the job outcome.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use pagesmith_core::defaults::{ENV_VALIDATE_CMD, VALIDATE_TIMEOUT_SECS};
use pagesmith_core::truncate_message;

use crate::proc::run_captured;

/// Verdict of a validation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Gate ran and passed; carries trimmed stdout as a summary.
    Passed(String),
    /// Gate ran and reported problems, or could not run at all.
    Failed(String),
    /// No gate command configured.
    Skipped,
}

impl ValidationOutcome {
    /// Short wire spelling for result payloads and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationOutcome::Passed(_) => "passed",
            ValidationOutcome::Failed(_) => "failed",
            ValidationOutcome::Skipped => "skipped",
        }
    }
}

/// The configured gate command, if any. Blank counts as unset.
pub fn configured_gate() -> Option<String> {
    std::env::var(ENV_VALIDATE_CMD)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Run the environment-configured validation gate in `root`.
pub async fn run_validation_gate(root: &Path) -> ValidationOutcome {
    match configured_gate() {
        Some(command) => run_gate_command(root, &command).await,
        None => ValidationOutcome::Skipped,
    }
}

/// Run one gate command string via `sh -c`.
///
/// Spawn failures and timeouts surface as `Failed` with the cause; only an
/// unset command yields `Skipped`.
pub(crate) async fn run_gate_command(root: &Path, command: &str) -> ValidationOutcome {
    debug!(command, "Running validation gate");
    let result = run_captured(
        Command::new("sh").arg("-c").arg(command).current_dir(root),
        Duration::from_secs(VALIDATE_TIMEOUT_SECS),
    )
    .await;

    match result {
        Ok(output) if output.success() => {
            ValidationOutcome::Passed(truncate_message(output.stdout.trim()))
        }
        Ok(output) => {
            let detail = if output.stderr.trim().is_empty() {
                output.stdout
            } else {
                output.stderr
            };
            ValidationOutcome::Failed(truncate_message(detail.trim()))
        }
        Err(e) => ValidationOutcome::Failed(e.to_string()),
    }
}
