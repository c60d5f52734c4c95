//! Validation gate handler.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use pagesmith_core::defaults::ENV_VALIDATE_CMD;
use pagesmith_core::job_type;

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::validate::{run_gate_command, run_validation_gate, ValidationOutcome};

/// Runs the site validation gate and reports its verdict.
///
/// Unlike the advisory run inside batch commits, a `verify` job treats gate
/// failure as job failure, and a missing gate command as one too: a verify
/// that checks nothing should not read as green.
#[derive(Debug, Default)]
pub struct VerifyHandler {
    command: Option<String>,
}

impl VerifyHandler {
    /// The gate command is resolved from the environment at execution time.
    pub fn new() -> Self {
        Self { command: None }
    }

    /// Fixed gate command, ignoring the environment.
    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
        }
    }
}

#[async_trait]
impl JobHandler for VerifyHandler {
    fn job_type(&self) -> &'static str {
        job_type::VERIFY
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let outcome = match &self.command {
            Some(command) => run_gate_command(&ctx.project_root, command).await,
            None => run_validation_gate(&ctx.project_root).await,
        };

        match outcome {
            ValidationOutcome::Passed(summary) => {
                info!(job_id = ctx.job.id, "Validation gate passed");
                JobResult::Success(Some(json!({
                    "validation": "passed",
                    "summary": summary,
                })))
            }
            ValidationOutcome::Failed(detail) => {
                JobResult::Failed(format!("validation gate failed: {}", detail))
            }
            ValidationOutcome::Skipped => JobResult::Failed(format!(
                "{} is not set; nothing to verify",
                ENV_VALIDATE_CMD
            )),
        }
    }
}
