//! Liveness probe handler.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use pagesmith_core::job_type;

use crate::handler::{JobContext, JobHandler, JobResult};

/// Answers `ping` jobs with a pong carrying the worker identity.
///
/// Queue one and watch it complete to prove the store, a worker and the
/// claim loop end to end.
#[derive(Debug, Default)]
pub struct PingHandler;

impl PingHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobHandler for PingHandler {
    fn job_type(&self) -> &'static str {
        job_type::PING
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        JobResult::Success(Some(json!({
            "message": "pong",
            "workerId": ctx.worker_id,
            "timestamp": Utc::now().to_rfc3339(),
        })))
    }
}
