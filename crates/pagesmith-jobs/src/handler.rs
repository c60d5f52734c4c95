//! Job handler contract and execution context.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use pagesmith_core::{Error, Job, Result};

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
    /// Identity of the worker executing the job.
    pub worker_id: String,
    /// Root of the site repository checkout handlers may edit.
    pub project_root: PathBuf,
    /// Whether verbose diagnostics were requested.
    pub verbose: bool,
}

impl JobContext {
    /// Create a context for a claimed job.
    pub fn new(job: Job, worker_id: impl Into<String>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            job,
            worker_id: worker_id.into(),
            project_root: project_root.into(),
            verbose: false,
        }
    }

    /// Enable verbose handler diagnostics.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Get the raw job parameters.
    pub fn params(&self) -> Option<&JsonValue> {
        self.job.params.as_ref()
    }

    /// Deserialize the job parameters into a handler's typed struct.
    ///
    /// Absent params deserialize from an empty object, so a struct whose
    /// fields all carry defaults accepts a job queued without any.
    pub fn typed_params<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self
            .job
            .params
            .clone()
            .unwrap_or_else(|| JsonValue::Object(Default::default()));
        serde_json::from_value(value)
            .map_err(|e| Error::InvalidInput(format!("invalid job params: {}", e)))
    }
}

/// Result of job execution.
///
/// This is the whole handler/worker contract: success data becomes the
/// job's `result`, a failure message becomes its `error` (after which the
/// store requeues the job while retry budget remains).
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed with an error message.
    Failed(String),
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Success(_))
    }
}

/// Trait for job handlers.
///
/// `execute` is infallible by design: anything that goes wrong becomes a
/// `JobResult::Failed` so the worker can report it to the store instead of
/// deciding locally what an `Err` means.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job type string this handler processes.
    fn job_type(&self) -> &'static str;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;

    /// Check if this handler can process the given job type.
    fn can_handle(&self, job_type: &str) -> bool {
        self.job_type() == job_type
    }
}
