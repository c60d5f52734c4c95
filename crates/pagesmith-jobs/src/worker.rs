//! Job worker runtime: claim, execute, report.
//!
//! One worker process runs one job at a time. The store's atomic claim is
//! the only coordination between workers, so scaling out is starting more
//! processes. Each iteration is a straight line: claim a job, mark it
//! started, resolve a handler, execute with a panic fence and a timeout,
//! write the terminal status back.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use pagesmith_core::defaults::{
    ENV_JOB_TIMEOUT_SECS, ENV_JOB_TYPE, ENV_MAX_JOBS, ENV_POLL_INTERVAL_MS, ENV_PROJECT_ROOT,
    ENV_WORKER_ID, JOB_POLL_INTERVAL_MS, JOB_TIMEOUT_SECS, WORKER_DEFAULT_MAX_JOBS,
};
use pagesmith_core::{truncate_message, Job, JobStore};

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::registry::HandlerRegistry;

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identity reported to the store on claims.
    pub worker_id: String,
    /// Only claim jobs of this type; `None` claims any known type.
    pub type_filter: Option<String>,
    /// One-shot mode: iterations before exiting.
    pub max_jobs: usize,
    /// Keep polling instead of exiting when the queue is empty.
    pub poll: bool,
    /// Sleep between polls when the queue is empty, in milliseconds.
    pub poll_interval_ms: u64,
    /// Site repository checkout job handlers operate on.
    pub project_root: PathBuf,
    pub verbose: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", Uuid::new_v4()),
            type_filter: None,
            max_jobs: WORKER_DEFAULT_MAX_JOBS,
            poll: false,
            poll_interval_ms: JOB_POLL_INTERVAL_MS,
            project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            verbose: false,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `PAGESMITH_WORKER_ID` | `worker-{uuid}` | Stable worker identity |
    /// | `PAGESMITH_JOB_TYPE` | any | Restrict claims to one job type |
    /// | `PAGESMITH_MAX_JOBS` | `1` | One-shot iteration budget |
    /// | `PAGESMITH_POLL_INTERVAL_MS` | `30000` | Empty-queue sleep |
    /// | `PAGESMITH_PROJECT_ROOT` | cwd | Site checkout to operate on |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(id) = std::env::var(ENV_WORKER_ID) {
            if !id.trim().is_empty() {
                config.worker_id = id;
            }
        }
        if let Ok(job_type) = std::env::var(ENV_JOB_TYPE) {
            if !job_type.trim().is_empty() {
                config.type_filter = Some(job_type);
            }
        }
        if let Some(max_jobs) = env_parse::<usize>(ENV_MAX_JOBS) {
            config.max_jobs = max_jobs.max(1);
        }
        if let Some(interval) = env_parse::<u64>(ENV_POLL_INTERVAL_MS) {
            config.poll_interval_ms = interval;
        }
        if let Ok(root) = std::env::var(ENV_PROJECT_ROOT) {
            if !root.trim().is_empty() {
                config.project_root = PathBuf::from(root);
            }
        }
        config
    }

    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    pub fn with_type_filter(mut self, job_type: impl Into<String>) -> Self {
        self.type_filter = Some(job_type.into());
        self
    }

    /// Set the one-shot iteration budget (clamped to at least 1).
    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs.max(1);
        self
    }

    pub fn with_poll(mut self, poll: bool) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// What one worker iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// A job was claimed and carried to a terminal status (or consumed by
    /// a failed start write).
    Processed,
    /// Nothing claimable, or the store was unreachable.
    NoJob,
}

/// Single-slot job worker.
pub struct Worker {
    store: Arc<dyn JobStore>,
    registry: Arc<HandlerRegistry>,
    config: WorkerConfig,
    job_timeout: Duration,
}

impl Worker {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<HandlerRegistry>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
            job_timeout: job_timeout_from_env(),
        }
    }

    /// Override the per-job timeout. Production reads
    /// `PAGESMITH_JOB_TIMEOUT_SECS`; this is for tests.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Log identity, registered handlers and (best effort) queue stats.
    pub async fn log_startup(&self) {
        info!(
            worker_id = %self.config.worker_id,
            type_filter = ?self.config.type_filter,
            handlers = ?self.registry.registered_types(),
            job_timeout_secs = self.job_timeout.as_secs(),
            "Worker starting"
        );
        match self.store.stats().await {
            Ok(stats) => info!(
                pending = stats.pending,
                running = stats.running,
                failed = stats.failed,
                total = stats.total,
                "Queue stats"
            ),
            Err(e) => debug!(error = %e, "Queue stats unavailable"),
        }
    }

    /// Run one claim-execute-report iteration.
    #[instrument(skip(self), fields(worker_id = %self.config.worker_id))]
    pub async fn run_once(&self) -> IterationOutcome {
        let job = match self
            .store
            .claim_next(&self.config.worker_id, self.config.type_filter.as_deref())
            .await
        {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!("No claimable job");
                return IterationOutcome::NoJob;
            }
            Err(e) => {
                // Indistinguishable from an empty queue for scheduling
                // purposes; poll mode retries after the usual sleep.
                warn!(error = %e, "Claim failed");
                return IterationOutcome::NoJob;
            }
        };

        let job_id = job.id;
        let job_type = job.job_type.clone();
        info!(job_id, job_type = %job_type, retries = job.retries, "Claimed job");

        if let Err(e) = self.store.mark_started(job_id).await {
            // The claim is ours but the start write was lost. Running the
            // handler anyway could race a sweep requeue, so the iteration
            // is consumed without executing.
            error!(job_id, error = %e, "Failed to mark job started");
            return IterationOutcome::Processed;
        }

        let Some(handler) = self.registry.get(&job_type) else {
            let message = format!("no handler registered for job type '{}'", job_type);
            warn!(job_id, job_type = %job_type, "Unknown job type");
            if let Err(e) = self.store.mark_failed(job_id, &message).await {
                error!(job_id, error = %e, "Failed to report unknown-type failure");
            }
            return IterationOutcome::Processed;
        };

        let start = Instant::now();
        let result = self.execute_handler(handler.clone(), job).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            JobResult::Success(data) => {
                info!(job_id, job_type = %job_type, duration_ms, "Job completed");
                if let Err(e) = self.store.mark_completed(job_id, data).await {
                    error!(job_id, error = %e, "Failed to mark job as completed");
                }
            }
            JobResult::Failed(message) => {
                let message = if message.trim().is_empty() {
                    "job failed without an error message".to_string()
                } else {
                    truncate_message(&message)
                };
                warn!(job_id, job_type = %job_type, duration_ms, error = %message, "Job failed");
                if let Err(e) = self.store.mark_failed(job_id, &message).await {
                    error!(job_id, error = %e, "Failed to mark job as failed");
                }
            }
        }
        IterationOutcome::Processed
    }

    /// Execute the handler on its own task, bounded by the job timeout.
    ///
    /// The spawn is the panic fence: a panicking handler surfaces as a
    /// `JoinError` here instead of unwinding through the worker loop.
    async fn execute_handler(&self, handler: Arc<dyn JobHandler>, job: Job) -> JobResult {
        let ctx = JobContext::new(job, self.config.worker_id.clone(), &self.config.project_root)
            .with_verbose(self.config.verbose);

        let task = tokio::spawn(async move { handler.execute(ctx).await });
        let abort = task.abort_handle();

        match tokio::time::timeout(self.job_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                JobResult::Failed(truncate_message(&format!("handler panicked: {}", join_err)))
            }
            Err(_) => {
                abort.abort();
                JobResult::Failed(format!(
                    "job exceeded timeout of {}s",
                    self.job_timeout.as_secs()
                ))
            }
        }
    }

    /// One-shot mode: up to `max_jobs` iterations, stopping early when the
    /// queue runs dry. Returns the number of jobs processed.
    pub async fn run_max_jobs(&self, max_jobs: usize) -> usize {
        let mut processed = 0;
        for _ in 0..max_jobs {
            match self.run_once().await {
                IterationOutcome::Processed => processed += 1,
                IterationOutcome::NoJob => break,
            }
        }
        processed
    }

    /// Poll mode: loop forever, sleeping between polls when the queue is
    /// empty. Shutdown is the caller's concern (select against a signal).
    pub async fn run_polling(&self) {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            "Polling for jobs"
        );
        loop {
            if self.run_once().await == IterationOutcome::NoJob {
                sleep(interval).await;
            }
        }
    }
}

fn job_timeout_from_env() -> Duration {
    let secs = env_parse::<u64>(ENV_JOB_TIMEOUT_SECS).unwrap_or(JOB_TIMEOUT_SECS);
    Duration::from_secs(secs)
}
