//! Trait definitions for pagesmith's pluggable seams.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::{Result, StoreResult};
use crate::models::{Job, JobFilter, NewJob, QueueStats, SweepOutcome, UpdateCandidate};

// =============================================================================
// JOB STORE
// =============================================================================

/// Client boundary to the remote job store.
///
/// The store owns persistence and claim arbitration; implementations are
/// thin typed clients. Every method maps a transport failure into the
/// `StoreError` taxonomy so callers can branch on retryability without
/// inspecting message text.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Queue a new job, returning it as stored.
    async fn create_job(&self, new_job: &NewJob) -> StoreResult<Job>;

    /// Queue several jobs atomically, returning their ids in input order.
    async fn create_jobs(&self, new_jobs: &[NewJob]) -> StoreResult<Vec<i64>>;

    /// List jobs matching the filter, newest first.
    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>>;

    /// Fetch a single job by id.
    async fn get_job(&self, id: i64) -> StoreResult<Job>;

    /// Atomically claim the next pending job for this worker, optionally
    /// restricted to one job type. `None` when the queue is empty.
    async fn claim_next(&self, worker_id: &str, job_type: Option<&str>) -> StoreResult<Option<Job>>;

    /// Transition a claimed job to running.
    async fn mark_started(&self, id: i64) -> StoreResult<()>;

    /// Transition a running job to completed, attaching result data.
    async fn mark_completed(&self, id: i64, result: Option<JsonValue>) -> StoreResult<()>;

    /// Record a failed attempt. The store increments the retry counter and
    /// requeues the job while budget remains; otherwise it stays failed.
    async fn mark_failed(&self, id: i64, error: &str) -> StoreResult<()>;

    /// Cancel a job that has not started executing.
    async fn cancel(&self, id: i64) -> StoreResult<()>;

    /// Queue statistics summary.
    async fn stats(&self) -> StoreResult<QueueStats>;

    /// Fail jobs stuck claimed/running longer than the cutoff. Ones with
    /// retry budget left go back to pending.
    async fn sweep(&self, stale_minutes: i64) -> StoreResult<SweepOutcome>;
}

// =============================================================================
// UPDATE PLANNER
// =============================================================================

/// Source of page-update candidates for the auto-update digest.
///
/// The production implementation shells out to the content pipeline's
/// planner; tests substitute a fixed list. Candidates come back in priority
/// order, which the budget admission preserves.
#[async_trait]
pub trait UpdatePlanner: Send + Sync {
    /// Propose pages to update, most valuable first.
    async fn candidates(&self, window_hours: Option<i64>) -> Result<Vec<UpdateCandidate>>;
}
