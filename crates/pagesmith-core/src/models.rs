//! Wire models shared across the pagesmith worker system.
//!
//! Every type that crosses the job-store HTTP boundary lives here, serialized
//! in the store's camelCase dialect. Handler-specific parameter structs stay
//! with their handlers; only shapes shared between producers and consumers
//! (jobs, file changes, planner candidates) are defined centrally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::defaults;

// =============================================================================
// JOB TYPES
// =============================================================================

/// Status of a job in the store's queue.
///
/// Transitions are strictly forward; the one exception is the store-internal
/// requeue of a failed job that still has retry budget (failed -> pending).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Claimed,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Wire spelling of the status, as used in query strings and payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Claimed => "claimed",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition can occur (short of a requeue).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Legal transition check. Cancel is only reachable before execution
    /// starts; failed -> pending is the store's retry requeue.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Claimed)
                | (Claimed, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Pending, Cancelled)
                | (Claimed, Cancelled)
                | (Failed, Pending)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known job type strings.
///
/// The dispatch key is an open string on the wire; these constants cover the
/// types this worker ships handlers for. Deployments may register more.
pub mod job_type {
    /// Queue/worker liveness probe.
    pub const PING: &str = "ping";
    /// Run the site validation gate and report its outcome.
    pub const VERIFY: &str = "verify";
    /// Revise an existing page through the content pipeline.
    pub const PAGE_IMPROVE: &str = "page-improve";
    /// Produce a new page through the content pipeline.
    pub const PAGE_CREATE: &str = "page-create";
    /// Plan a batch of page updates and fan out child jobs.
    pub const AUTO_UPDATE_DIGEST: &str = "auto-update-digest";
    /// Aggregate a batch's child results into one branch and pull request.
    pub const BATCH_COMMIT: &str = "batch-commit";

    /// All built-in job types, in registration order.
    pub const BUILTIN: [&str; 6] = [
        PING,
        VERIFY,
        PAGE_IMPROVE,
        PAGE_CREATE,
        AUTO_UPDATE_DIGEST,
        BATCH_COMMIT,
    ];
}

/// A job as stored and served by the remote job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: i64,
    /// Dispatch key, e.g. `"page-improve"`.
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    pub priority: i32,
    #[serde(default)]
    pub params: Option<JsonValue>,
    #[serde(default)]
    pub result: Option<JsonValue>,
    #[serde(default)]
    pub error: Option<String>,
    pub retries: i32,
    pub max_retries: i32,
    #[serde(default)]
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Request body for queueing a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonValue>,
    pub priority: i32,
    pub max_retries: i32,
}

impl NewJob {
    /// New job with default priority and retry budget.
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            params: None,
            priority: defaults::JOB_DEFAULT_PRIORITY,
            max_retries: defaults::JOB_MAX_RETRIES,
        }
    }

    pub fn with_params(mut self, params: JsonValue) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Filter for listing jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub job_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl JobFilter {
    pub fn by_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Queue statistics summary: one count per status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub pending: i64,
    pub claimed: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub total: i64,
}

/// Outcome of a stale-job sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepOutcome {
    /// Jobs force-failed because they sat claimed/running past the cutoff.
    pub swept: i64,
}

// =============================================================================
// FILE CHANGES
// =============================================================================

/// One desired file state emitted by a content producer.
///
/// `content: Some(_)` carries the complete file text (never a diff);
/// `content: None` means delete the file at `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    /// Repository-relative path.
    pub path: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl FileChange {
    pub fn write(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Some(content.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: None,
        }
    }

    pub fn is_delete(&self) -> bool {
        self.content.is_none()
    }
}

/// Result payload of a content-producing job (page-improve, page-create).
///
/// The batch-commit aggregator parses this shape back out of each completed
/// child's `result`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentJobResult {
    #[serde(default)]
    pub file_changes: Vec<FileChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

// =============================================================================
// UPDATE PLANNING
// =============================================================================

/// Cost tier of a planned page update.
///
/// Tiers carry fixed dollar estimates for budget admission only; the actual
/// spend happens downstream in the content pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateTier {
    /// Small touch-ups: link fixes, metadata refresh.
    Light,
    /// Section-level rewrite with source checking.
    Standard,
    /// Full-page research and rewrite.
    Deep,
}

impl UpdateTier {
    /// Estimated cost in USD used for budget admission.
    pub fn cost_usd(&self) -> f64 {
        match self {
            UpdateTier::Light => defaults::TIER_LIGHT_COST_USD,
            UpdateTier::Standard => defaults::TIER_STANDARD_COST_USD,
            UpdateTier::Deep => defaults::TIER_DEEP_COST_USD,
        }
    }
}

/// One page the planner proposes to update, in priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCandidate {
    /// Repository-relative page path.
    pub page: String,
    /// Human-readable reason the planner selected this page.
    pub reason: String,
    pub tier: UpdateTier,
}

// =============================================================================
// TESTS
// =============================================================================
