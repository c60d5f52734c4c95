//! Structured logging schema and field name constants for pagesmith.
//!
//! All crates use these constants for consistent structured logging fields.
//! This ensures log aggregation tools (Loki, Elasticsearch) can query by
//! standardized field names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, best-effort step skipped or failed |
//! | INFO  | Lifecycle events (startup, shutdown), job outcomes |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (file changes, children) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "store", "jobs", "worker"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "http_store", "batch_commit", "digest", "pipeline", "git"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "claim", "execute", "merge", "publish"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Store-assigned job id being processed.
pub const JOB_ID: &str = "job_id";

/// Job type string (dispatch key).
pub const JOB_TYPE: &str = "job_type";

/// Batch identifier tying a digest to its children and aggregator.
pub const BATCH_ID: &str = "batch_id";

/// Identity of the worker process.
pub const WORKER_ID: &str = "worker_id";

/// Git branch being prepared or published.
pub const BRANCH: &str = "branch";

/// Repository-relative page path.
pub const PAGE: &str = "page";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of child jobs in a batch.
pub const CHILD_COUNT: &str = "child_count";

/// Number of file changes applied to the working tree.
pub const FILE_COUNT: &str = "file_count";

/// Number of planner candidates admitted within budget.
pub const ADMITTED: &str = "admitted";

/// Number of planner candidates skipped (budget or cap).
pub const SKIPPED: &str = "skipped";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
