//! Centralized default constants for the pagesmith worker system.
//!
//! **This module is the single source of truth** for all shared default values.
//! Handlers, the store client, and the worker binary reference these constants
//! instead of defining their own magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// JOB QUEUE
// =============================================================================

/// Default priority for queued jobs (higher = claimed sooner).
pub const JOB_DEFAULT_PRIORITY: i32 = 5;

/// Default maximum retry count for failed jobs.
pub const JOB_MAX_RETRIES: i32 = 3;

/// Default poll interval in milliseconds when the queue comes up empty.
pub const JOB_POLL_INTERVAL_MS: u64 = 30_000;

/// Default per-job execution timeout in seconds (1 hour).
///
/// Content jobs drive an AI pipeline and legitimately run for many minutes;
/// the cap exists so a wedged subprocess cannot hold the worker's single
/// job slot forever. Override with `PAGESMITH_JOB_TIMEOUT_SECS`.
pub const JOB_TIMEOUT_SECS: u64 = 3600;

/// Default number of jobs a one-shot worker run will process.
pub const WORKER_DEFAULT_MAX_JOBS: usize = 1;

/// Environment variable overriding the per-job execution timeout.
pub const ENV_JOB_TIMEOUT_SECS: &str = "PAGESMITH_JOB_TIMEOUT_SECS";

/// Environment variable setting a stable worker id.
pub const ENV_WORKER_ID: &str = "PAGESMITH_WORKER_ID";

/// Environment variable restricting the worker to a single job type.
pub const ENV_JOB_TYPE: &str = "PAGESMITH_JOB_TYPE";

/// Environment variable overriding the one-shot iteration budget.
pub const ENV_MAX_JOBS: &str = "PAGESMITH_MAX_JOBS";

/// Environment variable overriding the empty-queue poll interval.
pub const ENV_POLL_INTERVAL_MS: &str = "PAGESMITH_POLL_INTERVAL_MS";

// =============================================================================
// JOB STORE CLIENT
// =============================================================================

/// Deadline for single-entity store calls in seconds (claim, get, status writes).
pub const STORE_CALL_TIMEOUT_SECS: u64 = 5;

/// Deadline for batch-oriented store calls in seconds (batch create, list, sweep).
pub const STORE_BATCH_TIMEOUT_SECS: u64 = 30;

/// Environment variable for the job store base URL.
pub const ENV_STORE_URL: &str = "PAGESMITH_STORE_URL";

/// Environment variable for the job store bearer token.
pub const ENV_STORE_TOKEN: &str = "PAGESMITH_STORE_TOKEN";

// =============================================================================
// UPDATE PLANNING (auto-update-digest)
// =============================================================================

/// Default per-digest budget in USD when params carry none.
pub const DIGEST_BUDGET_USD: f64 = 25.0;

/// Default cap on admitted updates per digest, independent of budget.
pub const DIGEST_MAX_ITEMS: usize = 20;

/// Estimated cost of a light-tier update (link fixes, metadata refresh).
pub const TIER_LIGHT_COST_USD: f64 = 1.5;

/// Estimated cost of a standard-tier update (section rewrite).
pub const TIER_STANDARD_COST_USD: f64 = 6.5;

/// Estimated cost of a deep-tier update (full-page research and rewrite).
pub const TIER_DEEP_COST_USD: f64 = 12.0;

/// Priority of fanned-out page-improve children. Above default so a digest's
/// children drain ahead of routine queue traffic.
pub const PAGE_IMPROVE_PRIORITY: i32 = 7;

/// Retry budget for content-producing children. One retry: a second attempt
/// at a flaky pipeline is cheap, a third is wasted spend.
pub const CONTENT_JOB_MAX_RETRIES: i32 = 1;

/// Priority of the batch-commit aggregator. Lowest in the system so every
/// child is claimed before the aggregator's first attempt.
pub const BATCH_COMMIT_PRIORITY: i32 = 1;

/// Retry budget for the batch-commit aggregator. Each failed attempt while
/// children are still running is a scheduling delay, so the budget doubles
/// as the join's polling allowance.
pub const BATCH_COMMIT_MAX_RETRIES: i32 = 10;

// =============================================================================
// GIT / REVIEW
// =============================================================================

/// Commit author/committer name for batch commits.
pub const GIT_AUTHOR_NAME: &str = "pagesmith-bot";

/// Commit author/committer email for batch commits.
pub const GIT_AUTHOR_EMAIL: &str = "bot@pagesmith.dev";

/// Maximum length of a sanitized branch name in characters.
pub const BRANCH_NAME_MAX_LENGTH: usize = 100;

/// Default trunk branch batch branches fork from.
pub const DEFAULT_TRUNK_BRANCH: &str = "main";

/// Per-command timeout for local git operations (seconds).
pub const GIT_CMD_TIMEOUT_SECS: u64 = 60;

/// Timeout for network git operations: push, pull, fetch (seconds).
pub const GIT_NET_TIMEOUT_SECS: u64 = 120;

/// Timeout for `gh pr create` (seconds).
pub const REVIEW_CMD_TIMEOUT_SECS: u64 = 60;

/// Maximum collection/apply errors listed in a pull request body.
pub const PR_BODY_MAX_ERRORS: usize = 10;

/// Environment variable overriding the trunk branch name.
pub const ENV_TRUNK_BRANCH: &str = "PAGESMITH_TRUNK_BRANCH";

// =============================================================================
// CONTENT PIPELINE
// =============================================================================

/// Environment variable naming the content pipeline executable.
pub const ENV_PIPELINE_CMD: &str = "PAGESMITH_PIPELINE_CMD";

/// Timeout for content generation subcommands in seconds (30 minutes).
pub const PIPELINE_TIMEOUT_SECS: u64 = 1800;

/// Timeout for the planner subcommand in seconds.
pub const PIPELINE_PLAN_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// VALIDATION GATE
// =============================================================================

/// Environment variable holding the validation/auto-fix shell command.
pub const ENV_VALIDATE_CMD: &str = "PAGESMITH_VALIDATE_CMD";

/// Timeout for the validation gate in seconds.
pub const VALIDATE_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// CONTENT AREAS
// =============================================================================

/// Environment variable overriding the writable content areas
/// (comma-separated top-level directories).
pub const ENV_CONTENT_AREAS: &str = "PAGESMITH_CONTENT_AREAS";

/// Default writable content areas. File changes outside these top-level
/// directories are rejected during batch apply.
pub const CONTENT_AREAS: &str = "content,pages,data";

// =============================================================================
// PROJECT LAYOUT
// =============================================================================

/// Environment variable for the site repository checkout the worker edits.
pub const ENV_PROJECT_ROOT: &str = "PAGESMITH_PROJECT_ROOT";

// =============================================================================
// ERROR REPORTING
// =============================================================================

/// Truncation cap for error messages reported to the store. Stack traces and
/// subprocess stderr can run to megabytes; the store column should not.
pub const ERROR_MESSAGE_MAX_LENGTH: usize = 2000;

// =============================================================================
// MAINTENANCE
// =============================================================================

/// Default stale-job cutoff for sweeps, in minutes.
pub const SWEEP_STALE_MINUTES: i64 = 30;

/// Environment variable enabling a sweep at worker startup (value = cutoff
/// in minutes).
pub const ENV_SWEEP_STALE_MINUTES: &str = "PAGESMITH_SWEEP_STALE_MINUTES";
