//! # pagesmith-jobs
//!
//! Job handlers and worker runtime for pagesmith.
//!
//! This crate provides:
//! - A string-keyed handler registry dispatching jobs by type
//! - The built-in handlers: ping, verify, page-improve, page-create,
//!   auto-update-digest and batch-commit
//! - A single-slot worker runtime with one-shot and polling modes
//! - Git branch and pull-request plumbing for the batch aggregator
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pagesmith_jobs::{builtin_registry, Worker, WorkerConfig};
//! use pagesmith_store::HttpJobStore;
//!
//! let store = Arc::new(HttpJobStore::from_env());
//! let config = WorkerConfig::from_env();
//! let registry = Arc::new(builtin_registry(store.clone(), config.project_root.clone()));
//!
//! let worker = Worker::new(store, registry, config);
//!
//! // One-shot: process one job if one is pending, then return
//! let processed = worker.run_max_jobs(1).await;
//!
//! // Or keep polling until the process is stopped
//! // worker.run_polling().await;
//! ```

pub mod git;
pub mod handler;
pub mod handlers;
pub mod pipeline;
mod proc;
pub mod registry;
pub mod review;
pub mod validate;
pub mod worker;

// Re-export core types
pub use pagesmith_core::*;

// Re-export the handler/worker surface
pub use handler::{JobContext, JobHandler, JobResult};
pub use handlers::{
    builtin_registry, AutoUpdateDigestHandler, BatchCommitHandler, PageCreateHandler,
    PageImproveHandler, PingHandler, VerifyHandler,
};
pub use registry::HandlerRegistry;
pub use worker::{IterationOutcome, Worker, WorkerConfig};

/// Default maximum retries for failed jobs.
pub const DEFAULT_MAX_RETRIES: i32 = pagesmith_core::defaults::JOB_MAX_RETRIES;

/// Default polling interval when the queue is empty (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = pagesmith_core::defaults::JOB_POLL_INTERVAL_MS;
