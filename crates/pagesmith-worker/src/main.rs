//! pagesmith-worker - queue worker process for pagesmith
//!
//! Claims jobs from the store and runs them against the site checkout.
//! Defaults to one-shot mode (process up to N jobs, then exit) so it can
//! run under cron; `--poll` turns it into a long-lived daemon.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pagesmith_core::defaults::{ENV_SWEEP_STALE_MINUTES, SWEEP_STALE_MINUTES};
use pagesmith_core::JobStore;
use pagesmith_jobs::{builtin_registry, Worker, WorkerConfig};
use pagesmith_store::HttpJobStore;

#[derive(Parser)]
#[command(name = "pagesmith-worker")]
#[command(author, version, about = "Background job worker for pagesmith")]
struct Cli {
    /// Only claim jobs of this type
    #[arg(long = "type", value_name = "JOB_TYPE")]
    job_type: Option<String>,

    /// Process up to this many jobs before exiting (default: 1)
    #[arg(long, value_name = "N")]
    max_jobs: Option<usize>,

    /// Keep polling instead of exiting when the queue is empty
    #[arg(long)]
    poll: bool,

    /// Milliseconds to sleep between polls when the queue is empty
    #[arg(long, value_name = "MS")]
    poll_interval: Option<u64>,

    /// Worker identity reported to the store
    #[arg(long, value_name = "ID")]
    worker_id: Option<String>,

    /// Echo pipeline subprocess output while jobs run
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = init_logging();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Worker failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = WorkerConfig::from_env();
    if let Some(worker_id) = cli.worker_id {
        config = config.with_worker_id(worker_id);
    }
    if let Some(job_type) = cli.job_type {
        config = config.with_type_filter(job_type);
    }
    if let Some(max_jobs) = cli.max_jobs {
        config = config.with_max_jobs(max_jobs);
    }
    if cli.poll {
        config = config.with_poll(true);
    }
    if let Some(interval) = cli.poll_interval {
        config = config.with_poll_interval_ms(interval);
    }
    if cli.verbose {
        config = config.with_verbose(true);
    }

    let store: Arc<dyn JobStore> = Arc::new(HttpJobStore::from_env());
    sweep_stale_jobs(store.as_ref()).await;

    let registry = Arc::new(builtin_registry(store.clone(), config.project_root.clone()));
    let worker = Worker::new(store, registry, config);
    worker.log_startup().await;

    if worker.config().poll {
        tokio::select! {
            _ = worker.run_polling() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
            }
        }
        Ok(ExitCode::SUCCESS)
    } else {
        let processed = worker.run_max_jobs(worker.config().max_jobs).await;
        info!(processed, "One-shot run complete");
        // Cron-style callers read the exit code to see whether anything ran
        if processed > 0 {
            Ok(ExitCode::SUCCESS)
        } else {
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Requeue jobs a dead worker left claimed or running.
///
/// Best-effort: an unreachable store logs and moves on, and
/// `PAGESMITH_SWEEP_STALE_MINUTES=0` disables the sweep entirely.
async fn sweep_stale_jobs(store: &dyn JobStore) {
    let stale_minutes = std::env::var(ENV_SWEEP_STALE_MINUTES)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(SWEEP_STALE_MINUTES);
    if stale_minutes <= 0 {
        return;
    }

    match store.sweep(stale_minutes).await {
        Ok(outcome) if outcome.swept > 0 => {
            warn!(
                swept = outcome.swept,
                stale_minutes, "Requeued stale jobs from dead workers"
            );
        }
        Ok(_) => {}
        Err(e) => {
            debug!(error = %e, "Stale job sweep skipped");
        }
    }
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: pagesmith crates at info)
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "pagesmith_worker=info,pagesmith_jobs=info,pagesmith_store=info".into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("pagesmith-worker.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}
