//! Batch-commit end-to-end tests against a real local git repository.
//!
//! A bare repository stands in for the origin so branch pushes can be
//! verified without network access. Each test skips with a note when git
//! is not installed.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value as JsonValue};

use pagesmith_jobs::git::GitRepo;
use pagesmith_jobs::handler::{JobContext, JobHandler, JobResult};
use pagesmith_jobs::{job_type, BatchCommitHandler, Job, JobStatus};
use pagesmith_store::MemoryJobStore;

fn run(dir: &Path, args: &[&str]) {
    let output = Command::new(args[0])
        .args(&args[1..])
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to spawn {:?}: {}", args, e));
    assert!(
        output.status.success(),
        "{:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn run_capture(dir: &Path, args: &[&str]) -> String {
    let output = Command::new(args[0])
        .args(&args[1..])
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to spawn {:?}: {}", args, e));
    assert!(
        output.status.success(),
        "{:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Bare origin plus a site checkout seeded with one trunk commit.
fn site_fixture(root: &Path) -> (PathBuf, PathBuf) {
    let origin = root.join("origin.git");
    let site = root.join("site");

    std::fs::create_dir_all(&origin).unwrap();
    run(&origin, &["git", "init", "--bare", "-b", "main", "."]);

    std::fs::create_dir_all(site.join("content")).unwrap();
    run(&site, &["git", "init", "-b", "main", "."]);
    run(&site, &["git", "config", "user.name", "Fixture"]);
    run(&site, &["git", "config", "user.email", "fixture@example.com"]);
    std::fs::write(site.join("content/index.md"), "# Home\n").unwrap();
    run(&site, &["git", "add", "."]);
    run(&site, &["git", "commit", "-m", "seed site"]);
    run(&site, &["git", "remote", "add", "origin", origin.to_str().unwrap()]);
    run(&site, &["git", "push", "-u", "origin", "main"]);

    (origin, site)
}

fn completed_child(id: i64, result: JsonValue) -> Job {
    Job {
        id,
        job_type: job_type::PAGE_IMPROVE.to_string(),
        status: JobStatus::Completed,
        priority: 7,
        params: None,
        result: Some(result),
        error: None,
        retries: 0,
        max_retries: 1,
        worker_id: Some("worker-content".to_string()),
        created_at: Utc::now(),
        claimed_at: None,
        started_at: None,
        completed_at: Some(Utc::now()),
    }
}

fn aggregator_job(params: JsonValue) -> Job {
    Job {
        id: 90,
        job_type: job_type::BATCH_COMMIT.to_string(),
        status: JobStatus::Running,
        priority: 1,
        params: Some(params),
        result: None,
        error: None,
        retries: 0,
        max_retries: 10,
        worker_id: Some("worker-int".to_string()),
        created_at: Utc::now(),
        claimed_at: None,
        started_at: None,
        completed_at: None,
    }
}

#[tokio::test]
async fn test_batch_commit_end_to_end_with_local_origin() {
    if !GitRepo::available().await {
        eprintln!("Skipping test: git not installed");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let (origin, site) = site_fixture(dir.path());

    let store = Arc::new(MemoryJobStore::new());
    store.insert_raw(completed_child(
        1,
        json!({
            "page": "news/alpha",
            "summary": "first pass",
            "fileChanges": [
                {"path": "content/news/alpha.md", "content": "# Alpha v1\n"}
            ]
        }),
    ));
    store.insert_raw(completed_child(
        2,
        json!({
            "page": "news/alpha",
            "summary": "second pass",
            "fileChanges": [
                {"path": "content/news/alpha.md", "content": "# Alpha v2\n"},
                {"path": "content/index.md", "content": null},
                {"path": "../outside.md", "content": "escape"}
            ]
        }),
    ));

    let handler = BatchCommitHandler::new(store);
    let job = aggregator_job(json!({
        "batchId": "digest-e2e",
        "childJobIds": [1, 2],
        "branch": "auto-update/digest-e2e",
        "prTitle": "Auto-update digest e2e",
    }));

    let result = handler
        .execute(JobContext::new(job, "worker-int", &site))
        .await;
    let data = match result {
        JobResult::Success(Some(data)) => data,
        other => panic!("unexpected result: {:?}", other),
    };

    assert_eq!(data["batchId"], "digest-e2e");
    assert_eq!(data["branch"], "auto-update/digest-e2e");
    // Last writer wins for alpha.md, plus the index deletion
    assert_eq!(data["filesApplied"], 2);
    assert_eq!(data["filesRejected"], 1);
    assert_eq!(data["validation"], "skipped");
    // The local bare origin is not a GitHub remote, so no PR
    assert_eq!(data["prUrl"], "");

    let alpha = std::fs::read_to_string(site.join("content/news/alpha.md")).unwrap();
    assert_eq!(alpha, "# Alpha v2\n");
    assert!(!site.join("content/index.md").exists());
    assert!(!dir.path().join("outside.md").exists());

    // Commit carries the bot identity and the batch message
    let author = run_capture(&site, &["git", "log", "-1", "--format=%an <%ae>"]);
    assert_eq!(author.trim(), "pagesmith-bot <bot@pagesmith.dev>");
    let message = run_capture(&site, &["git", "log", "-1", "--format=%B"]);
    assert!(message.contains("Auto-update batch digest-e2e"), "got: {}", message);
    assert!(message.contains("Validation: skipped"), "got: {}", message);

    // The branch made it to the origin; trunk is untouched
    let branches = run_capture(&origin, &["git", "branch", "--list", "auto-update/digest-e2e"]);
    assert!(branches.contains("auto-update/digest-e2e"));
    let trunk_index = run_capture(&site, &["git", "show", "main:content/index.md"]);
    assert_eq!(trunk_index, "# Home\n");
}

#[tokio::test]
async fn test_incomplete_children_leave_repo_untouched() {
    if !GitRepo::available().await {
        eprintln!("Skipping test: git not installed");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let (_origin, site) = site_fixture(dir.path());
    let head_before = run_capture(&site, &["git", "rev-parse", "HEAD"]);

    let store = Arc::new(MemoryJobStore::new());
    store.insert_raw(completed_child(
        1,
        json!({"fileChanges": [{"path": "content/news/alpha.md", "content": "# Alpha\n"}]}),
    ));
    let mut pending = completed_child(2, json!({}));
    pending.status = JobStatus::Running;
    pending.result = None;
    pending.completed_at = None;
    store.insert_raw(pending);

    let handler = BatchCommitHandler::new(store);
    let job = aggregator_job(json!({
        "batchId": "digest-wait",
        "childJobIds": [1, 2],
        "prTitle": "Auto-update digest wait",
    }));

    let result = handler
        .execute(JobContext::new(job, "worker-int", &site))
        .await;
    match result {
        JobResult::Failed(msg) => assert_eq!(msg, "1 child job(s) not yet completed"),
        other => panic!("unexpected result: {:?}", other),
    }

    // No branch, no commit, no stray files while the batch waits
    let head_after = run_capture(&site, &["git", "rev-parse", "HEAD"]);
    assert_eq!(head_before, head_after);
    let branch = run_capture(&site, &["git", "rev-parse", "--abbrev-ref", "HEAD"]);
    assert_eq!(branch.trim(), "main");
    assert!(!site.join("content/news/alpha.md").exists());
}

#[tokio::test]
async fn test_push_failure_fails_then_rerun_succeeds() {
    if !GitRepo::available().await {
        eprintln!("Skipping test: git not installed");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let (origin, site) = site_fixture(dir.path());

    let store = Arc::new(MemoryJobStore::new());
    store.insert_raw(completed_child(
        1,
        json!({"fileChanges": [{"path": "content/news/alpha.md", "content": "# Alpha\n"}]}),
    ));

    let handler = BatchCommitHandler::new(store);
    let params = json!({
        "batchId": "digest-retry",
        "childJobIds": [1],
        "prTitle": "Auto-update digest retry",
    });

    // Break the remote so the push fails after the local commit lands
    let broken = dir.path().join("missing-origin.git");
    run(&site, &["git", "remote", "set-url", "origin", broken.to_str().unwrap()]);
    let result = handler
        .execute(JobContext::new(
            aggregator_job(params.clone()),
            "worker-int",
            &site,
        ))
        .await;
    match result {
        JobResult::Failed(msg) => assert!(msg.contains("push"), "got: {}", msg),
        other => panic!("unexpected result: {:?}", other),
    }

    // Restore the remote; the retry resets the batch branch and goes through
    run(&site, &["git", "remote", "set-url", "origin", origin.to_str().unwrap()]);
    let result = handler
        .execute(JobContext::new(aggregator_job(params), "worker-int", &site))
        .await;
    match result {
        JobResult::Success(Some(data)) => {
            assert_eq!(data["filesApplied"], 1);
        }
        other => panic!("unexpected result: {:?}", other),
    }

    // No branch was named, so the batch id fallback applies
    let branches = run_capture(&origin, &["git", "branch", "--list", "batch/digest-retry"]);
    assert!(branches.contains("batch/digest-retry"));
    // Exactly one batch commit on top of trunk after the rerun
    let count = run_capture(&site, &["git", "rev-list", "--count", "main..batch/digest-retry"]);
    assert_eq!(count.trim(), "1");
}
