//! Batch-commit: fan-in aggregator for a digest's child jobs.
//!
//! Queued at low priority with a high retry budget, this handler is the
//! join point of a batch. Each attempt checks whether every child job has
//! completed; if not it fails cheaply and lets the store's retry requeue
//! stand in for a wait. Once the batch is done it merges all child file
//! changes onto one branch, commits as the bot identity and opens a PR.
//!
//! Everything before the completeness check is side-effect free, so a
//! half-done batch never leaves a branch behind.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::fs;
use tracing::{debug, info, warn};

use pagesmith_core::defaults::{DEFAULT_TRUNK_BRANCH, ENV_TRUNK_BRANCH, PR_BODY_MAX_ERRORS};
use pagesmith_core::{
    content_areas_from_env, is_in_content_area, job_type, normalize_rel_path, ContentJobResult,
    FileChange, JobStatus, JobStore,
};

use crate::git::{sanitize_branch_name, GitRepo};
use crate::handler::{JobContext, JobHandler, JobResult};
use crate::review::ReviewClient;
use crate::validate::{run_validation_gate, ValidationOutcome};

/// Params of a `batch-commit` job.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchCommitParams {
    pub batch_id: String,
    /// Jobs whose results make up the batch, in merge order.
    pub child_job_ids: Vec<i64>,
    /// Branch to commit onto; falls back to `batch/{batchId}`.
    pub branch: Option<String>,
    pub pr_title: String,
    /// Free-form intro prepended to the generated PR body.
    pub pr_body: Option<String>,
    pub pr_labels: Vec<String>,
    /// Base for branch and PR; falls back to `PAGESMITH_TRUNK_BRANCH`,
    /// then to the built-in default.
    pub base_branch: Option<String>,
}

impl BatchCommitParams {
    fn validate(&self) -> Result<(), String> {
        if self.batch_id.trim().is_empty() {
            return Err("batchId is required".to_string());
        }
        if self.child_job_ids.is_empty() {
            return Err("childJobIds is empty".to_string());
        }
        if self.pr_title.trim().is_empty() {
            return Err("prTitle is required".to_string());
        }
        Ok(())
    }
}

/// Collects completed child results and lands them as one commit plus PR.
pub struct BatchCommitHandler {
    store: Arc<dyn JobStore>,
}

impl BatchCommitHandler {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Fetch every child and pull the file changes out of the completed
    /// ones. Fetch and payload errors are recorded, not fatal; a child
    /// that is simply not done yet counts as incomplete.
    async fn collect(&self, child_ids: &[i64]) -> CollectedBatch {
        let fetches = child_ids.iter().map(|&id| self.store.get_job(id));
        let fetched = futures::future::join_all(fetches).await;

        let mut batch = CollectedBatch::default();
        for (&id, result) in child_ids.iter().zip(fetched) {
            match result {
                Err(e) => {
                    batch.errors.push(format!("job {}: fetch failed: {}", id, e));
                    batch.children.push(ChildOutcome {
                        job_id: id,
                        status: "unavailable".to_string(),
                        changes: 0,
                        summary: None,
                    });
                }
                Ok(job) if job.status != JobStatus::Completed => {
                    batch.incomplete += 1;
                    batch.children.push(ChildOutcome {
                        job_id: id,
                        status: job.status.to_string(),
                        changes: 0,
                        summary: None,
                    });
                }
                Ok(job) => {
                    let payload = job.result.clone().unwrap_or_else(|| json!({}));
                    match serde_json::from_value::<ContentJobResult>(payload) {
                        Ok(content) => {
                            batch.children.push(ChildOutcome {
                                job_id: id,
                                status: job.status.to_string(),
                                changes: content.file_changes.len(),
                                summary: content.summary.clone().or_else(|| content.page.clone()),
                            });
                            batch.changes.extend(content.file_changes);
                        }
                        Err(e) => {
                            batch
                                .errors
                                .push(format!("job {}: invalid result payload: {}", id, e));
                            batch.children.push(ChildOutcome {
                                job_id: id,
                                status: job.status.to_string(),
                                changes: 0,
                                summary: None,
                            });
                        }
                    }
                }
            }
        }
        batch
    }
}

#[async_trait]
impl JobHandler for BatchCommitHandler {
    fn job_type(&self) -> &'static str {
        job_type::BATCH_COMMIT
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let params: BatchCommitParams = match ctx.typed_params() {
            Ok(params) => params,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        if let Err(msg) = params.validate() {
            return JobResult::Failed(msg);
        }

        let batch = self.collect(&params.child_job_ids).await;
        if batch.incomplete > 0 {
            // Not an error worth logging loudly. The retry budget is the
            // wait mechanism; a later attempt finds the batch finished.
            debug!(
                batch_id = %params.batch_id,
                incomplete = batch.incomplete,
                "Batch not ready"
            );
            return JobResult::Failed(format!(
                "{} child job(s) not yet completed",
                batch.incomplete
            ));
        }

        let merged = merge_file_changes(batch.changes);
        if merged.is_empty() {
            info!(batch_id = %params.batch_id, "Batch produced no file changes");
            return JobResult::Success(Some(json!({
                "batchId": params.batch_id,
                "noChanges": true,
                "filesApplied": 0,
                "filesRejected": 0,
                "prUrl": "",
                "children": batch.children.len(),
                "errors": batch.errors,
            })));
        }

        let base_branch = params
            .base_branch
            .clone()
            .or_else(|| {
                std::env::var(ENV_TRUNK_BRANCH)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
            })
            .unwrap_or_else(|| DEFAULT_TRUNK_BRANCH.to_string());
        let mut branch = sanitize_branch_name(params.branch.as_deref().unwrap_or(""));
        if branch.is_empty() {
            branch = sanitize_branch_name(&format!("batch/{}", params.batch_id));
        }

        let repo = GitRepo::new(&ctx.project_root);

        // Best-effort trunk refresh. An offline remote must not stop the
        // batch; the branch then bases off the local trunk state.
        if let Err(e) = repo.checkout(&base_branch).await {
            warn!(error = %e, base_branch = %base_branch, "Trunk checkout failed, continuing");
        }
        if let Err(e) = repo.pull_ff_only().await {
            warn!(error = %e, "Trunk refresh failed, continuing with local state");
        }
        if let Err(e) = repo.create_or_reset_branch(&branch, &base_branch).await {
            return JobResult::Failed(format!("failed to prepare branch {}: {}", branch, e));
        }

        let report = apply_changes(&ctx.project_root, &merged).await;

        // The gate runs before staging so that any auto-fixes it makes to
        // the touched files end up in the commit.
        let validation = run_validation_gate(&ctx.project_root).await;
        if let ValidationOutcome::Failed(detail) = &validation {
            warn!(batch_id = %params.batch_id, detail = %detail, "Validation gate failed");
        }

        if let Err(e) = repo.add_paths(&report.applied).await {
            return JobResult::Failed(format!("git add failed: {}", e));
        }
        let staged = match repo.has_staged_changes().await {
            Ok(staged) => staged,
            Err(e) => return JobResult::Failed(format!("git status check failed: {}", e)),
        };

        let mut errors = batch.errors.clone();
        errors.extend(report.rejected.iter().cloned());

        if !staged {
            info!(batch_id = %params.batch_id, "Nothing staged after applying changes");
            return JobResult::Success(Some(json!({
                "batchId": params.batch_id,
                "branch": branch,
                "baseBranch": base_branch,
                "noChanges": true,
                "filesApplied": report.applied.len(),
                "filesRejected": report.rejected.len(),
                "prUrl": "",
                "validation": validation.as_str(),
                "children": batch.children.len(),
                "errors": errors,
            })));
        }

        let message = commit_message(&params.batch_id, &batch.children, &report, &validation);
        if let Err(e) = repo.commit(&message).await {
            return JobResult::Failed(format!("git commit failed: {}", e));
        }

        // The pushed branch is the primary outcome; the PR is a courtesy.
        if let Err(e) = repo.push(&branch).await {
            return JobResult::Failed(format!("git push failed: {}", e));
        }

        let pr_url = if ReviewClient::available().await {
            let review = ReviewClient::new(&ctx.project_root);
            let body = build_pr_body(
                params.pr_body.as_deref(),
                &params.batch_id,
                &batch.children,
                &errors,
                &report,
                &validation,
            );
            match review
                .create_pr(&branch, &base_branch, &params.pr_title, &body, &params.pr_labels)
                .await
            {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, branch = %branch, "PR creation failed, branch is pushed");
                    String::new()
                }
            }
        } else {
            warn!("gh is not available, skipping PR creation");
            String::new()
        };

        info!(
            batch_id = %params.batch_id,
            branch = %branch,
            files_applied = report.applied.len(),
            files_rejected = report.rejected.len(),
            validation = validation.as_str(),
            "Batch committed"
        );

        JobResult::Success(Some(json!({
            "batchId": params.batch_id,
            "branch": branch,
            "baseBranch": base_branch,
            "filesApplied": report.applied.len(),
            "filesRejected": report.rejected.len(),
            "prUrl": pr_url,
            "validation": validation.as_str(),
            "children": batch.children.len(),
            "errors": errors,
        })))
    }
}

// =============================================================================
// BATCH MECHANICS
// =============================================================================

/// One child's contribution, for the commit message and PR table.
struct ChildOutcome {
    job_id: i64,
    status: String,
    changes: usize,
    summary: Option<String>,
}

#[derive(Default)]
struct CollectedBatch {
    children: Vec<ChildOutcome>,
    /// All child changes concatenated in child order, pre-merge.
    changes: Vec<FileChange>,
    incomplete: usize,
    errors: Vec<String>,
}

#[derive(Default)]
struct ApplyReport {
    /// Normalized paths actually touched, in apply order. Exactly these
    /// get staged; never `add -A`.
    applied: Vec<String>,
    rejected: Vec<String>,
}

/// Merge changes by path. A later change to the same path replaces the
/// earlier one in place, so the merged list keeps first-seen order.
fn merge_file_changes(changes: Vec<FileChange>) -> Vec<FileChange> {
    let mut merged: Vec<FileChange> = Vec::with_capacity(changes.len());
    let mut by_path: HashMap<String, usize> = HashMap::new();
    for change in changes {
        match by_path.get(&change.path) {
            Some(&slot) => merged[slot] = change,
            None => {
                by_path.insert(change.path.clone(), merged.len());
                merged.push(change);
            }
        }
    }
    merged
}

/// Write and delete merged changes under the project root.
///
/// Children normalize their own output, but a batch can also be queued by
/// hand, so the fence is enforced again here. Rejections record an error
/// and continue; deleting an already-absent file is a no-op that is not
/// staged.
async fn apply_changes(root: &Path, changes: &[FileChange]) -> ApplyReport {
    let areas = content_areas_from_env();
    let mut report = ApplyReport::default();

    for change in changes {
        let normalized = match normalize_rel_path(&change.path) {
            Ok(normalized) => normalized,
            Err(e) => {
                report.rejected.push(format!("{}: {}", change.path, e));
                continue;
            }
        };
        if !is_in_content_area(&normalized, &areas) {
            report
                .rejected
                .push(format!("{}: outside content areas", normalized));
            continue;
        }

        let target = root.join(&normalized);
        match &change.content {
            Some(content) => {
                if let Some(parent) = target.parent() {
                    if let Err(e) = fs::create_dir_all(parent).await {
                        report
                            .rejected
                            .push(format!("{}: mkdir failed: {}", normalized, e));
                        continue;
                    }
                }
                match fs::write(&target, content).await {
                    Ok(()) => report.applied.push(normalized),
                    Err(e) => report
                        .rejected
                        .push(format!("{}: write failed: {}", normalized, e)),
                }
            }
            None => match fs::remove_file(&target).await {
                Ok(()) => report.applied.push(normalized),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %normalized, "Delete target already absent");
                }
                Err(e) => report
                    .rejected
                    .push(format!("{}: delete failed: {}", normalized, e)),
            },
        }
    }
    report
}

fn commit_message(
    batch_id: &str,
    children: &[ChildOutcome],
    report: &ApplyReport,
    validation: &ValidationOutcome,
) -> String {
    let completed = children.iter().filter(|c| c.status == "completed").count();
    format!(
        "Auto-update batch {}\n\nMerged {} of {} child job(s): {} file(s) applied, {} rejected.\nValidation: {}\n",
        batch_id,
        completed,
        children.len(),
        report.applied.len(),
        report.rejected.len(),
        validation.as_str()
    )
}

fn build_pr_body(
    intro: Option<&str>,
    batch_id: &str,
    children: &[ChildOutcome],
    errors: &[String],
    report: &ApplyReport,
    validation: &ValidationOutcome,
) -> String {
    let mut body = String::new();
    if let Some(intro) = intro {
        body.push_str(intro.trim());
        body.push_str("\n\n");
    }
    body.push_str(&format!(
        "Automated content batch `{}`: {} file(s) applied, {} rejected, validation {}.\n\n",
        batch_id,
        report.applied.len(),
        report.rejected.len(),
        validation.as_str()
    ));

    body.push_str("| Job | Status | Changes | Summary |\n");
    body.push_str("|----:|--------|--------:|---------|\n");
    for child in children {
        body.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            child.job_id,
            child.status,
            child.changes,
            child.summary.as_deref().unwrap_or("-")
        ));
    }

    if !errors.is_empty() {
        body.push_str("\n### Errors\n\n");
        for error in errors.iter().take(PR_BODY_MAX_ERRORS) {
            body.push_str(&format!("- {}\n", error));
        }
        if errors.len() > PR_BODY_MAX_ERRORS {
            body.push_str(&format!(
                "- ...and {} more\n",
                errors.len() - PR_BODY_MAX_ERRORS
            ));
        }
    }
    body
}
