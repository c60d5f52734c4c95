//! Auto-update digest: plan a batch of page updates and fan it out.
//!
//! The digest asks the planner for candidates, admits as many as the budget
//! allows, queues one `page-improve` child per admitted page and a single
//! low-priority `batch-commit` aggregator that will collect them into one
//! branch and PR. The digest itself does no content work.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use pagesmith_core::defaults::{
    BATCH_COMMIT_MAX_RETRIES, BATCH_COMMIT_PRIORITY, CONTENT_JOB_MAX_RETRIES, DIGEST_BUDGET_USD,
    DIGEST_MAX_ITEMS, PAGE_IMPROVE_PRIORITY,
};
use pagesmith_core::{job_type, JobStore, NewJob, UpdateCandidate, UpdatePlanner, UpdateTier};

use crate::git::sanitize_branch_name;
use crate::handler::{JobContext, JobHandler, JobResult};

/// Params of an `auto-update-digest` job. Everything is optional; defaults
/// come from `defaults`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DigestParams {
    /// Spending cap for this batch in USD.
    pub budget_usd: Option<f64>,
    /// Hard cap on admitted pages regardless of budget.
    pub max_items: Option<usize>,
    /// Plan only; create no jobs.
    pub dry_run: bool,
    /// Branch namespace for the batch, default `auto-update`.
    pub branch_prefix: Option<String>,
    /// Passed through to the planner's feed scan.
    pub feed_window_hours: Option<i64>,
}

/// One planner candidate with its admission verdict.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedUpdate {
    pub page: String,
    pub reason: String,
    pub tier: UpdateTier,
    pub estimated_cost_usd: f64,
    pub admitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

/// Greedy first-fit admission in planner (priority) order.
///
/// The first candidate that would push spend past the budget closes it:
/// that candidate and everything after it is skipped, even if a later one
/// would still fit. No backtracking keeps admission predictable from the
/// planner's ordering alone. `max_items` cuts off the same way.
pub fn plan_batch(
    candidates: Vec<UpdateCandidate>,
    budget_usd: f64,
    max_items: usize,
) -> Vec<PlannedUpdate> {
    let mut plan = Vec::with_capacity(candidates.len());
    let mut spent = 0.0_f64;
    let mut admitted = 0_usize;
    let mut budget_closed = false;

    for candidate in candidates {
        let cost = candidate.tier.cost_usd();
        let skip_reason = if budget_closed {
            Some("budget exhausted".to_string())
        } else if admitted >= max_items {
            Some(format!("max items cap ({}) reached", max_items))
        } else if spent + cost > budget_usd {
            budget_closed = true;
            Some(format!(
                "would exceed budget (${:.2} + ${:.2} > ${:.2})",
                spent, cost, budget_usd
            ))
        } else {
            spent += cost;
            admitted += 1;
            None
        };

        plan.push(PlannedUpdate {
            page: candidate.page,
            reason: candidate.reason,
            tier: candidate.tier,
            estimated_cost_usd: cost,
            admitted: skip_reason.is_none(),
            skip_reason,
        });
    }
    plan
}

/// Plans an update batch and fans it out as child jobs plus one aggregator.
pub struct AutoUpdateDigestHandler {
    store: Arc<dyn JobStore>,
    planner: Arc<dyn UpdatePlanner>,
}

impl AutoUpdateDigestHandler {
    pub fn new(store: Arc<dyn JobStore>, planner: Arc<dyn UpdatePlanner>) -> Self {
        Self { store, planner }
    }

    /// Create child jobs, falling back to one-by-one creation if the batch
    /// call fails. Partial fan-out is acceptable; callers see exactly the
    /// ids that made it into the queue.
    async fn create_children(&self, children: &[NewJob]) -> Vec<i64> {
        match self.store.create_jobs(children).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Batch job creation failed, retrying one by one");
                let mut ids = Vec::new();
                for child in children {
                    match self.store.create_job(child).await {
                        Ok(job) => ids.push(job.id),
                        Err(e) => {
                            warn!(error = %e, params = ?child.params, "Failed to create child job")
                        }
                    }
                }
                ids
            }
        }
    }
}

#[async_trait]
impl JobHandler for AutoUpdateDigestHandler {
    fn job_type(&self) -> &'static str {
        job_type::AUTO_UPDATE_DIGEST
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let params: DigestParams = match ctx.typed_params() {
            Ok(params) => params,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        let budget_usd = params.budget_usd.unwrap_or(DIGEST_BUDGET_USD);
        let max_items = params.max_items.unwrap_or(DIGEST_MAX_ITEMS);

        let candidates = match self.planner.candidates(params.feed_window_hours).await {
            Ok(candidates) => candidates,
            Err(e) => return JobResult::Failed(format!("update planning failed: {}", e)),
        };
        if candidates.is_empty() {
            info!(job_id = ctx.job.id, "Planner returned no update candidates");
            return JobResult::Success(Some(json!({
                "admitted": 0,
                "skipped": 0,
                "childJobIds": [],
                "estimatedCostUsd": 0.0,
            })));
        }

        let plan = plan_batch(candidates, budget_usd, max_items);
        let admitted: Vec<&PlannedUpdate> = plan.iter().filter(|p| p.admitted).collect();
        let skipped = plan.len() - admitted.len();
        let estimated_cost_usd: f64 = admitted.iter().map(|p| p.estimated_cost_usd).sum();

        let batch_id = format!("digest-{}", Utc::now().format("%Y%m%d-%H%M%S"));
        let prefix = params.branch_prefix.as_deref().unwrap_or("auto-update");
        let branch = sanitize_branch_name(&format!("{}/{}", prefix, batch_id));

        info!(
            job_id = ctx.job.id,
            batch_id = %batch_id,
            admitted = admitted.len(),
            skipped,
            estimated_cost_usd,
            "Planned update batch"
        );

        if params.dry_run {
            return JobResult::Success(Some(json!({
                "batchId": batch_id,
                "branch": branch,
                "dryRun": true,
                "admitted": admitted.len(),
                "skipped": skipped,
                "estimatedCostUsd": estimated_cost_usd,
                "plan": plan,
            })));
        }

        let children: Vec<NewJob> = admitted
            .iter()
            .map(|update| {
                NewJob::new(job_type::PAGE_IMPROVE)
                    .with_params(json!({
                        "page": update.page,
                        "reason": update.reason,
                        "tier": update.tier,
                        "batchId": batch_id,
                    }))
                    .with_priority(PAGE_IMPROVE_PRIORITY)
                    .with_max_retries(CONTENT_JOB_MAX_RETRIES)
            })
            .collect();

        let child_ids = self.create_children(&children).await;
        if child_ids.is_empty() {
            // Nothing to aggregate. Not a digest failure: the plan stands,
            // the queue just never accepted any of it.
            warn!(job_id = ctx.job.id, batch_id = %batch_id, "No child jobs created");
            return JobResult::Success(Some(json!({
                "batchId": batch_id,
                "branch": branch,
                "admitted": admitted.len(),
                "skipped": skipped,
                "childJobIds": [],
                "aggregatorJobId": null,
                "estimatedCostUsd": estimated_cost_usd,
                "plan": plan,
            })));
        }

        let aggregator = NewJob::new(job_type::BATCH_COMMIT)
            .with_params(json!({
                "batchId": batch_id,
                "childJobIds": child_ids,
                "branch": branch,
                "prTitle": format!("Auto-update digest {}", batch_id),
                "prLabels": ["auto-update"],
            }))
            .with_priority(BATCH_COMMIT_PRIORITY)
            .with_max_retries(BATCH_COMMIT_MAX_RETRIES);

        let aggregator_id = match self.store.create_job(&aggregator).await {
            Ok(job) => job.id,
            Err(e) => {
                // Children stay queued; they will complete but nothing will
                // collect them. Surfaced as a failure so the digest retries.
                return JobResult::Failed(format!(
                    "created {} child job(s) but failed to create aggregator: {}",
                    child_ids.len(),
                    e
                ));
            }
        };

        info!(
            job_id = ctx.job.id,
            batch_id = %batch_id,
            children = child_ids.len(),
            aggregator_job_id = aggregator_id,
            "Fanned out update batch"
        );

        JobResult::Success(Some(json!({
            "batchId": batch_id,
            "branch": branch,
            "admitted": admitted.len(),
            "skipped": skipped,
            "childJobIds": child_ids,
            "aggregatorJobId": aggregator_id,
            "estimatedCostUsd": estimated_cost_usd,
            "plan": plan,
        })))
    }
}
