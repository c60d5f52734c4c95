//! In-memory job store for deterministic testing and offline development.
//!
//! Implements the full `JobStore` trait behind a mutex, so claim arbitration
//! is atomic by construction. Retry requeue, cancellation rules, and the
//! stale-job sweep behave like the remote store, which lets worker and
//! handler tests run the real orchestration paths without a network.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pagesmith_core::{JobStore, NewJob};
//! use pagesmith_store::MemoryJobStore;
//!
//! # async fn example() {
//! let store = MemoryJobStore::new();
//! store.create_job(&NewJob::new("ping")).await.unwrap();
//! let job = store.claim_next("worker-a", None).await.unwrap();
//! assert!(job.is_some());
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;

use pagesmith_core::{
    Job, JobFilter, JobStatus, JobStore, NewJob, QueueStats, StoreError, StoreResult, SweepOutcome,
};

/// In-process `JobStore` implementation.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    state: Arc<Mutex<StoreState>>,
    unavailable: Arc<AtomicBool>,
}

#[derive(Default)]
struct StoreState {
    jobs: Vec<Job>,
    next_id: i64,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a store outage: while set, every call returns `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert a fully-formed job as-is, bypassing creation defaults.
    ///
    /// Lets tests shape jobs in arbitrary states (e.g. already-completed
    /// children for aggregation scenarios). The id counter advances past the
    /// inserted id.
    pub fn insert_raw(&self, job: Job) {
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(job.id);
        state.jobs.push(job);
    }

    /// Snapshot of every job, for assertions.
    pub fn snapshot(&self) -> Vec<Job> {
        self.state.lock().unwrap().jobs.clone()
    }

    fn gate(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

fn not_found(id: i64) -> StoreError {
    StoreError::BadRequest {
        status: 404,
        message: format!("job {} not found", id),
    }
}

fn conflict(id: i64, from: JobStatus, to: JobStatus) -> StoreError {
    StoreError::BadRequest {
        status: 409,
        message: format!("job {} cannot move {} -> {}", id, from, to),
    }
}

fn validate(new_job: &NewJob) -> StoreResult<()> {
    if new_job.job_type.trim().is_empty() {
        return Err(StoreError::BadRequest {
            status: 400,
            message: "job type must not be empty".to_string(),
        });
    }
    Ok(())
}

impl StoreState {
    fn build(&mut self, new_job: &NewJob) -> Job {
        self.next_id += 1;
        Job {
            id: self.next_id,
            job_type: new_job.job_type.clone(),
            status: JobStatus::Pending,
            priority: new_job.priority,
            params: new_job.params.clone(),
            result: None,
            error: None,
            retries: 0,
            max_retries: new_job.max_retries,
            worker_id: None,
            created_at: Utc::now(),
            claimed_at: None,
            started_at: None,
            completed_at: None,
        }
    }

    fn find_mut(&mut self, id: i64) -> StoreResult<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id).ok_or_else(|| not_found(id))
    }

    /// Record a failed attempt: requeue while retry budget remains,
    /// otherwise leave the job terminally failed.
    fn record_failure(job: &mut Job, error: &str) {
        job.retries += 1;
        job.error = Some(error.to_string());
        if job.retries <= job.max_retries {
            job.status = JobStatus::Pending;
            job.worker_id = None;
            job.claimed_at = None;
            job.started_at = None;
        } else {
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, new_job: &NewJob) -> StoreResult<Job> {
        self.gate()?;
        validate(new_job)?;
        let mut state = self.state.lock().unwrap();
        let job = state.build(new_job);
        state.jobs.push(job.clone());
        Ok(job)
    }

    async fn create_jobs(&self, new_jobs: &[NewJob]) -> StoreResult<Vec<i64>> {
        self.gate()?;
        // All-or-nothing: validate everything before inserting anything
        for new_job in new_jobs {
            validate(new_job)?;
        }
        let mut state = self.state.lock().unwrap();
        let mut ids = Vec::with_capacity(new_jobs.len());
        for new_job in new_jobs {
            let job = state.build(new_job);
            ids.push(job.id);
            state.jobs.push(job);
        }
        Ok(ids)
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        self.gate()?;
        let state = self.state.lock().unwrap();
        let mut jobs: Vec<Job> = state
            .jobs
            .iter()
            .filter(|j| filter.status.is_none_or(|s| j.status == s))
            .filter(|j| {
                filter
                    .job_type
                    .as_ref()
                    .is_none_or(|t| &j.job_type == t)
            })
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let jobs: Vec<Job> = jobs.into_iter().skip(offset).collect();
        match filter.limit {
            Some(limit) => Ok(jobs.into_iter().take(limit.max(0) as usize).collect()),
            None => Ok(jobs),
        }
    }

    async fn get_job(&self, id: i64) -> StoreResult<Job> {
        self.gate()?;
        let state = self.state.lock().unwrap();
        state
            .jobs
            .iter()
            .find(|j| j.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn claim_next(&self, worker_id: &str, job_type: Option<&str>) -> StoreResult<Option<Job>> {
        self.gate()?;
        let mut state = self.state.lock().unwrap();

        // Highest priority first, FIFO within a priority level
        let candidate = state
            .jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Pending)
            .filter(|j| job_type.is_none_or(|t| j.job_type == t))
            .min_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            });

        match candidate {
            Some(job) => {
                job.status = JobStatus::Claimed;
                job.worker_id = Some(worker_id.to_string());
                job.claimed_at = Some(Utc::now());
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn mark_started(&self, id: i64) -> StoreResult<()> {
        self.gate()?;
        let mut state = self.state.lock().unwrap();
        let job = state.find_mut(id)?;
        if !job.status.can_transition_to(JobStatus::Running) {
            return Err(conflict(id, job.status, JobStatus::Running));
        }
        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_completed(&self, id: i64, result: Option<JsonValue>) -> StoreResult<()> {
        self.gate()?;
        let mut state = self.state.lock().unwrap();
        let job = state.find_mut(id)?;
        if !job.status.can_transition_to(JobStatus::Completed) {
            return Err(conflict(id, job.status, JobStatus::Completed));
        }
        job.status = JobStatus::Completed;
        job.result = result;
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(&self, id: i64, error: &str) -> StoreResult<()> {
        self.gate()?;
        let mut state = self.state.lock().unwrap();
        let job = state.find_mut(id)?;
        // A claimed job that never started can still fail (e.g. handler
        // resolution), alongside the normal running path.
        if !matches!(job.status, JobStatus::Running | JobStatus::Claimed) {
            return Err(conflict(id, job.status, JobStatus::Failed));
        }
        StoreState::record_failure(job, error);
        Ok(())
    }

    async fn cancel(&self, id: i64) -> StoreResult<()> {
        self.gate()?;
        let mut state = self.state.lock().unwrap();
        let job = state.find_mut(id)?;
        if !job.status.can_transition_to(JobStatus::Cancelled) {
            return Err(conflict(id, job.status, JobStatus::Cancelled));
        }
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn stats(&self) -> StoreResult<QueueStats> {
        self.gate()?;
        let state = self.state.lock().unwrap();
        let mut stats = QueueStats::default();
        for job in &state.jobs {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Claimed => stats.claimed += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats.total = state.jobs.len() as i64;
        Ok(stats)
    }

    async fn sweep(&self, stale_minutes: i64) -> StoreResult<SweepOutcome> {
        self.gate()?;
        let cutoff = Utc::now() - Duration::minutes(stale_minutes);
        let mut state = self.state.lock().unwrap();
        let mut swept = 0;
        for job in state.jobs.iter_mut() {
            let stale = match job.status {
                JobStatus::Claimed => job.claimed_at.is_some_and(|t| t < cutoff),
                JobStatus::Running => job.started_at.is_some_and(|t| t < cutoff),
                _ => false,
            };
            if stale {
                StoreState::record_failure(
                    job,
                    &format!("stale: exceeded {} minute processing window", stale_minutes),
                );
                swept += 1;
            }
        }
        Ok(SweepOutcome { swept })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagesmith_core::job_type;
    use serde_json::json;

    fn ping() -> NewJob {
        NewJob::new(job_type::PING)
    }

    #[tokio::test]
    async fn test_create_and_get_round_trip() {
        let store = MemoryJobStore::new();
        let created = store
            .create_job(&ping().with_params(json!({"note": "hi"})))
            .await
            .unwrap();

        let fetched = store.get_job(created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.status, JobStatus::Pending);
        assert_eq!(fetched.params, Some(json!({"note": "hi"})));
        assert_eq!(fetched.retries, 0);
    }

    #[tokio::test]
    async fn test_get_missing_job_is_404() {
        let store = MemoryJobStore::new();
        match store.get_job(99).await {
            Err(StoreError::BadRequest { status: 404, .. }) => {}
            other => panic!("Expected 404, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_empty_type() {
        let store = MemoryJobStore::new();
        let result = store.create_job(&NewJob::new("  ")).await;
        assert!(matches!(
            result,
            Err(StoreError::BadRequest { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_batch_create_is_all_or_nothing() {
        let store = MemoryJobStore::new();
        let batch = vec![ping(), NewJob::new(""), ping()];
        assert!(store.create_jobs(&batch).await.is_err());
        assert_eq!(store.snapshot().len(), 0);

        let ids = store.create_jobs(&[ping(), ping()]).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids[1] > ids[0]);
    }

    #[tokio::test]
    async fn test_claim_prefers_priority_then_fifo() {
        let store = MemoryJobStore::new();
        let low = store.create_job(&ping().with_priority(1)).await.unwrap();
        let high = store.create_job(&ping().with_priority(9)).await.unwrap();
        let mid_first = store.create_job(&ping().with_priority(5)).await.unwrap();
        let mid_second = store.create_job(&ping().with_priority(5)).await.unwrap();

        let order: Vec<i64> = [
            store.claim_next("w", None).await.unwrap().unwrap().id,
            store.claim_next("w", None).await.unwrap().unwrap().id,
            store.claim_next("w", None).await.unwrap().unwrap().id,
            store.claim_next("w", None).await.unwrap().unwrap().id,
        ]
        .to_vec();

        assert_eq!(order, vec![high.id, mid_first.id, mid_second.id, low.id]);
        assert!(store.claim_next("w", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_sets_worker_and_status() {
        let store = MemoryJobStore::new();
        store.create_job(&ping()).await.unwrap();

        let job = store.claim_next("worker-a", None).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Claimed);
        assert_eq!(job.worker_id.as_deref(), Some("worker-a"));
        assert!(job.claimed_at.is_some());
    }

    #[tokio::test]
    async fn test_claim_respects_type_filter() {
        let store = MemoryJobStore::new();
        store.create_job(&NewJob::new(job_type::VERIFY)).await.unwrap();
        store.create_job(&ping()).await.unwrap();

        let claimed = store
            .claim_next("w", Some(job_type::PING))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.job_type, job_type::PING);

        assert!(store
            .claim_next("w", Some("page-improve"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_double_assign() {
        let store = MemoryJobStore::new();
        store.create_job(&ping()).await.unwrap();
        store.create_job(&ping()).await.unwrap();

        let (a, b) = tokio::join!(store.claim_next("w1", None), store.claim_next("w2", None));
        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();
        assert_ne!(a.id, b.id, "Two claims must not hand out the same job");
    }

    #[tokio::test]
    async fn test_full_lifecycle_to_completed() {
        let store = MemoryJobStore::new();
        let job = store.create_job(&ping()).await.unwrap();

        let claimed = store.claim_next("w", None).await.unwrap().unwrap();
        assert_eq!(claimed.id, job.id);
        store.mark_started(job.id).await.unwrap();
        store
            .mark_completed(job.id, Some(json!({"message": "pong"})))
            .await
            .unwrap();

        let done = store.get_job(job.id).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.result, Some(json!({"message": "pong"})));
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_start_requires_claimed() {
        let store = MemoryJobStore::new();
        let job = store.create_job(&ping()).await.unwrap();

        match store.mark_started(job.id).await {
            Err(StoreError::BadRequest { status: 409, .. }) => {}
            other => panic!("Expected 409 conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_requires_running() {
        let store = MemoryJobStore::new();
        let job = store.create_job(&ping()).await.unwrap();
        store.claim_next("w", None).await.unwrap();

        // Claimed but not started
        assert!(store.mark_completed(job.id, None).await.is_err());
    }

    #[tokio::test]
    async fn test_failure_requeues_until_budget_exhausted() {
        let store = MemoryJobStore::new();
        let job = store
            .create_job(&ping().with_max_retries(1))
            .await
            .unwrap();

        // First attempt fails: one retry remains, so back to pending
        store.claim_next("w", None).await.unwrap();
        store.mark_started(job.id).await.unwrap();
        store.mark_failed(job.id, "attempt 1 broke").await.unwrap();

        let requeued = store.get_job(job.id).await.unwrap();
        assert_eq!(requeued.status, JobStatus::Pending);
        assert_eq!(requeued.retries, 1);
        assert_eq!(requeued.error.as_deref(), Some("attempt 1 broke"));
        assert!(requeued.worker_id.is_none());
        assert!(requeued.started_at.is_none());

        // Second attempt fails: budget gone, terminally failed
        store.claim_next("w", None).await.unwrap();
        store.mark_started(job.id).await.unwrap();
        store.mark_failed(job.id, "attempt 2 broke").await.unwrap();

        let failed = store.get_job(job.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.retries, 2);
        assert_eq!(failed.error.as_deref(), Some("attempt 2 broke"));
        assert!(store.claim_next("w", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_allowed_from_claimed() {
        let store = MemoryJobStore::new();
        let job = store
            .create_job(&ping().with_max_retries(0))
            .await
            .unwrap();
        store.claim_next("w", None).await.unwrap();

        store.mark_failed(job.id, "no handler").await.unwrap();
        let failed = store.get_job(job.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_cancel_only_before_execution() {
        let store = MemoryJobStore::new();
        let pending = store.create_job(&ping()).await.unwrap();
        store.cancel(pending.id).await.unwrap();
        assert_eq!(
            store.get_job(pending.id).await.unwrap().status,
            JobStatus::Cancelled
        );

        let running = store.create_job(&ping()).await.unwrap();
        store.claim_next("w", None).await.unwrap();
        store.mark_started(running.id).await.unwrap();
        assert!(matches!(
            store.cancel(running.id).await,
            Err(StoreError::BadRequest { status: 409, .. })
        ));
    }

    #[tokio::test]
    async fn test_stats_counts_by_status() {
        let store = MemoryJobStore::new();
        store.create_job(&ping()).await.unwrap();
        let b = store.create_job(&ping()).await.unwrap();
        let c = store.create_job(&ping()).await.unwrap();

        store.claim_next("w", None).await.unwrap();
        store.mark_started(b.id).await.unwrap();
        store.mark_completed(b.id, None).await.unwrap();
        store.cancel(c.id).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.total, 3);
    }

    #[tokio::test]
    async fn test_list_jobs_filters_and_limits() {
        let store = MemoryJobStore::new();
        store.create_job(&ping()).await.unwrap();
        store.create_job(&NewJob::new(job_type::VERIFY)).await.unwrap();
        store.create_job(&ping()).await.unwrap();

        let pings = store
            .list_jobs(&JobFilter::default().with_type(job_type::PING))
            .await
            .unwrap();
        assert_eq!(pings.len(), 2);

        let limited = store
            .list_jobs(&JobFilter::by_status(JobStatus::Pending).with_limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_fails_stale_jobs_only() {
        let store = MemoryJobStore::new();

        // Fresh running job: untouched
        let fresh = store.create_job(&ping()).await.unwrap();
        store.claim_next("w", None).await.unwrap();
        store.mark_started(fresh.id).await.unwrap();

        // Stale running job, shaped directly
        let mut stale = store.get_job(fresh.id).await.unwrap();
        stale.id = 50;
        stale.started_at = Some(Utc::now() - Duration::minutes(90));
        stale.max_retries = 0;
        store.insert_raw(stale);

        let outcome = store.sweep(30).await.unwrap();
        assert_eq!(outcome.swept, 1);
        assert_eq!(
            store.get_job(fresh.id).await.unwrap().status,
            JobStatus::Running
        );
        let swept = store.get_job(50).await.unwrap();
        assert_eq!(swept.status, JobStatus::Failed);
        assert!(swept.error.as_deref().unwrap_or_default().contains("stale"));
    }

    #[tokio::test]
    async fn test_sweep_requeues_when_budget_remains() {
        let store = MemoryJobStore::new();
        let job = store
            .create_job(&ping().with_max_retries(3))
            .await
            .unwrap();
        store.claim_next("w", None).await.unwrap();
        store.mark_started(job.id).await.unwrap();

        let mut stale = store.get_job(job.id).await.unwrap();
        stale.started_at = Some(Utc::now() - Duration::minutes(90));
        // Replace in place via raw insert under a new id
        stale.id = 51;
        store.insert_raw(stale);

        store.sweep(30).await.unwrap();
        let requeued = store.get_job(51).await.unwrap();
        assert_eq!(requeued.status, JobStatus::Pending);
        assert_eq!(requeued.retries, 1);
    }

    #[tokio::test]
    async fn test_unavailable_gate() {
        let store = MemoryJobStore::new();
        store.create_job(&ping()).await.unwrap();
        store.set_unavailable(true);

        assert!(matches!(
            store.claim_next("w", None).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.stats().await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_unavailable(false);
        assert!(store.claim_next("w", None).await.unwrap().is_some());
    }
}
