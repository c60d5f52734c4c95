//! HTTP client for the remote job store.
//!
//! Every method maps onto one store endpoint and classifies failures into
//! the `StoreError` taxonomy: connection-level problems and a missing base
//! URL become `Unavailable`, elapsed deadlines become `Timeout`, HTTP 4xx
//! becomes `BadRequest`, and 5xx (or an unusable body) becomes `ServerError`.
//! Callers decide retry-vs-abort from the variant, never from message text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use pagesmith_core::defaults;
use pagesmith_core::{
    Job, JobFilter, JobStore, NewJob, QueueStats, StoreError, StoreResult, SweepOutcome,
};

/// Deadline for single-entity calls (claim, get, status writes), seconds.
pub const CALL_TIMEOUT_SECS: u64 = defaults::STORE_CALL_TIMEOUT_SECS;

/// Deadline for batch-oriented calls (batch create, list, sweep), seconds.
pub const BATCH_TIMEOUT_SECS: u64 = defaults::STORE_BATCH_TIMEOUT_SECS;

/// Typed client for the job store's HTTP API.
///
/// Construction never fails: with no base URL configured the client still
/// builds, and every call reports `Unavailable` instead. That keeps worker
/// startup independent of store reachability.
pub struct HttpJobStore {
    client: Client,
    base_url: Option<String>,
    token: Option<String>,
}

impl HttpJobStore {
    /// Create a client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(Some(base_url.into()), None)
    }

    /// Create a client with explicit URL and bearer token settings.
    pub fn with_config(base_url: Option<String>, token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(BATCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());

        Self {
            client,
            base_url,
            token,
        }
    }

    /// Create from `PAGESMITH_STORE_URL` / `PAGESMITH_STORE_TOKEN`.
    pub fn from_env() -> Self {
        let base_url = std::env::var(defaults::ENV_STORE_URL).ok();
        let token = std::env::var(defaults::ENV_STORE_TOKEN).ok();
        Self::with_config(base_url, token)
    }

    /// Attach a bearer token to subsequent requests.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Whether a base URL is configured.
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    fn url(&self, path: &str) -> StoreResult<String> {
        match &self.base_url {
            Some(base) => Ok(format!("{}{}", base, path)),
            None => Err(StoreError::Unavailable(format!(
                "no store URL configured (set {})",
                defaults::ENV_STORE_URL
            ))),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Map a send-level reqwest failure onto the taxonomy.
fn classify_transport(op: &'static str, secs: u64, e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout { op, secs }
    } else {
        StoreError::Unavailable(e.to_string())
    }
}

/// Extract a human-readable message from an error response body.
///
/// Stores commonly wrap errors as `{"error": "..."}` or `{"message": "..."}`;
/// fall back to the raw text otherwise.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<JsonValue>(body) {
        for key in ["error", "message"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    body.trim().to_string()
}

/// Convert a non-success response into the matching taxonomy variant.
async fn status_error(response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    if status.is_client_error() {
        StoreError::BadRequest {
            status: status.as_u16(),
            message,
        }
    } else {
        StoreError::ServerError {
            status: status.as_u16(),
            message,
        }
    }
}

/// Check status and decode the response body.
async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> StoreResult<T> {
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    let status = response.status().as_u16();
    response
        .json()
        .await
        .map_err(|e| StoreError::ServerError {
            status,
            message: format!("invalid response body: {}", e),
        })
}

/// Check status on a response whose body we discard.
async fn ensure_ok(response: Response) -> StoreResult<()> {
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    Ok(())
}

#[async_trait]
impl JobStore for HttpJobStore {
    async fn create_job(&self, new_job: &NewJob) -> StoreResult<Job> {
        let url = self.url("/api/jobs")?;
        let response = self
            .authorize(self.client.post(url))
            .timeout(Duration::from_secs(CALL_TIMEOUT_SECS))
            .json(new_job)
            .send()
            .await
            .map_err(|e| classify_transport("create_job", CALL_TIMEOUT_SECS, e))?;
        read_json(response).await
    }

    #[instrument(skip(self, new_jobs), fields(subsystem = "store", component = "http_store", op = "create_jobs", job_count = new_jobs.len()))]
    async fn create_jobs(&self, new_jobs: &[NewJob]) -> StoreResult<Vec<i64>> {
        if new_jobs.is_empty() {
            return Ok(vec![]);
        }

        let url = self.url("/api/jobs/batch")?;
        let response = self
            .authorize(self.client.post(url))
            .timeout(Duration::from_secs(BATCH_TIMEOUT_SECS))
            .json(&BatchCreateRequest { jobs: new_jobs })
            .send()
            .await
            .map_err(|e| classify_transport("create_jobs", BATCH_TIMEOUT_SECS, e))?;
        let body: BatchCreateResponse = read_json(response).await?;
        Ok(body.ids)
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        let url = self.url("/api/jobs")?;

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(status) = filter.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(job_type) = &filter.job_type {
            query.push(("type", job_type.clone()));
        }
        if let Some(limit) = filter.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(offset) = filter.offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .authorize(self.client.get(url))
            .query(&query)
            .timeout(Duration::from_secs(BATCH_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| classify_transport("list_jobs", BATCH_TIMEOUT_SECS, e))?;
        read_json(response).await
    }

    async fn get_job(&self, id: i64) -> StoreResult<Job> {
        let url = self.url(&format!("/api/jobs/{}", id))?;
        let response = self
            .authorize(self.client.get(url))
            .timeout(Duration::from_secs(CALL_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| classify_transport("get_job", CALL_TIMEOUT_SECS, e))?;
        read_json(response).await
    }

    #[instrument(skip(self), fields(subsystem = "store", component = "http_store", op = "claim", worker_id = %worker_id))]
    async fn claim_next(&self, worker_id: &str, job_type: Option<&str>) -> StoreResult<Option<Job>> {
        let url = self.url("/api/jobs/claim")?;
        let response = self
            .authorize(self.client.post(url))
            .timeout(Duration::from_secs(CALL_TIMEOUT_SECS))
            .json(&ClaimRequest {
                worker_id,
                job_type,
            })
            .send()
            .await
            .map_err(|e| classify_transport("claim", CALL_TIMEOUT_SECS, e))?;

        // Empty queue is a 204, or a 200 with a null body
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let claimed: Option<Job> = read_json(response).await?;
        if let Some(job) = &claimed {
            debug!(job_id = job.id, job_type = %job.job_type, "Claimed job");
        }
        Ok(claimed)
    }

    async fn mark_started(&self, id: i64) -> StoreResult<()> {
        let url = self.url(&format!("/api/jobs/{}/start", id))?;
        let response = self
            .authorize(self.client.post(url))
            .timeout(Duration::from_secs(CALL_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| classify_transport("mark_started", CALL_TIMEOUT_SECS, e))?;
        ensure_ok(response).await
    }

    async fn mark_completed(&self, id: i64, result: Option<JsonValue>) -> StoreResult<()> {
        let url = self.url(&format!("/api/jobs/{}/complete", id))?;
        let response = self
            .authorize(self.client.post(url))
            .timeout(Duration::from_secs(CALL_TIMEOUT_SECS))
            .json(&CompleteRequest {
                result: result.as_ref(),
            })
            .send()
            .await
            .map_err(|e| classify_transport("mark_completed", CALL_TIMEOUT_SECS, e))?;
        ensure_ok(response).await
    }

    async fn mark_failed(&self, id: i64, error: &str) -> StoreResult<()> {
        let url = self.url(&format!("/api/jobs/{}/fail", id))?;
        let response = self
            .authorize(self.client.post(url))
            .timeout(Duration::from_secs(CALL_TIMEOUT_SECS))
            .json(&FailRequest { error })
            .send()
            .await
            .map_err(|e| classify_transport("mark_failed", CALL_TIMEOUT_SECS, e))?;
        ensure_ok(response).await
    }

    async fn cancel(&self, id: i64) -> StoreResult<()> {
        let url = self.url(&format!("/api/jobs/{}/cancel", id))?;
        let response = self
            .authorize(self.client.post(url))
            .timeout(Duration::from_secs(CALL_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| classify_transport("cancel", CALL_TIMEOUT_SECS, e))?;
        ensure_ok(response).await
    }

    async fn stats(&self) -> StoreResult<QueueStats> {
        let url = self.url("/api/jobs/stats")?;
        let response = self
            .authorize(self.client.get(url))
            .timeout(Duration::from_secs(CALL_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| classify_transport("stats", CALL_TIMEOUT_SECS, e))?;
        read_json(response).await
    }

    async fn sweep(&self, stale_minutes: i64) -> StoreResult<SweepOutcome> {
        let url = self.url("/api/jobs/sweep")?;
        let response = self
            .authorize(self.client.post(url))
            .timeout(Duration::from_secs(BATCH_TIMEOUT_SECS))
            .json(&SweepRequest { stale_minutes })
            .send()
            .await
            .map_err(|e| classify_transport("sweep", BATCH_TIMEOUT_SECS, e))?;
        read_json(response).await
    }
}

#[derive(Serialize)]
struct BatchCreateRequest<'a> {
    jobs: &'a [NewJob],
}

#[derive(Deserialize)]
struct BatchCreateResponse {
    ids: Vec<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRequest<'a> {
    worker_id: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    job_type: Option<&'a str>,
}

#[derive(Serialize)]
struct CompleteRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a JsonValue>,
}

#[derive(Serialize)]
struct FailRequest<'a> {
    error: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SweepRequest {
    stale_minutes: i64,
}
