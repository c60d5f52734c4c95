//! Content-producing handlers: `page-improve` and `page-create`.
//!
//! Both hand their params to the content pipeline subprocess and post-process
//! its result the same way. The pipeline is untrusted with respect to paths:
//! every emitted file change is normalized and fenced to the configured
//! content areas before the result is accepted, so nothing unvetted reaches
//! the batch-commit fan-in.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use pagesmith_core::{
    content_areas_from_env, is_in_content_area, job_type, normalize_rel_path, ContentJobResult,
    UpdateTier,
};

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::pipeline::ContentPipeline;

/// Params of a `page-improve` job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImproveParams {
    /// Repository-relative path of the page to improve.
    pub page: String,
    /// Why this page was selected, shown to the pipeline as context.
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub tier: Option<UpdateTier>,
    /// Set when the job was fanned out by a digest.
    #[serde(default)]
    pub batch_id: Option<String>,
}

/// Params of a `page-create` job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCreateParams {
    /// Repository-relative path the new page should land at.
    pub page: String,
    /// What the page should cover.
    pub brief: String,
    #[serde(default)]
    pub batch_id: Option<String>,
}

/// Improves an existing page via the content pipeline.
pub struct PageImproveHandler {
    pipeline: ContentPipeline,
}

impl PageImproveHandler {
    pub fn new(pipeline: ContentPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl JobHandler for PageImproveHandler {
    fn job_type(&self) -> &'static str {
        job_type::PAGE_IMPROVE
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let params: PageImproveParams = match ctx.typed_params() {
            Ok(params) => params,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        info!(
            job_id = ctx.job.id,
            page = %params.page,
            tier = ?params.tier,
            "Improving page"
        );

        let result = match self.pipeline.improve(&raw_params(&ctx)).await {
            Ok(result) => result,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        accept_content_result(params.page, result)
    }
}

/// Creates a new page via the content pipeline.
pub struct PageCreateHandler {
    pipeline: ContentPipeline,
}

impl PageCreateHandler {
    pub fn new(pipeline: ContentPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl JobHandler for PageCreateHandler {
    fn job_type(&self) -> &'static str {
        job_type::PAGE_CREATE
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let params: PageCreateParams = match ctx.typed_params() {
            Ok(params) => params,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        info!(job_id = ctx.job.id, page = %params.page, "Creating page");

        let result = match self.pipeline.create(&raw_params(&ctx)).await {
            Ok(result) => result,
            Err(e) => return JobResult::Failed(e.to_string()),
        };
        accept_content_result(params.page, result)
    }
}

/// The pipeline gets the params as stored, so planner-added fields like
/// `batchId` pass through without this crate having to know about them.
fn raw_params(ctx: &JobContext) -> JsonValue {
    ctx.params().cloned().unwrap_or_else(|| json!({}))
}

/// Normalize and fence every emitted path, then build the job result.
///
/// A single bad path fails the whole job rather than dropping the change:
/// only `Completed` children are merged downstream, so failing here keeps
/// the rejected path out of the batch entirely.
fn accept_content_result(page: String, mut result: ContentJobResult) -> JobResult {
    let areas = content_areas_from_env();
    for change in &mut result.file_changes {
        let normalized = match normalize_rel_path(&change.path) {
            Ok(normalized) => normalized,
            Err(e) => {
                return JobResult::Failed(format!(
                    "pipeline emitted invalid path {:?}: {}",
                    change.path, e
                ))
            }
        };
        if !is_in_content_area(&normalized, &areas) {
            return JobResult::Failed(format!(
                "pipeline emitted path outside content areas: {}",
                normalized
            ));
        }
        change.path = normalized;
    }

    if result.page.is_none() {
        result.page = Some(page);
    }
    match serde_json::to_value(&result) {
        Ok(data) => JobResult::Success(Some(data)),
        Err(e) => JobResult::Failed(format!("failed to serialize job result: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use chrono::Utc;
    use pagesmith_core::{FileChange, Job, JobStatus};

    fn content_job(job_type: &str, params: JsonValue) -> Job {
        Job {
            id: 21,
            job_type: job_type.to_string(),
            status: JobStatus::Running,
            priority: 7,
            params: Some(params),
            result: None,
            error: None,
            retries: 0,
            max_retries: 1,
            worker_id: Some("worker-test".to_string()),
            created_at: Utc::now(),
            claimed_at: None,
            started_at: None,
            completed_at: None,
        }
    }

    fn fake_pipeline(dir: &Path, body: &str) -> ContentPipeline {
        let script = dir.join("pipeline.sh");
        std::fs::write(&script, body).unwrap();
        ContentPipeline::new(format!("sh {}", script.display()), dir)
    }

    #[test]
    fn test_improve_params_shape() {
        let params: PageImproveParams = serde_json::from_value(json!({
            "page": "content/news/solar.md",
            "reason": "stale citations",
            "tier": "standard",
            "batchId": "digest-20250301-0400"
        }))
        .unwrap();
        assert_eq!(params.page, "content/news/solar.md");
        assert_eq!(params.tier, Some(UpdateTier::Standard));
        assert_eq!(params.batch_id.as_deref(), Some("digest-20250301-0400"));

        // Only the page is required
        let minimal: PageImproveParams =
            serde_json::from_value(json!({"page": "content/a.md"})).unwrap();
        assert!(minimal.reason.is_none());
        assert!(minimal.tier.is_none());
    }

    #[test]
    fn test_create_params_require_brief() {
        assert!(serde_json::from_value::<PageCreateParams>(json!({"page": "pages/x.md"})).is_err());
    }

    #[test]
    fn test_accept_normalizes_paths_and_fills_page() {
        let result = ContentJobResult {
            file_changes: vec![FileChange::write("./content/news/a.md", "# A")],
            summary: Some("refreshed".to_string()),
            page: None,
        };
        match accept_content_result("content/news/a.md".to_string(), result) {
            JobResult::Success(Some(data)) => {
                assert_eq!(data["fileChanges"][0]["path"], "content/news/a.md");
                assert_eq!(data["page"], "content/news/a.md");
                assert_eq!(data["summary"], "refreshed");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_accept_rejects_traversal() {
        let result = ContentJobResult {
            file_changes: vec![FileChange::write("content/../../evil.md", "x")],
            summary: None,
            page: None,
        };
        match accept_content_result("content/a.md".to_string(), result) {
            JobResult::Failed(msg) => assert!(msg.contains("invalid path"), "got: {}", msg),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_accept_rejects_out_of_area_path() {
        let result = ContentJobResult {
            file_changes: vec![FileChange::write("src/main.rs", "fn main() {}")],
            summary: None,
            page: None,
        };
        match accept_content_result("content/a.md".to_string(), result) {
            JobResult::Failed(msg) => {
                assert!(msg.contains("outside content areas"), "got: {}", msg);
                assert!(msg.contains("src/main.rs"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_improve_end_to_end_with_fake_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = fake_pipeline(
            dir.path(),
            r##"cat <<'EOF'
{"fileChanges":[{"path":"content/news/solar.md","content":"# Solar"}],"summary":"rewrote intro"}
EOF
"##,
        );
        let handler = PageImproveHandler::new(pipeline);
        let job = content_job(job_type::PAGE_IMPROVE, json!({"page": "content/news/solar.md"}));
        let ctx = JobContext::new(job, "w", dir.path());

        match handler.execute(ctx).await {
            JobResult::Success(Some(data)) => {
                assert_eq!(data["fileChanges"][0]["content"], "# Solar");
                assert_eq!(data["page"], "content/news/solar.md");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_fails_when_pipeline_escapes_fence() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = fake_pipeline(
            dir.path(),
            r#"echo '{"fileChanges":[{"path":"../outside.md","content":"x"}]}'
"#,
        );
        let handler = PageCreateHandler::new(pipeline);
        let job = content_job(
            job_type::PAGE_CREATE,
            json!({"page": "pages/about.md", "brief": "about us"}),
        );
        let ctx = JobContext::new(job, "w", dir.path());

        match handler.execute(ctx).await {
            JobResult::Failed(msg) => assert!(msg.contains("invalid path"), "got: {}", msg),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_improve_fails_without_pipeline_command() {
        let dir = tempfile::tempdir().unwrap();
        let handler = PageImproveHandler::new(ContentPipeline::new("", dir.path()));
        let job = content_job(job_type::PAGE_IMPROVE, json!({"page": "content/a.md"}));
        let ctx = JobContext::new(job, "w", dir.path());

        match handler.execute(ctx).await {
            JobResult::Failed(msg) => {
                assert!(msg.contains("PAGESMITH_PIPELINE_CMD"), "got: {}", msg)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_improve_rejects_malformed_params() {
        let dir = tempfile::tempdir().unwrap();
        let handler = PageImproveHandler::new(ContentPipeline::new("true", dir.path()));
        // page must be a string
        let job = content_job(job_type::PAGE_IMPROVE, json!({"page": 42}));
        let ctx = JobContext::new(job, "w", dir.path());

        match handler.execute(ctx).await {
            JobResult::Failed(msg) => assert!(msg.contains("invalid job params"), "got: {}", msg),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
