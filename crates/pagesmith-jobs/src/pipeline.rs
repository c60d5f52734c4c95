//! Content pipeline subprocess boundary.
//!
//! Page content is produced by an external pipeline executable (the AI
//! authoring tool), named by `PAGESMITH_PIPELINE_CMD`. This module owns the
//! calling convention: job params are handed over in a scratch JSON file,
//! the pipeline prints a JSON result as the last thing on stdout, and every
//! call is wall-clock bounded.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio::process::Command;
use tracing::debug;

use pagesmith_core::defaults::{
    ENV_PIPELINE_CMD, PIPELINE_PLAN_TIMEOUT_SECS, PIPELINE_TIMEOUT_SECS,
};
use pagesmith_core::{ContentJobResult, Error, Result, UpdateCandidate, UpdatePlanner};

use crate::proc::run_captured;

/// Client for the content pipeline executable.
///
/// The command string may carry leading arguments (`node tools/pipeline.mjs`);
/// it is split on whitespace. Subprocesses run with the project root as
/// their working directory.
#[derive(Clone)]
pub struct ContentPipeline {
    command: Option<String>,
    project_root: PathBuf,
}

impl ContentPipeline {
    /// Pipeline with an explicit command.
    pub fn new(command: impl Into<String>, project_root: impl Into<PathBuf>) -> Self {
        let command = command.into();
        Self {
            command: if command.trim().is_empty() {
                None
            } else {
                Some(command)
            },
            project_root: project_root.into(),
        }
    }

    /// Pipeline configured from `PAGESMITH_PIPELINE_CMD`. An unset command
    /// still constructs; content jobs then fail with a config message.
    pub fn from_env(project_root: impl Into<PathBuf>) -> Self {
        let command = std::env::var(ENV_PIPELINE_CMD).unwrap_or_default();
        Self::new(command, project_root)
    }

    pub fn is_configured(&self) -> bool {
        self.command.is_some()
    }

    fn resolved_command(&self) -> Result<&str> {
        self.command.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "{} is not set; content jobs cannot run",
                ENV_PIPELINE_CMD
            ))
        })
    }

    /// Run a pipeline subcommand, handing params over in a scratch file.
    async fn invoke(
        &self,
        subcommand: &str,
        params: &JsonValue,
        timeout_secs: u64,
    ) -> Result<String> {
        let command = self.resolved_command()?;

        let mut params_file = tempfile::Builder::new()
            .prefix("pagesmith-params-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| Error::Internal(format!("Failed to create params file: {}", e)))?;
        params_file
            .write_all(serde_json::to_string(params)?.as_bytes())
            .map_err(|e| Error::Internal(format!("Failed to write params file: {}", e)))?;

        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::Config("content pipeline command is empty".to_string()))?;

        debug!(subcommand, command, "Invoking content pipeline");

        let output = run_captured(
            Command::new(program)
                .args(parts)
                .arg(subcommand)
                .arg("--params")
                .arg(params_file.path())
                .current_dir(&self.project_root),
            Duration::from_secs(timeout_secs),
        )
        .await?;

        if !output.success() {
            return Err(Error::Job(format!(
                "content pipeline {} failed (exit {}): {}",
                subcommand,
                output.status,
                output.stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    /// Produce revised content for an existing page.
    pub async fn improve(&self, params: &JsonValue) -> Result<ContentJobResult> {
        let stdout = self.invoke("improve", params, PIPELINE_TIMEOUT_SECS).await?;
        parse_json_output(&stdout)
    }

    /// Produce content for a new page.
    pub async fn create(&self, params: &JsonValue) -> Result<ContentJobResult> {
        let stdout = self.invoke("create", params, PIPELINE_TIMEOUT_SECS).await?;
        parse_json_output(&stdout)
    }
}

/// Parse the JSON object from pipeline stdout.
///
/// The pipeline may print progress noise before the result, so parsing
/// starts at the first `{`. Anything after the object still fails.
fn parse_json_output<T: DeserializeOwned>(stdout: &str) -> Result<T> {
    let start = stdout.find('{').ok_or_else(|| {
        Error::Serialization("content pipeline produced no JSON output".to_string())
    })?;
    serde_json::from_str(stdout[start..].trim_end())
        .map_err(|e| Error::Serialization(format!("invalid content pipeline output: {}", e)))
}

/// Update planner backed by the pipeline's `plan` subcommand.
pub struct PipelinePlanner {
    pipeline: ContentPipeline,
}

impl PipelinePlanner {
    pub fn new(pipeline: ContentPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl UpdatePlanner for PipelinePlanner {
    async fn candidates(&self, window_hours: Option<i64>) -> Result<Vec<UpdateCandidate>> {
        let params = match window_hours {
            Some(hours) => json!({ "windowHours": hours }),
            None => json!({}),
        };
        let stdout = self
            .pipeline
            .invoke("plan", &params, PIPELINE_PLAN_TIMEOUT_SECS)
            .await?;
        let plan: PlanOutput = parse_json_output(&stdout)?;
        Ok(plan.candidates)
    }
}

// =============================================================================
// PIPELINE DTOS
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanOutput {
    #[serde(default)]
    candidates: Vec<UpdateCandidate>,
}
