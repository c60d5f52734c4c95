//! Local git plumbing for the batch-commit aggregator.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use pagesmith_core::defaults::{
    BRANCH_NAME_MAX_LENGTH, GIT_AUTHOR_EMAIL, GIT_AUTHOR_NAME, GIT_CMD_TIMEOUT_SECS,
    GIT_NET_TIMEOUT_SECS,
};
use pagesmith_core::{Error, Result};

use crate::proc::run_captured;

/// Sanitize a branch name for git.
///
/// Characters outside `[A-Za-z0-9-_/]` become `-`, runs of the same
/// separator collapse, leading and trailing separators are trimmed, and the
/// result is capped at 100 characters. Idempotent: sanitizing a sanitized
/// name changes nothing. May return an empty string; callers fall back to a
/// generated name.
pub fn sanitize_branch_name(name: &str) -> String {
    let mut collapsed = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/') {
            c
        } else {
            '-'
        };
        // No `--` or `//`, so no empty path segments and no range syntax
        if matches!(c, '-' | '/') && collapsed.ends_with(c) {
            continue;
        }
        collapsed.push(c);
    }

    let trimmed = collapsed.trim_matches(|c| c == '-' || c == '/');
    let mut out: String = trimmed.chars().take(BRANCH_NAME_MAX_LENGTH).collect();
    while out.ends_with('-') || out.ends_with('/') {
        out.pop();
    }
    out
}

/// Thin wrapper over the `git` CLI rooted at one working tree.
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the `git` CLI is available at all.
    pub async fn available() -> bool {
        match Command::new("git").arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    /// Run git with the given args, failing on non-zero exit.
    async fn git(&self, args: &[&str], timeout_secs: u64) -> Result<String> {
        let output = run_captured(
            Command::new("git").args(args).current_dir(&self.root),
            Duration::from_secs(timeout_secs),
        )
        .await?;

        if !output.success() {
            // Skip over `-c key=val` config pairs to name the subcommand
            let verb = args
                .iter()
                .find(|a| !a.starts_with('-') && !a.contains('='))
                .copied()
                .unwrap_or("");
            return Err(Error::Git(format!(
                "git {} failed ({}): {}",
                verb,
                output.status,
                output.stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    pub async fn current_branch(&self) -> Result<String> {
        let out = self
            .git(&["rev-parse", "--abbrev-ref", "HEAD"], GIT_CMD_TIMEOUT_SECS)
            .await?;
        Ok(out.trim().to_string())
    }

    pub async fn checkout(&self, branch: &str) -> Result<()> {
        self.git(&["checkout", branch], GIT_CMD_TIMEOUT_SECS).await?;
        Ok(())
    }

    /// Fast-forward the current branch from its upstream.
    pub async fn pull_ff_only(&self) -> Result<()> {
        self.git(&["pull", "--ff-only"], GIT_NET_TIMEOUT_SECS).await?;
        Ok(())
    }

    /// Check out `branch`, creating it from `base` if it does not exist. An
    /// existing branch is reset hard to `base` so a re-run of the same batch
    /// starts from a clean state instead of stacking commits.
    pub async fn create_or_reset_branch(&self, branch: &str, base: &str) -> Result<()> {
        if self
            .git(&["checkout", branch], GIT_CMD_TIMEOUT_SECS)
            .await
            .is_ok()
        {
            self.git(&["reset", "--hard", base], GIT_CMD_TIMEOUT_SECS)
                .await?;
        } else {
            self.git(&["checkout", "-b", branch, base], GIT_CMD_TIMEOUT_SECS)
                .await?;
        }
        Ok(())
    }

    /// Stage exactly the given paths (never the whole tree).
    pub async fn add_paths(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.git(&args, GIT_CMD_TIMEOUT_SECS).await?;
        Ok(())
    }

    /// Whether the index differs from HEAD.
    pub async fn has_staged_changes(&self) -> Result<bool> {
        let output = run_captured(
            Command::new("git")
                .args(["diff", "--cached", "--quiet"])
                .current_dir(&self.root),
            Duration::from_secs(GIT_CMD_TIMEOUT_SECS),
        )
        .await?;

        // --quiet exits 1 when differences exist, 0 when clean
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(Error::Git(format!(
                "git diff --cached failed: {}",
                output.stderr.trim()
            ))),
        }
    }

    /// Commit staged changes under the fixed bot identity.
    pub async fn commit(&self, message: &str) -> Result<()> {
        let name = format!("user.name={}", GIT_AUTHOR_NAME);
        let email = format!("user.email={}", GIT_AUTHOR_EMAIL);
        self.git(
            &["-c", &name, "-c", &email, "commit", "-m", message],
            GIT_CMD_TIMEOUT_SECS,
        )
        .await?;
        Ok(())
    }

    /// Push the branch, creating the remote tracking ref.
    pub async fn push(&self, branch: &str) -> Result<()> {
        self.git(&["push", "-u", "origin", branch], GIT_NET_TIMEOUT_SECS)
            .await?;
        Ok(())
    }
}
