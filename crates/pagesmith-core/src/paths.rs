//! Path safety for file changes applied to the site working tree.
//!
//! Content producers are AI-driven, so every path they emit is untrusted
//! input. Two checks gate a write:
//! 1. Lexical normalization must keep the path inside the repository root
//!    (no absolute paths, no `..` escaping above the root).
//! 2. The first path segment must be an allow-listed content area.
//!
//! Checks are lexical on purpose: they run before anything exists on disk,
//! and apply identically on every platform.

use thiserror::Error;

use crate::defaults;

/// Why a path was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("absolute path not allowed: {0}")]
    Absolute(String),

    #[error("path escapes repository root: {0}")]
    EscapesRoot(String),

    #[error("path contains NUL byte")]
    NulByte,
}

/// Lexically normalize a repository-relative path.
///
/// Accepts `/` and `\` separators, drops `.` and empty segments, resolves
/// `..` against preceding segments, and rejects anything absolute or
/// escaping above the root. Returns the normalized `/`-joined path.
pub fn normalize_rel_path(path: &str) -> Result<String, PathError> {
    if path.contains('\0') {
        return Err(PathError::NulByte);
    }

    let unified = path.replace('\\', "/");
    let trimmed = unified.trim();
    if trimmed.is_empty() {
        return Err(PathError::Empty);
    }
    if trimmed.starts_with('/') || has_drive_prefix(trimmed) {
        return Err(PathError::Absolute(path.to_string()));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathError::EscapesRoot(path.to_string()));
                }
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(PathError::Empty);
    }
    Ok(segments.join("/"))
}

/// Windows drive-letter prefix, e.g. `C:\` or `c:/`.
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Whether a normalized path sits inside one of the allowed content areas.
///
/// An area matches as a whole first segment: area `content` admits
/// `content/news/a.md` but not `content-drafts/a.md`.
pub fn is_in_content_area(normalized: &str, areas: &[String]) -> bool {
    let first = normalized.split('/').next().unwrap_or("");
    areas.iter().any(|area| area == first)
}

/// Allowed content areas from `PAGESMITH_CONTENT_AREAS`, falling back to the
/// built-in default list. Empty entries are dropped.
pub fn content_areas_from_env() -> Vec<String> {
    let raw = std::env::var(defaults::ENV_CONTENT_AREAS)
        .unwrap_or_else(|_| defaults::CONTENT_AREAS.to_string());
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_matches('/').to_string())
        .collect()
}
