use super::status::RepoStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Name used when a result has no usable path.
pub const UNKNOWN_REPO_NAME: &str = "unknown";

/// Optional per-signal counts gathered while probing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncommitted_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub untracked_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpushed_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_count: Option<usize>,
}

impl StatusDetails {
    /// Human-readable clauses for the non-zero counts, in display order:
    /// modified, untracked, unpushed, upstream.
    pub fn clauses(&self) -> Vec<String> {
        [
            (self.uncommitted_count, "modified"),
            (self.untracked_count, "untracked"),
            (self.unpushed_count, "unpushed"),
            (self.upstream_count, "upstream"),
        ]
        .into_iter()
        .filter_map(|(count, label)| match count {
            Some(n) if n > 0 => Some(format!("{} {}", n, label)),
            _ => None,
        })
        .collect()
    }

    /// `" (3 modified, 1 untracked)"`, or an empty string when nothing is set.
    pub fn parenthesized(&self) -> String {
        let clauses = self.clauses();
        if clauses.is_empty() {
            String::new()
        } else {
            format!(" ({})", clauses.join(", "))
        }
    }
}

/// One repository's outcome for one scan cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoCheckResult {
    pub path: String,
    pub name: String,
    pub raw_statuses: BTreeSet<RepoStatus>,
    pub priority_status: RepoStatus,
    pub error: Option<String>,
    pub details: StatusDetails,
}

impl RepoCheckResult {
    /// A clean result with no signals yet.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: repo_name(&path),
            path,
            raw_statuses: BTreeSet::new(),
            priority_status: RepoStatus::Clean,
            error: None,
            details: StatusDetails::default(),
        }
    }

    /// A terminal result carrying a single failure status.
    pub fn failed(path: impl Into<String>, status: RepoStatus, message: impl Into<String>) -> Self {
        let mut result = Self::new(path);
        result.raw_statuses.insert(status);
        result.priority_status = status;
        result.error = Some(message.into());
        result
    }

    pub fn is_clean(&self) -> bool {
        self.priority_status == RepoStatus::Clean
    }
}

/// Final path segment, or [`UNKNOWN_REPO_NAME`] for an empty path.
pub fn repo_name(path: &str) -> String {
    if path.is_empty() {
        return UNKNOWN_REPO_NAME.to_string();
    }

    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}
