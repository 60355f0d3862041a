use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a [`GitPort`] implementation.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository: {path}")]
    NotARepository { path: String },

    #[error("git {operation} failed: {message}")]
    Query { operation: &'static str, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type GitResult<T> = std::result::Result<T, GitError>;

/// One line of porcelain status: a two-character code and a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub code: String,
    pub path: String,
}

impl StatusEntry {
    pub fn new(code: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            path: path.into(),
        }
    }

    pub fn is_untracked(&self) -> bool {
        self.code == "??"
    }

    pub fn is_ignored(&self) -> bool {
        self.code == "!!"
    }

    /// Anything that is neither untracked nor ignored is an uncommitted change.
    pub fn is_uncommitted(&self) -> bool {
        !self.is_untracked() && !self.is_ignored()
    }
}

/// Upstream configuration of the checked-out branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingRef {
    /// Local branch name, e.g. `main`.
    pub branch: String,
    /// Remote the upstream lives on, e.g. `origin`.
    pub remote: String,
    /// Upstream reference usable in a range expression, e.g. `origin/main`.
    pub upstream: String,
}

impl TrackingRef {
    /// `upstream..branch`: commits only the local branch has.
    pub fn ahead_range(&self) -> String {
        format!("{}..{}", self.upstream, self.branch)
    }

    /// `branch..upstream`: commits only the upstream has.
    pub fn behind_range(&self) -> String {
        format!("{}..{}", self.branch, self.upstream)
    }
}

/// Result of a best-effort network fetch. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched,
    Failed { stderr: String },
    TimedOut,
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Fetched => write!(f, "fetched"),
            FetchOutcome::Failed { stderr } => write!(f, "failed: {}", stderr.trim()),
            FetchOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Port for the external git capability
pub trait GitPort: Send + Sync {
    /// Confirm the path opens as a repository
    fn ensure_repository(&self, repo: &Path) -> GitResult<()>;

    /// Porcelain status lines, ignored files excluded
    fn status_porcelain(&self, repo: &Path) -> GitResult<Vec<StatusEntry>>;

    /// Whether HEAD points directly at a commit
    fn head_detached(&self, repo: &Path) -> GitResult<bool>;

    /// Upstream of the current branch, if one is configured
    fn tracking_ref(&self, repo: &Path) -> GitResult<Option<TrackingRef>>;

    /// Count commits in a `base..tip` range expression
    fn commits_between(&self, repo: &Path, range: &str) -> GitResult<usize>;

    /// First URL configured for a remote
    fn remote_url(&self, repo: &Path, remote: &str) -> GitResult<Option<String>>;

    /// Fetch from a remote, bounded by `timeout`
    fn fetch(&self, repo: &Path, remote: &str, timeout: Duration) -> GitResult<FetchOutcome>;
}
