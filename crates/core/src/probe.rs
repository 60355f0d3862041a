//! Per-repository status probing over the [`GitPort`].

use crate::auth::{AuthAvailability, AuthSettings};
use crate::classify::{classify, is_raw_signal};
use crate::domain::{RepoCheckResult, RepoStatus};
use crate::ports::{AuthProbe, FetchOutcome, GitError, GitPort, StatusEntry, TrackingRef};
use crate::scan::RepoChecker;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Default bound on a single fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    pub enabled: bool,
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Why a path cannot be probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathProblem {
    Empty,
    Missing(String),
    NotADirectory(String),
    NoGitDir(String),
}

impl PathProblem {
    /// A missing path is an `Error`; everything else means "not a repository".
    pub fn status(&self) -> RepoStatus {
        match self {
            PathProblem::Missing(_) => RepoStatus::Error,
            PathProblem::Empty | PathProblem::NotADirectory(_) | PathProblem::NoGitDir(_) => {
                RepoStatus::NotARepo
            }
        }
    }
}

impl fmt::Display for PathProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathProblem::Empty => write!(f, "Empty repository path"),
            PathProblem::Missing(p) => write!(f, "Path does not exist: {}", p),
            PathProblem::NotADirectory(p) => write!(f, "Path is not a directory: {}", p),
            PathProblem::NoGitDir(p) => write!(f, "Not a git repository (no .git directory): {}", p),
        }
    }
}

/// Check that `path` exists, is a directory and has a `.git` entry.
pub fn validate_path(path: &str) -> Result<PathBuf, PathProblem> {
    if path.is_empty() {
        return Err(PathProblem::Empty);
    }

    let repo = PathBuf::from(path);
    if !repo.exists() {
        return Err(PathProblem::Missing(path.to_string()));
    }
    if !repo.is_dir() {
        return Err(PathProblem::NotADirectory(path.to_string()));
    }
    // .git may be a file for worktrees and submodules
    if !repo.join(".git").exists() {
        return Err(PathProblem::NoGitDir(path.to_string()));
    }

    Ok(repo)
}

pub fn count_uncommitted(entries: &[StatusEntry]) -> usize {
    entries.iter().filter(|e| e.is_uncommitted()).count()
}

pub fn untracked_files(entries: &[StatusEntry]) -> Vec<&str> {
    entries
        .iter()
        .filter(|e| e.is_untracked() && !e.path.is_empty())
        .map(|e| e.path.as_str())
        .collect()
}

/// Fetch stderr that indicates missing or rejected credentials.
pub fn is_auth_failure(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("authentication") || lower.contains("permission")
}

/// Probes one repository: working tree, ahead/behind, best-effort fetch.
pub struct StatusProbe<G, A> {
    git: G,
    auth: AuthAvailability<A>,
    fetch: FetchSettings,
}

impl<G: GitPort, A: AuthProbe> StatusProbe<G, A> {
    pub fn new(git: G, auth_probe: A, auth: AuthSettings, fetch: FetchSettings) -> Self {
        Self {
            git,
            auth: AuthAvailability::new(auth_probe, auth),
            fetch,
        }
    }

    pub fn git(&self) -> &G {
        &self.git
    }

    /// Probe one repository. Ordinary git-level problems never surface as
    /// `Err`; they become statuses or partial-failure notes.
    pub fn check_repository(&self, path: &str) -> RepoCheckResult {
        let repo = match validate_path(path) {
            Ok(repo) => repo,
            Err(problem) => {
                warn!("Invalid repository path: {}", problem);
                return RepoCheckResult::failed(path, problem.status(), problem.to_string());
            }
        };

        match self.git.ensure_repository(&repo) {
            Ok(()) => {}
            Err(GitError::NotARepository { .. }) => {
                warn!("Not a git repository: {}", path);
                return RepoCheckResult::failed(path, RepoStatus::NotARepo, "Not a git repository");
            }
            Err(e) => {
                error!("Error opening repository {}: {}", path, e);
                return RepoCheckResult::failed(path, RepoStatus::Error, e.to_string());
            }
        }

        let mut result = RepoCheckResult::new(path);
        let mut failures = Vec::new();

        match self.git.status_porcelain(&repo) {
            Ok(entries) => {
                let uncommitted = count_uncommitted(&entries);
                if uncommitted > 0 {
                    result.raw_statuses.insert(RepoStatus::Uncommitted);
                    result.details.uncommitted_count = Some(uncommitted);
                }

                let untracked = untracked_files(&entries);
                for file in &untracked {
                    debug!("Found untracked file: {}", file);
                }
                if !untracked.is_empty() {
                    result.raw_statuses.insert(RepoStatus::Untracked);
                    result.details.untracked_count = Some(untracked.len());
                }
            }
            Err(e) => {
                warn!("Status query failed for {}: {}", path, e);
                failures.push(format!("status check failed: {}", e));
            }
        }

        let tracking = self.tracking(&repo, &mut failures);

        let unpushed = self.check_unpushed(&repo, tracking.as_ref(), &mut failures);
        if unpushed > 0 {
            result.raw_statuses.insert(RepoStatus::Unpushed);
            result.details.unpushed_count = Some(unpushed);
        }

        let upstream = self.check_upstream(&repo, tracking.as_ref(), &mut failures);
        if upstream > 0 {
            result.raw_statuses.insert(RepoStatus::UpstreamAvailable);
            result.details.upstream_count = Some(upstream);
        }

        debug_assert!(result.raw_statuses.iter().all(|s| is_raw_signal(*s)));
        result.priority_status = classify(&result.raw_statuses);
        if !failures.is_empty() {
            result.error = Some(failures.join("; "));
        }
        result
    }

    /// Commits on the local branch that its upstream lacks. Zero for a
    /// detached HEAD or a branch without an upstream.
    fn check_unpushed(
        &self,
        repo: &Path,
        tracking: Option<&TrackingRef>,
        failures: &mut Vec<String>,
    ) -> usize {
        let Some(tracking) = tracking else {
            return 0;
        };
        self.count(repo, &tracking.ahead_range(), "unpushed", failures)
    }

    /// Commits on the upstream that the local branch lacks, after a
    /// best-effort fetch.
    fn check_upstream(
        &self,
        repo: &Path,
        tracking: Option<&TrackingRef>,
        failures: &mut Vec<String>,
    ) -> usize {
        let Some(tracking) = tracking else {
            return 0;
        };
        self.refresh_remote(repo, tracking);
        // Counted whether or not the fetch went through
        self.count(repo, &tracking.behind_range(), "upstream", failures)
    }

    /// Upstream of the checked-out branch, resolved once per check.
    fn tracking(&self, repo: &Path, failures: &mut Vec<String>) -> Option<TrackingRef> {
        match self.git.head_detached(repo) {
            Ok(true) => {
                debug!("Repository is in detached HEAD state");
                return None;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Could not determine HEAD state: {}", e);
                failures.push(format!("head check failed: {}", e));
                return None;
            }
        }

        match self.git.tracking_ref(repo) {
            Ok(Some(tracking)) => Some(tracking),
            Ok(None) => {
                debug!("Current branch has no tracking branch");
                None
            }
            Err(e) => {
                warn!("Could not resolve tracking branch: {}", e);
                failures.push(format!("tracking lookup failed: {}", e));
                None
            }
        }
    }

    fn count(&self, repo: &Path, range: &str, what: &str, failures: &mut Vec<String>) -> usize {
        match self.git.commits_between(repo, range) {
            Ok(n) => {
                if n > 0 {
                    debug!("Found {} {} commits ({})", n, what, range);
                }
                n
            }
            Err(e) => {
                warn!("Error counting {} commits: {}", what, e);
                let note = format!("{} count failed: {}", what, e);
                if !failures.contains(&note) {
                    failures.push(note);
                }
                0
            }
        }
    }

    fn refresh_remote(&self, repo: &Path, tracking: &TrackingRef) {
        if !self.fetch.enabled {
            debug!("Fetch disabled, counting against local knowledge of {}", tracking.remote);
            return;
        }

        let url = match self.git.remote_url(repo, &tracking.remote) {
            Ok(Some(url)) => url,
            Ok(None) => {
                warn!("Could not get URL for remote '{}'", tracking.remote);
                String::new()
            }
            Err(e) => {
                warn!("Could not get URL for remote '{}': {}", tracking.remote, e);
                String::new()
            }
        };

        let Some(method) = self.auth.select_fetch_method(&url) else {
            debug!("Skipping fetch for remote '{}'", tracking.remote);
            return;
        };

        debug!("Fetching from remote '{}' using {}", tracking.remote, method);
        match self.git.fetch(repo, &tracking.remote, self.fetch.timeout) {
            Ok(FetchOutcome::Fetched) => debug!("Fetch completed successfully"),
            Ok(FetchOutcome::Failed { stderr }) if is_auth_failure(&stderr) => {
                debug!("Authentication failed for fetch: {}", stderr.trim());
            }
            Ok(FetchOutcome::Failed { stderr }) => warn!("Fetch failed: {}", stderr.trim()),
            Ok(FetchOutcome::TimedOut) => {
                warn!("Fetch timed out after {} seconds", self.fetch.timeout.as_secs());
            }
            Err(e) => warn!("Error during fetch: {}", e),
        }
    }
}

impl<G: GitPort, A: AuthProbe> RepoChecker for StatusProbe<G, A> {
    fn check(&self, path: &str) -> anyhow::Result<RepoCheckResult> {
        Ok(self.check_repository(path))
    }
}
