use git2::{ErrorCode, Repository as GitRepository, Status, StatusOptions};
use gitbar_core::ports::{FetchOutcome, GitError, GitPort, GitResult, StatusEntry, TrackingRef};
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

use super::process::run_with_timeout;

/// Git adapter that implements GitPort using git2.
///
/// Fetching shells out to the `git` binary so it picks up the user's
/// credential helpers and can be killed at the timeout.
#[derive(Debug, Default, Clone)]
pub struct Git2Adapter;

impl Git2Adapter {
    pub fn new() -> Self {
        Self
    }

    fn open_repo(&self, repo: &Path) -> GitResult<GitRepository> {
        GitRepository::open(repo).map_err(|e| match e.code() {
            ErrorCode::NotFound => GitError::NotARepository {
                path: repo.display().to_string(),
            },
            _ => query("open", e),
        })
    }
}

fn query(operation: &'static str, e: git2::Error) -> GitError {
    GitError::Query {
        operation,
        message: e.message().to_string(),
    }
}

/// Two-letter porcelain code for a git2 status, e.g. `" M"`, `"A "`, `"??"`.
pub fn porcelain_code(status: Status) -> String {
    if status.is_conflicted() {
        return "UU".to_string();
    }
    if status.is_ignored() {
        return "!!".to_string();
    }

    let index = if status.is_index_new() {
        'A'
    } else if status.is_index_modified() {
        'M'
    } else if status.is_index_deleted() {
        'D'
    } else if status.is_index_renamed() {
        'R'
    } else if status.is_index_typechange() {
        'T'
    } else {
        ' '
    };

    if index == ' ' && status.is_wt_new() {
        return "??".to_string();
    }

    let worktree = if status.is_wt_modified() {
        'M'
    } else if status.is_wt_deleted() {
        'D'
    } else if status.is_wt_renamed() {
        'R'
    } else if status.is_wt_typechange() {
        'T'
    } else {
        ' '
    };

    format!("{}{}", index, worktree)
}

impl GitPort for Git2Adapter {
    fn ensure_repository(&self, repo: &Path) -> GitResult<()> {
        self.open_repo(repo).map(|_| ())
    }

    fn status_porcelain(&self, repo: &Path) -> GitResult<Vec<StatusEntry>> {
        let git_repo = self.open_repo(repo)?;

        let mut status_options = StatusOptions::new();
        status_options.include_untracked(true);
        status_options.include_ignored(false);

        let statuses = git_repo
            .statuses(Some(&mut status_options))
            .map_err(|e| query("status", e))?;

        Ok(statuses
            .iter()
            .filter(|entry| entry.status() != Status::CURRENT)
            .map(|entry| {
                let path = String::from_utf8_lossy(entry.path_bytes()).to_string();
                StatusEntry::new(porcelain_code(entry.status()), path)
            })
            .collect())
    }

    fn head_detached(&self, repo: &Path) -> GitResult<bool> {
        self.open_repo(repo)?
            .head_detached()
            .map_err(|e| query("symbolic-ref", e))
    }

    fn tracking_ref(&self, repo: &Path) -> GitResult<Option<TrackingRef>> {
        let git_repo = self.open_repo(repo)?;

        let head = match git_repo.head() {
            Ok(head) => head,
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                debug!("HEAD is unborn in {}", repo.display());
                return Ok(None);
            }
            Err(e) => return Err(query("rev-parse", e)),
        };
        if !head.is_branch() {
            return Ok(None);
        }

        let (Some(ref_name), Some(branch)) = (head.name(), head.shorthand()) else {
            return Ok(None);
        };

        let upstream_buf = match git_repo.branch_upstream_name(ref_name) {
            Ok(buf) => buf,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(query("rev-parse", e)),
        };
        let remote_buf = git_repo
            .branch_upstream_remote(ref_name)
            .map_err(|e| query("config", e))?;

        let (Some(upstream), Some(remote)) = (upstream_buf.as_str(), remote_buf.as_str()) else {
            return Ok(None);
        };

        let upstream = upstream
            .strip_prefix("refs/remotes/")
            .or_else(|| upstream.strip_prefix("refs/heads/"))
            .unwrap_or(upstream);

        Ok(Some(TrackingRef {
            branch: branch.to_string(),
            remote: remote.to_string(),
            upstream: upstream.to_string(),
        }))
    }

    fn commits_between(&self, repo: &Path, range: &str) -> GitResult<usize> {
        let git_repo = self.open_repo(repo)?;
        let mut revwalk = git_repo.revwalk().map_err(|e| query("rev-list", e))?;

        // "base..tip" or a single revision
        let (base, tip) = match range.split_once("..") {
            Some((base, tip)) => (base, tip),
            None => ("", range),
        };

        if tip.is_empty() || tip == "HEAD" {
            revwalk.push_head().map_err(|e| query("rev-list", e))?;
        } else {
            let tip_oid = git_repo
                .revparse_single(tip)
                .map_err(|e| query("rev-list", e))?
                .id();
            revwalk.push(tip_oid).map_err(|e| query("rev-list", e))?;
        }

        if !base.is_empty() {
            let base_oid = git_repo
                .revparse_single(base)
                .map_err(|e| query("rev-list", e))?
                .id();
            revwalk.hide(base_oid).map_err(|e| query("rev-list", e))?;
        }

        let mut count = 0;
        for oid in revwalk {
            oid.map_err(|e| query("rev-list", e))?;
            count += 1;
        }
        Ok(count)
    }

    fn remote_url(&self, repo: &Path, remote: &str) -> GitResult<Option<String>> {
        let git_repo = self.open_repo(repo)?;
        let remote_obj = match git_repo.find_remote(remote) {
            Ok(remote_obj) => remote_obj,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(query("remote get-url", e)),
        };
        Ok(remote_obj.url().map(str::to_string))
    }

    fn fetch(&self, repo: &Path, remote: &str, timeout: Duration) -> GitResult<FetchOutcome> {
        let mut command = Command::new("git");
        command
            .arg("-C")
            .arg(repo)
            .arg("fetch")
            .arg(remote)
            .env("GIT_TERMINAL_PROMPT", "0");

        let output = run_with_timeout(command, timeout)?;
        Ok(if output.timed_out {
            FetchOutcome::TimedOut
        } else if output.success() {
            FetchOutcome::Fetched
        } else {
            FetchOutcome::Failed {
                stderr: output.stderr,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_porcelain_codes() {
        assert_eq!(porcelain_code(Status::WT_NEW), "??");
        assert_eq!(porcelain_code(Status::IGNORED), "!!");
        assert_eq!(porcelain_code(Status::CONFLICTED), "UU");
        assert_eq!(porcelain_code(Status::WT_MODIFIED), " M");
        assert_eq!(porcelain_code(Status::INDEX_NEW), "A ");
        assert_eq!(porcelain_code(Status::INDEX_NEW | Status::WT_MODIFIED), "AM");
        assert_eq!(porcelain_code(Status::INDEX_MODIFIED | Status::WT_DELETED), "MD");
        assert_eq!(porcelain_code(Status::INDEX_RENAMED), "R ");
    }

    #[test]
    fn test_missing_repository_is_not_a_repository() -> anyhow::Result<()> {
        let temp_dir = tempfile::TempDir::new()?;
        let err = Git2Adapter::new()
            .ensure_repository(temp_dir.path())
            .unwrap_err();
        assert!(matches!(err, GitError::NotARepository { .. }));
        Ok(())
    }
}
