//! Batch scanning with per-repository failure isolation.

use crate::domain::{RepoCheckResult, RepoStatus};
use crate::error::{CoreError, Result};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Anything that can check a single repository path.
pub trait RepoChecker: Send + Sync {
    fn check(&self, path: &str) -> anyhow::Result<RepoCheckResult>;
}

/// Runs a [`RepoChecker`] over an ordered list of paths.
pub struct RepositorySetScanner {
    checker: Arc<dyn RepoChecker>,
    pool: Option<rayon::ThreadPool>,
}

impl RepositorySetScanner {
    /// Sequential scanner.
    pub fn new(checker: Arc<dyn RepoChecker>) -> Self {
        Self { checker, pool: None }
    }

    /// Scanner that checks up to `parallelism` repositories at once.
    pub fn with_parallelism(checker: Arc<dyn RepoChecker>, parallelism: usize) -> Result<Self> {
        if parallelism <= 1 {
            return Ok(Self::new(checker));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .thread_name(|i| format!("gitbar-check-{}", i))
            .build()
            .map_err(|e| CoreError::Pool { message: e.to_string() })?;

        Ok(Self {
            checker,
            pool: Some(pool),
        })
    }

    /// One result per non-blank path, in input order. Never fails as a whole.
    pub fn scan<S: AsRef<str> + Sync>(&self, paths: &[S]) -> Vec<RepoCheckResult> {
        let paths: Vec<&str> = paths
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| {
                if p.is_empty() {
                    debug!("Skipping empty repository path");
                }
                !p.is_empty()
            })
            .collect();

        if paths.is_empty() {
            info!("No repositories configured for monitoring");
            return Vec::new();
        }

        debug!("Checking {} repositories", paths.len());
        match &self.pool {
            Some(pool) => pool.install(|| paths.par_iter().map(|p| self.check_one(p)).collect()),
            None => paths.iter().map(|p| self.check_one(p)).collect(),
        }
    }

    fn check_one(&self, path: &str) -> RepoCheckResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.checker.check(path)));
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Unexpected error checking repository {}: {:#}", path, e);
                RepoCheckResult::failed(path, RepoStatus::Error, format!("Unexpected error: {:#}", e))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Repository check panicked for {}: {}", path, message);
                RepoCheckResult::failed(path, RepoStatus::Error, format!("Unexpected error: {}", message))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "check panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use parking_lot::Mutex;

    /// Status is chosen from the path: "err:*" fails, "panic:*" panics,
    /// "dirty:*" is uncommitted, everything else clean.
    #[derive(Default)]
    struct ScriptedChecker {
        seen: Mutex<Vec<String>>,
    }

    impl RepoChecker for ScriptedChecker {
        fn check(&self, path: &str) -> anyhow::Result<RepoCheckResult> {
            self.seen.lock().push(path.to_string());
            if path.starts_with("err:") {
                return Err(anyhow!("boom"));
            }
            if path.starts_with("panic:") {
                panic!("probe exploded");
            }
            let mut result = RepoCheckResult::new(path);
            if path.starts_with("dirty:") {
                result.raw_statuses.insert(RepoStatus::Uncommitted);
                result.priority_status = RepoStatus::Uncommitted;
            }
            Ok(result)
        }
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let scanner = RepositorySetScanner::new(Arc::new(ScriptedChecker::default()));
        let empty: [&str; 0] = [];
        assert!(scanner.scan(&empty).is_empty());
    }

    #[test]
    fn test_blank_entries_are_skipped_and_paths_trimmed() {
        let checker = Arc::new(ScriptedChecker::default());
        let scanner = RepositorySetScanner::new(checker.clone());
        let results = scanner.scan(&["  /a  ", "", "   ", "/b"]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].path, "/a");
        assert_eq!(results[1].path, "/b");
        assert_eq!(*checker.seen.lock(), vec!["/a".to_string(), "/b".to_string()]);
    }

    #[test]
    fn test_failures_are_isolated() {
        let scanner = RepositorySetScanner::new(Arc::new(ScriptedChecker::default()));
        let results = scanner.scan(&["/ok", "err:/broken", "panic:/worse", "dirty:/c"]);

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].priority_status, RepoStatus::Clean);
        assert_eq!(results[1].priority_status, RepoStatus::Error);
        assert!(results[1].error.as_deref().unwrap_or("").contains("boom"));
        assert_eq!(results[2].priority_status, RepoStatus::Error);
        assert!(results[2].error.as_deref().unwrap_or("").contains("probe exploded"));
        assert_eq!(results[3].priority_status, RepoStatus::Uncommitted);
    }

    #[test]
    fn test_parallel_scan_preserves_input_order() -> anyhow::Result<()> {
        let scanner = RepositorySetScanner::with_parallelism(Arc::new(ScriptedChecker::default()), 4)?;
        let paths: Vec<String> = (0..32).map(|i| format!("/repo-{:02}", i)).collect();
        let results = scanner.scan(&paths);

        let got: Vec<_> = results.iter().map(|r| r.path.clone()).collect();
        assert_eq!(got, paths);
        Ok(())
    }
}
