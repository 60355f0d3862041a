//! Scan-or-reuse decisions and the scan cache.
//!
//! All decisions and cache replacement happen under one scan lock, so two
//! triggers never scan concurrently; the second blocks until the first is
//! done. Readers take [`RefreshScheduler::snapshot`], an `Arc` of a complete
//! result list, and never observe a half-written cache.

use crate::domain::{RepoCheckResult, RepoStatus};
use crate::error::{CoreError, Result};
use crate::ports::Clock;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    update_interval: Duration,
    cache_duration: Duration,
}

impl RefreshPolicy {
    pub fn new(update_interval: Duration, cache_duration: Duration) -> Result<Self> {
        if update_interval.is_zero() {
            return Err(CoreError::InvalidPolicy {
                reason: "update interval must be positive".to_string(),
            });
        }
        Ok(Self {
            update_interval,
            cache_duration,
        })
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// A rescan is due once this much time has passed.
    pub fn check_interval(&self) -> Duration {
        self.update_interval.min(self.cache_duration)
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(30),
            cache_duration: Duration::from_secs(5),
        }
    }
}

/// The most recent complete scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanCache {
    pub results: Vec<RepoCheckResult>,
    pub scanned_at: Option<Instant>,
}

/// What a call to [`RefreshScheduler::refresh`] did.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Scanned(Arc<ScanCache>),
    Cached(Arc<ScanCache>),
    /// The scan failed; the previous cache is returned untouched.
    Failed(Arc<ScanCache>),
}

impl RefreshOutcome {
    pub fn cache(&self) -> &Arc<ScanCache> {
        match self {
            RefreshOutcome::Scanned(c) | RefreshOutcome::Cached(c) | RefreshOutcome::Failed(c) => c,
        }
    }

    pub fn scanned(&self) -> bool {
        matches!(self, RefreshOutcome::Scanned(_))
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    last_scan: Option<Instant>,
    cache: Arc<ScanCache>,
    policy: RefreshPolicy,
    /// Bumped by every invalidate; a scan that started under an older
    /// generation does not mark itself as fresh.
    generation: u64,
}

pub struct RefreshScheduler<C> {
    clock: C,
    scan_lock: Mutex<()>,
    state: Mutex<SchedulerState>,
}

impl<C: Clock> RefreshScheduler<C> {
    pub fn new(clock: C, policy: RefreshPolicy) -> Self {
        Self {
            clock,
            scan_lock: Mutex::new(()),
            state: Mutex::new(SchedulerState {
                policy,
                ..Default::default()
            }),
        }
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.state.lock().policy
    }

    pub fn set_policy(&self, policy: RefreshPolicy) {
        self.state.lock().policy = policy;
    }

    /// Whether the next refresh will scan.
    pub fn is_due(&self) -> bool {
        let state = self.state.lock();
        self.due(&state)
    }

    fn due(&self, state: &SchedulerState) -> bool {
        match state.last_scan {
            None => true,
            Some(last) => {
                self.clock.now().saturating_duration_since(last) >= state.policy.check_interval()
            }
        }
    }

    /// Drop the cache and force the next decision to "due".
    ///
    /// Does not wait for an in-flight scan; that scan's results are kept as
    /// the cache but the next refresh still rescans.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.last_scan = None;
        state.cache = Arc::new(ScanCache::default());
        state.generation = state.generation.wrapping_add(1);
        info!("Scan cache invalidated");
    }

    /// The current cache, without waiting for an in-flight scan.
    pub fn snapshot(&self) -> Arc<ScanCache> {
        self.state.lock().cache.clone()
    }

    /// Scan if due, otherwise reuse the cache. Never propagates a scan
    /// failure or panic.
    pub fn refresh<F>(&self, scan: F) -> RefreshOutcome
    where
        F: FnOnce() -> anyhow::Result<Vec<RepoCheckResult>>,
    {
        let _scan_guard = self.scan_lock.lock();

        let generation = {
            let state = self.state.lock();
            if !self.due(&state) {
                debug!("Using cached repository status");
                return RefreshOutcome::Cached(state.cache.clone());
            }
            state.generation
        };

        let results = match panic::catch_unwind(AssertUnwindSafe(scan)) {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => {
                error!("Error checking repositories: {:#}", e);
                return RefreshOutcome::Failed(self.snapshot());
            }
            Err(_) => {
                error!("Repository scan panicked");
                return RefreshOutcome::Failed(self.snapshot());
            }
        };

        debug!("Repository check complete. Status counts: {:?}", status_counts(&results));

        let now = self.clock.now();
        let cache = Arc::new(ScanCache {
            results,
            scanned_at: Some(now),
        });

        let mut state = self.state.lock();
        state.cache = cache.clone();
        if state.generation == generation {
            state.last_scan = Some(now);
        } else {
            debug!("Cache invalidated during scan; next refresh rescans");
        }
        RefreshOutcome::Scanned(cache)
    }
}

fn status_counts(results: &[RepoCheckResult]) -> BTreeMap<RepoStatus, usize> {
    let mut counts = BTreeMap::new();
    for result in results {
        *counts.entry(result.priority_status).or_insert(0) += 1;
    }
    counts
}
