//! Raw signal set → single priority status.

use crate::domain::{RepoStatus, PRIORITY_ORDER};
use std::collections::BTreeSet;

/// Resolve a repository's raw statuses to its priority status.
///
/// Empty → `Clean`; one member → that member. With more than one member a
/// failure status wins (`Error` over `NotARepo`), otherwise the result is
/// `Multiple`.
pub fn classify(raw: &BTreeSet<RepoStatus>) -> RepoStatus {
    let mut members = raw.iter().copied();
    match (members.next(), members.next()) {
        (None, _) => RepoStatus::Clean,
        (Some(only), None) => only,
        (Some(_), Some(_)) => highest_failure(raw.iter().copied()).unwrap_or(RepoStatus::Multiple),
    }
}

/// Most urgent failure status among `statuses`, by the fixed ordering.
pub(crate) fn highest_failure(statuses: impl IntoIterator<Item = RepoStatus>) -> Option<RepoStatus> {
    statuses
        .into_iter()
        .filter(|s| s.is_failure())
        .min_by_key(|s| s.rank())
}

/// Statuses a probe may legitimately report.
pub fn is_raw_signal(status: RepoStatus) -> bool {
    PRIORITY_ORDER.contains(&status) && status != RepoStatus::Clean
}
