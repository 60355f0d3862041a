//! Folding a scan's results into one overall indicator.

use crate::classify::highest_failure;
use crate::domain::{RepoCheckResult, RepoStatus};
use serde::Serialize;

/// Most itemized repositories shown in a summary.
pub const MAX_SUMMARY_ITEMS: usize = 10;

/// Summary line (and picker entry) used when nothing is configured.
pub const NO_REPOSITORIES: &str = "No repositories configured";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateSummary {
    pub overall_status: RepoStatus,
    pub display_icon: &'static str,
    pub display_class: &'static str,
    pub summary_lines: Vec<String>,
    pub truncated: bool,
    pub repository_count: usize,
    pub issue_count: usize,
}

impl AggregateSummary {
    pub fn is_empty(&self) -> bool {
        self.repository_count == 0
    }

    pub fn tooltip(&self) -> String {
        self.summary_lines.join("\n")
    }
}

/// Overall status across a repository set.
///
/// No issues → `Clean`; exactly one → that repository's own status; more
/// than one → `Error` if any failed, else `Multiple`.
pub fn overall_status(results: &[RepoCheckResult]) -> RepoStatus {
    let mut issues = results.iter().filter(|r| !r.is_clean()).map(|r| r.priority_status);

    match (issues.next(), issues.next()) {
        (None, _) => RepoStatus::Clean,
        (Some(only), None) => only,
        (Some(_), Some(_)) => {
            let any_failure = highest_failure(results.iter().map(|r| r.priority_status)).is_some();
            if any_failure {
                RepoStatus::Error
            } else {
                RepoStatus::Multiple
            }
        }
    }
}

pub fn aggregate(results: &[RepoCheckResult]) -> AggregateSummary {
    let overall = overall_status(results);
    let mut issues: Vec<&RepoCheckResult> = results.iter().filter(|r| !r.is_clean()).collect();

    let mut lines = Vec::new();
    let mut truncated = false;

    if results.is_empty() {
        lines.push(NO_REPOSITORIES.to_string());
    } else if issues.is_empty() {
        lines.push(format!("All {} repositories clean", results.len()));
    } else {
        lines.push(format!(
            "{} of {} repositories need attention:",
            issues.len(),
            results.len()
        ));

        sort_by_priority(&mut issues);
        for repo in issues.iter().take(MAX_SUMMARY_ITEMS) {
            lines.push(format!(
                "  {} {}{}",
                repo.priority_status.icon(),
                repo.name,
                repo.details.parenthesized()
            ));
        }

        if issues.len() > MAX_SUMMARY_ITEMS {
            truncated = true;
            lines.push(format!("  +{} more", issues.len() - MAX_SUMMARY_ITEMS));
        }
    }

    AggregateSummary {
        overall_status: overall,
        display_icon: overall.icon(),
        display_class: overall.css_class(),
        summary_lines: lines,
        truncated,
        repository_count: results.len(),
        issue_count: issues.len(),
    }
}

/// Entries handed to the external picker: `icon name (details) | path`,
/// most urgent first.
pub fn picker_entries(results: &[RepoCheckResult]) -> Vec<String> {
    if results.is_empty() {
        return vec![NO_REPOSITORIES.to_string()];
    }

    let mut sorted: Vec<&RepoCheckResult> = results.iter().collect();
    sort_by_priority(&mut sorted);
    sorted
        .into_iter()
        .map(|repo| {
            format!(
                "{} {}{} | {}",
                repo.priority_status.icon(),
                repo.name,
                repo.details.parenthesized(),
                repo.path
            )
        })
        .collect()
}

/// Fixed priority order, then name and path so output never depends on
/// input order.
fn sort_by_priority(results: &mut [&RepoCheckResult]) {
    results.sort_by(|a, b| {
        a.priority_status
            .rank()
            .cmp(&b.priority_status.rank())
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.path.cmp(&b.path))
    });
}
