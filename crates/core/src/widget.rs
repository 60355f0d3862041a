use crate::aggregate::AggregateSummary;
use crate::domain::RepoStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-status overrides for the bar text.
pub type WidgetIcons = BTreeMap<RepoStatus, String>;

/// The JSON object emitted once per cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetOutput {
    pub text: String,
    pub class: String,
    pub tooltip: String,
}

impl WidgetOutput {
    pub fn from_summary(summary: &AggregateSummary, icons: &WidgetIcons) -> Self {
        let text = if summary.is_empty() {
            String::new()
        } else {
            icons
                .get(&summary.overall_status)
                .cloned()
                .unwrap_or_else(|| summary.overall_status.widget_text().to_string())
        };

        Self {
            text,
            class: summary.display_class.to_string(),
            tooltip: summary.tooltip(),
        }
    }

    /// Error-classed object, e.g. `"Configuration error"` + cause.
    pub fn error(prefix: &str, message: impl std::fmt::Display) -> Self {
        Self {
            text: RepoStatus::Error.widget_text().to_string(),
            class: RepoStatus::Error.css_class().to_string(),
            tooltip: format!("{}: {}", prefix, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::domain::RepoCheckResult;

    fn uncommitted(name: &str) -> RepoCheckResult {
        let mut result = RepoCheckResult::new(format!("/r/{}", name));
        result.raw_statuses.insert(RepoStatus::Uncommitted);
        result.priority_status = RepoStatus::Uncommitted;
        result
    }

    #[test]
    fn test_empty_set_has_empty_text() {
        let output = WidgetOutput::from_summary(&aggregate(&[]), &WidgetIcons::new());
        assert_eq!(output.text, "");
        assert_eq!(output.class, "clean");
        assert_eq!(output.tooltip, "No repositories configured");
    }

    #[test]
    fn test_default_and_overridden_text() {
        let summary = aggregate(&[uncommitted("a")]);
        let output = WidgetOutput::from_summary(&summary, &WidgetIcons::new());
        assert_eq!(output.text, "●");
        assert_eq!(output.class, "uncommitted");

        let mut icons = WidgetIcons::new();
        icons.insert(RepoStatus::Uncommitted, "M".to_string());
        assert_eq!(WidgetOutput::from_summary(&summary, &icons).text, "M");
    }

    #[test]
    fn test_multiple_text() {
        let summary = aggregate(&[uncommitted("a"), uncommitted("b")]);
        let output = WidgetOutput::from_summary(&summary, &WidgetIcons::new());
        assert_eq!(output.text, "!");
        assert_eq!(output.class, "multiple");
    }

    #[test]
    fn test_error_object() {
        let output = WidgetOutput::error("Configuration error", "update_interval out of range");
        assert_eq!(output.text, "✗");
        assert_eq!(output.class, "error");
        assert_eq!(output.tooltip, "Configuration error: update_interval out of range");
    }
}
