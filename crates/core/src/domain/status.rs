use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Glyph used for a status name that does not parse.
pub const FALLBACK_ICON: &str = "?";

/// CSS class used for a status name that does not parse.
pub const FALLBACK_CLASS: &str = "unknown";

/// Repository status taxonomy.
///
/// `Multiple` is only ever produced by classification or aggregation; probes
/// never report it, and never report `Clean` either (clean is the absence of
/// signals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoStatus {
    Error,
    NotARepo,
    Uncommitted,
    Untracked,
    Unpushed,
    UpstreamAvailable,
    Clean,
    Multiple,
}

/// The fixed priority ordering, highest first.
///
/// Classification, aggregation and summary sorting all rank through this one
/// table.
pub const PRIORITY_ORDER: [RepoStatus; 7] = [
    RepoStatus::Error,
    RepoStatus::NotARepo,
    RepoStatus::Uncommitted,
    RepoStatus::Untracked,
    RepoStatus::Unpushed,
    RepoStatus::UpstreamAvailable,
    RepoStatus::Clean,
];

impl RepoStatus {
    /// Position in [`PRIORITY_ORDER`]; lower is more urgent.
    ///
    /// `Multiple` has no slot in the table and ranks after every entry.
    pub fn rank(self) -> usize {
        PRIORITY_ORDER
            .iter()
            .position(|s| *s == self)
            .unwrap_or(PRIORITY_ORDER.len())
    }

    /// Error or NotARepo: statuses that dominate everything else.
    pub fn is_failure(self) -> bool {
        matches!(self, RepoStatus::Error | RepoStatus::NotARepo)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RepoStatus::Error => "error",
            RepoStatus::NotARepo => "not_a_repo",
            RepoStatus::Uncommitted => "uncommitted",
            RepoStatus::Untracked => "untracked",
            RepoStatus::Unpushed => "unpushed",
            RepoStatus::UpstreamAvailable => "upstream_available",
            RepoStatus::Clean => "clean",
            RepoStatus::Multiple => "multiple",
        }
    }

    /// Tooltip / picker icon.
    pub fn icon(self) -> &'static str {
        match self {
            RepoStatus::Clean => "✓",
            RepoStatus::Uncommitted => "●",
            RepoStatus::Untracked => "◉",
            RepoStatus::Unpushed => "↑",
            RepoStatus::UpstreamAvailable => "↓",
            RepoStatus::Multiple => "⚠",
            RepoStatus::Error | RepoStatus::NotARepo => "✗",
        }
    }

    /// CSS class name consumed by the bar's stylesheet.
    pub fn css_class(self) -> &'static str {
        match self {
            RepoStatus::Clean => "clean",
            RepoStatus::Uncommitted => "uncommitted",
            RepoStatus::Untracked => "untracked",
            RepoStatus::Unpushed => "unpushed",
            RepoStatus::UpstreamAvailable => "upstream",
            RepoStatus::Multiple => "multiple",
            RepoStatus::Error | RepoStatus::NotARepo => "error",
        }
    }

    /// Default text shown in the bar itself. Empty when clean so the widget
    /// collapses.
    pub fn widget_text(self) -> &'static str {
        match self {
            RepoStatus::Clean => "",
            RepoStatus::Uncommitted => "●",
            RepoStatus::Untracked => "○",
            RepoStatus::Unpushed => "↑",
            RepoStatus::UpstreamAvailable => "↓",
            RepoStatus::Multiple => "!",
            RepoStatus::Error | RepoStatus::NotARepo => "✗",
        }
    }
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown repository status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for RepoStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(RepoStatus::Error),
            "not_a_repo" => Ok(RepoStatus::NotARepo),
            "uncommitted" => Ok(RepoStatus::Uncommitted),
            "untracked" => Ok(RepoStatus::Untracked),
            "unpushed" => Ok(RepoStatus::Unpushed),
            "upstream_available" | "upstream" => Ok(RepoStatus::UpstreamAvailable),
            "clean" => Ok(RepoStatus::Clean),
            "multiple" => Ok(RepoStatus::Multiple),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Icon lookup by status name, falling back to [`FALLBACK_ICON`].
///
/// In-process code holds a [`RepoStatus`] and calls [`RepoStatus::icon`].
/// These name lookups are for library consumers that only have the
/// serialized name, such as a stored `class` value or a script's argument.
pub fn icon_for_name(name: &str) -> &'static str {
    name.parse::<RepoStatus>()
        .map(RepoStatus::icon)
        .unwrap_or(FALLBACK_ICON)
}

/// Class lookup by status name, falling back to [`FALLBACK_CLASS`].
pub fn class_for_name(name: &str) -> &'static str {
    name.parse::<RepoStatus>()
        .map(RepoStatus::css_class)
        .unwrap_or(FALLBACK_CLASS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order_is_total_over_raw_and_clean() {
        for (i, status) in PRIORITY_ORDER.iter().enumerate() {
            assert_eq!(status.rank(), i);
        }
        assert_eq!(RepoStatus::Multiple.rank(), PRIORITY_ORDER.len());
    }

    #[test]
    fn test_failure_statuses() {
        assert!(RepoStatus::Error.is_failure());
        assert!(RepoStatus::NotARepo.is_failure());
        assert!(!RepoStatus::Multiple.is_failure());
        assert!(!RepoStatus::Clean.is_failure());
    }

    #[test]
    fn test_icons_and_classes() {
        assert_eq!(RepoStatus::Clean.icon(), "✓");
        assert_eq!(RepoStatus::Uncommitted.icon(), "●");
        assert_eq!(RepoStatus::Unpushed.icon(), "↑");
        assert_eq!(RepoStatus::UpstreamAvailable.css_class(), "upstream");
        assert_eq!(RepoStatus::NotARepo.css_class(), "error");
        assert_eq!(RepoStatus::Clean.widget_text(), "");
        assert_eq!(RepoStatus::Multiple.widget_text(), "!");
    }

    #[test]
    fn test_name_lookup_falls_back() {
        assert_eq!(icon_for_name("uncommitted"), "●");
        assert_eq!(class_for_name("upstream"), "upstream");
        assert_eq!(icon_for_name("sideways"), FALLBACK_ICON);
        assert_eq!(class_for_name(""), FALLBACK_CLASS);
    }

    #[test]
    fn test_emitted_class_names_resolve_back() {
        for status in PRIORITY_ORDER.iter().chain([RepoStatus::Multiple].iter()) {
            let class = status.css_class();
            assert_eq!(class_for_name(class), class);
            assert_ne!(icon_for_name(class), FALLBACK_ICON);
        }
    }

    #[test]
    fn test_parse_roundtrips_display() {
        for status in PRIORITY_ORDER.iter().chain([RepoStatus::Multiple].iter()) {
            assert_eq!(status.to_string().parse::<RepoStatus>(), Ok(*status));
        }
    }
}
