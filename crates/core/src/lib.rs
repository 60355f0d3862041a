//! gitbar core - status logic with no git library and no process spawning
//!
//! This crate holds the domain types, the classification and aggregation
//! rules, and the refresh scheduler. Git access, authentication probing and
//! time are reached through ports; concrete adapters live in the binary crate.

pub mod aggregate;
pub mod auth;
pub mod classify;
pub mod domain;
pub mod error;
pub mod ports;
pub mod probe;
pub mod scan;
pub mod scheduler;
pub mod widget;

// Re-exports for ergonomics
pub use aggregate::{aggregate, picker_entries, AggregateSummary};
pub use auth::{AuthAvailability, AuthSettings, FetchMethod};
pub use classify::classify;
pub use domain::*;
pub use error::*;
pub use probe::{FetchSettings, StatusProbe};
pub use scan::{RepoChecker, RepositorySetScanner};
pub use scheduler::{RefreshOutcome, RefreshPolicy, RefreshScheduler, ScanCache};
pub use widget::{WidgetIcons, WidgetOutput};
