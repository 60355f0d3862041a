pub mod auth;
pub mod git;
pub mod time;

// Re-exports
pub use auth::*;
pub use git::*;
pub use time::*;
