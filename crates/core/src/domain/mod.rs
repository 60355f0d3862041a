pub mod repo;
pub mod status;

// Re-exports for convenience
pub use repo::*;
pub use status::*;
