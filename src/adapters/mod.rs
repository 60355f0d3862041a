pub mod auth;
pub mod git;
pub mod process;

pub use auth::SystemAuthProbe;
pub use git::Git2Adapter;
