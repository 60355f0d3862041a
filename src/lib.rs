//! gitbar application library
//!
//! Adapters, configuration and the monitor loop, exposed for the binary and
//! for integration tests.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod logging;
pub mod monitor;
