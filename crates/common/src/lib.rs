//! scenemux Common Utilities
//!
//! Shared infrastructure for all scenemux crates:
//! - Error types and result aliases
//! - Tracing/logging initialization
//! - Configuration loading and temp-file retention policy

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
