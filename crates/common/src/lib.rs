//! Snapreel Common Utilities
//!
//! Shared infrastructure for all Snapreel crates:
//! - Error taxonomy and result alias
//! - Recording clock and status formatting helpers
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
