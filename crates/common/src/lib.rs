//! Matte Common Utilities
//!
//! Shared infrastructure for all Matte crates:
//! - Error types and result aliases
//! - Clock used to stamp exported file names
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
