//! Service configuration and constants.
//!
//! This module provides:
//! - Configuration constants (queue sizes, file names, endpoints, limits)
//! - The library `Config` struct and logging option types

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{Config, LogFormat, LogLevel};
