//! Shared resource initialization.
//!
//! This module provides functions to initialize the process-wide resources the
//! service depends on:
//! - Logger (plain or JSON output)
//! - HTTP client for the update pipelines

mod client;
mod logger;

// Re-export public API
pub use client::init_client;
pub use logger::init_logger_with;
