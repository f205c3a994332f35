//! Error handling and service statistics.
//!
//! This module provides:
//! - Error type definitions for fetching, extraction, parsing and queries
//! - Thread-safe event counters shared by the service and its pipelines

mod stats;
mod types;

// Re-export public API
pub use stats::{EventKind, ServiceStats, StatsSnapshot};
pub use types::{
    ArchiveError, FetchError, InitializationError, QueryError, StoreError, TorParseError,
    UpdateError,
};
