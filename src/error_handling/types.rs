//! Error type definitions.
//!
//! This module defines the error types used by the lookup service, the update
//! pipelines and the exit list parser.

use std::path::PathBuf;

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Failures talking to a remote endpoint.
///
/// Every variant is transient from the pipeline's point of view: the product or
/// list is skipped for this cycle and retried on the next tick.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, TLS, timeout or other transport failure.
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: ReqwestError,
    },

    /// The endpoint answered with a non-success status.
    #[error("Request to {url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The response body could not be read completely.
    #[error("Failed reading response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: ReqwestError,
    },

    /// MaxMind rejected the configured license key.
    #[error("Invalid license key for {product}")]
    InvalidCredential { product: String },

    /// The checksum body is empty or contains characters unusable in a file name.
    #[error("Malformed checksum for {product}: {checksum:?}")]
    MalformedChecksum { product: String, checksum: String },

    /// The archive exceeds the configured size limit.
    #[error("Download from {url} too large: {size} bytes (max: {max} bytes)")]
    TooLarge { url: String, size: u64, max: u64 },

    /// The configured endpoint could not be turned into a request URL.
    #[error("Invalid endpoint URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Errors reading a downloaded database archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The archive holds no member ending in `.mmdb`.
    #[error("No .mmdb member found in archive for {product}")]
    MissingDatabase { product: String },

    /// The gzip or tar stream is corrupt, or writing the member out failed.
    #[error("Failed to extract archive for {product}: {source}")]
    Io {
        product: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from a single product update in the geo pipeline.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Persisting the version record failed.
    #[error("Failed to persist version record {path}: {source}")]
    Version {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The extraction task panicked or was cancelled.
    #[error("Extraction task for {product} did not complete: {source}")]
    Task {
        product: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Errors opening or querying a geo database store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The database file could not be read.
    #[error("Failed to read database {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid MaxMind database.
    #[error("Failed to parse database {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// The version record names no installed file for the product.
    #[error("No {product} database installed")]
    NotInstalled { product: String },

    /// The store has no record for the address.
    #[error("No record found for {0}")]
    NotFound(std::net::IpAddr),

    /// The record exists but could not be decoded.
    #[error("Lookup failed: {0}")]
    Lookup(String),
}

/// Structural errors in the Tor exit list.
///
/// Timestamp content never produces an error; only record structure does.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TorParseError {
    /// A line did not match the keyword expected by the current state.
    #[error("Line {line}: expected {expected}, found {found:?}")]
    UnexpectedLine {
        line: usize,
        expected: &'static str,
        found: String,
    },

    /// An `ExitAddress` line is missing its address or has an invalid one.
    #[error("Line {line}: invalid exit address {found:?}")]
    InvalidAddress { line: usize, found: String },

    /// The input ended in the middle of a record.
    #[error("Exit list ended while expecting {expected}")]
    IncompleteRecord { expected: &'static str },

    /// Reading the underlying stream failed.
    #[error("Failed reading exit list: {0}")]
    Io(String),
}

/// Errors surfaced to callers of the lookup service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The intake queue is saturated; the caller decides whether to retry.
    #[error("Unable to queue the geo request for processing")]
    QueueFull,

    /// The wait deadline passed before a response arrived.
    #[error("Deadline elapsed before the geo response arrived")]
    DeadlineElapsed,

    /// The caller cancelled the wait.
    #[error("Geo request was cancelled")]
    Cancelled,

    /// The city lookup failed for this address.
    #[error("Geo lookup failed: {0}")]
    Lookup(String),

    /// The service shut down before answering.
    #[error("Geo service is not running")]
    ServiceStopped,
}

impl QueryError {
    /// Returns true for errors caused by the caller giving up on the wait.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, QueryError::DeadlineElapsed | QueryError::Cancelled)
    }
}
