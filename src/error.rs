// src/error.rs

//! Error types for every layer of the scanner.
//!
//! Probe failures ([`ProbeError`]) are expected and end up as values in the
//! scan results. Everything else that reaches the coordinator is wrapped in a
//! [`ScanError`] and terminates the scan.

use crate::core::models::ScanStatus;

/// Failure of a single probe or detector. Never fatal to the pipeline unless
/// it is [`ProbeError::Internal`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("DNS Error: {0}")]
    Resolve(String),

    #[error("TCP Connection Error: {0}")]
    Connect(String),

    #[error("TLS Handshake Error: {0}")]
    Tls(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("WHOIS Error: {0}")]
    Whois(String),

    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// A bug or environment problem rather than a network condition.
    #[error("internal probe error: {0}")]
    Internal(String),
}

impl ProbeError {
    /// Whether the coordinator must abort the scan on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProbeError::Internal(_))
    }
}

/// Errors raised by a [`ScanStore`](crate::core::store::ScanStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("scan not found: {0}")]
    NotFound(String),

    #[error("invalid status transition for scan {scan_id}: {from} -> {to}")]
    InvalidTransition {
        scan_id: String,
        from: ScanStatus,
        to: ScanStatus,
    },

    #[error("result already stored for scan {0}")]
    DuplicateResult(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Pipeline-level failure. Any of these moves the scan to `failed`.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to serialize scan results: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stage '{stage}' failed: {source}")]
    Probe {
        stage: String,
        #[source]
        source: ProbeError,
    },

    #[error("stage '{stage}' panicked: {reason}")]
    ProbePanicked { stage: String, reason: String },

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Scan timed out after {0} s")]
    TimedOut(u64),

    #[error("scan task aborted: {0}")]
    Aborted(String),
}
