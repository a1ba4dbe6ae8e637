//! Error types for the harness
//!
//! `SessionError` classifies the ways a single session can fail. Its
//! `Display` form is the exact classification string persisted in the
//! result record's error column, so variants render as
//! `HttpStatus:<code>`, `ParseError:<detail>` and `TransportError:<detail>`.
//! Session failures never propagate past the owning session's record.

use thiserror::Error;

/// Per-session failure classification.
///
/// All variants are terminal for the session that produced them and are
/// isolated to that session's result record. None abort the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The server rejected the request outright with a non-200 status.
    #[error("HttpStatus:{0}")]
    HttpStatus(u16),

    /// A stream payload could not be decoded.
    #[error("ParseError:{0}")]
    ParseError(String),

    /// Network-level failure: connection refused or reset, timeout, DNS
    /// failure, or any failure not otherwise classified.
    #[error("TransportError:{0}")]
    TransportError(String),
}

/// Top-level errors for batch setup and result persistence.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Invalid run configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// HTTP client construction failed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// Filesystem failure while writing results.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HarnessError>;
