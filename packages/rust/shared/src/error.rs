//! Error types for jobdigest.
//!
//! Library crates use [`JobDigestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all jobdigest operations.
#[derive(Debug, thiserror::Error)]
pub enum JobDigestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a job source document.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The fetched document could not be turned into postings.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// A posting date that cannot be resolved to a calendar day.
    #[error("invalid posting date {value:?}: {reason}")]
    InvalidDate { value: String, reason: String },

    /// Sent-record storage could not be read or written.
    #[error("persistence error for {key:?}: {message}")]
    Persistence { key: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, JobDigestError>;

impl JobDigestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Create an invalid-date error for the raw `value`.
    pub fn invalid_date(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDate {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a persistence error for the storage `key`.
    pub fn persistence(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Persistence {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is a storage failure.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }
}
