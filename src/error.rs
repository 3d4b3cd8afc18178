//! Error types for nupkg-restore
//!
//! This module provides the error taxonomy for the restore pipeline:
//! - [`Error`] for failures that abort the whole invocation (bad config, missing input)
//! - [`FetchError`] for transport failures while retrieving one archive
//! - [`ExtractError`] for extraction failures, separating trust verification from the rest
//!
//! Per-package failures never surface as [`Error`]; the retry controller converts them
//! into [`FailureReason`] values.

use crate::types::{FailureReason, SignatureIssue};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for nupkg-restore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nupkg-restore
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// The package list does not exist
    #[error("package list not found: {}", path.display())]
    InputNotFound {
        /// The path that was expected to hold the package list
        path: PathBuf,
    },

    /// The package source could not be understood
    #[error("invalid package source: {0}")]
    InvalidSource(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Failure while retrieving an archive into a staging slot
///
/// Every variant except [`FetchError::Cancelled`] is a transient transport failure.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The request exceeded the configured timeout
    #[error("timed out fetching {url}")]
    Timeout {
        /// Requested URL
        url: String,
    },

    /// Could not connect to the server
    #[error("connection failed for {url}: {reason}")]
    Connect {
        /// Requested URL
        url: String,
        /// Underlying error
        reason: String,
    },

    /// The transfer broke off after it started
    #[error("transfer failed for {url}: {reason}")]
    Transfer {
        /// Requested URL
        url: String,
        /// Underlying error
        reason: String,
    },

    /// A pre-placed archive is missing from the source directory
    #[error("archive not found in source directory: {}", path.display())]
    NotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Writing the staging file failed
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// Staging file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The fetch was aborted by cancellation
    #[error("fetch cancelled")]
    Cancelled,
}

/// Failure while extracting an archive into the feed
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Trust verification rejected the package
    #[error("package signature validation failed for {identity}")]
    Signature {
        /// Package identity as reported by the archive or the request
        identity: String,
        /// Every issue found during verification
        issues: Vec<SignatureIssue>,
    },

    /// Any other failure: unreadable archive, missing manifest, I/O
    #[error("{reason}")]
    Generic {
        /// What went wrong
        reason: String,
    },
}

impl ExtractError {
    /// Build a generic extraction error
    pub fn generic(reason: impl Into<String>) -> Self {
        ExtractError::Generic {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for ExtractError {
    fn from(e: std::io::Error) -> Self {
        ExtractError::generic(format!("I/O error: {e}"))
    }
}

impl From<FetchError> for FailureReason {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Cancelled => FailureReason::Cancelled,
            other => FailureReason::Transport {
                detail: other.to_string(),
            },
        }
    }
}

impl From<ExtractError> for FailureReason {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::Signature { identity, issues } => {
                FailureReason::Signature { identity, issues }
            }
            ExtractError::Generic { reason } => FailureReason::Extraction { detail: reason },
        }
    }
}
