//! Error types for attachment-dl
//!
//! Errors come in two tiers:
//! - [`Error`] is batch-level: invalid configuration or an unavailable base
//!   directory aborts a batch before any attachment is touched.
//! - [`AttachmentError`] is per-attachment: it is recorded in that attachment's
//!   outcome and never unwinds the batch.
//!
//! [`FetchError`] is what an [`AttachmentFetcher`](crate::source::AttachmentFetcher)
//! reports; the retry layer uses its transient/permanent split.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for attachment-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for attachment-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "organize_by")
        key: Option<String>,
    },

    /// The batch base directory could not be created or is not a directory
    #[error("failed to prepare directory {path}: {reason}")]
    DirectoryCreation {
        /// The directory that could not be prepared
        path: PathBuf,
        /// The underlying reason
        reason: String,
    },

    /// Message search through the external source failed
    #[error("message source error: {0}")]
    Source(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The downloader was cancelled before the batch started
    #[error("shutdown in progress: not accepting new batches")]
    ShuttingDown,
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "invalid_configuration",
            Error::DirectoryCreation { .. } => "directory_creation_failure",
            Error::Source(_) => "source_error",
            Error::Io(_) => "io_error",
            Error::ShuttingDown => "shutting_down",
        }
    }
}

/// Per-attachment failure, recorded in the attachment's outcome
///
/// Cloneable and serializable so it can be carried in reports and events.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum AttachmentError {
    /// The organized directory for this attachment could not be created
    #[error("failed to create directory {path}: {reason}")]
    DirectoryCreation {
        /// The directory that could not be created
        path: PathBuf,
        /// The underlying reason
        reason: String,
    },

    /// Fetch kept failing with transient errors until retries ran out
    #[error("fetch failed after {attempts} attempts: {reason}")]
    TransientFetch {
        /// Total number of fetch attempts made
        attempts: u32,
        /// The last transient error
        reason: String,
    },

    /// Fetch failed with an error that retrying cannot fix
    #[error("fetch failed permanently: {reason}")]
    PermanentFetch {
        /// The permanent error reported by the fetcher
        reason: String,
    },

    /// Writing the payload to disk failed; no partial file was left behind
    #[error("failed to write {path}: {reason}")]
    Write {
        /// The final path that was being written
        path: PathBuf,
        /// The underlying reason
        reason: String,
    },

    /// No free name could be claimed in the target directory
    #[error("no free filename for {filename} in {directory}")]
    NameCollisionExhausted {
        /// The target directory
        directory: PathBuf,
        /// The candidate filename
        filename: String,
    },

    /// The batch was cancelled while this attachment was mid-flight
    #[error("cancelled before the attachment could be written")]
    Cancelled,
}

impl AttachmentError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AttachmentError::DirectoryCreation { .. } => "directory_creation",
            AttachmentError::TransientFetch { .. } => "transient_fetch",
            AttachmentError::PermanentFetch { .. } => "permanent_fetch",
            AttachmentError::Write { .. } => "write",
            AttachmentError::NameCollisionExhausted { .. } => "name_collision_exhausted",
            AttachmentError::Cancelled => "cancelled",
        }
    }
}

/// Error reported by an attachment fetcher
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Temporary condition (timeout, rate limit, connection reset); eligible for retry
    #[error("transient: {0}")]
    Transient(String),

    /// Condition that will not go away (attachment deleted, access denied)
    #[error("permanent: {0}")]
    Permanent(String),
}

impl FetchError {
    /// Build a fetch error from an I/O error, classifying by error kind
    pub fn from_io(err: &std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::TimedOut
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock => FetchError::Transient(err.to_string()),
            _ => FetchError::Permanent(err.to_string()),
        }
    }

    /// The message carried by the error, without the classification prefix
    pub fn reason(&self) -> &str {
        match self {
            FetchError::Transient(msg) | FetchError::Permanent(msg) => msg,
        }
    }
}
