//! Error types for Gramophone core operations.
//!
//! The media index has its own error taxonomy ([`IndexError`]) because the
//! loader needs to tell permission/availability failures, which degrade to
//! "no results", apart from everything else.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Gramophone core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The media index failed to answer a query.
    #[error("Media index error: {0}")]
    MediaIndex(#[from] IndexError),

    /// A song download failed.
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// Blacklist store could not be read or written.
    #[error("Blacklist store error at {path}: {message}")]
    Blacklist {
        /// Path of the backing file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Remote request failed.
    #[error("Network error: {0}")]
    Network(String),

    /// Remote response could not be understood.
    #[error("Invalid remote response: {0}")]
    InvalidResponse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a network error from any displayable message.
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Whether this error means the media index is off-limits rather than broken.
    #[must_use]
    pub const fn is_access_denied(&self) -> bool {
        matches!(self, Self::MediaIndex(e) if e.is_access_denied())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Errors reported by a [`MediaIndex`](crate::index::MediaIndex).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The caller lacks permission to read the index.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The index is not reachable (not mounted, cannot be opened).
    #[error("Media index unavailable: {0}")]
    Unavailable(String),

    /// The query itself failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// A returned row could not be decoded.
    #[error("Malformed row at column {column}: {reason}")]
    Malformed {
        /// Zero-based column index.
        column: usize,
        /// Why decoding failed.
        reason: String,
    },
}

impl IndexError {
    /// Permission and availability failures are reported to callers as empty results.
    #[must_use]
    pub const fn is_access_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::Unavailable(_))
    }
}

/// Errors specific to song downloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// The song has no remote URL to download from.
    #[error("Song '{title}' has no remote URL")]
    NotRemote {
        /// Title of the offending song.
        title: String,
    },

    /// The server answered with a non-success status.
    #[error("Server returned HTTP {status} for {url}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Transfer broke off mid-stream.
    #[error("Transfer of {url} failed: {reason}")]
    TransferFailed {
        /// Requested URL.
        url: String,
        /// Underlying reason.
        reason: String,
    },

    /// The destination file could not be written.
    #[error("Cannot write {path}: {reason}")]
    WriteFailed {
        /// Destination path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The download was cancelled before it finished.
    #[error("Download cancelled")]
    Cancelled,
}
