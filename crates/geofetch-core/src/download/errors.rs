//! Download error types.
//!
//! These errors are designed to be serializable and not depend on external
//! error types like `std::io::Error`. For I/O errors, we capture the kind
//! and message as strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for feature download operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// Transport or HTTP failure while talking to the server.
    #[error("Network error: {message}")]
    Network {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// The server answered, but the body was malformed or unexpected.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Detailed error message.
        message: String,
    },

    /// I/O error during spill or cache file operations.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g. "NotFound", "PermissionDenied").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// An external cancellation source interrupted a waiting fetch.
    #[error("Fetch interrupted")]
    Interrupted,

    /// The iterator or source was used after being closed.
    #[error("Iterator closed")]
    Closed,

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl DownloadError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a network error with HTTP status code.
    pub fn network_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an I/O error from a `std::io::Error`.
    ///
    /// This captures the error kind name and message for serialization.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        Self::Io {
            kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this error is an external interruption.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Whether a fresh query could plausibly succeed after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Io { .. } | Self::Interrupted)
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}

/// Convenience result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;
