//! Error types for putio-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Plan, Fetch, Arr, Api)
//! - Context information (transfer ID, file path, service name)
//! - `#[from]` conversions for the underlying HTTP, I/O, and serde errors

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{FileId, TransferId};

/// Result type alias for putio-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for putio-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "putio.api_key")
        key: Option<String>,
    },

    /// put.io API returned a non-success response
    #[error("put.io API error: {0}")]
    Api(#[from] ApiError),

    /// Network error from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Target planning failed
    #[error("planning error: {0}")]
    Plan(#[from] PlanError),

    /// File fetch failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Arr history query failed
    #[error("history error: {0}")]
    Arr(#[from] ArrError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A channel closed while the service was still running
    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    /// put.io account verification failed at startup
    #[error("account verification failed: {0}")]
    AccountVerification(String),

    /// Operation aborted by the root cancellation token
    #[error("operation cancelled")]
    Cancelled,
}

/// Non-success response from the put.io API
#[derive(Debug, Error)]
#[error("HTTP {status}: {message}")]
pub struct ApiError {
    /// HTTP status code returned by the API
    pub status: u16,
    /// Response body or status text
    pub message: String,
}

/// Errors encountered while building a download plan
#[derive(Debug, Error)]
pub enum PlanError {
    /// The transfer has no remote file tree yet
    #[error("transfer {transfer_id} has no file_id and is not downloadable")]
    NotDownloadable {
        /// The transfer missing its file tree root
        transfer_id: TransferId,
    },

    /// The transfer was saved under a folder other than this instance's
    #[error("transfer {transfer_id} belongs to folder {actual}, expected {expected}")]
    FolderMismatch {
        /// The transfer whose scope did not match
        transfer_id: TransferId,
        /// The configured instance folder
        expected: FileId,
        /// The folder the transfer was actually saved under
        actual: FileId,
    },
}

/// Errors encountered while fetching a download target
#[derive(Debug, Error)]
pub enum FetchError {
    /// The download endpoint returned a non-success status
    #[error("GET {url} returned HTTP {status}")]
    Status {
        /// The URL that was fetched
        url: String,
        /// The HTTP status code
        status: u16,
    },

    /// A file target carried no source URL
    #[error("file target {path} has no source URL")]
    MissingSource {
        /// Local path of the malformed target
        path: PathBuf,
    },

    /// Network error while streaming the response body
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error while writing the local file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The fetch was aborted by cancellation
    #[error("fetch cancelled")]
    Cancelled,
}

/// Errors from an Arr history query
#[derive(Debug, Error)]
pub enum ArrError {
    /// The client's circuit breaker is open; no request was made
    #[error("{service}: circuit breaker open, history not queried")]
    CircuitOpen {
        /// Name of the Arr service
        service: String,
    },

    /// The history endpoint returned a non-success status
    #[error("{service}: history endpoint returned HTTP {status}")]
    Status {
        /// Name of the Arr service
        service: String,
        /// The HTTP status code
        status: u16,
    },

    /// Network error while querying the history endpoint
    #[error("{service}: {source}")]
    Http {
        /// Name of the Arr service
        service: String,
        /// The underlying HTTP error
        #[source]
        source: reqwest::Error,
    },
}

impl ArrError {
    /// True when the error was raised by an open circuit breaker.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ArrError::CircuitOpen { .. })
    }

    /// True when the underlying failure was a plain connection failure
    /// (service down or unreachable).
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, ArrError::Http { source, .. } if source.is_connect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_includes_status_and_message() {
        let err = ApiError {
            status: 402,
            message: "payment required".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 402: payment required");
    }

    #[test]
    fn plan_error_display_names_the_transfer() {
        let err = PlanError::FolderMismatch {
            transfer_id: TransferId(9),
            expected: FileId(1),
            actual: FileId(2),
        };
        let msg = err.to_string();
        assert!(msg.contains('9'));
        assert!(msg.contains("expected 1"));
    }

    #[test]
    fn arr_error_classification() {
        let open = ArrError::CircuitOpen {
            service: "sonarr".to_string(),
        };
        assert!(open.is_circuit_open());
        assert!(!open.is_connection_refused());

        let status = ArrError::Status {
            service: "radarr".to_string(),
            status: 500,
        };
        assert!(!status.is_circuit_open());
        assert!(!status.is_connection_refused());
    }
}
