//! Error types for transfer-dl
//!
//! This module provides the error taxonomy for the library:
//! - Transfer outcomes (HTTP status failures, transport failures, cancellation)
//! - Storage failures (I/O, encoding, schema mismatches, invalid paths)
//! - Machine-readable error codes for logging and host integration
//!
//! Every outcome of a transfer is reported through its completion callback as
//! one of these values; nothing is raised across the coordinator boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for transfer-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for transfer-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "session.temp_dir")
        key: Option<String>,
    },

    /// The server answered with a status code >= 400
    #[error("HTTP error {status_code}: {reason}")]
    Http {
        /// HTTP status code reported at completion
        status_code: u16,
        /// Human-readable status description (canonical reason phrase)
        reason: String,
    },

    /// Transport-level failure (connectivity loss, session error, aborted stream)
    #[error("transport error: {underlying}")]
    Transport {
        /// Description of the underlying failure
        underlying: String,
    },

    /// Committing to or reading from managed storage failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Transfer was cancelled before reaching a terminal state
    #[error("transfer cancelled")]
    Cancelled,

    /// Shutdown in progress - not accepting new transfers
    #[error("shutdown in progress: not accepting new transfers")]
    ShuttingDown,

    /// The request description could not be turned into a transfer
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed
    #[error("I/O failure at {path}: {source}")]
    Io {
        /// The path the operation was acting on
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A value could not be serialized for storage
    #[error("failed to encode value for {path}: {source}")]
    Encode {
        /// Destination path of the value
        path: PathBuf,
        /// The underlying serializer error
        #[source]
        source: serde_json::Error,
    },

    /// A stored file did not match the requested type
    #[error("failed to decode {path}: {source}")]
    Decode {
        /// Path of the undecodable file
        path: PathBuf,
        /// The underlying deserializer error
        #[source]
        source: serde_json::Error,
    },

    /// A relative path escaped its root or was absolute
    #[error("invalid relative path {path}: {reason}")]
    InvalidPath {
        /// The rejected path
        path: String,
        /// Why the path was rejected
        reason: String,
    },

    /// The platform did not provide a location for a logical directory
    #[error("no platform location available for {directory}")]
    RootUnavailable {
        /// Name of the logical directory
        directory: String,
    },
}

impl StorageError {
    /// Build an I/O error bound to the path it happened on
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this failure indicates a programming or schema mistake
    ///
    /// Encoding and decoding failures are not transient: retrying the same
    /// call with the same type will fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Encode { .. } | Self::Decode { .. })
    }
}

impl Error {
    /// Build an HTTP error for a status code, filling in its reason phrase
    pub fn http(status_code: u16) -> Self {
        let reason = reqwest::StatusCode::from_u16(status_code)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Unknown Status")
            .to_string();
        Self::Http {
            status_code,
            reason,
        }
    }

    /// Build a transport error from anything displayable
    pub fn transport(underlying: impl std::fmt::Display) -> Self {
        Self::Transport {
            underlying: underlying.to_string(),
        }
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Http { .. } => "http_error",
            Error::Transport { .. } => "transport_error",
            Error::Storage(e) => match e {
                StorageError::Io { .. } => "storage_io_error",
                StorageError::Encode { .. } => "storage_encode_error",
                StorageError::Decode { .. } => "storage_decode_error",
                StorageError::InvalidPath { .. } => "invalid_path",
                StorageError::RootUnavailable { .. } => "root_unavailable",
            },
            Error::Cancelled => "cancelled",
            Error::ShuttingDown => "shutting_down",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn decode_error() -> serde_json::Error {
        serde_json::from_str::<u32>("\"not a number\"").unwrap_err()
    }

    #[test]
    fn http_error_uses_canonical_reason_phrase() {
        match Error::http(404) {
            Error::Http {
                status_code,
                reason,
            } => {
                assert_eq!(status_code, 404);
                assert_eq!(reason, "Not Found");
            }
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[test]
    fn http_error_falls_back_for_unassigned_status() {
        match Error::http(599) {
            Error::Http { reason, .. } => assert_eq!(reason, "Unknown Status"),
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[test]
    fn http_error_display_includes_code_and_reason() {
        let msg = Error::http(503).to_string();
        assert_eq!(msg, "HTTP error 503: Service Unavailable");
    }

    #[test]
    fn transport_error_keeps_underlying_message() {
        let err = Error::transport("connection reset by peer");
        assert_eq!(err.to_string(), "transport error: connection reset by peer");
        assert_eq!(err.error_code(), "transport_error");
    }

    #[test]
    fn every_variant_has_a_distinct_code() {
        let variants = vec![
            Error::Config {
                message: "bad".into(),
                key: None,
            },
            Error::http(500),
            Error::transport("x"),
            Error::Storage(StorageError::io(
                "/tmp/x",
                std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            )),
            Error::Storage(StorageError::Encode {
                path: "/tmp/x".into(),
                source: decode_error(),
            }),
            Error::Storage(StorageError::Decode {
                path: "/tmp/x".into(),
                source: decode_error(),
            }),
            Error::Storage(StorageError::InvalidPath {
                path: "../x".into(),
                reason: "parent".into(),
            }),
            Error::Storage(StorageError::RootUnavailable {
                directory: "documents".into(),
            }),
            Error::Cancelled,
            Error::ShuttingDown,
            Error::InvalidRequest("no url".into()),
            Error::Io(std::io::Error::other("io")),
            Error::Serialization(decode_error()),
        ];

        let mut codes: Vec<&str> = variants.iter().map(Error::error_code).collect();
        let total = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), total, "error codes must be unique per variant");
    }

    #[test]
    fn only_codec_failures_are_fatal() {
        assert!(
            StorageError::Decode {
                path: "/a".into(),
                source: decode_error()
            }
            .is_fatal()
        );
        assert!(
            StorageError::Encode {
                path: "/a".into(),
                source: decode_error()
            }
            .is_fatal()
        );
        assert!(
            !StorageError::io("/a", std::io::Error::other("disk full")).is_fatal(),
            "I/O failures are environmental, not schema mistakes"
        );
    }

    #[test]
    fn storage_error_converts_into_error() {
        let err: Error = StorageError::InvalidPath {
            path: "/abs".into(),
            reason: "absolute".into(),
        }
        .into();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(err.error_code(), "invalid_path");
    }
}
