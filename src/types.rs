//! Core types for transfer-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bytes in one megabyte for progress reporting
pub const BYTES_PER_MB: i64 = 1024 * 1024;

/// Canonical identity of a transfer
///
/// Derived from the originating request's URL (see [`crate::config::KeyStrategy`]).
/// Two enqueues that produce the same key share one transfer.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferKey(pub String);

impl TransferKey {
    /// Create a key from an already-canonical string
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TransferKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for TransferKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl PartialEq<str> for TransferKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TransferKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for TransferKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle of one transfer inside a [`crate::session::TransferSession`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferHandle(pub u64);

impl TransferHandle {
    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical storage root
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Directory {
    /// User-visible documents
    Documents,
    /// Application support data
    Library,
    /// Purgeable cached data
    Caches,
}

impl Directory {
    /// All logical roots, in declaration order
    pub const ALL: [Directory; 3] = [Directory::Documents, Directory::Library, Directory::Caches];

    /// Lowercase name used in logs, events and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Directory::Documents => "documents",
            Directory::Library => "library",
            Directory::Caches => "caches",
        }
    }
}

impl std::fmt::Display for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final location of a transfer, relative to a [`Directory`] root
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    /// Logical root
    pub directory: Directory,
    /// Subdirectory below the root (None or empty = the root itself)
    #[serde(default)]
    pub subdirectory: Option<String>,
    /// File name inside the subdirectory
    pub file_name: String,
}

impl Destination {
    /// Create a destination
    pub fn new(
        directory: Directory,
        subdirectory: Option<impl Into<String>>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            subdirectory: subdirectory.map(Into::into),
            file_name: file_name.into(),
        }
    }

    /// `subdirectory/file_name`, the value reported to callers on success
    pub fn relative_path(&self) -> String {
        crate::utils::relative_path(self.subdirectory.as_deref(), &self.file_name)
    }
}

/// Request description handed to the transfer session unmodified
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// HTTP method (e.g. "GET")
    pub method: String,
    /// Absolute request URL
    pub url: String,
    /// Header name/value pairs, in order
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Optional request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<u8>>,
}

impl TransferRequest {
    /// Create a request with an explicit method
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Append a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Progress of one transfer as reported to callers
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Completed fraction in `[0.0, 1.0]`
    pub fraction: f64,
    /// Expected size in whole megabytes (truncated)
    pub total_mb: u64,
}

impl Progress {
    /// Derive progress from raw byte counters
    ///
    /// A non-positive `bytes_expected` means the size is unknown and yields
    /// a fraction of 0.
    pub fn from_bytes(bytes_written: i64, bytes_expected: i64) -> Self {
        let fraction = if bytes_expected <= 0 {
            0.0
        } else {
            (bytes_written.max(0) as f64 / bytes_expected as f64).clamp(0.0, 1.0)
        };
        let total_mb = if bytes_expected <= 0 {
            0
        } else {
            (bytes_expected / BYTES_PER_MB) as u64
        };
        Self { fraction, total_mb }
    }
}

/// Lifecycle state of a tracked transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    /// Registered, session transfer not yet started
    Pending,
    /// Session transfer running
    InProgress,
    /// Moved into storage successfully
    Completed,
    /// Ended with an HTTP, transport or storage error
    Failed,
    /// Cancelled by the caller or by shutdown
    Cancelled,
}

impl TransferState {
    /// Whether no further events are processed in this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Failed | TransferState::Cancelled
        )
    }
}

/// Snapshot of an active transfer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferInfo {
    /// Transfer key
    pub key: TransferKey,
    /// Final destination
    pub destination: Destination,
    /// Current state
    pub state: TransferState,
    /// Last fraction relayed to the progress callback
    pub fraction: f64,
    /// When the record was registered
    pub started_at: DateTime<Utc>,
}

/// Progress callback, invoked on the delivery context
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync + 'static>;

/// Completion callback, invoked at most once on the delivery context
///
/// Receives the destination relative path on success.
pub type CompletionCallback = Box<dyn FnOnce(crate::Result<String>) + Send + 'static>;

/// Event emitted during the transfer lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Transfer registered and started
    Queued {
        /// Transfer key
        key: TransferKey,
        /// Final destination
        destination: Destination,
    },

    /// Transfer progress update
    Progress {
        /// Transfer key
        key: TransferKey,
        /// Completed fraction in `[0.0, 1.0]`
        fraction: f64,
        /// Expected size in whole megabytes
        total_mb: u64,
    },

    /// Transfer resumed from previously downloaded data
    Resumed {
        /// Transfer key
        key: TransferKey,
        /// Byte offset the transfer resumed at
        offset: i64,
        /// Expected total size in bytes
        expected_total: i64,
    },

    /// Transfer is waiting for network connectivity
    WaitingForConnectivity {
        /// Transfer key
        key: TransferKey,
    },

    /// Transfer committed to storage
    Completed {
        /// Transfer key
        key: TransferKey,
        /// Relative path inside the destination root
        path: String,
    },

    /// Transfer ended with an error
    Failed {
        /// Transfer key
        key: TransferKey,
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },

    /// Transfer cancelled
    Cancelled {
        /// Transfer key
        key: TransferKey,
    },

    /// The session flushed all queued background events
    EventsFlushed,

    /// Coordinator is shutting down
    Shutdown,
}
