//! Traits and types for transfer sessions

use crate::types::{TransferHandle, TransferRequest};
use std::path::PathBuf;

/// Sending half of the session event channel
pub type SessionEventSender = tokio::sync::mpsc::UnboundedSender<SessionEvent>;

/// Receiving half of the session event channel
pub type SessionEventReceiver = tokio::sync::mpsc::UnboundedReceiver<SessionEvent>;

/// Create the channel a session publishes its events on
///
/// The sender goes to the session, the receiver to the
/// [`DownloadCoordinator`](crate::DownloadCoordinator).
pub fn event_channel() -> (SessionEventSender, SessionEventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Event published by a session
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Event about one transfer
    Transfer {
        /// Handle returned by [`TransferSession::start`]
        handle: TransferHandle,
        /// What happened
        kind: TransferEvent,
    },

    /// The host woke the process and every queued event has been delivered
    AllEventsDelivered,
}

impl SessionEvent {
    /// Shorthand for a per-transfer event
    pub fn transfer(handle: TransferHandle, kind: TransferEvent) -> Self {
        Self::Transfer { handle, kind }
    }
}

/// Per-transfer lifecycle event
///
/// Each transfer publishes zero or more non-terminal events followed by
/// exactly one of `CompletedToTemporaryLocation` or `Failed`, unless it is
/// cancelled, in which case no terminal event is required.
#[derive(Clone, Debug, PartialEq)]
pub enum TransferEvent {
    /// Bytes written so far out of the expected total (`<= 0` = unknown)
    Progress {
        /// Total bytes written, including any resumed offset
        bytes_written: i64,
        /// Expected total bytes
        bytes_expected: i64,
    },

    /// Transfer continued from previously downloaded data
    Resumed {
        /// Byte offset the transfer resumed at
        offset: i64,
        /// Expected total bytes
        expected_total: i64,
    },

    /// No connectivity; the session is waiting before giving up
    WaitingForConnectivity,

    /// Body fully written to a temporary file
    CompletedToTemporaryLocation {
        /// Location of the temporary file; ownership passes to the receiver
        temp_path: PathBuf,
        /// HTTP status of the response, if the protocol has one
        status_code: Option<u16>,
    },

    /// Transfer ended without a body
    Failed {
        /// HTTP status, if a response was received
        status_code: Option<u16>,
        /// Description of the failure
        error: Option<String>,
    },
}

impl TransferEvent {
    /// Whether this event ends the transfer
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferEvent::CompletedToTemporaryLocation { .. } | TransferEvent::Failed { .. }
        )
    }
}

/// Trait for background-capable transfer sessions
///
/// A session runs transfers independently of its caller and reports their
/// lifecycle on the channel created by [`event_channel`]. Implementations
/// must be safe to call from any thread.
///
/// # Examples
///
/// ```no_run
/// use transfer_dl::session::{event_channel, HttpTransferSession, TransferSession};
/// use transfer_dl::config::SessionConfig;
/// use transfer_dl::TransferRequest;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let (events_tx, mut events_rx) = event_channel();
/// let session = HttpTransferSession::new(SessionConfig::default(), events_tx)?;
///
/// let handle = session.start(TransferRequest::get("https://example.com/a.mp4"))?;
/// while let Some(event) = events_rx.recv().await {
///     println!("{handle}: {event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub trait TransferSession: Send + Sync {
    /// Start transferring a request
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be turned into a transfer
    /// (malformed method, URL or headers) or the session cannot run it.
    fn start(&self, request: TransferRequest) -> crate::Result<TransferHandle>;

    /// Cancel a running transfer
    ///
    /// Unknown or finished handles are ignored.
    fn cancel(&self, handle: TransferHandle);

    /// Publish [`SessionEvent::AllEventsDelivered`] after every event queued so far
    ///
    /// Called when the host wakes the process for background transfer
    /// events. The signal is published even when no transfers are running.
    fn flush_events(&self);

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
