//! Background transfer sessions
//!
//! A session owns the actual byte transfer. It runs independently of the
//! coordinator and reports what happens to each transfer as [`SessionEvent`]s
//! on an unbounded channel; the coordinator consumes that channel and turns the
//! events into storage commits and caller callbacks.
//!
//! ## Architecture
//!
//! The core abstraction is the [`TransferSession`] trait. Two implementations
//! are provided:
//!
//! - [`HttpTransferSession`]: streams HTTP responses to temporary files with
//!   resume and connectivity waiting
//! - [`ManualSession`]: performs no I/O; events are injected by the caller
//!
//! Sessions never touch managed storage. A successful transfer ends with
//! [`TransferEvent::CompletedToTemporaryLocation`] and hands ownership of the
//! temporary file to whoever consumes the event.

mod http;
mod manual;
mod traits;

pub use http::HttpTransferSession;
pub use manual::ManualSession;
pub use traits::{
    SessionEvent, SessionEventReceiver, SessionEventSender, TransferEvent, TransferSession,
    event_channel,
};
