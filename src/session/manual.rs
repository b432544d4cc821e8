//! Manually driven transfer session

use super::traits::{SessionEvent, SessionEventSender, TransferEvent, TransferSession};
use crate::error::{Error, Result};
use crate::types::{TransferHandle, TransferRequest};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct State {
    started: Vec<(TransferHandle, TransferRequest)>,
    cancelled: Vec<TransferHandle>,
    fail_next_start: Option<String>,
}

/// Session that performs no I/O and publishes only what it is told to
///
/// Started requests are recorded, and events are injected with
/// [`emit`](Self::emit). Useful for driving the coordinator through exact
/// event sequences, including ones a real network would rarely produce
/// (late events after cancellation, duplicate terminals, status codes
/// without bodies).
#[derive(Clone)]
pub struct ManualSession {
    events: SessionEventSender,
    next_handle: Arc<AtomicU64>,
    state: Arc<parking_lot::Mutex<State>>,
}

impl ManualSession {
    /// Create a session publishing on `events`
    pub fn new(events: SessionEventSender) -> Self {
        Self {
            events,
            next_handle: Arc::new(AtomicU64::new(1)),
            state: Arc::new(parking_lot::Mutex::new(State::default())),
        }
    }

    /// Publish an event for a transfer
    pub fn emit(&self, handle: TransferHandle, kind: TransferEvent) {
        self.events.send(SessionEvent::transfer(handle, kind)).ok();
    }

    /// Publish the background-wake flush signal
    pub fn emit_all_events_delivered(&self) {
        self.events.send(SessionEvent::AllEventsDelivered).ok();
    }

    /// Make the next [`start`](TransferSession::start) call fail with `message`
    pub fn fail_next_start(&self, message: impl Into<String>) {
        self.state.lock().fail_next_start = Some(message.into());
    }

    /// Every request started so far, in order
    pub fn started(&self) -> Vec<(TransferHandle, TransferRequest)> {
        self.state.lock().started.clone()
    }

    /// Number of started transfers
    pub fn started_count(&self) -> usize {
        self.state.lock().started.len()
    }

    /// Handles passed to [`cancel`](TransferSession::cancel), in order
    pub fn cancelled(&self) -> Vec<TransferHandle> {
        self.state.lock().cancelled.clone()
    }

    /// Most recent handle started for `url`
    pub fn handle_for(&self, url: &str) -> Option<TransferHandle> {
        self.state
            .lock()
            .started
            .iter()
            .rev()
            .find(|(_, request)| request.url == url)
            .map(|(handle, _)| *handle)
    }
}

impl TransferSession for ManualSession {
    fn start(&self, request: TransferRequest) -> Result<TransferHandle> {
        let mut state = self.state.lock();
        if let Some(message) = state.fail_next_start.take() {
            return Err(Error::transport(message));
        }
        let handle = TransferHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        state.started.push((handle, request));
        Ok(handle)
    }

    fn cancel(&self, handle: TransferHandle) {
        self.state.lock().cancelled.push(handle);
    }

    fn flush_events(&self) {
        self.emit_all_events_delivered();
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}
