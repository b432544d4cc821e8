//! Custom test assertions for end-to-end tests

use std::time::Duration;
use tokio::sync::mpsc;
use transfer_dl::{CompletionCallback, Event, Progress, ProgressCallback, TransferKey};

/// Result of waiting for a transfer to finish
#[derive(Debug, PartialEq)]
pub enum WaitResult {
    /// Transfer committed at this relative path
    Completed(String),
    /// Transfer failed with this error code
    Failed(String),
    /// Timeout waiting for completion
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Completion callback that forwards its result to a channel
pub fn completion_channel() -> (
    CompletionCallback,
    mpsc::UnboundedReceiver<transfer_dl::Result<String>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: CompletionCallback = Box::new(move |result| {
        tx.send(result).ok();
    });
    (callback, rx)
}

/// Progress callback that forwards every update to a channel
pub fn progress_channel() -> (ProgressCallback, mpsc::UnboundedReceiver<Progress>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: ProgressCallback = std::sync::Arc::new(move |progress| {
        tx.send(progress).ok();
    });
    (callback, rx)
}

/// Wait for a completion callback result
pub async fn wait_for_result(
    rx: &mut mpsc::UnboundedReceiver<transfer_dl::Result<String>>,
    timeout: Duration,
) -> transfer_dl::Result<String> {
    tokio::time::timeout(timeout, rx.recv())
        .await
        .expect("timed out waiting for completion callback")
        .expect("completion callback dropped without being invoked")
}

/// Wait for a transfer to reach a terminal event on the broadcast stream
pub async fn wait_for_terminal_event(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    key: &TransferKey,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Completed { key: k, path }) if &k == key => {
                    return WaitResult::Completed(path);
                }
                Ok(Event::Failed { key: k, code, .. }) if &k == key => {
                    return WaitResult::Failed(code);
                }
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}
