//! Shared test helpers for creating DownloadCoordinator instances in tests.

use crate::config::{Config, KeyStrategy, StorageConfig};
use crate::coordinator::{DeliveryContext, DownloadCoordinator, ImmediateDelivery};
use crate::error::Result;
use crate::session::{ManualSession, TransferSession, event_channel};
use crate::storage::StorageManager;
use crate::types::{CompletionCallback, Progress, ProgressCallback};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;

/// Coordinator driven by a manual session, with everything needed to inspect it
pub(crate) struct TestCoordinator {
    pub(crate) coordinator: DownloadCoordinator,
    pub(crate) session: ManualSession,
    /// Keeps the storage roots alive
    pub(crate) temp_dir: tempfile::TempDir,
}

impl TestCoordinator {
    /// Write a file into the temp area, as a session would before completing
    pub(crate) fn temp_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let dir = self.temp_dir.path().join("session");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}

/// Helper to create a coordinator over a [`ManualSession`] with immediate delivery.
/// The returned tempdir holds the storage roots and must be kept alive.
pub(crate) async fn create_test_coordinator() -> TestCoordinator {
    create_test_coordinator_with(KeyStrategy::Url, Arc::new(ImmediateDelivery)).await
}

/// Like [`create_test_coordinator`] with an explicit key strategy and delivery context
pub(crate) async fn create_test_coordinator_with(
    key_strategy: KeyStrategy,
    delivery: Arc<dyn DeliveryContext>,
) -> TestCoordinator {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.storage = StorageConfig::rooted_at(temp_dir.path());
    config.session.temp_dir = temp_dir.path().join("session");
    config.coordinator.key_strategy = key_strategy;

    let storage = StorageManager::new(&config.storage).unwrap();
    let (events_tx, events_rx) = event_channel();
    let session = ManualSession::new(events_tx);
    let session_arc: Arc<dyn TransferSession> = Arc::new(session.clone());

    let coordinator =
        DownloadCoordinator::with_parts(config, storage, session_arc, events_rx, delivery).unwrap();

    TestCoordinator {
        coordinator,
        session,
        temp_dir,
    }
}

/// Completion callback that forwards its result to a channel
pub(crate) fn completion_channel() -> (CompletionCallback, mpsc::UnboundedReceiver<Result<String>>)
{
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: CompletionCallback = Box::new(move |result| {
        tx.send(result).ok();
    });
    (callback, rx)
}

/// Progress callback that forwards every update to a channel
pub(crate) fn progress_channel() -> (ProgressCallback, mpsc::UnboundedReceiver<Progress>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: ProgressCallback = Arc::new(move |progress| {
        tx.send(progress).ok();
    });
    (callback, rx)
}

/// Wait for the next value on a channel, failing the test after a timeout
pub(crate) async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for callback")
        .expect("callback channel closed")
}

/// Assert that nothing arrives on a channel within a short window
pub(crate) async fn assert_silent<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
    match tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        Err(_) | Ok(None) => {}
        Ok(Some(value)) => panic!("expected no callback, got {value:?}"),
    }
}

/// Wait until the dispatcher has drained every event published so far
///
/// Publishes a flush signal and waits for the matching `EventsFlushed`.
/// Any registered background handler fires as a side effect.
pub(crate) async fn settle(test: &TestCoordinator) {
    let mut events = test.coordinator.subscribe();
    test.session.emit_all_events_delivered();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for dispatcher")
            .expect("event channel closed");
        if matches!(event, crate::types::Event::EventsFlushed) {
            return;
        }
    }
}
