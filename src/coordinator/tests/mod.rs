use super::test_helpers::*;
use super::*;
use crate::config::KeyStrategy;
use crate::session::TransferEvent;
use crate::types::{Destination, Directory, Progress, TransferKey, TransferRequest, TransferState};
use std::sync::Arc;
use std::time::Duration;


const VIDEO_URL: &str = "https://x/a.mp4";

/// Enqueue `url` into documents/videos/a.mp4 with channel-backed callbacks
fn enqueue_video(
    test: &TestCoordinator,
    url: &str,
) -> (
    Option<TransferKey>,
    tokio::sync::mpsc::UnboundedReceiver<Progress>,
    tokio::sync::mpsc::UnboundedReceiver<Result<String>>,
) {
    let (progress, progress_rx) = progress_channel();
    let (completion, completion_rx) = completion_channel();
    let key = test.coordinator.enqueue(
        TransferRequest::get(url),
        Directory::Documents,
        Some("videos"),
        "a.mp4",
        Some(progress),
        completion,
    );
    (key, progress_rx, completion_rx)
}

#[tokio::test]
async fn test_new_requires_valid_config() {
    let mut config = Config::default();
    config.coordinator.event_channel_capacity = 0;

    let result = DownloadCoordinator::new(config);
    assert!(matches!(result, Err(Error::Config { .. })));
}

#[tokio::test]
async fn test_new_builds_http_coordinator() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage = crate::config::StorageConfig::rooted_at(temp_dir.path());
    config.session.temp_dir = temp_dir.path().join("session");

    let coordinator = DownloadCoordinator::new(config).unwrap();

    assert_eq!(coordinator.session.name(), "http");
    assert!(coordinator.storage().root(Directory::Caches).is_dir());
    assert!(temp_dir.path().join("session").is_dir());
    coordinator.shutdown().await.unwrap();
}

#[test]
fn test_with_parts_outside_runtime_is_config_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config::default();
    let storage =
        StorageManager::new(&crate::config::StorageConfig::rooted_at(temp_dir.path())).unwrap();
    let (tx, rx) = event_channel();

    let result = DownloadCoordinator::with_parts(
        config,
        storage,
        Arc::new(crate::session::ManualSession::new(tx)),
        rx,
        Arc::new(ImmediateDelivery),
    );

    assert!(matches!(result, Err(Error::Config { .. })));
}
