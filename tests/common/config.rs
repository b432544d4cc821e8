//! Test configuration helpers for creating coordinators over temporary roots

use tempfile::TempDir;
use transfer_dl::{Config, DownloadCoordinator, KeyStrategy, StorageConfig};

/// Build a configuration whose storage roots and temp directory live in `temp_dir`
///
/// Connectivity waits are shortened so failure paths finish quickly.
pub fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage = StorageConfig::rooted_at(temp_dir.path());
    config.session.temp_dir = temp_dir.path().join("session");
    config.session.connectivity_timeout = std::time::Duration::from_secs(1);
    config.session.connectivity_poll_interval = std::time::Duration::from_millis(100);
    config
}

/// Create an HTTP-backed coordinator for end-to-end testing
///
/// Returns the coordinator and temp directory (keep temp_dir alive for test duration)
pub fn create_test_coordinator() -> (DownloadCoordinator, TempDir) {
    create_test_coordinator_with(KeyStrategy::Url)
}

/// Like [`create_test_coordinator`] with an explicit key strategy
pub fn create_test_coordinator_with(key_strategy: KeyStrategy) -> (DownloadCoordinator, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = test_config(&temp_dir);
    config.coordinator.key_strategy = key_strategy;

    let coordinator = DownloadCoordinator::new(config).expect("Failed to create coordinator");
    (coordinator, temp_dir)
}
