//! # transfer-dl
//!
//! Background transfer coordination with managed local storage.
//!
//! ## Design Philosophy
//!
//! transfer-dl is designed to be:
//! - **Deduplicating** - One transfer per canonical URL, however often it is requested
//! - **Resumable** - Cancelled HTTP transfers pick up where they stopped
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Callbacks per transfer, plus a broadcast stream of events
//!
//! ## Architecture
//!
//! - [`DownloadCoordinator`] keeps the registry of active transfers and turns
//!   session events into callbacks and storage commits
//! - [`session::TransferSession`] performs the transfers and reports on a channel
//! - [`storage::StorageManager`] resolves the documents, library and caches
//!   roots and moves finished files into place
//!
//! Callbacks run on an injected [`DeliveryContext`]; storage work runs on the
//! Tokio blocking pool.
//!
//! ## Quick Start
//!
//! ```no_run
//! use transfer_dl::{Config, Directory, DownloadCoordinator, TransferRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let coordinator = DownloadCoordinator::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = coordinator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     coordinator.enqueue(
//!         TransferRequest::get("https://example.com/a.mp4"),
//!         Directory::Documents,
//!         Some("videos"),
//!         "a.mp4",
//!         None,
//!         Box::new(|result| println!("finished: {:?}", result)),
//!     );
//!
//!     transfer_dl::run_with_shutdown(coordinator).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Transfer coordination (decomposed into focused submodules)
pub mod coordinator;
/// Error types
pub mod error;
/// Background transfer sessions
pub mod session;
/// Managed local storage
pub mod storage;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, CoordinatorConfig, KeyStrategy, SessionConfig, StorageConfig};
pub use coordinator::{
    BackgroundCompletionHandler, DeliveryContext, DeliveryQueue, DownloadCoordinator,
    EnqueueOutcome, ImmediateDelivery,
};
pub use error::{Error, Result, StorageError};
pub use session::{HttpTransferSession, ManualSession, TransferSession};
pub use storage::StorageManager;
pub use types::{
    CompletionCallback, Destination, Directory, Event, Progress, ProgressCallback,
    TransferHandle, TransferInfo, TransferKey, TransferRequest, TransferState,
};

/// Helper function to run the coordinator with graceful signal handling.
///
/// Waits for a termination signal and then calls the coordinator's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use transfer_dl::{DownloadCoordinator, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let coordinator = DownloadCoordinator::new(Config::default())?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(coordinator).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(coordinator: DownloadCoordinator) -> Result<()> {
    wait_for_signal().await;
    coordinator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
