//! Download coordination split into focused submodules.
//!
//! The `DownloadCoordinator` struct and its methods are organized by concern:
//! - [`enqueue`] - Existing-file and duplicate checks, transfer registration
//! - [`control`] - Cancellation, callback rebinding, registry queries
//! - [`events`] - Dispatch of session events to callbacks and storage
//! - [`lifecycle`] - Background flush hook and shutdown
//! - [`delivery`] - Execution contexts for caller-facing callbacks
//! - [`record`] - Per-transfer records and the registry

mod control;
pub mod delivery;
mod enqueue;
mod events;
mod lifecycle;
mod record;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use delivery::{DeliveryContext, DeliveryJob, DeliveryQueue, ImmediateDelivery};
pub use enqueue::EnqueueOutcome;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{HttpTransferSession, SessionEventReceiver, TransferSession, event_channel};
use crate::storage::StorageManager;
use crate::types::Event;
use record::Registry;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio_util::sync::CancellationToken;

/// Host hook fired when the session reports that all background events were delivered
pub type BackgroundCompletionHandler = Box<dyn FnOnce() + Send + 'static>;

/// Shutdown and background-wake state
#[derive(Clone)]
pub(crate) struct LifecycleState {
    /// Flag to indicate whether new transfers are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Pending host flush hook, fired and cleared on the next all-events-delivered signal
    pub(crate) background_handler: Arc<parking_lot::Mutex<Option<BackgroundCompletionHandler>>>,
    /// Stops the session event dispatcher
    pub(crate) dispatcher_token: CancellationToken,
    /// Dispatcher task, awaited on shutdown
    pub(crate) dispatcher: Arc<parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

/// Coordinator of background transfers (cloneable - all fields are Arc-wrapped)
///
/// Owns the registry of active transfers, deduplicates enqueues by key, relays
/// session events to caller callbacks on the delivery context, and commits
/// finished transfers into storage.
#[derive(Clone)]
pub struct DownloadCoordinator {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Managed storage the transfers are committed into
    pub(crate) storage: Arc<StorageManager>,
    /// Transfer session (trait object for pluggable implementations)
    pub(crate) session: Arc<dyn TransferSession>,
    /// Context on which progress and completion callbacks run
    pub(crate) delivery: Arc<dyn DeliveryContext>,
    /// Active transfers; every mutation and event lookup goes through this lock
    pub(crate) registry: Arc<parking_lot::Mutex<Registry>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Shutdown and background-wake state
    pub(crate) lifecycle: LifecycleState,
}

impl DownloadCoordinator {
    /// Create a coordinator with the HTTP session and a dedicated delivery thread
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Resolves and creates the storage roots
    /// - Creates the HTTP transfer session and its temporary directory
    /// - Spawns the delivery thread and the session event dispatcher
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let storage = StorageManager::new(&config.storage)?;
        let (events_tx, events_rx) = event_channel();
        let session = HttpTransferSession::new(config.session.clone(), events_tx)?;
        let delivery = DeliveryQueue::new(config.coordinator.delivery_thread_name.clone())?;

        Self::with_parts(
            config,
            storage,
            Arc::new(session),
            events_rx,
            Arc::new(delivery),
        )
    }

    /// Create a coordinator from explicit components
    ///
    /// `events` must be the receiving half of the channel `session` publishes
    /// on. Must be called from within a Tokio runtime.
    pub fn with_parts(
        config: Config,
        storage: StorageManager,
        session: Arc<dyn TransferSession>,
        events: SessionEventReceiver,
        delivery: Arc<dyn DeliveryContext>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| Error::Config {
            message: format!("coordinator requires a Tokio runtime: {}", e),
            key: None,
        })?;

        let (event_tx, _rx) =
            tokio::sync::broadcast::channel(config.coordinator.event_channel_capacity);

        let coordinator = Self {
            config: Arc::new(config),
            storage: Arc::new(storage),
            session,
            delivery,
            registry: Arc::new(parking_lot::Mutex::new(Registry::default())),
            event_tx,
            lifecycle: LifecycleState {
                accepting_new: Arc::new(AtomicBool::new(true)),
                background_handler: Arc::new(parking_lot::Mutex::new(None)),
                dispatcher_token: CancellationToken::new(),
                dispatcher: Arc::new(parking_lot::Mutex::new(None)),
            },
        };

        let task = runtime.spawn(coordinator.clone().run_dispatcher(events));
        *coordinator.lifecycle.dispatcher.lock() = Some(task);

        tracing::info!(
            session = coordinator.session.name(),
            key_strategy = ?coordinator.config.coordinator.key_strategy,
            "Download coordinator started"
        );

        Ok(coordinator)
    }

    /// Subscribe to transfer events
    ///
    /// Each subscriber receives every event emitted after it subscribed. A
    /// subscriber that falls more than `event_channel_capacity` events behind
    /// receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Managed storage used for committed transfers
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Configuration the coordinator was created with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Emit an event to subscribers (no subscribers is fine)
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
