//! Background flush hook and shutdown coordination.

use crate::error::{Error, Result};
use crate::types::Event;
use std::sync::atomic::Ordering;

use super::DownloadCoordinator;

impl DownloadCoordinator {
    /// Register the host hook for the next background flush
    ///
    /// The hook runs on the delivery context the next time the session
    /// reports that every queued background event has been delivered, even if
    /// no transfers are pending, and is then cleared. Registering again before
    /// that replaces the previous hook without invoking it.
    pub fn set_background_completion_handler<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let previous = self
            .lifecycle
            .background_handler
            .lock()
            .replace(Box::new(handler));
        if previous.is_some() {
            tracing::debug!("Replaced pending background completion handler");
        }
    }

    /// Tell the coordinator the host woke the process for background transfers
    ///
    /// Asks the session to publish its all-events-delivered signal behind
    /// every event already queued. Once those events are applied, the
    /// registered handler runs (if any) and [`Event::EventsFlushed`] is
    /// emitted, also when no transfers are pending. Safe to call from any
    /// thread.
    pub fn handle_background_wake(&self) {
        tracing::debug!(session = self.session.name(), "Background wake requested");
        self.session.flush_events();
    }

    /// Whether a background completion handler is waiting to fire
    pub fn has_background_completion_handler(&self) -> bool {
        self.lifecycle.background_handler.lock().is_some()
    }

    /// Whether new transfers are accepted
    pub fn is_accepting(&self) -> bool {
        self.lifecycle.accepting_new.load(Ordering::SeqCst)
    }

    /// Shut the coordinator down
    ///
    /// This method performs the shutdown sequence:
    /// 1. Stops accepting new transfers (later enqueues fail with `ShuttingDown`)
    /// 2. Cancels every active transfer in the session
    /// 3. Invokes each outstanding completion callback with `Error::Cancelled`
    /// 4. Emits [`Event::Shutdown`]
    /// 5. Stops the session event dispatcher and waits for it to exit
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.lifecycle.accepting_new.swap(false, Ordering::SeqCst) {
            tracing::debug!("Shutdown already performed");
            return Ok(());
        }
        tracing::info!("Initiating shutdown");

        let records = self.registry.lock().drain();
        let outstanding = records.len();
        for record in records {
            if let Some(handle) = record.handle {
                self.session.cancel(handle);
            }
            self.emit_event(Event::Cancelled {
                key: record.key.clone(),
            });
            let completion = record.completion;
            self.delivery
                .dispatch(Box::new(move || completion(Err(Error::Cancelled))));
        }
        tracing::info!(outstanding, "Cancelled outstanding transfers");

        self.emit_event(Event::Shutdown);

        self.lifecycle.dispatcher_token.cancel();
        let dispatcher = self.lifecycle.dispatcher.lock().take();
        if let Some(task) = dispatcher {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Session event dispatcher ended abnormally");
            }
        }

        tracing::info!("Shutdown complete");
        Ok(())
    }
}
