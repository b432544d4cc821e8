//! Transfer control: cancellation, callback rebinding and registry queries.

use crate::types::{CompletionCallback, Event, ProgressCallback, TransferInfo, TransferKey};

use super::DownloadCoordinator;

impl DownloadCoordinator {
    /// Cancel an active transfer
    ///
    /// The record is removed before this returns, so any event the session
    /// publishes for the transfer afterwards is ignored. The completion
    /// callback is not invoked. Unknown keys are a no-op.
    ///
    /// A transfer whose body has already arrived is no longer active while
    /// it is being moved into storage. Cancelling it then is a no-op: the
    /// move is not interrupted and its completion still fires.
    ///
    /// Returns whether a transfer was cancelled.
    pub fn cancel(&self, key: &TransferKey) -> bool {
        let Some(record) = self.registry.lock().remove(key) else {
            tracing::debug!(key = %key, "Cancel ignored, transfer not active");
            return false;
        };

        if let Some(handle) = record.handle {
            self.session.cancel(handle);
        }
        tracing::info!(key = %key, "Transfer cancelled");
        self.emit_event(Event::Cancelled { key: key.clone() });
        true
    }

    /// Cancel every active transfer and clear the registry
    ///
    /// Completion callbacks are not invoked. Returns the number of transfers
    /// cancelled.
    pub fn cancel_all(&self) -> usize {
        let records = self.registry.lock().drain();
        let count = records.len();

        for record in records {
            if let Some(handle) = record.handle {
                self.session.cancel(handle);
            }
            self.emit_event(Event::Cancelled { key: record.key });
        }

        if count > 0 {
            tracing::info!(count, "Cancelled all active transfers");
        }
        count
    }

    /// Replace the callbacks of an active transfer
    ///
    /// Lets a caller that lost its original callbacks (for example after a
    /// duplicate enqueue was coalesced) observe the running transfer. The
    /// previous callbacks are dropped without being invoked. Destination and
    /// key are unchanged. Unknown keys are a no-op and drop the new callbacks.
    ///
    /// Returns whether the callbacks were replaced.
    pub fn rebind(
        &self,
        key: &TransferKey,
        progress: Option<ProgressCallback>,
        completion: CompletionCallback,
    ) -> bool {
        let replaced = {
            let mut registry = self.registry.lock();
            match registry.get_mut(key) {
                Some(record) => {
                    let old_progress = std::mem::replace(&mut record.progress, progress);
                    let old_completion = std::mem::replace(&mut record.completion, completion);
                    Some((old_progress, old_completion))
                }
                None => None,
            }
        };

        // Previous callbacks are dropped outside the lock
        match replaced {
            Some(_) => {
                tracing::debug!(key = %key, "Transfer callbacks rebound");
                true
            }
            None => {
                tracing::debug!(key = %key, "Rebind ignored, transfer not active");
                false
            }
        }
    }

    /// Whether a transfer with this key is active
    pub fn is_in_progress(&self, key: &TransferKey) -> bool {
        self.registry.lock().contains(key)
    }

    /// Keys of all active transfers, in registration order
    pub fn list_active_keys(&self) -> Vec<TransferKey> {
        self.registry.lock().keys()
    }

    /// Number of active transfers
    pub fn active_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Snapshots of all active transfers, in registration order
    pub fn active_transfers(&self) -> Vec<TransferInfo> {
        self.registry.lock().infos()
    }
}
