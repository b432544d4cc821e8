//! Dispatch of session events to callbacks, storage and subscribers.

use crate::error::{Error, Result, StorageError};
use crate::session::{SessionEvent, SessionEventReceiver, TransferEvent};
use crate::types::{Destination, Event, Progress, TransferHandle, TransferKey, TransferState};
use std::path::PathBuf;

use super::DownloadCoordinator;
use super::record::DownloadRecord;

impl DownloadCoordinator {
    /// Consume session events in order until the channel closes or shutdown
    pub(crate) async fn run_dispatcher(self, mut events: SessionEventReceiver) {
        let token = self.lifecycle.dispatcher_token.clone();
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("Session event dispatcher stopped");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_session_event(event).await,
                    None => {
                        tracing::debug!("Session event channel closed");
                        break;
                    }
                },
            }
        }
    }

    /// Apply one session event
    pub(crate) async fn handle_session_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Transfer { handle, kind } => match kind {
                TransferEvent::Progress {
                    bytes_written,
                    bytes_expected,
                } => self.handle_progress(handle, bytes_written, bytes_expected),
                TransferEvent::Resumed {
                    offset,
                    expected_total,
                } => self.handle_resumed(handle, offset, expected_total),
                TransferEvent::WaitingForConnectivity => self.handle_waiting(handle),
                TransferEvent::CompletedToTemporaryLocation {
                    temp_path,
                    status_code,
                } => self.handle_completed(handle, temp_path, status_code).await,
                TransferEvent::Failed { status_code, error } => {
                    self.handle_failed(handle, status_code, error)
                }
            },
            SessionEvent::AllEventsDelivered => self.handle_all_events_delivered(),
        }
    }

    fn handle_progress(&self, handle: TransferHandle, bytes_written: i64, bytes_expected: i64) {
        let progress = Progress::from_bytes(bytes_written, bytes_expected);

        let relay = {
            let mut registry = self.registry.lock();
            let Some(record) = registry.get_by_handle_mut(handle) else {
                return;
            };
            if record.state != TransferState::InProgress || progress.fraction < record.last_fraction
            {
                return;
            }
            record.last_fraction = progress.fraction;
            (record.key.clone(), record.progress.clone())
        };

        let (key, callback) = relay;
        if let Some(callback) = callback {
            self.delivery.dispatch(Box::new(move || callback(progress)));
        }
        self.emit_event(Event::Progress {
            key,
            fraction: progress.fraction,
            total_mb: progress.total_mb,
        });
    }

    fn handle_resumed(&self, handle: TransferHandle, offset: i64, expected_total: i64) {
        let Some(key) = self.active_key(handle) else {
            return;
        };
        tracing::info!(key = %key, offset, expected_total, "Transfer resumed");
        self.emit_event(Event::Resumed {
            key,
            offset,
            expected_total,
        });
    }

    fn handle_waiting(&self, handle: TransferHandle) {
        let Some(key) = self.active_key(handle) else {
            return;
        };
        tracing::info!(key = %key, "Transfer waiting for connectivity");
        self.emit_event(Event::WaitingForConnectivity { key });
    }

    async fn handle_completed(
        &self,
        handle: TransferHandle,
        temp_path: PathBuf,
        status_code: Option<u16>,
    ) {
        let record = self.registry.lock().remove_by_handle(handle);
        let Some(record) = record else {
            tracing::debug!(
                handle = handle.0,
                "Completion for inactive transfer ignored, discarding temporary file"
            );
            self.discard_temp_file(temp_path).await;
            return;
        };

        if let Some(status) = status_code.filter(|s| *s >= 400) {
            self.discard_temp_file(temp_path).await;
            self.finish(record, Err(Error::http(status)));
            return;
        }

        let result = self.commit(record.destination.clone(), temp_path).await;
        self.finish(record, result);
    }

    fn handle_failed(
        &self,
        handle: TransferHandle,
        status_code: Option<u16>,
        error: Option<String>,
    ) {
        let Some(record) = self.registry.lock().remove_by_handle(handle) else {
            tracing::debug!(handle = handle.0, "Failure for inactive transfer ignored");
            return;
        };

        let error = match status_code.filter(|s| *s >= 400) {
            Some(status) => Error::http(status),
            None => Error::transport(error.unwrap_or_else(|| "transfer failed".to_string())),
        };
        self.finish(record, Err(error));
    }

    fn handle_all_events_delivered(&self) {
        let handler = self.lifecycle.background_handler.lock().take();
        match handler {
            Some(handler) => {
                tracing::info!("All background events delivered, invoking host handler");
                self.delivery.dispatch(handler);
            }
            None => tracing::debug!("All background events delivered, no host handler registered"),
        }
        self.emit_event(Event::EventsFlushed);
    }

    /// Move a finished temporary file into its destination on the blocking pool
    async fn commit(&self, destination: Destination, temp_path: PathBuf) -> Result<String> {
        let storage = self.storage.clone();
        let source = temp_path.clone();

        tokio::task::spawn_blocking(move || {
            storage.move_file(
                &source,
                destination.directory,
                destination.subdirectory.as_deref(),
                &destination.file_name,
            )
        })
        .await
        .map_err(|e| {
            StorageError::io(
                &temp_path,
                std::io::Error::other(format!("storage task failed: {}", e)),
            )
        })?
        .map_err(Error::from)
    }

    /// Remove a temporary file nobody will commit, on the blocking pool
    async fn discard_temp_file(&self, temp_path: PathBuf) {
        let result = tokio::task::spawn_blocking(move || match std::fs::remove_file(&temp_path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err((temp_path, e)),
            _ => Ok(()),
        })
        .await;

        if let Ok(Err((path, e))) = result {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary file");
        }
    }

    /// Report a terminal outcome and hand it to the completion callback
    fn finish(&self, record: DownloadRecord, result: Result<String>) {
        let key = record.key.clone();
        match &result {
            Ok(path) => {
                tracing::info!(key = %key, path = %path, "Transfer completed");
                self.emit_event(Event::Completed {
                    key,
                    path: path.clone(),
                });
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Transfer failed");
                self.emit_event(Event::Failed {
                    key,
                    code: e.error_code().to_string(),
                    error: e.to_string(),
                });
            }
        }

        let completion = record.completion;
        self.delivery.dispatch(Box::new(move || completion(result)));
    }

    fn active_key(&self, handle: TransferHandle) -> Option<TransferKey> {
        self.registry
            .lock()
            .get_by_handle_mut(handle)
            .map(|record| record.key.clone())
    }
}
