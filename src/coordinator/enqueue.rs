//! Enqueueing transfers: existing-file check, deduplication, registration.

use crate::config::KeyStrategy;
use crate::error::{Error, Result};
use crate::types::{
    CompletionCallback, Destination, Directory, Event, ProgressCallback, TransferKey,
    TransferRequest,
};
use crate::utils::canonical_url;
use std::sync::atomic::Ordering;

use super::DownloadCoordinator;
use super::record::DownloadRecord;

/// What an enqueue call did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A transfer was registered and started under this key
    Started(TransferKey),
    /// The destination file already existed; completion received its relative path
    AlreadyExists(String),
    /// A transfer with the same key is active; the new callbacks were dropped
    DuplicateInProgress(TransferKey),
    /// The transfer could not be started; completion received the error with this code
    Rejected(&'static str),
}

impl EnqueueOutcome {
    /// Key of the started transfer, if one was started
    pub fn key(&self) -> Option<&TransferKey> {
        match self {
            EnqueueOutcome::Started(key) => Some(key),
            _ => None,
        }
    }
}

impl DownloadCoordinator {
    /// Enqueue a transfer into `directory/subdirectory/file_name`
    ///
    /// Returns the transfer key when a new transfer was started, `None`
    /// otherwise:
    /// - If the destination file already exists, `completion` is called
    ///   synchronously on the calling thread with its relative path.
    /// - If a transfer with the same key is active, the new callbacks are
    ///   dropped without being invoked; use [`rebind`](Self::rebind) to observe
    ///   the running transfer.
    /// - If the request is invalid, the coordinator is shutting down, or the
    ///   session refuses the transfer, `completion` receives the error on the
    ///   delivery context.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use transfer_dl::*;
    /// # fn example(coordinator: DownloadCoordinator) {
    /// let key = coordinator.enqueue(
    ///     TransferRequest::get("https://example.com/a.mp4"),
    ///     Directory::Documents,
    ///     Some("videos"),
    ///     "a.mp4",
    ///     None,
    ///     Box::new(|result| match result {
    ///         Ok(path) => println!("saved to {path}"),
    ///         Err(e) => eprintln!("failed: {e}"),
    ///     }),
    /// );
    /// # }
    /// ```
    pub fn enqueue(
        &self,
        request: TransferRequest,
        directory: Directory,
        subdirectory: Option<&str>,
        file_name: &str,
        progress: Option<ProgressCallback>,
        completion: CompletionCallback,
    ) -> Option<TransferKey> {
        match self.enqueue_with_outcome(
            request,
            Destination::new(directory, subdirectory, file_name),
            progress,
            completion,
        ) {
            EnqueueOutcome::Started(key) => Some(key),
            _ => None,
        }
    }

    /// Enqueue a transfer and report which path the call took
    pub fn enqueue_with_outcome(
        &self,
        request: TransferRequest,
        destination: Destination,
        progress: Option<ProgressCallback>,
        completion: CompletionCallback,
    ) -> EnqueueOutcome {
        let relative = destination.relative_path();

        if !self.lifecycle.accepting_new.load(Ordering::SeqCst) {
            tracing::debug!(url = %request.url, "Rejecting enqueue during shutdown");
            return self.reject(completion, Error::ShuttingDown);
        }

        if let Some(existing) = self
            .storage
            .check_if_already_exists(&relative, destination.directory)
        {
            tracing::debug!(
                directory = %destination.directory,
                path = %existing,
                "Destination already exists, skipping transfer"
            );
            completion(Ok(existing.clone()));
            return EnqueueOutcome::AlreadyExists(existing);
        }

        let key = match self.transfer_key(&request, &destination) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "Rejecting invalid request");
                return self.reject(completion, e);
            }
        };

        let record = DownloadRecord::new(key.clone(), destination.clone(), progress, completion);

        // Registration and session start happen under one lock so an event for
        // the new handle can never be looked up before the handle is bound
        let start_result = {
            let mut registry = self.registry.lock();
            if let Err(duplicate) = registry.insert(record) {
                drop(registry);
                tracing::debug!(key = %key, "Transfer already in progress, coalescing enqueue");
                drop(duplicate);
                return EnqueueOutcome::DuplicateInProgress(key);
            }

            match self.session.start(request) {
                Ok(handle) => {
                    registry.bind_handle(&key, handle);
                    Ok(handle)
                }
                Err(e) => Err((e, registry.remove(&key))),
            }
        };

        match start_result {
            Ok(handle) => {
                tracing::info!(
                    key = %key,
                    handle = handle.0,
                    directory = %destination.directory,
                    path = %relative,
                    "Transfer started"
                );
                self.emit_event(Event::Queued {
                    key: key.clone(),
                    destination,
                });
                EnqueueOutcome::Started(key)
            }
            Err((e, record)) => {
                tracing::warn!(key = %key, error = %e, "Session refused transfer");
                match record {
                    Some(record) => self.reject(record.completion, e),
                    None => EnqueueOutcome::Rejected(e.error_code()),
                }
            }
        }
    }

    /// Derive the transfer key for a request according to the key strategy
    pub(crate) fn transfer_key(
        &self,
        request: &TransferRequest,
        destination: &Destination,
    ) -> Result<TransferKey> {
        let url = canonical_url(&request.url)?;
        let key = match self.config.coordinator.key_strategy {
            KeyStrategy::Url => url,
            KeyStrategy::UrlAndDestination => format!(
                "{}#{}/{}",
                url,
                destination.directory,
                destination.relative_path()
            ),
        };
        Ok(TransferKey(key))
    }

    /// Deliver an enqueue-time error to the completion callback
    fn reject(&self, completion: CompletionCallback, error: Error) -> EnqueueOutcome {
        let code = error.error_code();
        self.delivery
            .dispatch(Box::new(move || completion(Err(error))));
        EnqueueOutcome::Rejected(code)
    }
}
