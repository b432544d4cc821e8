//! Per-transfer records and the registry that owns them

use crate::types::{
    CompletionCallback, Destination, ProgressCallback, TransferHandle, TransferInfo, TransferKey,
    TransferState,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// State the coordinator holds for one transfer
pub(crate) struct DownloadRecord {
    pub(crate) key: TransferKey,
    pub(crate) handle: Option<TransferHandle>,
    pub(crate) progress: Option<ProgressCallback>,
    pub(crate) completion: CompletionCallback,
    pub(crate) destination: Destination,
    pub(crate) state: TransferState,
    /// Last fraction relayed; progress never moves backwards
    pub(crate) last_fraction: f64,
    pub(crate) started_at: DateTime<Utc>,
    /// Registration order
    pub(crate) sequence: u64,
}

impl DownloadRecord {
    pub(crate) fn new(
        key: TransferKey,
        destination: Destination,
        progress: Option<ProgressCallback>,
        completion: CompletionCallback,
    ) -> Self {
        Self {
            key,
            handle: None,
            progress,
            completion,
            destination,
            state: TransferState::Pending,
            last_fraction: 0.0,
            started_at: Utc::now(),
            sequence: 0,
        }
    }

    pub(crate) fn info(&self) -> TransferInfo {
        TransferInfo {
            key: self.key.clone(),
            destination: self.destination.clone(),
            state: self.state,
            fraction: self.last_fraction,
            started_at: self.started_at,
        }
    }
}

/// Active records keyed by transfer key, with a reverse index by handle
///
/// Holds at most one record per key. Removing a record also removes its
/// handle mapping, so events for that handle stop resolving immediately.
#[derive(Default)]
pub(crate) struct Registry {
    records: HashMap<TransferKey, DownloadRecord>,
    handles: HashMap<TransferHandle, TransferKey>,
    next_sequence: u64,
}

impl Registry {
    pub(crate) fn contains(&self, key: &TransferKey) -> bool {
        self.records.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Register a record, assigning its sequence number
    ///
    /// Returns the record back if one with the same key is already active.
    pub(crate) fn insert(
        &mut self,
        mut record: DownloadRecord,
    ) -> std::result::Result<(), DownloadRecord> {
        if self.records.contains_key(&record.key) {
            return Err(record);
        }
        record.sequence = self.next_sequence;
        self.next_sequence += 1;
        if let Some(handle) = record.handle {
            self.handles.insert(handle, record.key.clone());
        }
        self.records.insert(record.key.clone(), record);
        Ok(())
    }

    /// Attach a session handle to a registered record and mark it running
    pub(crate) fn bind_handle(&mut self, key: &TransferKey, handle: TransferHandle) -> bool {
        match self.records.get_mut(key) {
            Some(record) => {
                record.handle = Some(handle);
                record.state = TransferState::InProgress;
                self.handles.insert(handle, key.clone());
                true
            }
            None => false,
        }
    }

    pub(crate) fn get_mut(&mut self, key: &TransferKey) -> Option<&mut DownloadRecord> {
        self.records.get_mut(key)
    }

    pub(crate) fn get_by_handle_mut(
        &mut self,
        handle: TransferHandle,
    ) -> Option<&mut DownloadRecord> {
        let key = self.handles.get(&handle)?;
        self.records.get_mut(key)
    }

    pub(crate) fn remove(&mut self, key: &TransferKey) -> Option<DownloadRecord> {
        let record = self.records.remove(key)?;
        if let Some(handle) = record.handle {
            self.handles.remove(&handle);
        }
        Some(record)
    }

    pub(crate) fn remove_by_handle(&mut self, handle: TransferHandle) -> Option<DownloadRecord> {
        let key = self.handles.remove(&handle)?;
        self.records.remove(&key)
    }

    /// Remove every record, in registration order
    pub(crate) fn drain(&mut self) -> Vec<DownloadRecord> {
        self.handles.clear();
        let mut records: Vec<DownloadRecord> = self.records.drain().map(|(_, r)| r).collect();
        records.sort_by_key(|r| r.sequence);
        records
    }

    /// Active keys in registration order
    pub(crate) fn keys(&self) -> Vec<TransferKey> {
        self.ordered().into_iter().map(|r| r.key.clone()).collect()
    }

    /// Snapshots in registration order
    pub(crate) fn infos(&self) -> Vec<TransferInfo> {
        self.ordered().into_iter().map(DownloadRecord::info).collect()
    }

    fn ordered(&self) -> Vec<&DownloadRecord> {
        let mut records: Vec<&DownloadRecord> = self.records.values().collect();
        records.sort_by_key(|r| r.sequence);
        records
    }
}
