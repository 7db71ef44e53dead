//! Data context and record abstractions consumed from the sync engine
//!
//! The adapter never owns local state. It reads records through
//! [`SyncRecord::perform`] and runs every mutation of caller-visible state
//! on the context's [`SerialQueue`].

use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::errors::ValidationError;
use crate::domain::record::{RecordId, RemoteRef};

// ============================================================================
// SerialQueue
// ============================================================================

/// Single-writer execution context
///
/// Closures submitted through [`SerialQueue::perform`] run one at a time,
/// in the order they acquire the queue.
#[derive(Debug, Default)]
pub struct SerialQueue {
    lock: tokio::sync::Mutex<()>,
}

impl SerialQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `work` once no other closure is running on this queue
    pub async fn perform<F, R>(&self, work: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.lock.lock().await;
        work()
    }
}

// ============================================================================
// DataContext
// ============================================================================

/// The caller's local data context
pub trait DataContext: Send + Sync + 'static {
    /// Representation downloaded records are decoded into
    type LocalRecord: DeserializeOwned + Send + 'static;

    /// Queue on which context-owned state may be touched
    fn queue(&self) -> &SerialQueue;

    /// Builds a local record from downloaded bytes
    fn decode_local_record(&self, bytes: &[u8]) -> Result<Self::LocalRecord, ValidationError> {
        serde_json::from_slice(bytes).map_err(|e| ValidationError::Decoding(e.to_string()))
    }
}

// ============================================================================
// Records
// ============================================================================

/// The managed object behind a [`SyncRecord`]
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedRecord {
    pub record_id: RecordId,
    /// Local representation, if the record exists locally
    pub local_record: Option<serde_json::Value>,
    /// Last known remote counterpart
    pub remote_record: Option<RemoteRef>,
}

impl ManagedRecord {
    pub fn new(record_id: RecordId) -> Self {
        Self {
            record_id,
            local_record: None,
            remote_record: None,
        }
    }

    pub fn with_local_record<T: Serialize>(mut self, value: &T) -> Result<Self, ValidationError> {
        let value =
            serde_json::to_value(value).map_err(|e| ValidationError::Encoding(e.to_string()))?;
        self.local_record = Some(value);
        Ok(self)
    }

    pub fn with_remote_record(mut self, remote: RemoteRef) -> Self {
        self.remote_record = Some(remote);
        self
    }

    /// Encodes the local record as JSON bytes for upload
    pub fn encode_local_record(&self) -> Result<Vec<u8>, ValidationError> {
        let value = self
            .local_record
            .as_ref()
            .ok_or_else(|| ValidationError::MissingLocalRecord(self.record_id.to_string()))?;
        serde_json::to_vec(value).map_err(|e| ValidationError::Encoding(e.to_string()))
    }
}

/// A record the sync engine asks the adapter to transfer
pub trait SyncRecord: Send + Sync {
    /// Runs `work` against the managed object
    fn perform<R>(&self, work: impl FnOnce(&ManagedRecord) -> R) -> R;

    fn record_id(&self) -> RecordId {
        self.perform(|managed| managed.record_id.clone())
    }

    fn remote_counterpart(&self) -> Option<RemoteRef> {
        self.perform(|managed| managed.remote_record.clone())
    }
}

/// A [`SyncRecord`] guarding its managed object with a mutex
#[derive(Debug)]
pub struct SharedRecord {
    inner: Mutex<ManagedRecord>,
}

impl SharedRecord {
    pub fn new(managed: ManagedRecord) -> Self {
        Self {
            inner: Mutex::new(managed),
        }
    }

    /// Replaces the remote counterpart after a successful transfer
    pub fn set_remote_record(&self, remote: Option<RemoteRef>) {
        self.update(|managed| managed.remote_record = remote);
    }

    /// Mutates the managed object
    pub fn update<R>(&self, work: impl FnOnce(&mut ManagedRecord) -> R) -> R {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        work(&mut guard)
    }
}

impl SyncRecord for SharedRecord {
    fn perform<R>(&self, work: impl FnOnce(&ManagedRecord) -> R) -> R {
        let guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        work(&guard)
    }
}
