//! Storage sink for accepted inbound messages.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use ulid::Ulid;

use crate::message::Headers;

/// Errors from the storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage write failed: {0}")]
    Write(String),
}

/// One storage record: a single recipient's copy of a parsed message.
///
/// The same message content is written once per accepted recipient, each
/// copy under its own identifier.
#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    pub recipient: String,
    pub sender: String,
    pub headers: Headers,
    pub body: String,
}

/// External storage capability: durably store one record, returning its
/// freshly generated unique identifier.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// # Errors
    ///
    /// Returns [`StoreError`] when the record could not be stored; the
    /// intake pipeline treats this as fatal for the whole transaction.
    async fn store(&self, record: StoredRecord) -> Result<String, StoreError>;
}

/// In-memory store keyed by ULID, for tests and the bundled receiver
/// binary.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<(String, StoredRecord)>>,
}

impl MemoryStore {
    /// Snapshot of everything stored so far, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<(String, StoredRecord)> {
        self.records.lock().expect("store lock poisoned").clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().expect("store lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn store(&self, record: StoredRecord) -> Result<String, StoreError> {
        let id = Ulid::new().to_string();
        self.records
            .lock()
            .map_err(|_| StoreError::Write("store lock poisoned".to_string()))?
            .push((id.clone(), record));
        Ok(id)
    }
}
