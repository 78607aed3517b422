//! Metadata of files and folders confirmed to exist remotely.
//!
//! A soft cache: entries may be stale, so callers that care re-validate
//! against the remote.

use serde::{Deserialize, Serialize};

use crate::store::{DurableMap, MapBackend, StoreError};

/// Confirmed remote object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Absolute remote path.
    pub remote_path: String,
    pub is_folder: bool,
    /// Lowercase SHA-1 content hash; empty for folders.
    pub content_hash: String,
    /// Local modification time in epoch milliseconds.
    pub mod_time: i64,
    pub size: u64,
    /// Remote file id.
    pub file_id: String,
    /// Remote parent folder id.
    pub parent_file_id: String,
}

impl SyncRecord {
    /// Build a folder record.
    pub fn folder(remote_path: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            remote_path: remote_path.into(),
            is_folder: true,
            content_hash: String::new(),
            mod_time: 0,
            size: 0,
            file_id: file_id.into(),
            parent_file_id: String::new(),
        }
    }
}

/// Store of [`SyncRecord`] values keyed by remote path.
pub struct SyncDatabase {
    map: DurableMap<SyncRecord>,
}

impl SyncDatabase {
    /// Open the store on the given backend.
    pub async fn open(backend: impl MapBackend + 'static) -> Result<Self, StoreError> {
        Ok(Self {
            map: DurableMap::open(backend).await?,
        })
    }

    pub fn get(&self, remote_path: &str) -> Option<SyncRecord> {
        self.map.get(remote_path)
    }

    /// Insert or replace the record for its remote path.
    pub fn put(&self, record: SyncRecord) {
        self.map.put(record.remote_path.clone(), record);
    }

    pub fn delete(&self, remote_path: &str) -> bool {
        self.map.delete(remote_path)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Flush pending changes to durable storage.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.map.flush().await?;
        Ok(())
    }
}
