//! Resumable progress of in-flight chunked transfers.
//!
//! One entry per local path. An entry is only handed back when the file
//! still has exactly the identity it had when the transfer started.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::store::{DurableMap, MapBackend, StoreError};
use crate::transfer::InstanceState;

/// Identity of a local file for resumption purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIdentity {
    /// Local path.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// Modification time in epoch milliseconds.
    pub mod_time: i64,
    /// Lowercase SHA-1 content hash.
    pub content_hash: String,
}

/// Persisted progress of one chunked transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadingEntry {
    pub identity: FileIdentity,
    pub state: InstanceState,
    /// Last update time in epoch seconds.
    pub updated_at: i64,
}

/// Store of [`UploadingEntry`] values keyed by local path.
pub struct UploadingDatabase {
    map: DurableMap<UploadingEntry>,
}

impl UploadingDatabase {
    /// Open the store on the given backend.
    ///
    /// # Errors
    /// Returns error if persisted entries cannot be loaded.
    pub async fn open(backend: impl MapBackend + 'static) -> Result<Self, StoreError> {
        Ok(Self {
            map: DurableMap::open(backend).await?,
        })
    }

    /// Check whether any entry exists for a local path.
    pub fn has_entry(&self, path: &str) -> bool {
        self.map.contains_key(path)
    }

    /// Find the saved transfer state for a file.
    ///
    /// An entry for the same path whose identity differs is deleted.
    ///
    /// # Returns
    /// The saved state if the identity matches exactly, None otherwise.
    pub fn search(&self, identity: &FileIdentity) -> Option<InstanceState> {
        let entry: UploadingEntry = self.map.get(&identity.path)?;
        if entry.identity == *identity {
            return Some(entry.state);
        }

        log::warn!(
            "Discarding upload progress for {}: file changed since the transfer started",
            identity.path
        );
        self.map.delete(&identity.path);
        None
    }

    /// Record the latest transfer state for a file.
    pub fn update_uploading(&self, identity: &FileIdentity, state: InstanceState) {
        let entry = UploadingEntry {
            identity: identity.clone(),
            state,
            updated_at: epoch_seconds(),
        };
        self.map.put(identity.path.clone(), entry);
    }

    /// Remove the entry for a local path.
    pub fn delete(&self, path: &str) -> bool {
        self.map.delete(path)
    }

    /// Number of in-flight entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check whether no transfer is in flight.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Flush pending changes to durable storage.
    pub async fn save(&self) -> Result<(), StoreError> {
        self.map.flush().await?;
        Ok(())
    }
}

fn epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryMapBackend, SqliteMapBackend};
    use crate::transfer::generate_parts;
    use crate::types::UploadSession;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn identity(size: u64, hash: &str) -> FileIdentity {
        FileIdentity {
            path: "/data/video.mp4".to_string(),
            size,
            mod_time: 1_700_000_000_000,
            content_hash: hash.to_string(),
        }
    }

    fn state(size: u64) -> InstanceState {
        let session = UploadSession {
            drive_id: "d1".into(),
            file_id: "f1".into(),
            upload_id: "u1".into(),
            parent_file_id: "root".into(),
            file_name: "video.mp4".into(),
            rapid_upload: false,
            block_size: 4,
            part_info_list: Vec::new(),
        };
        InstanceState::new(session, size, 4, &generate_parts(size, 4))
    }

    #[tokio::test]
    async fn test_search_exact_match() {
        let db = UploadingDatabase::open(MemoryMapBackend::new()).await.unwrap();
        let id = identity(10, "abc");
        db.update_uploading(&id, state(10));

        assert!(db.has_entry(&id.path));
        assert_eq!(db.search(&id), Some(state(10)));
    }

    #[tokio::test]
    async fn test_search_discards_mismatch() {
        let db = UploadingDatabase::open(MemoryMapBackend::new()).await.unwrap();
        db.update_uploading(&identity(10, "abc"), state(10));

        assert!(db.search(&identity(10, "def")).is_none());
        assert!(!db.has_entry("/data/video.mp4"));
        assert!(db.search(&identity(10, "abc")).is_none());
    }

    #[tokio::test]
    async fn test_one_entry_per_path() {
        let db = UploadingDatabase::open(MemoryMapBackend::new()).await.unwrap();
        db.update_uploading(&identity(10, "abc"), state(10));
        db.update_uploading(&identity(12, "xyz"), state(12));

        assert_eq!(db.len(), 1);
        assert_eq!(db.search(&identity(12, "xyz")), Some(state(12)));
    }

    #[tokio::test]
    async fn test_save_survives_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("panup.db");
        let id = identity(10, "abc");

        {
            let backend = SqliteMapBackend::open(&db_path, "uploading").unwrap();
            let db = UploadingDatabase::open(backend).await.unwrap();
            db.update_uploading(&id, state(10));
            db.save().await.unwrap();
        }

        let backend = SqliteMapBackend::open(&db_path, "uploading").unwrap();
        let db = UploadingDatabase::open(backend).await.unwrap();
        assert_eq!(db.search(&id), Some(state(10)));
    }

    #[tokio::test]
    async fn test_delete_then_save() {
        let backend = Arc::new(MemoryMapBackend::new());
        let db = UploadingDatabase::open(Arc::clone(&backend)).await.unwrap();
        let id = identity(10, "abc");
        db.update_uploading(&id, state(10));
        db.save().await.unwrap();

        assert!(db.delete(&id.path));
        db.save().await.unwrap();
        assert!(db.is_empty());
        assert_eq!(backend.persisted_len(), 0);
    }
}
