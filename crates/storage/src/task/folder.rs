//! Serialized creation of remote parent folders.

use std::collections::HashMap;
use std::time::Duration;

use panup_common::{clean_remote_path, is_root, path_segments, ROOT_FOLDER_ID};
use tokio::sync::Mutex;

use crate::error::UploadError;
use crate::sync_db::{SyncDatabase, SyncRecord};
use crate::traits::DriveClient;

/// Process-wide lock around remote folder creation.
///
/// The remote is eventually consistent: two concurrent creations of the
/// same folder can yield duplicates, and a fresh folder may not be visible
/// right away. Every resolution therefore runs under one async mutex, and
/// a remote creation keeps the mutex for a settle delay before releasing.
///
/// Share one instance (behind an `Arc`) between all task units of a drive.
#[derive(Debug, Default)]
pub struct FolderCreateLock {
    /// Remote folder path to folder id.
    resolved: Mutex<HashMap<String, String>>,
}

impl FolderCreateLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a remote folder to its id, creating it if needed.
    ///
    /// Lookup order: folders resolved earlier in this process, then the
    /// sync database, then a recursive remote creation. The root resolves
    /// without any remote call.
    ///
    /// # Arguments
    /// * `client` - Remote drive API
    /// * `drive_id` - Target drive
    /// * `dir` - Absolute remote folder path
    /// * `sync_db` - Optional sync database consulted and updated
    /// * `settle_delay` - Wait after a remote creation, with the lock held
    ///
    /// # Errors
    /// Returns `UploadError::Api` if the remote creation fails.
    pub async fn resolve<C: DriveClient + ?Sized>(
        &self,
        client: &C,
        drive_id: &str,
        dir: &str,
        sync_db: Option<&SyncDatabase>,
        settle_delay: Duration,
    ) -> Result<String, UploadError> {
        let dir: String = clean_remote_path(dir);
        if is_root(&dir) {
            return Ok(ROOT_FOLDER_ID.to_string());
        }

        let mut resolved = self.resolved.lock().await;
        if let Some(folder_id) = resolved.get(&dir) {
            return Ok(folder_id.clone());
        }

        if let Some(record) = sync_db.and_then(|db| db.get(&dir)) {
            if record.is_folder && !record.file_id.is_empty() {
                resolved.insert(dir, record.file_id.clone());
                return Ok(record.file_id);
            }
        }

        let created = client.mkdir_recursive(drive_id, &path_segments(&dir)).await?;
        log::debug!("Created remote folder {} ({})", dir, created.file_id);

        resolved.insert(dir.clone(), created.file_id.clone());
        if let Some(db) = sync_db {
            db.put(SyncRecord::folder(dir, created.file_id.clone()));
        }

        if !settle_delay.is_zero() {
            tokio::time::sleep(settle_delay).await;
        }
        Ok(created.file_id)
    }

    /// Folder id resolved earlier in this process, if any.
    pub async fn cached(&self, dir: &str) -> Option<String> {
        self.resolved
            .lock()
            .await
            .get(&clean_remote_path(dir))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ApiErrorKind};
    use crate::store::MemoryMapBackend;
    use crate::types::{
        CreateUploadParams, DeleteResult, DeleteTarget, FileInfo, MkdirResult, UploadSession,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct MkdirCounter {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl DriveClient for MkdirCounter {
        async fn create_upload_session(
            &self,
            _params: &CreateUploadParams,
        ) -> Result<UploadSession, ApiError> {
            unimplemented!()
        }

        async fn mkdir_recursive(
            &self,
            _drive_id: &str,
            segments: &[String],
        ) -> Result<MkdirResult, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail {
                return Err(ApiError::new(ApiErrorKind::Server, "InternalError", "mkdir failed"));
            }
            Ok(MkdirResult {
                file_id: format!("id-{}", segments.join("-")),
            })
        }

        async fn file_info_by_path(
            &self,
            _drive_id: &str,
            _path: &str,
        ) -> Result<Option<FileInfo>, ApiError> {
            Ok(None)
        }

        async fn delete_files(
            &self,
            _targets: &[DeleteTarget],
        ) -> Result<Vec<DeleteResult>, ApiError> {
            Ok(Vec::new())
        }

        fn access_token(&self) -> String {
            String::new()
        }
    }

    #[tokio::test]
    async fn test_root_needs_no_remote_call() {
        let lock = FolderCreateLock::new();
        let client = MkdirCounter::default();
        let id = lock
            .resolve(&client, "d1", "/", None, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(id, ROOT_FOLDER_ID);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolved_folder_is_cached() {
        let lock = FolderCreateLock::new();
        let client = MkdirCounter::default();

        let first = lock
            .resolve(&client, "d1", "/backup/photos", None, Duration::ZERO)
            .await
            .unwrap();
        let second = lock
            .resolve(&client, "d1", "/backup//photos/", None, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(first, "id-backup-photos");
        assert_eq!(first, second);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(lock.cached("/backup/photos").await, Some(first));
    }

    #[tokio::test]
    async fn test_sync_db_folder_record_is_used() {
        let lock = FolderCreateLock::new();
        let client = MkdirCounter::default();
        let db = SyncDatabase::open(MemoryMapBackend::new()).await.unwrap();
        db.put(SyncRecord::folder("/docs", "known-id"));

        let id = lock
            .resolve(&client, "d1", "/docs", Some(&db), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(id, "known-id");
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_created_folder_is_recorded() {
        let lock = FolderCreateLock::new();
        let client = MkdirCounter::default();
        let db = SyncDatabase::open(MemoryMapBackend::new()).await.unwrap();

        lock.resolve(&client, "d1", "/new", Some(&db), Duration::ZERO)
            .await
            .unwrap();
        let record = db.get("/new").unwrap();
        assert!(record.is_folder);
        assert_eq!(record.file_id, "id-new");
    }

    #[tokio::test]
    async fn test_concurrent_resolution_creates_once() {
        let lock = Arc::new(FolderCreateLock::new());
        let client = Arc::new(MkdirCounter::default());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let client = Arc::clone(&client);
            handles.push(tokio::spawn(async move {
                lock.resolve(&*client, "d1", "/shared", None, Duration::from_millis(10))
                    .await
                    .unwrap()
            }));
        }
        for joined in futures::future::join_all(handles).await {
            assert_eq!(joined.unwrap(), "id-shared");
        }
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_creation_is_not_cached() {
        let lock = FolderCreateLock::new();
        let client = MkdirCounter {
            fail: true,
            ..Default::default()
        };

        let result = lock
            .resolve(&client, "d1", "/broken", None, Duration::ZERO)
            .await;
        assert!(matches!(result, Err(UploadError::Api(_))));
        assert!(lock.cached("/broken").await.is_none());
    }
}
