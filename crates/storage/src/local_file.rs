//! Local file being uploaded.

use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use panup_common::hash_file;

use crate::error::UploadError;
use crate::types::UploadSession;
use crate::uploading_db::FileIdentity;

/// A local file and what one task unit run learned about it.
#[derive(Debug, Clone)]
pub struct LocalFileRecord {
    /// Local path.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Modification time in epoch milliseconds.
    pub mod_time: i64,
    /// Lowercase SHA-1, set by [`LocalFileRecord::sum`].
    pub content_hash: Option<String>,
    /// Session created for this file, if any.
    pub upload_session: Option<UploadSession>,
    /// Resolved remote parent folder id.
    pub parent_folder_id: Option<String>,
}

impl LocalFileRecord {
    /// Stat a local file.
    ///
    /// # Errors
    /// Returns `UploadError::IoError` if the file cannot be accessed or is
    /// not a regular file.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, UploadError> {
        let path: PathBuf = path.into();
        let display: String = path.display().to_string();

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| UploadError::io(display.clone(), e))?;
        if !metadata.is_file() {
            return Err(UploadError::IoError {
                path: display,
                message: "not a regular file".to_string(),
            });
        }

        let mod_time: i64 = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        Ok(Self {
            path,
            size: metadata.len(),
            mod_time,
            content_hash: None,
            upload_session: None,
            parent_folder_id: None,
        })
    }

    /// Path as a display string.
    pub fn path_str(&self) -> String {
        self.path.display().to_string()
    }

    /// Compute the content hash, once per record.
    ///
    /// # Errors
    /// Returns `UploadError::IoError` if the file cannot be read.
    pub async fn sum(&mut self) -> Result<String, UploadError> {
        if let Some(hash) = &self.content_hash {
            return Ok(hash.clone());
        }

        let path: PathBuf = self.path.clone();
        let hash: String = tokio::task::spawn_blocking(move || hash_file(&path))
            .await
            .map_err(|e| UploadError::Other {
                message: format!("Hash task failed: {}", e),
            })?
            .map_err(|e| UploadError::io(self.path_str(), e))?;

        self.content_hash = Some(hash.clone());
        Ok(hash)
    }

    /// Whether `other` was taken from the file with the same size and
    /// modification time.
    pub fn same_stat(&self, other: &LocalFileRecord) -> bool {
        self.path == other.path && self.size == other.size && self.mod_time == other.mod_time
    }

    /// Identity used to match saved transfer progress.
    ///
    /// Uses an empty hash if [`LocalFileRecord::sum`] has not run.
    pub fn identity(&self) -> FileIdentity {
        FileIdentity {
            path: self.path_str(),
            size: self.size,
            mod_time: self.mod_time,
            content_hash: self.content_hash.clone().unwrap_or_default(),
        }
    }
}
