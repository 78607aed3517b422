//! Remote drive interfaces consumed by the upload engine.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::types::{
    CreateUploadParams, DeleteResult, DeleteTarget, FileInfo, MkdirResult, UploadSession,
};

/// Remote drive API - implemented by the transport layer.
#[async_trait]
pub trait DriveClient: Send + Sync {
    /// Create an upload session for one file.
    ///
    /// The returned session reports whether the remote completed the file
    /// instantly (rapid upload).
    async fn create_upload_session(
        &self,
        params: &CreateUploadParams,
    ) -> Result<UploadSession, ApiError>;

    /// Create every folder along `segments`, reusing existing ones.
    ///
    /// # Arguments
    /// * `drive_id` - Target drive
    /// * `segments` - Folder names from the root down
    async fn mkdir_recursive(
        &self,
        drive_id: &str,
        segments: &[String],
    ) -> Result<MkdirResult, ApiError>;

    /// Look up an object by absolute remote path.
    /// Returns None if nothing exists at that path.
    async fn file_info_by_path(
        &self,
        drive_id: &str,
        path: &str,
    ) -> Result<Option<FileInfo>, ApiError>;

    /// Delete (move to recycle bin) a batch of objects.
    async fn delete_files(&self, targets: &[DeleteTarget]) -> Result<Vec<DeleteResult>, ApiError>;

    /// Current access token, used to derive proof codes.
    fn access_token(&self) -> String;
}

/// Byte transmitter for one session's parts.
///
/// The remote rejects concurrent or out-of-order parts; callers submit
/// parts one at a time in ascending order starting at 1.
#[async_trait]
pub trait PartSink: Send + Sync {
    /// Send the bytes of one part.
    ///
    /// # Arguments
    /// * `session` - Session the part belongs to
    /// * `part_number` - One-based part number
    /// * `data` - Part content
    async fn upload_part(
        &self,
        session: &UploadSession,
        part_number: u32,
        data: Vec<u8>,
    ) -> Result<(), ApiError>;

    /// Finalize the session once every part has been accepted.
    async fn complete_upload(&self, session: &UploadSession) -> Result<(), ApiError>;
}
