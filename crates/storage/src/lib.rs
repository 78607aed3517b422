//! Resumable, deduplicating upload engine for a remote cloud drive.
//!
//! The crate uploads local files to a remote drive one task unit at a time.
//! An external scheduler runs the units, owns parallelism and backoff, and
//! calls the unit's hooks between attempts.
//!
//! # Upload path
//!
//! Each attempt walks a small state machine:
//!
//! - **Init** - open the local file and resume saved progress if the file is
//!   unchanged
//! - **PrepareUpload** - hash, resolve the parent folder, handle an existing
//!   remote file, create an upload session
//! - **RapidUpload** - the remote may complete the file from content it
//!   already holds
//! - **ChunkedUpload** - send the bytes part by part, strictly in order
//!
//! # Local databases
//!
//! - **Uploading database** - resumable progress of in-flight transfers
//! - **Sync database** - remote files and folders confirmed to exist
//!
//! Both sit on a write-back [`store::DurableMap`] backed by SQLite.

mod error;
mod local_file;
pub mod store;
mod sync_db;
pub mod task;
mod traits;
pub mod transfer;
mod types;
mod uploading_db;

pub use error::{ApiError, ApiErrorKind, RetryPolicy, TransferError, UploadError};
pub use local_file::LocalFileRecord;
pub use store::{DurableMap, MapBackend, MemoryMapBackend, SqliteMapBackend, StoreError};
pub use sync_db::{SyncDatabase, SyncRecord};
pub use task::{
    select_transfer_step, Completion, FolderCreateLock, ResultCode, TaskInfo, TaskUnit,
    TaskUnitRunResult, UploadContext, UploadStep, UploadTaskUnit,
};
pub use traits::{DriveClient, PartSink};
pub use transfer::{
    BytesSource, FileSource, InstanceState, MultiUploader, MultiUploaderConfig, PartSource,
    StatusObserver, TransferStatus, INSTANCE_STATE_VERSION,
};
pub use types::{
    CreateUploadParams, DeleteResult, DeleteTarget, FileInfo, MkdirResult, PartTarget,
    RetrySettings, UploadOptions, UploadSession, UploadStatistic,
};
pub use uploading_db::{FileIdentity, UploadingDatabase, UploadingEntry};
