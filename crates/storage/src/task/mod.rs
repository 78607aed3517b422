//! Task units driven by an external retrying scheduler.
//!
//! The scheduler owns parallelism, retry counting and backoff. A task unit
//! runs one attempt at a time, classifies its failures, and exposes hooks
//! the scheduler calls between and after attempts.

mod folder;
mod upload_task;

pub use folder::FolderCreateLock;
pub use upload_task::{
    select_transfer_step, Completion, UploadContext, UploadStep, UploadTaskUnit,
};

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::UploadError;
use crate::types::FileInfo;

/// How a successful (or failed) attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// Bytes were sent through a chunked transfer.
    Uploaded,
    /// The remote completed the file from content it already had.
    RapidUploaded,
    /// Sync metadata already matched the local file; nothing was sent.
    AlreadyConsistent,
    /// The remote object at the target path already had the same content.
    RemoteMatched,
    /// The attempt failed.
    Failed,
}

/// Outcome of one attempt.
#[derive(Debug, Clone)]
pub struct TaskUnitRunResult {
    pub succeeded: bool,
    pub code: ResultCode,
    pub message: String,
    pub error: Option<UploadError>,
    /// Whether the scheduler should try again.
    pub need_retry: bool,
    /// Remote metadata found during the attempt, if any.
    pub extra: Option<FileInfo>,
}

impl TaskUnitRunResult {
    /// Successful attempt.
    pub fn success(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            code,
            message: message.into(),
            error: None,
            need_retry: false,
            extra: None,
        }
    }

    /// Failed attempt.
    pub fn failure(message: impl Into<String>, error: UploadError, need_retry: bool) -> Self {
        Self {
            succeeded: false,
            code: ResultCode::Failed,
            message: message.into(),
            error: Some(error),
            need_retry,
            extra: None,
        }
    }

    /// Attach remote metadata.
    pub fn with_extra(mut self, extra: FileInfo) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Identity and retry counters of a task, shared with the scheduler.
#[derive(Debug)]
pub struct TaskInfo {
    id: String,
    retry: AtomicU32,
    max_retry: u32,
}

impl TaskInfo {
    pub fn new(id: impl Into<String>, max_retry: u32) -> Self {
        Self {
            id: id.into(),
            retry: AtomicU32::new(0),
            max_retry,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Retries performed so far.
    pub fn retry(&self) -> u32 {
        self.retry.load(Ordering::Relaxed)
    }

    /// Record one more retry.
    ///
    /// # Returns
    /// The new retry count.
    pub fn increment_retry(&self) -> u32 {
        self.retry.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn max_retry(&self) -> u32 {
        self.max_retry
    }
}

/// A unit of work the scheduler runs, retries and reports on.
#[async_trait]
pub trait TaskUnit: Send {
    /// Run one attempt.
    async fn run(&mut self) -> TaskUnitRunResult;

    /// Called before the scheduler retries a failed attempt.
    async fn on_retry(&mut self, last: &TaskUnitRunResult);

    /// Called once after a successful attempt.
    async fn on_success(&mut self, last: &TaskUnitRunResult);

    /// Called once after the last failed attempt.
    async fn on_failed(&mut self, _last: &TaskUnitRunResult) {}

    /// Called once after the task finished, successful or not.
    async fn on_complete(&mut self, _last: &TaskUnitRunResult) {}

    /// Backoff before the next attempt.
    fn retry_wait(&self) -> Duration;
}
