//! Shared data structures for upload operations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use panup_common::{
    DEFAULT_BLOCK_SIZE, DEFAULT_DELETE_SETTLE_DELAY_MS, DEFAULT_FOLDER_SETTLE_DELAY_MS,
};
use serde::{Deserialize, Serialize};

/// Upload target of a single part, as issued by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartTarget {
    /// One-based part number.
    pub part_number: u32,
    /// Pre-signed URL the part bytes are sent to.
    pub upload_url: String,
}

/// Remote upload session returned by `create_upload_session`.
///
/// Immutable once issued; consumed by the transfer engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    /// Drive the file is created in.
    pub drive_id: String,
    /// Id of the file being created.
    pub file_id: String,
    /// Id of the multipart upload.
    pub upload_id: String,
    /// Id of the parent folder.
    pub parent_file_id: String,
    /// Remote file name.
    pub file_name: String,
    /// Whether the remote completed the file instantly from existing content.
    pub rapid_upload: bool,
    /// Part size negotiated for this session.
    pub block_size: u64,
    /// Per-part upload targets, ascending by part number.
    pub part_info_list: Vec<PartTarget>,
}

/// Parameters for creating an upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUploadParams {
    /// Target drive.
    pub drive_id: String,
    /// Parent folder id.
    pub parent_file_id: String,
    /// Remote file name.
    pub name: String,
    /// File size in bytes.
    pub size: u64,
    /// Uppercase SHA-1 content hash.
    pub content_hash: String,
    /// Proof of possession; `None` when rapid upload is not attempted.
    pub proof_code: Option<String>,
    /// Proof algorithm version.
    pub proof_version: String,
    /// Requested part size.
    pub block_size: u64,
}

/// Remote object metadata from `file_info_by_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub drive_id: String,
    pub file_id: String,
    pub parent_file_id: String,
    pub name: String,
    pub size: u64,
    /// Content hash as reported by the remote (uppercase hex).
    pub content_hash: String,
    pub is_folder: bool,
}

/// Result of a recursive folder creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MkdirResult {
    /// Id of the deepest folder.
    pub file_id: String,
}

/// Object to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTarget {
    pub drive_id: String,
    pub file_id: String,
}

/// Per-object outcome of a batch delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    pub file_id: String,
    pub success: bool,
}

/// Retry backoff settings handed to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum number of retry attempts.
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds.
    pub initial_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Backoff multiplier (exponential backoff).
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2_000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetrySettings {
    /// Backoff before the given retry attempt.
    ///
    /// Never decreases as `attempt` grows and never exceeds `max_backoff_ms`.
    ///
    /// # Arguments
    /// * `attempt` - One-based retry number (0 is treated as 1)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let multiplier: f64 = self.backoff_multiplier.max(1.0);
        let exponent: i32 = attempt.saturating_sub(1).min(64) as i32;
        let delay: f64 = self.initial_backoff_ms as f64 * multiplier.powi(exponent);
        let capped: f64 = delay.min(self.max_backoff_ms as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Configuration for upload task units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadOptions {
    /// Requested transfer parallelism. The remote only accepts 1.
    pub parallel: usize,
    /// Part size for chunked transfers.
    pub block_size: u64,
    /// Bandwidth cap per transfer in bytes per second (0 = unlimited).
    pub max_upload_rate: u64,
    /// Skip rapid upload and always send the bytes.
    pub no_rapid_upload: bool,
    /// Log a progress line during chunked transfers.
    pub show_progress: bool,
    /// Replace an existing remote object at the target path.
    pub is_overwrite: bool,
    /// Wait after creating a remote folder, holding the folder lock.
    pub folder_settle_delay_ms: u64,
    /// Wait after deleting a remote object.
    pub delete_settle_delay_ms: u64,
    /// Backoff reported to the scheduler.
    pub retry: RetrySettings,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            parallel: 1,
            block_size: DEFAULT_BLOCK_SIZE,
            max_upload_rate: 0,
            no_rapid_upload: false,
            show_progress: false,
            is_overwrite: false,
            folder_settle_delay_ms: DEFAULT_FOLDER_SETTLE_DELAY_MS,
            delete_settle_delay_ms: DEFAULT_DELETE_SETTLE_DELAY_MS,
            retry: RetrySettings::default(),
        }
    }
}

impl UploadOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the part size for chunked transfers.
    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the bandwidth cap in bytes per second.
    pub fn with_max_upload_rate(mut self, rate: u64) -> Self {
        self.max_upload_rate = rate;
        self
    }

    /// Disable rapid upload.
    pub fn with_no_rapid_upload(mut self, no_rapid_upload: bool) -> Self {
        self.no_rapid_upload = no_rapid_upload;
        self
    }

    /// Enable progress lines.
    pub fn with_show_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Replace existing remote objects at the target path.
    pub fn with_overwrite(mut self, is_overwrite: bool) -> Self {
        self.is_overwrite = is_overwrite;
        self
    }

    /// Set both settle delays.
    ///
    /// # Arguments
    /// * `folder` - Delay after folder creation
    /// * `delete` - Delay after deleting a remote object
    pub fn with_settle_delays(mut self, folder: Duration, delete: Duration) -> Self {
        self.folder_settle_delay_ms = folder.as_millis() as u64;
        self.delete_settle_delay_ms = delete.as_millis() as u64;
        self
    }

    /// Set retry backoff settings.
    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// Delay after folder creation.
    pub fn folder_settle_delay(&self) -> Duration {
        Duration::from_millis(self.folder_settle_delay_ms)
    }

    /// Delay after deleting a remote object.
    pub fn delete_settle_delay(&self) -> Duration {
        Duration::from_millis(self.delete_settle_delay_ms)
    }
}

/// Process-wide upload counters shared by all task units.
#[derive(Debug)]
pub struct UploadStatistic {
    total_size: AtomicU64,
    files_uploaded: AtomicU64,
    start_time: Instant,
}

impl UploadStatistic {
    /// Start counting from now.
    pub fn new() -> Self {
        Self {
            total_size: AtomicU64::new(0),
            files_uploaded: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one uploaded file of `size` bytes.
    pub fn add_total_size(&self, size: u64) {
        self.total_size.fetch_add(size, Ordering::Relaxed);
        self.files_uploaded.fetch_add(1, Ordering::Relaxed);
    }

    /// Bytes uploaded so far.
    pub fn total_size(&self) -> u64 {
        self.total_size.load(Ordering::Relaxed)
    }

    /// Files uploaded so far.
    pub fn files_uploaded(&self) -> u64 {
        self.files_uploaded.load(Ordering::Relaxed)
    }

    /// Time since counting started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for UploadStatistic {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_options_default() {
        let options = UploadOptions::default();
        assert_eq!(options.parallel, 1);
        assert_eq!(options.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(options.folder_settle_delay(), Duration::from_secs(2));
        assert_eq!(options.delete_settle_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_upload_options_from_partial_json() {
        let options: UploadOptions =
            serde_json::from_str(r#"{"no_rapid_upload": true, "max_upload_rate": 1024}"#)
                .unwrap();
        assert!(options.no_rapid_upload);
        assert_eq!(options.max_upload_rate, 1024);
        assert_eq!(options.block_size, DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_backoff_is_monotonic_and_capped() {
        let retry = RetrySettings::default();
        let mut previous = Duration::ZERO;
        for attempt in 0..20 {
            let wait = retry.backoff(attempt);
            assert!(wait >= previous);
            assert!(wait <= Duration::from_millis(retry.max_backoff_ms));
            previous = wait;
        }
        assert_eq!(retry.backoff(1), Duration::from_secs(2));
        assert_eq!(retry.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn test_statistic_counts() {
        let stats = UploadStatistic::new();
        stats.add_total_size(100);
        stats.add_total_size(50);
        assert_eq!(stats.total_size(), 150);
        assert_eq!(stats.files_uploaded(), 2);
    }
}
