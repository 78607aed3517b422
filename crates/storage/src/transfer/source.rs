//! Byte sources for chunked transfers.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use crate::error::TransferError;

/// Seekable, length-aware byte source.
#[async_trait]
pub trait PartSource: Send + Sync {
    /// Total length in bytes.
    fn len(&self) -> u64;

    /// Check whether the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly `length` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns `TransferError::IoError` if the range cannot be read.
    async fn read_range(&self, offset: u64, length: u64) -> Result<Vec<u8>, TransferError>;
}

/// Local file source.
pub struct FileSource {
    path: PathBuf,
    size: u64,
    file: Mutex<File>,
}

impl FileSource {
    /// Open a local file for reading.
    ///
    /// # Errors
    /// Returns `TransferError::IoError` if the file cannot be opened.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let file: File = File::open(path).await.map_err(|e| io_error(path, e))?;
        let size: u64 = file.metadata().await.map_err(|e| io_error(path, e))?.len();
        Ok(Self {
            path: path.to_path_buf(),
            size,
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl PartSource for FileSource {
    fn len(&self) -> u64 {
        self.size
    }

    async fn read_range(&self, offset: u64, length: u64) -> Result<Vec<u8>, TransferError> {
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| io_error(&self.path, e))?;

        let mut buffer: Vec<u8> = vec![0u8; length as usize];
        file.read_exact(&mut buffer)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        Ok(buffer)
    }
}

/// In-memory source.
pub struct BytesSource {
    data: Vec<u8>,
}

impl BytesSource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl PartSource for BytesSource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_range(&self, offset: u64, length: u64) -> Result<Vec<u8>, TransferError> {
        let start: usize = offset as usize;
        let end: usize = start.saturating_add(length as usize);
        self.data
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| TransferError::IoError {
                path: "<memory>".to_string(),
                message: format!("range {}..{} out of bounds", start, end),
            })
    }
}

fn io_error(path: &Path, err: std::io::Error) -> TransferError {
    TransferError::IoError {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
