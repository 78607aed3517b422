//! Error types for upload operations.

use std::collections::HashMap;

use panup_common::PathError;
use thiserror::Error;

use crate::store::StoreError;

/// Kind of failure reported by the remote drive API.
///
/// The API client maps its wire-level error codes to these kinds so the
/// orchestrator never has to inspect concrete error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// Target object does not exist.
    FileNotFound,
    /// Drive storage quota is used up.
    QuotaExhausted,
    /// Access token expired or was revoked.
    AccessTokenInvalid,
    /// Request was throttled by the remote.
    RateLimited,
    /// A part was submitted out of order or concurrently.
    PartNotSequential,
    /// Remote answered with a server-side failure.
    Server,
    /// Transport failure before a response was received.
    Network,
    /// Response did not match any known error shape.
    Unrecognized,
}

/// Error returned by the remote drive API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code: {code})")]
pub struct ApiError {
    /// Classified kind.
    pub kind: ApiErrorKind,
    /// Raw error code as reported by the remote.
    pub code: String,
    /// Human-readable message as reported by the remote.
    pub message: String,
}

impl ApiError {
    /// Create a new API error.
    ///
    /// # Arguments
    /// * `kind` - Classified error kind
    /// * `code` - Raw remote error code
    /// * `message` - Remote error message
    pub fn new(kind: ApiErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Check if this error means the object does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::FileNotFound
    }
}

/// Decides whether a remote error is worth another attempt.
///
/// Recognized kinds are retryable unless overridden; `Unrecognized`
/// errors are never retried.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    overrides: HashMap<ApiErrorKind, bool>,
}

impl RetryPolicy {
    /// Create a policy with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override retry eligibility for one error kind.
    ///
    /// # Arguments
    /// * `kind` - Error kind to override
    /// * `retryable` - Whether errors of this kind should be retried
    pub fn with_override(mut self, kind: ApiErrorKind, retryable: bool) -> Self {
        self.overrides.insert(kind, retryable);
        self
    }

    /// Check if a remote API error is retryable.
    pub fn is_retryable(&self, err: &ApiError) -> bool {
        if err.kind == ApiErrorKind::Unrecognized {
            return false;
        }
        self.overrides.get(&err.kind).copied().unwrap_or(true)
    }

    /// Check if any upload error is retryable.
    pub fn classify(&self, err: &UploadError) -> bool {
        match err {
            UploadError::Api(e) => self.is_retryable(e),
            UploadError::Transfer(TransferError::Api(e)) => self.is_retryable(e),
            UploadError::Transfer(_) => false,
            UploadError::IoError { .. } => false,
            UploadError::InvalidPath(_) => false,
            UploadError::Store(_) => false,
            UploadError::Other { .. } => false,
        }
    }
}

/// Errors produced by the chunked transfer engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The remote rejected a part or the completion call.
    #[error("Remote API error: {0}")]
    Api(#[from] ApiError),

    /// Local source could not be read.
    #[error("I/O error for {path}: {message}")]
    IoError { path: String, message: String },

    /// A resumable snapshot does not fit this transfer.
    #[error("Incompatible transfer state: {reason}")]
    IncompatibleState { reason: String },

    /// Operation cancelled by a status observer.
    #[error("Transfer cancelled")]
    Cancelled,
}

/// Errors that can occur while running an upload task.
#[derive(Error, Debug, Clone)]
pub enum UploadError {
    /// Local I/O error.
    #[error("I/O error for {path}: {message}")]
    IoError { path: String, message: String },

    /// Remote API error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Chunked transfer failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Malformed remote path.
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    /// Durable store failure.
    #[error("Store error: {0}")]
    Store(String),

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl UploadError {
    /// Build an I/O error for a local path.
    ///
    /// # Arguments
    /// * `path` - Local path being accessed
    /// * `err` - The underlying IO error
    pub fn io(path: impl Into<String>, err: std::io::Error) -> Self {
        UploadError::IoError {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for UploadError {
    fn from(err: StoreError) -> Self {
        UploadError::Store(err.to_string())
    }
}
