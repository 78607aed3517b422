//! Shared error types used across panup crates.

use thiserror::Error;

/// Malformed remote path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Remote paths are rooted at the drive root.
    #[error("Remote path must start with '/': {path}")]
    NotAbsolute { path: String },

    /// Path names no file (empty, root only, or trailing separator).
    #[error("Remote path does not name a file: {path}")]
    InvalidPath { path: String },
}

impl PathError {
    /// The path that was rejected.
    pub fn path(&self) -> &str {
        match self {
            PathError::NotAbsolute { path } | PathError::InvalidPath { path } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_path() {
        let err = PathError::NotAbsolute {
            path: "backup/a.txt".to_string(),
        };
        assert_eq!(err.path(), "backup/a.txt");
        assert!(err.to_string().contains("backup/a.txt"));
    }
}
