//! Content hash computation.
//!
//! The remote identifies file content by its SHA-1 digest. Hashes are
//! produced as 40-character lowercase hex; compare with
//! [`content_hash_eq`] since the remote reports them uppercase.

use std::io::Read;
use std::path::Path;

use sha1::{Digest, Sha1};

/// Compute the SHA-1 hash of a byte slice.
///
/// # Arguments
/// * `data` - Bytes to hash
///
/// # Returns
/// 40-character lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the SHA-1 hash of a file.
///
/// Reads the file in chunks to avoid loading entire file into memory.
///
/// # Arguments
/// * `path` - Path to the file to hash
///
/// # Returns
/// 40-character lowercase hex string.
///
/// # Errors
/// Returns error if file cannot be read.
pub fn hash_file(path: &Path) -> Result<String, std::io::Error> {
    let mut file: std::fs::File = std::fs::File::open(path)?;
    let mut hasher: Sha1Hasher = Sha1Hasher::new();
    let mut buffer: Vec<u8> = vec![0u8; 256 * 1024];

    loop {
        let bytes_read: usize = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finish_hex())
}

/// Compare two content hashes ignoring hex case.
pub fn content_hash_eq(a: &str, b: &str) -> bool {
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

/// Streaming hasher for incremental SHA-1 hashing.
pub struct Sha1Hasher {
    inner: Sha1,
}

impl Sha1Hasher {
    /// Create a new streaming hasher.
    pub fn new() -> Self {
        Self { inner: Sha1::new() }
    }

    /// Update the hasher with additional data.
    ///
    /// # Arguments
    /// * `data` - Bytes to add to the hash computation
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the hash as 40-char lowercase hex string.
    pub fn finish_hex(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

impl Default for Sha1Hasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::constants::DEFAULT_ZERO_SIZE_FILE_CONTENT_HASH;

    #[test]
    fn test_hash_bytes_empty_matches_zero_size_constant() {
        let hash: String = hash_bytes(b"");
        assert!(content_hash_eq(&hash, DEFAULT_ZERO_SIZE_FILE_CONTENT_HASH));
    }

    #[test]
    fn test_hash_bytes_known_value() {
        assert_eq!(
            hash_bytes(b"hello world"),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
    }

    #[test]
    fn test_incremental_matches_direct() {
        let mut hasher: Sha1Hasher = Sha1Hasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finish_hex(), hash_bytes(b"hello world"));
    }

    #[test]
    fn test_hash_file() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let file_path: std::path::PathBuf = dir.path().join("test.txt");

        let mut file: std::fs::File = std::fs::File::create(&file_path).unwrap();
        file.write_all(b"hello world").unwrap();
        drop(file);

        assert_eq!(hash_file(&file_path).unwrap(), hash_bytes(b"hello world"));
    }

    #[test]
    fn test_hash_file_not_found() {
        assert!(hash_file(Path::new("/nonexistent/file.txt")).is_err());
    }

    #[test]
    fn test_content_hash_eq_ignores_case() {
        assert!(content_hash_eq("abcdef", "ABCDEF"));
        assert!(!content_hash_eq("abcdef", "abcdee"));
        assert!(!content_hash_eq("", ""));
    }
}
