//! Shared constants used across panup crates.

/// Largest file size eligible for rapid upload (20 GiB).
/// The remote never grants instant completion above this size.
pub const MAX_RAPID_UPLOAD_SIZE: u64 = 20 * 1024 * 1024 * 1024;

/// Default part size for chunked transfers (10 MiB).
pub const DEFAULT_BLOCK_SIZE: u64 = 10 * 1024 * 1024;

/// Content hash the remote expects for empty files (SHA-1 of zero bytes).
pub const DEFAULT_ZERO_SIZE_FILE_CONTENT_HASH: &str = "DA39A3EE5E6B4B0D3255BFEF95601890AFD80709";

/// Folder id of the drive root.
pub const ROOT_FOLDER_ID: &str = "root";

/// Proof code algorithm version sent alongside the proof.
pub const PROOF_VERSION: &str = "v1";

/// Wait after creating a remote folder before it shows up in listings.
pub const DEFAULT_FOLDER_SETTLE_DELAY_MS: u64 = 2_000;

/// Wait after deleting a remote object before re-creating the same path.
pub const DEFAULT_DELETE_SETTLE_DELAY_MS: u64 = 500;
