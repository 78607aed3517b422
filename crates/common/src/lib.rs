//! Shared types and utilities for panup.
//!
//! This crate provides common functionality used by the upload engine:
//! - Content hashing (SHA-1) and rapid-upload proof codes
//! - Remote path normalization
//! - Human-readable size and duration formatting
//! - Shared constants and error types

pub mod constants;
pub mod error;
pub mod format;
pub mod hash;
pub mod path_utils;
pub mod proof;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::PathError;
pub use format::{convert_file_size, convert_time};
pub use hash::{content_hash_eq, hash_bytes, hash_file, Sha1Hasher};
pub use path_utils::{clean_remote_path, is_root, path_segments, split_save_path};
pub use proof::calc_proof_code;
