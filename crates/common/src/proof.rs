//! Proof code computation for rapid upload.
//!
//! A proof code shows the client holds the file content without sending it.
//! It is bound to the caller's access token: the token's MD5 selects an
//! offset inside the file, and up to 8 bytes at that offset are returned
//! base64-encoded.

use std::io::{Read, Seek, SeekFrom};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};

/// Number of content bytes sampled into a v1 proof code.
const PROOF_SAMPLE_LEN: u64 = 8;

/// Compute the offset sampled for a given token and file size.
///
/// # Arguments
/// * `access_token` - Current access token of the drive session
/// * `size` - File size in bytes (must be non-zero)
fn proof_offset(access_token: &str, size: u64) -> u64 {
    let mut hasher = Md5::new();
    hasher.update(access_token.as_bytes());
    let digest: String = hex::encode(hasher.finalize());
    // 16 hex digits always fit in a u64.
    let seed: u64 = u64::from_str_radix(&digest[..16], 16).unwrap_or(0);
    seed % size
}

/// Compute a v1 proof code over a seekable reader.
///
/// # Arguments
/// * `access_token` - Current access token of the drive session
/// * `reader` - File content, positioned anywhere
/// * `size` - File size in bytes
///
/// # Returns
/// Base64-encoded sample bytes, or an empty string for empty files.
///
/// # Errors
/// Returns error if the sampled range cannot be read.
pub fn calc_proof_code<R: Read + Seek>(
    access_token: &str,
    reader: &mut R,
    size: u64,
) -> Result<String, std::io::Error> {
    if size == 0 {
        return Ok(String::new());
    }

    let start: u64 = proof_offset(access_token, size);
    let end: u64 = std::cmp::min(start + PROOF_SAMPLE_LEN, size);

    let mut buffer: Vec<u8> = vec![0u8; (end - start) as usize];
    reader.seek(SeekFrom::Start(start))?;
    reader.read_exact(&mut buffer)?;

    Ok(STANDARD.encode(&buffer))
}
