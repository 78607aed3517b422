//! Part planning for chunked transfers.
//!
//! Pure logic, no I/O.

/// One part of a chunked transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartInfo {
    /// One-based part number.
    pub part_number: u32,
    /// Byte offset within the file.
    pub offset: u64,
    /// Length of this part in bytes.
    pub length: u64,
}

/// Split a file into parts.
///
/// The last part may be smaller than `block_size`. A zero-size file still
/// has one (empty) part, and a `block_size` of 0 sends the file as a single
/// part.
///
/// # Arguments
/// * `size` - Total file size in bytes
/// * `block_size` - Size of each part
///
/// # Returns
/// Parts in ascending order, numbered from 1.
pub fn generate_parts(size: u64, block_size: u64) -> Vec<PartInfo> {
    if block_size == 0 || size == 0 {
        return vec![PartInfo {
            part_number: 1,
            offset: 0,
            length: size,
        }];
    }

    let mut parts = Vec::with_capacity(expected_part_count(size, block_size));
    let mut offset = 0u64;
    let mut part_number = 1u32;

    while offset < size {
        let length = std::cmp::min(block_size, size - offset);
        parts.push(PartInfo {
            part_number,
            offset,
            length,
        });
        offset += length;
        part_number += 1;
    }

    parts
}

/// Calculate the expected number of parts for a file.
pub fn expected_part_count(size: u64, block_size: u64) -> usize {
    if block_size == 0 || size == 0 {
        return 1;
    }
    size.div_ceil(block_size) as usize
}
