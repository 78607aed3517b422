//! Resumable snapshot of a chunked transfer.

use serde::{Deserialize, Serialize};

use super::parts::{generate_parts, PartInfo};
use crate::error::TransferError;
use crate::types::UploadSession;

/// Snapshot format version understood by this engine.
pub const INSTANCE_STATE_VERSION: u32 = 1;

/// Progress of one part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartState {
    pub part_number: u32,
    pub offset: u64,
    pub length: u64,
    /// Whether the remote accepted this part.
    pub acknowledged: bool,
}

/// Everything needed to continue a transfer after a restart.
///
/// Carries the session so a new process can resume without asking the
/// remote for another one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    pub version: u32,
    pub session: UploadSession,
    pub total_size: u64,
    pub block_size: u64,
    pub parts: Vec<PartState>,
}

impl InstanceState {
    /// Create a snapshot with no part acknowledged.
    pub fn new(
        session: UploadSession,
        total_size: u64,
        block_size: u64,
        parts: &[PartInfo],
    ) -> Self {
        Self {
            version: INSTANCE_STATE_VERSION,
            session,
            total_size,
            block_size,
            parts: parts
                .iter()
                .map(|p| PartState {
                    part_number: p.part_number,
                    offset: p.offset,
                    length: p.length,
                    acknowledged: false,
                })
                .collect(),
        }
    }

    /// Bytes acknowledged by the remote.
    pub fn uploaded_bytes(&self) -> u64 {
        self.parts
            .iter()
            .filter(|p| p.acknowledged)
            .map(|p| p.length)
            .sum()
    }

    /// Number of acknowledged parts.
    pub fn acknowledged_parts(&self) -> usize {
        self.parts.iter().filter(|p| p.acknowledged).count()
    }

    /// Check whether every part was acknowledged.
    pub fn is_complete(&self) -> bool {
        self.parts.iter().all(|p| p.acknowledged)
    }

    /// Mark a part as accepted by the remote.
    pub fn acknowledge(&mut self, part_number: u32) {
        if let Some(part) = self.parts.iter_mut().find(|p| p.part_number == part_number) {
            part.acknowledged = true;
        }
    }

    /// Check that this snapshot belongs to the given transfer.
    ///
    /// # Arguments
    /// * `session` - Session the transfer runs against
    /// * `total_size` - Size of the source
    /// * `block_size` - Part size of the transfer
    ///
    /// # Errors
    /// Returns `TransferError::IncompatibleState` naming the first mismatch.
    pub fn validate(
        &self,
        session: &UploadSession,
        total_size: u64,
        block_size: u64,
    ) -> Result<(), TransferError> {
        if self.version != INSTANCE_STATE_VERSION {
            return Err(incompatible(format!(
                "snapshot version {} is not supported (expected {})",
                self.version, INSTANCE_STATE_VERSION
            )));
        }
        if self.session.upload_id != session.upload_id || self.session.file_id != session.file_id {
            return Err(incompatible("snapshot belongs to another upload session"));
        }
        if self.total_size != total_size {
            return Err(incompatible(format!(
                "snapshot size {} does not match source size {}",
                self.total_size, total_size
            )));
        }
        if self.block_size != block_size {
            return Err(incompatible(format!(
                "snapshot block size {} does not match {}",
                self.block_size, block_size
            )));
        }

        let plan: Vec<PartInfo> = generate_parts(total_size, block_size);
        let same_plan: bool = plan.len() == self.parts.len()
            && plan.iter().zip(&self.parts).all(|(expected, saved)| {
                expected.part_number == saved.part_number
                    && expected.offset == saved.offset
                    && expected.length == saved.length
            });
        if !same_plan {
            return Err(incompatible("snapshot part plan does not match"));
        }

        // Parts are acknowledged strictly in order
        let acknowledged: usize = self.acknowledged_parts();
        if self.parts[..acknowledged].iter().any(|p| !p.acknowledged) {
            return Err(incompatible("acknowledged parts are not contiguous"));
        }

        Ok(())
    }
}

fn incompatible(reason: impl Into<String>) -> TransferError {
    TransferError::IncompatibleState {
        reason: reason.into(),
    }
}
