//! Transfer status events.

use std::time::Duration;

use async_trait::async_trait;

use super::state::InstanceState;

/// Progress of a running transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatus {
    /// Bytes acknowledged so far.
    pub uploaded: u64,
    /// Total bytes to send.
    pub total_size: u64,
    /// Rate of the most recent part in bytes per second.
    pub speed_per_second: u64,
    /// Time since the transfer started.
    pub elapsed: Duration,
}

/// Receives status events from a transfer.
#[async_trait]
pub trait StatusObserver: Send + Sync {
    /// Called after each acknowledged part.
    ///
    /// # Arguments
    /// * `status` - Current progress
    /// * `checkpoint` - Snapshot including the part just acknowledged
    ///
    /// # Returns
    /// - `true` to continue the transfer
    /// - `false` to cancel it
    async fn on_status(&self, status: &TransferStatus, checkpoint: &InstanceState) -> bool;
}

/// Observer that ignores every event.
pub struct NoOpObserver;

#[async_trait]
impl StatusObserver for NoOpObserver {
    async fn on_status(&self, _status: &TransferStatus, _checkpoint: &InstanceState) -> bool {
        true
    }
}

/// Bytes per second for `bytes` sent in `elapsed`.
pub(crate) fn rate(bytes: u64, elapsed: Duration) -> u64 {
    let secs: f64 = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return bytes;
    }
    (bytes as f64 / secs) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate() {
        assert_eq!(rate(1000, Duration::from_secs(2)), 500);
        assert_eq!(rate(1000, Duration::ZERO), 1000);
    }
}
