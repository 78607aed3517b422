//! Sequential multi-part uploader.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::parts::generate_parts;
use super::source::PartSource;
use super::state::{InstanceState, PartState};
use super::status::{rate, StatusObserver, TransferStatus};
use crate::error::TransferError;
use crate::traits::PartSink;
use crate::types::UploadSession;

/// Settings for a [`MultiUploader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiUploaderConfig {
    /// Requested parallelism. Only 1 is honored.
    pub parallel: usize,
    /// Part size in bytes.
    pub block_size: u64,
    /// Bandwidth cap in bytes per second (0 = unlimited).
    pub max_rate: u64,
}

impl Default for MultiUploaderConfig {
    fn default() -> Self {
        Self {
            parallel: 1,
            block_size: panup_common::DEFAULT_BLOCK_SIZE,
            max_rate: 0,
        }
    }
}

/// Sends one session's parts to a [`PartSink`].
///
/// Parts go out one at a time in ascending order starting at 1; the remote
/// rejects anything else. Already acknowledged parts of an imported
/// snapshot are skipped.
pub struct MultiUploader {
    sink: Arc<dyn PartSink>,
    source: Box<dyn PartSource>,
    config: MultiUploaderConfig,
    session: UploadSession,
    state: InstanceState,
    observer: Option<Arc<dyn StatusObserver>>,
}

impl MultiUploader {
    /// Create an uploader for a fresh transfer.
    ///
    /// # Arguments
    /// * `sink` - Part transmitter
    /// * `source` - Bytes to send
    /// * `config` - Transfer settings
    /// * `session` - Remote session the parts belong to
    pub fn new(
        sink: Arc<dyn PartSink>,
        source: impl PartSource + 'static,
        mut config: MultiUploaderConfig,
        session: UploadSession,
    ) -> Self {
        if config.parallel != 1 {
            log::warn!(
                "Parallel part upload ({}) is not supported by the remote, using 1",
                config.parallel
            );
            config.parallel = 1;
        }

        let total_size: u64 = source.len();
        let parts = generate_parts(total_size, config.block_size);
        let state = InstanceState::new(session.clone(), total_size, config.block_size, &parts);

        Self {
            sink,
            source: Box::new(source),
            config,
            session,
            state,
            observer: None,
        }
    }

    /// Import a snapshot saved by an earlier run.
    ///
    /// # Errors
    /// Returns `TransferError::IncompatibleState` if the snapshot does not
    /// belong to this transfer; the current state is left untouched.
    pub fn set_instance_state(&mut self, state: InstanceState) -> Result<(), TransferError> {
        state.validate(&self.session, self.source.len(), self.config.block_size)?;
        self.state = state;
        Ok(())
    }

    /// Export the current snapshot.
    pub fn instance_state(&self) -> InstanceState {
        self.state.clone()
    }

    /// Subscribe to status events.
    pub fn on_status(&mut self, observer: Arc<dyn StatusObserver>) {
        self.observer = Some(observer);
    }

    /// Effective settings.
    pub fn config(&self) -> &MultiUploaderConfig {
        &self.config
    }

    /// Send every pending part, then finalize the session.
    ///
    /// # Errors
    /// Returns the first read, sink or completion failure, or
    /// `TransferError::Cancelled` if the observer asked to stop.
    pub async fn execute(&mut self) -> Result<(), TransferError> {
        let start: Instant = Instant::now();
        let pending: Vec<PartState> = self
            .state
            .parts
            .iter()
            .filter(|p| !p.acknowledged)
            .cloned()
            .collect();

        for part in pending {
            let part_start: Instant = Instant::now();

            let data: Vec<u8> = self.source.read_range(part.offset, part.length).await?;
            self.sink
                .upload_part(&self.session, part.part_number, data)
                .await?;
            self.state.acknowledge(part.part_number);

            self.throttle(part.length, part_start.elapsed()).await;

            let status = TransferStatus {
                uploaded: self.state.uploaded_bytes(),
                total_size: self.state.total_size,
                speed_per_second: rate(part.length, part_start.elapsed()),
                elapsed: start.elapsed(),
            };
            if let Some(observer) = &self.observer {
                if !observer.on_status(&status, &self.state).await {
                    return Err(TransferError::Cancelled);
                }
            }
        }

        self.sink.complete_upload(&self.session).await?;
        Ok(())
    }

    /// Sleep long enough to keep the part under `max_rate`.
    async fn throttle(&self, length: u64, spent: Duration) {
        if self.config.max_rate == 0 || length == 0 {
            return;
        }
        let budget: Duration = Duration::from_secs_f64(length as f64 / self.config.max_rate as f64);
        if let Some(wait) = budget.checked_sub(spent) {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ApiErrorKind};
    use crate::transfer::source::BytesSource;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        parts: Mutex<Vec<(u32, Vec<u8>)>>,
        completed: Mutex<u32>,
        fail_on_part: Option<u32>,
    }

    #[async_trait]
    impl PartSink for RecordingSink {
        async fn upload_part(
            &self,
            _session: &UploadSession,
            part_number: u32,
            data: Vec<u8>,
        ) -> Result<(), ApiError> {
            if self.fail_on_part == Some(part_number) {
                return Err(ApiError::new(ApiErrorKind::Network, "Timeout", "connection reset"));
            }
            self.parts.lock().unwrap().push((part_number, data));
            Ok(())
        }

        async fn complete_upload(&self, _session: &UploadSession) -> Result<(), ApiError> {
            *self.completed.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct CheckpointRecorder {
        checkpoints: Mutex<Vec<InstanceState>>,
        stop_after: Option<usize>,
    }

    #[async_trait]
    impl StatusObserver for CheckpointRecorder {
        async fn on_status(&self, _status: &TransferStatus, checkpoint: &InstanceState) -> bool {
            let mut checkpoints = self.checkpoints.lock().unwrap();
            checkpoints.push(checkpoint.clone());
            self.stop_after.map_or(true, |n| checkpoints.len() < n)
        }
    }

    fn session() -> UploadSession {
        UploadSession {
            drive_id: "d1".into(),
            file_id: "f1".into(),
            upload_id: "u1".into(),
            parent_file_id: "root".into(),
            file_name: "a.bin".into(),
            rapid_upload: false,
            block_size: 4,
            part_info_list: Vec::new(),
        }
    }

    fn config(parallel: usize) -> MultiUploaderConfig {
        MultiUploaderConfig {
            parallel,
            block_size: 4,
            max_rate: 0,
        }
    }

    #[tokio::test]
    async fn test_parts_sent_in_ascending_order() {
        let sink = Arc::new(RecordingSink::default());
        let mut uploader = MultiUploader::new(
            sink.clone(),
            BytesSource::new(b"0123456789".to_vec()),
            config(4),
            session(),
        );
        assert_eq!(uploader.config().parallel, 1);

        uploader.execute().await.unwrap();

        let parts = sink.parts.lock().unwrap().clone();
        assert_eq!(
            parts,
            vec![
                (1, b"0123".to_vec()),
                (2, b"4567".to_vec()),
                (3, b"89".to_vec())
            ]
        );
        assert_eq!(*sink.completed.lock().unwrap(), 1);
        assert!(uploader.instance_state().is_complete());
    }

    #[tokio::test]
    async fn test_empty_source_sends_one_empty_part() {
        let sink = Arc::new(RecordingSink::default());
        let mut uploader =
            MultiUploader::new(sink.clone(), BytesSource::new(Vec::new()), config(1), session());
        uploader.execute().await.unwrap();
        assert_eq!(*sink.parts.lock().unwrap(), vec![(1, Vec::new())]);
    }

    #[tokio::test]
    async fn test_resume_skips_acknowledged_parts() {
        let first_sink = Arc::new(RecordingSink {
            fail_on_part: Some(3),
            ..Default::default()
        });
        let mut first = MultiUploader::new(
            first_sink.clone(),
            BytesSource::new(b"0123456789".to_vec()),
            config(1),
            session(),
        );
        let err = first.execute().await.unwrap_err();
        assert!(matches!(err, TransferError::Api(_)));
        let saved = first.instance_state();
        assert_eq!(saved.acknowledged_parts(), 2);

        let second_sink = Arc::new(RecordingSink::default());
        let mut second = MultiUploader::new(
            second_sink.clone(),
            BytesSource::new(b"0123456789".to_vec()),
            config(1),
            session(),
        );
        second.set_instance_state(saved).unwrap();
        second.execute().await.unwrap();

        assert_eq!(*second_sink.parts.lock().unwrap(), vec![(3, b"89".to_vec())]);
        assert_eq!(*second_sink.completed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incompatible_snapshot_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let mut uploader = MultiUploader::new(
            sink,
            BytesSource::new(b"0123456789".to_vec()),
            config(1),
            session(),
        );

        let mut foreign = uploader.instance_state();
        foreign.version += 1;
        foreign.acknowledge(1);
        assert!(matches!(
            uploader.set_instance_state(foreign),
            Err(TransferError::IncompatibleState { .. })
        ));
        assert_eq!(uploader.instance_state().acknowledged_parts(), 0);
    }

    #[tokio::test]
    async fn test_observer_receives_checkpoints_and_can_cancel() {
        let sink = Arc::new(RecordingSink::default());
        let observer = Arc::new(CheckpointRecorder {
            checkpoints: Mutex::new(Vec::new()),
            stop_after: Some(2),
        });
        let mut uploader = MultiUploader::new(
            sink.clone(),
            BytesSource::new(b"0123456789".to_vec()),
            config(1),
            session(),
        );
        uploader.on_status(observer.clone());

        let err = uploader.execute().await.unwrap_err();
        assert_eq!(err, TransferError::Cancelled);

        let checkpoints = observer.checkpoints.lock().unwrap();
        assert_eq!(checkpoints.len(), 2);
        assert_eq!(checkpoints[1].uploaded_bytes(), 8);
        assert_eq!(*sink.completed.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_rate_throttles() {
        let sink = Arc::new(RecordingSink::default());
        let mut uploader = MultiUploader::new(
            sink,
            BytesSource::new(vec![0u8; 8]),
            MultiUploaderConfig {
                parallel: 1,
                block_size: 4,
                max_rate: 2,
            },
            session(),
        );

        let start = tokio::time::Instant::now();
        uploader.execute().await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(4));
    }
}
