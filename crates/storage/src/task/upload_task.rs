//! Task unit that uploads one local file to one remote path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use panup_common::{
    calc_proof_code, clean_remote_path, content_hash_eq, convert_file_size, convert_time,
    split_save_path, DEFAULT_ZERO_SIZE_FILE_CONTENT_HASH, MAX_RAPID_UPLOAD_SIZE, PROOF_VERSION,
};

use super::folder::FolderCreateLock;
use super::{ResultCode, TaskInfo, TaskUnit, TaskUnitRunResult};
use crate::error::{ApiError, ApiErrorKind, RetryPolicy, UploadError};
use crate::local_file::LocalFileRecord;
use crate::sync_db::{SyncDatabase, SyncRecord};
use crate::traits::{DriveClient, PartSink};
use crate::transfer::{
    FileSource, InstanceState, MultiUploader, MultiUploaderConfig, StatusObserver, TransferStatus,
};
use crate::types::{CreateUploadParams, DeleteTarget, FileInfo, UploadOptions, UploadStatistic};
use crate::uploading_db::{FileIdentity, UploadingDatabase};

/// Collaborators shared by every upload task unit of a run.
#[derive(Clone)]
pub struct UploadContext {
    /// Target drive.
    pub drive_id: String,
    /// Transmitter for chunked transfers.
    pub sink: Arc<dyn PartSink>,
    pub folder_lock: Arc<FolderCreateLock>,
    pub uploading_db: Arc<UploadingDatabase>,
    /// Enables sync semantics: unchanged files are skipped and existing
    /// remote files are always overwritten.
    pub sync_db: Option<Arc<SyncDatabase>>,
    pub statistic: Arc<UploadStatistic>,
    pub options: UploadOptions,
    pub retry_policy: RetryPolicy,
}

/// Steps of one upload attempt.
#[derive(Debug, Clone)]
pub enum UploadStep {
    /// Open the local file and pick where to start.
    Init,
    /// Hash, resolve the parent folder and create a session.
    PrepareUpload,
    /// Check whether the remote completed the file instantly.
    RapidUpload,
    /// Send the bytes part by part.
    ChunkedUpload,
    Succeeded(Completion),
    Failed(UploadError),
}

/// Ways an upload attempt can succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Uploaded,
    RapidUploaded,
    AlreadyConsistent,
    RemoteMatched,
}

impl From<Completion> for ResultCode {
    fn from(completion: Completion) -> Self {
        match completion {
            Completion::Uploaded => ResultCode::Uploaded,
            Completion::RapidUploaded => ResultCode::RapidUploaded,
            Completion::AlreadyConsistent => ResultCode::AlreadyConsistent,
            Completion::RemoteMatched => ResultCode::RemoteMatched,
        }
    }
}

impl UploadStep {
    fn name(&self) -> &'static str {
        match self {
            UploadStep::Init => "init",
            UploadStep::PrepareUpload => "prepare upload",
            UploadStep::RapidUpload => "rapid upload",
            UploadStep::ChunkedUpload => "chunked upload",
            UploadStep::Succeeded(_) => "succeeded",
            UploadStep::Failed(_) => "failed",
        }
    }
}

enum StepOutcome {
    Next(UploadStep),
    Done(TaskUnitRunResult),
}

/// Step to take once a session exists for a file of `size` bytes.
///
/// Rapid upload is skipped when disabled or when the file is larger than
/// the remote accepts for it.
pub fn select_transfer_step(options: &UploadOptions, size: u64) -> UploadStep {
    if options.no_rapid_upload || size > MAX_RAPID_UPLOAD_SIZE {
        UploadStep::ChunkedUpload
    } else {
        UploadStep::RapidUpload
    }
}

/// Uploads one local file to one remote path.
///
/// A unit keeps what it learned (content hash, session, parent folder)
/// across attempts while the local file keeps its size and modification
/// time, so a retry picks up where the previous attempt failed. A session
/// the remote rejects for good is dropped along with its saved progress.
pub struct UploadTaskUnit<C: DriveClient> {
    client: Arc<C>,
    ctx: UploadContext,
    info: Arc<TaskInfo>,
    local_path: PathBuf,
    save_path: String,
    record: Option<LocalFileRecord>,
    resume_state: Option<InstanceState>,
    remote_info: Option<FileInfo>,
}

impl<C: DriveClient> UploadTaskUnit<C> {
    /// Create a task unit.
    ///
    /// # Arguments
    /// * `client` - Remote drive API
    /// * `ctx` - Shared collaborators and options
    /// * `info` - Task identity and retry counters
    /// * `local_path` - File to upload
    /// * `save_path` - Absolute remote destination path
    pub fn new(
        client: Arc<C>,
        ctx: UploadContext,
        info: Arc<TaskInfo>,
        local_path: impl Into<PathBuf>,
        save_path: &str,
    ) -> Self {
        Self {
            client,
            ctx,
            info,
            local_path: local_path.into(),
            save_path: clean_remote_path(save_path),
            record: None,
            resume_state: None,
            remote_info: None,
        }
    }

    /// Local file state gathered so far.
    pub fn record(&self) -> Option<&LocalFileRecord> {
        self.record.as_ref()
    }

    pub fn info(&self) -> &TaskInfo {
        &self.info
    }

    pub fn save_path(&self) -> &str {
        &self.save_path
    }

    async fn drive(&mut self, mut step: UploadStep) -> TaskUnitRunResult {
        let mut failed_at: &'static str = step.name();
        loop {
            let current: &'static str = step.name();
            let outcome: Result<StepOutcome, UploadError> = match step {
                UploadStep::Init => self.init().await,
                UploadStep::PrepareUpload => self.prepare_upload().await,
                UploadStep::RapidUpload => self.rapid_upload(),
                UploadStep::ChunkedUpload => self.chunked_upload().await,
                UploadStep::Succeeded(code) => Ok(StepOutcome::Done(self.succeed(code))),
                UploadStep::Failed(err) => Ok(StepOutcome::Done(self.fail(failed_at, err))),
            };

            match outcome {
                Ok(StepOutcome::Next(next)) => {
                    log::debug!("[{}] {} -> {}", self.info.id(), current, next.name());
                    step = next;
                }
                Ok(StepOutcome::Done(result)) => return result,
                Err(err) => {
                    failed_at = current;
                    step = UploadStep::Failed(err);
                }
            }
        }
    }

    async fn init(&mut self) -> Result<StepOutcome, UploadError> {
        let fresh: LocalFileRecord = LocalFileRecord::open(&self.local_path).await?;
        let opened: LocalFileRecord = match self.record.take() {
            Some(previous) if previous.same_stat(&fresh) => previous,
            Some(previous) => {
                log::info!(
                    "[{}] {} changed since the last attempt, starting over",
                    self.info.id(),
                    previous.path_str()
                );
                self.resume_state = None;
                fresh
            }
            None => fresh,
        };
        let record: &mut LocalFileRecord = self.record.insert(opened);

        if self.ctx.uploading_db.has_entry(&record.path_str()) {
            record.sum().await?;
            if let Some(state) = self.ctx.uploading_db.search(&record.identity()) {
                log::info!(
                    "[{}] Resuming {} at {}/{} parts",
                    self.info.id(),
                    record.path_str(),
                    state.acknowledged_parts(),
                    state.parts.len()
                );
                record.upload_session = Some(state.session.clone());
                self.resume_state = Some(state);
                return Ok(StepOutcome::Next(UploadStep::ChunkedUpload));
            }
        }

        if record.upload_session.is_some() {
            return Ok(StepOutcome::Next(select_transfer_step(
                &self.ctx.options,
                record.size,
            )));
        }
        Ok(StepOutcome::Next(UploadStep::PrepareUpload))
    }

    async fn prepare_upload(&mut self) -> Result<StepOutcome, UploadError> {
        let (dir, name) = split_save_path(&self.save_path)?;
        let record: &mut LocalFileRecord = self.record.as_mut().ok_or_else(record_missing)?;
        let overwrite: bool = self.ctx.options.is_overwrite || self.ctx.sync_db.is_some();

        let hash: String = record.sum().await?;

        if let Some(synced) = self.ctx.sync_db.as_ref().and_then(|db| db.get(&self.save_path)) {
            if !synced.is_folder && content_hash_eq(&synced.content_hash, &hash) {
                return Ok(StepOutcome::Next(UploadStep::Succeeded(
                    Completion::AlreadyConsistent,
                )));
            }
        }

        let parent_id: String = self
            .ctx
            .folder_lock
            .resolve(
                &*self.client,
                &self.ctx.drive_id,
                &dir,
                self.ctx.sync_db.as_deref(),
                self.ctx.options.folder_settle_delay(),
            )
            .await?;
        record.parent_folder_id = Some(parent_id.clone());

        if overwrite {
            let existing: Option<FileInfo> = match self
                .client
                .file_info_by_path(&self.ctx.drive_id, &self.save_path)
                .await
            {
                Ok(info) => info,
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            };

            if let Some(info) = existing {
                if !info.is_folder && content_hash_eq(&info.content_hash, &hash) {
                    self.remote_info = Some(info);
                    return Ok(StepOutcome::Next(UploadStep::Succeeded(
                        Completion::RemoteMatched,
                    )));
                }

                let target = DeleteTarget {
                    drive_id: info.drive_id.clone(),
                    file_id: info.file_id.clone(),
                };
                let results = self.client.delete_files(&[target]).await?;
                if results.is_empty() || results.iter().any(|r| !r.success) {
                    return Err(ApiError::new(
                        ApiErrorKind::Server,
                        "DeleteFailed",
                        format!("could not remove existing {}", self.save_path),
                    )
                    .into());
                }
                log::info!(
                    "[{}] Moved existing {} to the recycle bin",
                    self.info.id(),
                    self.save_path
                );

                let settle: Duration = self.ctx.options.delete_settle_delay();
                if !settle.is_zero() {
                    tokio::time::sleep(settle).await;
                }
            }
        }

        let rapid: bool = matches!(
            select_transfer_step(&self.ctx.options, record.size),
            UploadStep::RapidUpload
        );
        let proof_code: Option<String> = if rapid {
            let token: String = self.client.access_token();
            Some(compute_proof_code(token, record.path.clone(), record.size).await?)
        } else {
            None
        };

        let content_hash: String = if record.size == 0 {
            DEFAULT_ZERO_SIZE_FILE_CONTENT_HASH.to_string()
        } else {
            hash.to_uppercase()
        };

        let params = CreateUploadParams {
            drive_id: self.ctx.drive_id.clone(),
            parent_file_id: parent_id,
            name,
            size: record.size,
            content_hash,
            proof_code,
            proof_version: PROOF_VERSION.to_string(),
            block_size: self.ctx.options.block_size,
        };
        let session = self.client.create_upload_session(&params).await?;
        log::debug!(
            "[{}] Created upload session {} for {}",
            self.info.id(),
            session.upload_id,
            self.save_path
        );
        record.upload_session = Some(session);

        Ok(StepOutcome::Next(select_transfer_step(
            &self.ctx.options,
            record.size,
        )))
    }

    fn rapid_upload(&self) -> Result<StepOutcome, UploadError> {
        let record: &LocalFileRecord = self.record.as_ref().ok_or_else(record_missing)?;
        match &record.upload_session {
            Some(session) if session.rapid_upload => Ok(StepOutcome::Next(
                UploadStep::Succeeded(Completion::RapidUploaded),
            )),
            Some(_) => {
                log::debug!(
                    "[{}] Rapid upload declined for {}, sending bytes",
                    self.info.id(),
                    self.save_path
                );
                Ok(StepOutcome::Next(UploadStep::ChunkedUpload))
            }
            None => Ok(StepOutcome::Next(UploadStep::PrepareUpload)),
        }
    }

    async fn chunked_upload(&mut self) -> Result<StepOutcome, UploadError> {
        let record: &LocalFileRecord = self.record.as_ref().ok_or_else(record_missing)?;
        let Some(session) = record.upload_session.clone() else {
            return Ok(StepOutcome::Next(UploadStep::PrepareUpload));
        };

        let identity: FileIdentity = record.identity();
        let size: u64 = record.size;
        let block_size: u64 = if session.block_size > 0 {
            session.block_size
        } else {
            self.ctx.options.block_size
        };
        let config = MultiUploaderConfig {
            parallel: self.ctx.options.parallel,
            block_size,
            max_rate: self.ctx.options.max_upload_rate,
        };

        let source: FileSource = FileSource::open(&record.path).await?;
        let mut uploader = MultiUploader::new(Arc::clone(&self.ctx.sink), source, config, session);

        if let Some(state) = self.resume_state.take() {
            if let Err(e) = uploader.set_instance_state(state) {
                log::warn!(
                    "[{}] Discarding saved progress for {}: {}",
                    self.info.id(),
                    identity.path,
                    e
                );
            }
        }

        let db: &UploadingDatabase = &self.ctx.uploading_db;
        db.update_uploading(&identity, uploader.instance_state());
        save_uploading(db, self.info.id()).await;

        uploader.on_status(Arc::new(PersistProgress {
            task_id: self.info.id().to_string(),
            identity: identity.clone(),
            db: Arc::clone(&self.ctx.uploading_db),
            show_progress: self.ctx.options.show_progress,
        }));
        if let Err(e) = uploader.execute().await {
            let err: UploadError = e.into();
            if !self.ctx.retry_policy.classify(&err) {
                log::warn!(
                    "[{}] Dropping upload session {} for {}",
                    self.info.id(),
                    uploader.instance_state().session.upload_id,
                    identity.path
                );
                db.delete(&identity.path);
                save_uploading(db, self.info.id()).await;
                if let Some(record) = self.record.as_mut() {
                    record.upload_session = None;
                }
            }
            return Err(err);
        }

        self.ctx.statistic.add_total_size(size);
        db.delete(&identity.path);
        save_uploading(db, self.info.id()).await;

        Ok(StepOutcome::Next(UploadStep::Succeeded(Completion::Uploaded)))
    }

    fn succeed(&self, completion: Completion) -> TaskUnitRunResult {
        let message: String = match completion {
            Completion::Uploaded => format!("Uploaded to {}", self.save_path),
            Completion::RapidUploaded => {
                format!("Rapid upload succeeded, saved to {}", self.save_path)
            }
            Completion::AlreadyConsistent => {
                "Local file unchanged since last sync, skipped".to_string()
            }
            Completion::RemoteMatched => {
                "Remote file already has the same content, skipped".to_string()
            }
        };

        let result = TaskUnitRunResult::success(completion.into(), message);
        match (&self.remote_info, completion) {
            (Some(info), Completion::RemoteMatched) => result.with_extra(info.clone()),
            _ => result,
        }
    }

    fn fail(&self, step: &str, err: UploadError) -> TaskUnitRunResult {
        let need_retry: bool = self.ctx.retry_policy.classify(&err);
        TaskUnitRunResult::failure(format!("Upload failed during {}", step), err, need_retry)
    }
}

#[async_trait]
impl<C: DriveClient + 'static> TaskUnit for UploadTaskUnit<C> {
    async fn run(&mut self) -> TaskUnitRunResult {
        let started: Instant = Instant::now();
        self.remote_info = None;

        let result: TaskUnitRunResult = self.drive(UploadStep::Init).await;

        match &result.error {
            None => log::info!(
                "[{}] upload result: {}, elapsed {}",
                self.info.id(),
                result.message,
                convert_time(started.elapsed())
            ),
            Some(err) => log::info!(
                "[{}] upload result: {}: {}, elapsed {}",
                self.info.id(),
                result.message,
                err,
                convert_time(started.elapsed())
            ),
        }
        result
    }

    async fn on_retry(&mut self, last: &TaskUnitRunResult) {
        match &last.error {
            None => log::warn!(
                "[{}] {}, retry {}/{}",
                self.info.id(),
                last.message,
                self.info.retry(),
                self.info.max_retry()
            ),
            Some(err) => log::warn!(
                "[{}] {}, {}, retry {}/{}",
                self.info.id(),
                last.message,
                err,
                self.info.retry(),
                self.info.max_retry()
            ),
        }
    }

    async fn on_success(&mut self, last: &TaskUnitRunResult) {
        if last.code == ResultCode::AlreadyConsistent {
            return;
        }
        let Some(db) = self.ctx.sync_db.clone() else {
            return;
        };
        let Some(record) = &self.record else {
            return;
        };

        let (file_id, parent_file_id) = if let Some(session) = &record.upload_session {
            (session.file_id.clone(), session.parent_file_id.clone())
        } else if let Some(info) = &last.extra {
            (info.file_id.clone(), info.parent_file_id.clone())
        } else {
            match self
                .client
                .file_info_by_path(&self.ctx.drive_id, &self.save_path)
                .await
            {
                Ok(Some(info)) => (info.file_id, info.parent_file_id),
                _ => (String::new(), String::new()),
            }
        };

        db.put(SyncRecord {
            remote_path: self.save_path.clone(),
            is_folder: false,
            content_hash: record.content_hash.clone().unwrap_or_default(),
            mod_time: record.mod_time,
            size: record.size,
            file_id,
            parent_file_id,
        });
        if let Err(e) = db.flush().await {
            log::warn!("[{}] Failed to save sync metadata: {}", self.info.id(), e);
        }
    }

    fn retry_wait(&self) -> Duration {
        self.ctx.options.retry.backoff(self.info.retry())
    }
}

/// Persists checkpoints and logs progress lines.
struct PersistProgress {
    task_id: String,
    identity: FileIdentity,
    db: Arc<UploadingDatabase>,
    show_progress: bool,
}

#[async_trait]
impl StatusObserver for PersistProgress {
    async fn on_status(&self, status: &TransferStatus, checkpoint: &InstanceState) -> bool {
        self.db.update_uploading(&self.identity, checkpoint.clone());
        save_uploading(&self.db, &self.task_id).await;

        if self.show_progress {
            log::info!(
                "[{}] ↑ {}/{} {}/s in {}",
                self.task_id,
                convert_file_size(status.uploaded, 2),
                convert_file_size(status.total_size, 2),
                convert_file_size(status.speed_per_second, 2),
                convert_time(status.elapsed)
            );
        }
        true
    }
}

/// Flush the uploading database, logging instead of failing.
async fn save_uploading(db: &UploadingDatabase, task_id: &str) {
    if let Err(e) = db.save().await {
        log::warn!("[{}] Failed to save upload progress: {}", task_id, e);
    }
}

async fn compute_proof_code(
    access_token: String,
    path: PathBuf,
    size: u64,
) -> Result<String, UploadError> {
    let display: String = path.display().to_string();
    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&path)?;
        calc_proof_code(&access_token, &mut file, size)
    })
    .await
    .map_err(|e| UploadError::Other {
        message: format!("Proof code task failed: {}", e),
    })?
    .map_err(|e| UploadError::io(display, e))
}

fn record_missing() -> UploadError {
    UploadError::Other {
        message: "local file was not opened".to_string(),
    }
}
