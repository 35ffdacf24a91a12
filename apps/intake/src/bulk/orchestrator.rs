use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api_client::wire::{FileFailure, ResumeUpload};
use crate::api_client::RecruitApi;
use crate::bulk::batch::{RunPhase, UploadBatch};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::upload::{EntryStatus, ErrorDetail};
use crate::screening::overlay::CandidateOverlay;

/// Aggregate outcome of one run. `success_count + error_count ==
/// total_files` always holds.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUploadResult {
    pub total_files: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<FileFailure>,
    pub new_candidates: Vec<Value>,
    /// Whether the candidate list was re-fetched after the run.
    #[serde(skip)]
    pub refreshed: bool,
}

/// Drives the pending entries of a batch to a terminal outcome through one
/// multipart exchange.
#[derive(Clone)]
pub struct BulkUploadOrchestrator {
    api: Arc<dyn RecruitApi>,
    tick: Duration,
    step: u8,
}

impl BulkUploadOrchestrator {
    pub fn new(api: Arc<dyn RecruitApi>, config: &Config) -> Self {
        Self::with_timing(api, config.progress_tick, config.progress_step)
    }

    pub fn with_timing(api: Arc<dyn RecruitApi>, tick: Duration, step: u8) -> Self {
        Self {
            api,
            tick,
            step: step.clamp(1, 100),
        }
    }

    pub async fn run(
        &self,
        job_id: u64,
        batch: &RwLock<UploadBatch>,
        overlay: &RwLock<CandidateOverlay>,
    ) -> Result<BulkUploadResult, AppError> {
        let run_ids = {
            let mut batch = batch.write().await;
            if batch.is_busy() {
                return Err(AppError::UploadInProgress);
            }
            let ids = batch.pending_ids();
            if ids.is_empty() {
                return Err(AppError::EmptyBatch);
            }
            batch.set_phase(RunPhase::Preflight);
            batch.set_upload_error(None);
            batch.transfer().reset();
            ids
        };
        info!(job_id, files = run_ids.len(), "Starting bulk upload");

        for id in &run_ids {
            self.preflight(batch, *id).await;
        }

        let files = self.load_files(batch, &run_ids).await;
        if files.is_empty() {
            warn!(job_id, "No readable files left, skipping upload request");
            let mut batch = batch.write().await;
            batch.set_phase(RunPhase::Idle);
            return Ok(tally(&batch, &run_ids, Vec::new()));
        }

        let total_bytes: u64 = files.iter().map(|f| f.upload.contents.len() as u64).sum();
        let progress = {
            let mut batch = batch.write().await;
            batch.set_phase(RunPhase::Transfer);
            batch.transfer().start(total_bytes);
            batch.transfer().clone()
        };

        let (sent, uploads): (Vec<SentFile>, Vec<ResumeUpload>) = files
            .into_iter()
            .map(|f| {
                let record = SentFile {
                    id: f.id,
                    upload_name: f.upload.file_name.clone(),
                    display_name: f.display_name,
                };
                (record, f.upload)
            })
            .unzip();
        let sent_count = uploads.len();

        let response = match self.api.upload_resumes(job_id, uploads, progress).await {
            Ok(response) => response,
            Err(e) => {
                error!(job_id, "Bulk upload failed: {e}");
                let mut batch = batch.write().await;
                for id in &run_ids {
                    let unfinished = batch
                        .get(*id)
                        .map_or(false, |entry| !entry.status.is_terminal());
                    if unfinished {
                        batch.set_status(
                            *id,
                            EntryStatus::Error,
                            Some(ErrorDetail::message("Upload failed")),
                        );
                    }
                }
                let message = e.server_message().unwrap_or("Upload failed").to_string();
                batch.set_upload_error(Some(message));
                batch.set_phase(RunPhase::Idle);
                return Err(AppError::Transfer(e));
            }
        };

        if response.total_files != sent_count
            || response.success_count + response.error_count != sent_count
        {
            warn!(
                job_id,
                sent = sent_count,
                total = response.total_files,
                ok = response.success_count,
                failed = response.error_count,
                "Server counts disagree with the files sent"
            );
        }

        let failures: HashMap<&str, &ErrorDetail> = response
            .errors
            .iter()
            .map(|f| (f.file_name.as_str(), &f.error))
            .collect();
        let sent_names: HashSet<&str> = sent
            .iter()
            .flat_map(|f| [f.upload_name.as_str(), f.display_name.as_str()])
            .collect();
        for name in failures.keys().filter(|name| !sent_names.contains(*name)) {
            warn!(job_id, file = %name, "Server reported a failure for a file that was not sent");
        }

        let result = {
            let mut batch = batch.write().await;
            for file in &sent {
                // Servers may echo either the bare name or the relative path.
                let failure = failures
                    .get(file.upload_name.as_str())
                    .or_else(|| failures.get(file.display_name.as_str()));
                match failure {
                    Some(detail) => {
                        batch.set_status(file.id, EntryStatus::Error, Some((*detail).clone()))
                    }
                    None => batch.set_status(file.id, EntryStatus::Completed, None),
                };
            }
            batch.set_phase(RunPhase::Idle);
            tally(&batch, &run_ids, response.new_candidates)
        };
        info!(
            job_id,
            total = result.total_files,
            ok = result.success_count,
            failed = result.error_count,
            "Bulk upload finished"
        );

        let refreshed = match self.api.fetch_applications().await {
            Ok(records) => {
                overlay.write().await.apply_fetched(records);
                true
            }
            Err(e) => {
                warn!(job_id, "Could not refresh candidates after upload: {e}");
                false
            }
        };

        Ok(BulkUploadResult { refreshed, ..result })
    }

    /// Cosmetic progress ticks for one entry; no network involved.
    async fn preflight(&self, batch: &RwLock<UploadBatch>, id: Uuid) {
        batch
            .write()
            .await
            .set_status(id, EntryStatus::Processing, None);

        let mut value: u8 = 0;
        loop {
            batch.write().await.set_progress(id, value);
            if value >= 100 {
                break;
            }
            if !self.tick.is_zero() {
                tokio::time::sleep(self.tick).await;
            }
            value = value.saturating_add(self.step).min(100);
        }
    }

    /// Reads every entry's contents with no lock held. Unreadable entries
    /// are finished as errors right away.
    async fn load_files(
        &self,
        batch: &RwLock<UploadBatch>,
        ids: &[Uuid],
    ) -> Vec<LoadedFile> {
        let staged: Vec<_> = {
            let batch = batch.read().await;
            ids.iter().filter_map(|id| batch.get(*id).cloned()).collect()
        };

        let mut files = Vec::with_capacity(staged.len());
        for entry in staged {
            match entry.read_contents().await {
                Ok(contents) => files.push(LoadedFile {
                    id: entry.id,
                    display_name: entry.name,
                    upload: ResumeUpload {
                        file_name: entry.upload_name,
                        kind: entry.kind,
                        contents,
                    },
                }),
                Err(e) => {
                    warn!(file = %entry.name, "Cannot read staged file: {e}");
                    batch.write().await.set_status(
                        entry.id,
                        EntryStatus::Error,
                        Some(ErrorDetail::field("file", "could not be read")),
                    );
                }
            }
        }
        debug!(readable = files.len(), staged = ids.len(), "Loaded file contents");
        files
    }
}

struct LoadedFile {
    id: Uuid,
    display_name: String,
    upload: ResumeUpload,
}

struct SentFile {
    id: Uuid,
    upload_name: String,
    display_name: String,
}

/// Counts are taken from the reconciled entries of this run.
fn tally(batch: &UploadBatch, run_ids: &[Uuid], new_candidates: Vec<Value>) -> BulkUploadResult {
    let mut result = BulkUploadResult {
        total_files: run_ids.len(),
        new_candidates,
        ..BulkUploadResult::default()
    };
    for entry in run_ids.iter().filter_map(|id| batch.get(*id)) {
        match entry.status {
            EntryStatus::Completed => result.success_count += 1,
            _ => {
                result.error_count += 1;
                result.errors.push(FileFailure {
                    file_name: entry.name.clone(),
                    error: entry.error_detail.clone().unwrap_or_default(),
                });
            }
        }
    }
    result
}
