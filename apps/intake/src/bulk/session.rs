//! The bulk upload surface: open, stage files, remove, process, close.
//! Everything the user needs to hear about goes out through the notifier.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bulk::batch::UploadBatch;
use crate::bulk::orchestrator::{BulkUploadOrchestrator, BulkUploadResult};
use crate::bulk::selection::{self, SelectionItem};
use crate::errors::AppError;
use crate::models::upload::format_file_size;
use crate::notify::{self, Notifier};
use crate::screening::overlay::CandidateOverlay;
use crate::state::AppState;

/// Display summary of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub processing_complete: bool,
    pub uploading: bool,
    pub aggregate_progress: u8,
    pub total_size: String,
    pub upload_error: Option<String>,
}

pub struct BulkUploadSession {
    job_id: u64,
    batch: Arc<RwLock<UploadBatch>>,
    overlay: Arc<RwLock<CandidateOverlay>>,
    orchestrator: BulkUploadOrchestrator,
    notifier: Arc<dyn Notifier>,
}

impl BulkUploadSession {
    pub fn new(state: &AppState, job_id: u64) -> Self {
        Self {
            job_id,
            batch: state.uploads.clone(),
            overlay: state.candidates.clone(),
            orchestrator: BulkUploadOrchestrator::new(state.api.clone(), &state.config),
            notifier: state.notifier.clone(),
        }
    }

    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    /// Opens the surface with an empty batch. A batch left over from a
    /// previous opening is discarded unless it is still running.
    pub async fn open(&self) -> Result<(), AppError> {
        let mut batch = self.batch.write().await;
        if batch.is_busy() {
            return Err(AppError::UploadInProgress);
        }
        batch.clear();
        debug!(job_id = self.job_id, "Upload surface opened");
        Ok(())
    }

    /// Classifies and stages a selection. Returns the number of files added.
    pub async fn add_selection(&self, items: Vec<SelectionItem>) -> Result<usize, AppError> {
        if self.batch.read().await.is_busy() {
            return Err(AppError::UploadInProgress);
        }

        let outcome = tokio::task::spawn_blocking(move || selection::collect(items))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("selection task failed: {e}")))?;

        for reason in &outcome.rejected {
            notify::error(self.notifier.as_ref(), reason.to_string());
        }

        let added = outcome.accepted.len();
        if added > 0 {
            let mut batch = self.batch.write().await;
            if batch.is_busy() {
                return Err(AppError::UploadInProgress);
            }
            batch.add_entries(outcome.accepted);
            drop(batch);
            notify::success(self.notifier.as_ref(), format!("{added} valid files added"));
        } else if !outcome.rejected.is_empty() {
            notify::error(
                self.notifier.as_ref(),
                "No valid files found. Please select PDF or Word documents only.",
            );
        }
        Ok(added)
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.batch.write().await.remove_entry(id)
    }

    /// Runs the orchestrator and reports the outcome.
    pub async fn process(&self) -> Result<BulkUploadResult, AppError> {
        match self
            .orchestrator
            .run(self.job_id, &self.batch, &self.overlay)
            .await
        {
            Ok(result) => {
                notify::success(
                    self.notifier.as_ref(),
                    format!(
                        "Upload completed! {} files processed successfully",
                        result.success_count
                    ),
                );
                if result.error_count > 0 {
                    notify::error(
                        self.notifier.as_ref(),
                        format!("{} files failed to process", result.error_count),
                    );
                }
                Ok(result)
            }
            // The start control is disabled while a run is active.
            Err(AppError::UploadInProgress) => {
                warn!(job_id = self.job_id, "Upload already running, ignoring");
                Err(AppError::UploadInProgress)
            }
            Err(e) => {
                notify::error(self.notifier.as_ref(), e.user_message());
                Err(e)
            }
        }
    }

    /// Closing during a run is refused, never queued.
    pub async fn close(&self) -> Result<(), AppError> {
        let mut batch = self.batch.write().await;
        if batch.is_busy() {
            drop(batch);
            let err = AppError::UploadInProgress;
            notify::error(self.notifier.as_ref(), err.user_message());
            return Err(err);
        }
        batch.clear();
        debug!(job_id = self.job_id, "Upload surface closed");
        Ok(())
    }

    pub async fn summary(&self) -> BatchSummary {
        let batch = self.batch.read().await;
        BatchSummary {
            total: batch.len(),
            completed: batch.completed_count(),
            failed: batch.error_count(),
            processing_complete: batch.is_processing_complete(),
            uploading: batch.is_uploading(),
            aggregate_progress: batch.aggregate_progress(),
            total_size: format_file_size(batch.entries().iter().map(|e| e.size).sum()),
            upload_error: batch.upload_error().map(str::to_string),
        }
    }
}
