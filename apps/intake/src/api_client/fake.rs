//! In-memory `RecruitApi` used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::Notify;

use super::wire::{
    ApplicationRecord, BulkUploadResponse, FeedbackRequest, FileFailure, ResumeUpload,
    UpdateOutcome,
};
use super::{ApiError, RecruitApi};
use crate::bulk::progress::TransferProgress;
use crate::models::candidate::Candidate;
use crate::models::upload::{ErrorDetail, FileKind};

#[derive(Debug, Clone)]
pub struct UploadCall {
    pub job_id: u64,
    pub files: Vec<(String, FileKind, usize)>,
}

#[derive(Default)]
pub struct FakeApi {
    pub applications: Mutex<Vec<Value>>,
    /// Per-file failures to report; `None` makes the upload a transport failure.
    pub upload_failures: Mutex<Option<Vec<(String, String)>>>,
    pub upload_calls: Mutex<Vec<UploadCall>>,
    pub upload_gate: Mutex<Option<Arc<Notify>>>,
    pub update_status: Mutex<Option<u16>>,
    pub update_calls: Mutex<Vec<Vec<Candidate>>>,
    pub update_gate: Mutex<Option<Arc<Notify>>>,
    pub fetch_calls: AtomicUsize,
    pub fail_fetch: Mutex<bool>,
    pub feedback: Mutex<Vec<FeedbackRequest>>,
    pub export_calls: Mutex<Vec<Option<u64>>>,
    pub fail_export: Mutex<bool>,
}

impl FakeApi {
    pub fn new() -> Self {
        let api = Self::default();
        *api.upload_failures.lock().unwrap() = Some(Vec::new());
        *api.update_status.lock().unwrap() = Some(200);
        api
    }

    pub fn with_applications(applications: Vec<Value>) -> Self {
        let api = Self::new();
        *api.applications.lock().unwrap() = applications;
        api
    }

    pub fn fail_files(&self, failures: &[(&str, &str)]) {
        *self.upload_failures.lock().unwrap() = Some(
            failures
                .iter()
                .map(|(f, e)| (f.to_string(), e.to_string()))
                .collect(),
        );
    }

    pub fn fail_transfer(&self) {
        *self.upload_failures.lock().unwrap() = None;
    }

    pub fn fail_fetches(&self) {
        *self.fail_fetch.lock().unwrap() = true;
    }

    pub fn fail_exports(&self) {
        *self.fail_export.lock().unwrap() = true;
    }

    /// `None` makes the update a transport failure.
    pub fn set_update_status(&self, status: Option<u16>) {
        *self.update_status.lock().unwrap() = status;
    }

    pub fn gate_uploads(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.upload_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn gate_updates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.update_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn upload_count(&self) -> usize {
        self.upload_calls.lock().unwrap().len()
    }
}

/// Raw application record as `GET /api/jobapplication/` returns it.
pub fn application(candidate_id: u64, job_id: u64, status: &str, score: f64) -> Value {
    json!({
        "application_id": candidate_id * 100 + job_id,
        "status": status,
        "score": score,
        "ai_recommendation": "",
        "technical_score": score,
        "experience_score": score,
        "cultural_score": score,
        "candidate": {
            "candidate_id": candidate_id,
            "name": format!("Candidate {candidate_id}"),
            "summary": "",
            "technical_skills": "",
            "soft_skills": "",
            "work_experiences": []
        },
        "job": {"job_id": job_id, "role": "Engineer"}
    })
}

fn unavailable() -> ApiError {
    ApiError::Api {
        status: 502,
        message: String::new(),
    }
}

#[async_trait]
impl RecruitApi for FakeApi {
    async fn upload_resumes(
        &self,
        job_id: u64,
        files: Vec<ResumeUpload>,
        progress: TransferProgress,
    ) -> Result<BulkUploadResponse, ApiError> {
        self.upload_calls.lock().unwrap().push(UploadCall {
            job_id,
            files: files
                .iter()
                .map(|f| (f.file_name.clone(), f.kind, f.contents.len()))
                .collect(),
        });

        let gate = self.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let failures = self.upload_failures.lock().unwrap().clone().ok_or_else(unavailable)?;
        for file in &files {
            progress.record(file.contents.len() as u64);
        }

        let errors: Vec<FileFailure> = failures
            .into_iter()
            .map(|(file_name, error)| FileFailure {
                file_name,
                error: ErrorDetail::message(error),
            })
            .collect();
        Ok(BulkUploadResponse {
            total_files: files.len(),
            success_count: files.len().saturating_sub(errors.len()),
            error_count: errors.len(),
            errors,
            new_candidates: Vec::new(),
        })
    }

    async fn fetch_applications(&self) -> Result<Vec<ApplicationRecord>, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_fetch.lock().unwrap() {
            return Err(unavailable());
        }
        let raw = self.applications.lock().unwrap().clone();
        Ok(serde_json::from_value(Value::Array(raw))?)
    }

    async fn update_applications(
        &self,
        candidates: &[Candidate],
    ) -> Result<UpdateOutcome, ApiError> {
        self.update_calls.lock().unwrap().push(candidates.to_vec());

        let gate = self.update_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match *self.update_status.lock().unwrap() {
            Some(200) => Ok(UpdateOutcome {
                partial: false,
                results: None,
            }),
            Some(207) => Ok(UpdateOutcome {
                partial: true,
                results: None,
            }),
            Some(status) => Err(ApiError::Api {
                status,
                message: "update rejected".to_string(),
            }),
            None => Err(unavailable()),
        }
    }

    async fn submit_feedback(&self, feedback: &FeedbackRequest) -> Result<(), ApiError> {
        self.feedback.lock().unwrap().push(feedback.clone());
        Ok(())
    }

    async fn export_report(&self, job_id: Option<u64>) -> Result<Bytes, ApiError> {
        self.export_calls.lock().unwrap().push(job_id);
        if *self.fail_export.lock().unwrap() {
            return Err(unavailable());
        }
        Ok(Bytes::from_static(b"PK\x03\x04report"))
    }
}
