//! Request and response bodies exchanged with the recruiting backend.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::upload::{ErrorDetail, FileKind};

// ────────────────────────────────────────────────────────────────────────────
// POST /api/upload-cv/
// ────────────────────────────────────────────────────────────────────────────

/// One file blob sent in the multipart upload.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub file_name: String,
    pub kind: FileKind,
    pub contents: Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub file_name: String,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkUploadResponse {
    pub total_files: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<FileFailure>,
    pub new_candidates: Vec<Value>,
}

// ────────────────────────────────────────────────────────────────────────────
// GET /api/jobapplication/
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationRecord {
    pub application_id: u64,
    pub status: String,
    pub score: Option<f64>,
    pub ai_recommendation: Option<String>,
    pub technical_score: Option<f64>,
    pub experience_score: Option<f64>,
    pub cultural_score: Option<f64>,
    pub candidate: CandidateRecord,
    pub job: JobRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateRecord {
    pub candidate_id: u64,
    pub name: String,
    pub summary: Option<String>,
    pub technical_skills: Option<String>,
    pub soft_skills: Option<String>,
    #[serde(default)]
    pub work_experiences: Vec<WorkExperienceRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobRecord {
    pub job_id: u64,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkExperienceRecord {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub company_name: String,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub summary: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// PUT /api/jobapplication/update/
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of a batched update the server accepted (200 or 207).
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub partial: bool,
    pub results: Option<Value>,
}

// ────────────────────────────────────────────────────────────────────────────
// POST /api/feedback/
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackRequest {
    pub candidate_id: u64,
    pub job_id: u64,
    pub feedback_text: String,
    pub suggested_score: u8,
}

/// Error body shapes the backend uses for non-success responses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
    pub detail: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.message.or(self.error).or(self.detail)
    }
}
