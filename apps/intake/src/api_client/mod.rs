/// API client: the single point of entry for all backend calls.
///
/// Views and stores never build HTTP requests themselves; they go through
/// `RecruitApi`, which `HttpRecruitApi` implements over reqwest.
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::bulk::progress::{counted_stream, TransferProgress};
use crate::config::Config;
use crate::models::candidate::Candidate;

#[cfg(test)]
pub mod fake;
pub mod wire;

use wire::{
    ApplicationRecord, BulkUploadResponse, ErrorBody, FeedbackRequest, ResumeUpload,
    UpdateOutcome,
};

pub const UPLOAD_PATH: &str = "/api/upload-cv/";
pub const APPLICATIONS_PATH: &str = "/api/jobapplication/";
pub const UPDATE_PATH: &str = "/api/jobapplication/update/";
pub const FEEDBACK_PATH: &str = "/api/feedback/";
pub const EXPORT_PATH: &str = "/api/jobapplication/export/";

/// Upper bound on fetch attempts, whatever the configuration says.
pub const MAX_FETCH_RETRIES: u32 = 10;
const FETCH_BACKOFF: Duration = Duration::from_secs(1);
const MAX_FETCH_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ApiError {
    /// The message the server put in its error body, if it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Api { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

/// Backend operations the intake and screening layers depend on.
#[async_trait]
pub trait RecruitApi: Send + Sync {
    /// One multipart exchange carrying every file of a batch.
    async fn upload_resumes(
        &self,
        job_id: u64,
        files: Vec<ResumeUpload>,
        progress: TransferProgress,
    ) -> Result<BulkUploadResponse, ApiError>;

    async fn fetch_applications(&self) -> Result<Vec<ApplicationRecord>, ApiError>;

    /// Batched status update. 200 and 207 are both accepted.
    async fn update_applications(&self, candidates: &[Candidate])
        -> Result<UpdateOutcome, ApiError>;

    async fn submit_feedback(&self, feedback: &FeedbackRequest) -> Result<(), ApiError>;

    /// Spreadsheet report of applications, optionally for one job.
    async fn export_report(&self, job_id: Option<u64>) -> Result<Bytes, ApiError>;
}

/// Delay before retry `attempt` (1-based): `base × 2^(attempt-1)`, capped.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_FETCH_BACKOFF)
}

/// reqwest-backed implementation of `RecruitApi`.
#[derive(Clone)]
pub struct HttpRecruitApi {
    client: Client,
    base_url: String,
    token: Option<String>,
    fetch_retries: u32,
    retry_backoff: Duration,
}

impl HttpRecruitApi {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        Ok(Self {
            client: Client::builder().timeout(config.request_timeout).build()?,
            base_url: config.api_base_url.clone(),
            token: config.api_token.clone(),
            fetch_retries: config.fetch_retries.clamp(1, MAX_FETCH_RETRIES),
            retry_backoff: FETCH_BACKOFF,
        })
    }

    /// Base delay between fetch attempts (1s unless overridden).
    pub fn with_retry_backoff(mut self, base: Duration) -> Self {
        self.retry_backoff = base;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl RecruitApi for HttpRecruitApi {
    async fn upload_resumes(
        &self,
        job_id: u64,
        files: Vec<ResumeUpload>,
        progress: TransferProgress,
    ) -> Result<BulkUploadResponse, ApiError> {
        let mut form = Form::new().text("jobId", job_id.to_string());
        for file in files {
            let length = file.contents.len() as u64;
            let body = Body::wrap_stream(counted_stream(file.contents, progress.clone()));
            let part = Part::stream_with_length(body, length)
                .file_name(file.file_name)
                .mime_str(file.kind.mime_type())?;
            form = form.part("files", part).text("fileTypes", file.kind.as_str());
        }

        let response = self
            .authorize(self.client.post(self.url(UPLOAD_PATH)))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let result: BulkUploadResponse = response.json().await?;
        debug!(
            job_id,
            total = result.total_files,
            ok = result.success_count,
            failed = result.error_count,
            "Bulk upload response received"
        );
        Ok(result)
    }

    /// Retries on transport errors, 429 and 5xx with exponential backoff.
    async fn fetch_applications(&self) -> Result<Vec<ApplicationRecord>, ApiError> {
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..self.fetch_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = backoff_delay(self.retry_backoff, attempt);
                warn!(
                    "Candidate fetch attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .authorize(self.client.get(self.url(APPLICATIONS_PATH)))
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ApiError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let error = error_from_response(response).await;
                warn!("Candidate fetch returned {}: {}", status, error);
                last_error = Some(error);
                continue;
            }
            if !status.is_success() {
                return Err(error_from_response(response).await);
            }

            let text = response.text().await?;
            let records: Vec<ApplicationRecord> = serde_json::from_str(&text)?;
            debug!(count = records.len(), "Fetched job applications");
            return Ok(records);
        }

        Err(last_error.unwrap_or(ApiError::Api {
            status: 0,
            message: "no fetch attempt was made".to_string(),
        }))
    }

    async fn update_applications(
        &self,
        candidates: &[Candidate],
    ) -> Result<UpdateOutcome, ApiError> {
        let response = self
            .authorize(self.client.put(self.url(UPDATE_PATH)))
            .json(candidates)
            .send()
            .await?;

        let partial = match response.status() {
            StatusCode::OK => false,
            StatusCode::MULTI_STATUS => true,
            _ => return Err(error_from_response(response).await),
        };

        let text = response.text().await?;
        let results = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|body| body.get("results").cloned());

        Ok(UpdateOutcome { partial, results })
    }

    async fn submit_feedback(&self, feedback: &FeedbackRequest) -> Result<(), ApiError> {
        let response = self
            .authorize(self.client.post(self.url(FEEDBACK_PATH)))
            .json(feedback)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            _ => Err(error_from_response(response).await),
        }
    }

    async fn export_report(&self, job_id: Option<u64>) -> Result<Bytes, ApiError> {
        let mut request = self.client.get(self.url(EXPORT_PATH));
        if let Some(job_id) = job_id {
            request = request.query(&[("job_id", job_id)]);
        }
        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let report = response.bytes().await?;
        debug!(?job_id, bytes = report.len(), "Downloaded application report");
        Ok(report)
    }
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    // Try to parse error message
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or(body);
    ApiError::Api { status, message }
}
