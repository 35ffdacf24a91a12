use thiserror::Error;

use crate::api_client::ApiError;
use crate::models::candidate::{CandidateStatus, DirtyKey};
use crate::screening::overlay::Transition;

/// Application-level error type shared by the intake and screening layers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No files to upload")]
    EmptyBatch,

    #[error("An upload is already in progress")]
    UploadInProgress,

    #[error("A save is already in progress")]
    SaveInProgress,

    #[error("Transfer failed: {0}")]
    Transfer(#[from] ApiError),

    #[error("Cannot {transition} candidate {key} from status '{from}'")]
    IllegalTransition {
        key: DirtyKey,
        from: CandidateStatus,
        transition: Transition,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::EmptyBatch => "EMPTY_BATCH",
            AppError::UploadInProgress => "UPLOAD_IN_PROGRESS",
            AppError::SaveInProgress => "SAVE_IN_PROGRESS",
            AppError::Transfer(_) => "TRANSFER_ERROR",
            AppError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Text suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            AppError::EmptyBatch => "Please select files to upload".to_string(),
            AppError::UploadInProgress => {
                "Cannot close while upload is in progress".to_string()
            }
            AppError::SaveInProgress => "Changes are already being saved".to_string(),
            AppError::Transfer(e) => {
                tracing::error!("Transfer error: {e}");
                e.server_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| "Upload failed. Please try again.".to_string())
            }
            AppError::IllegalTransition { .. } => self.to_string(),
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal error occurred".to_string()
            }
        }
    }
}
