use std::sync::Arc;

use tokio::sync::RwLock;

use crate::api_client::{ApiError, HttpRecruitApi, RecruitApi};
use crate::bulk::batch::UploadBatch;
use crate::config::Config;
use crate::notify::{Notifier, TracingNotifier};
use crate::screening::overlay::CandidateOverlay;

/// Shared application state, built once at start and handed to the upload
/// session and the screening views.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub api: Arc<dyn RecruitApi>,
    pub notifier: Arc<dyn Notifier>,
    /// The single upload batch. Locks are never held across a network call.
    pub uploads: Arc<RwLock<UploadBatch>>,
    /// The single candidate overlay shared by every screening view.
    pub candidates: Arc<RwLock<CandidateOverlay>>,
}

impl AppState {
    pub fn new(config: Config, api: Arc<dyn RecruitApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config,
            api,
            notifier,
            uploads: Arc::new(RwLock::new(UploadBatch::new())),
            candidates: Arc::new(RwLock::new(CandidateOverlay::new())),
        }
    }

    /// HTTP-backed state with notifications written to the log.
    pub fn from_config(config: Config) -> Result<Self, ApiError> {
        let api = Arc::new(HttpRecruitApi::new(&config)?);
        Ok(Self::new(config, api, Arc::new(TracingNotifier)))
    }
}
