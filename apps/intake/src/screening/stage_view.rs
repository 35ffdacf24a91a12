//! Per-job screening views. The initial and final stages share one overlay;
//! each view filters, orders, and acts on it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::api_client::wire::FeedbackRequest;
use crate::api_client::RecruitApi;
use crate::errors::AppError;
use crate::models::candidate::{Candidate, CandidateStatus};
use crate::notify::{self, Notifier};
use crate::screening::overlay::{CandidateOverlay, Transition};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreeningStage {
    Initial,
    Final,
}

impl ScreeningStage {
    pub fn includes(&self, status: CandidateStatus) -> bool {
        match self {
            ScreeningStage::Initial => !matches!(
                status,
                CandidateStatus::FinalScreening | CandidateStatus::RejectedByHr
            ),
            ScreeningStage::Final => !matches!(
                status,
                CandidateStatus::NotSelected | CandidateStatus::Rejected
            ),
        }
    }
}

impl fmt::Display for ScreeningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScreeningStage::Initial => "initial",
            ScreeningStage::Final => "final",
        })
    }
}

impl FromStr for ScreeningStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "initial" => Ok(ScreeningStage::Initial),
            "final" => Ok(ScreeningStage::Final),
            other => Err(format!("unknown screening stage '{other}'")),
        }
    }
}

/// Download name for an exported report, stamped with the current time in
/// milliseconds.
pub fn report_file_name(job_id: Option<u64>) -> String {
    let stamp = Utc::now().timestamp_millis();
    match job_id {
        Some(id) => format!("HR_Report_Job{id}_{stamp}.xlsx"),
        None => format!("HR_Report_{stamp}.xlsx"),
    }
}

pub struct ScreeningStageView {
    stage: ScreeningStage,
    job_id: u64,
    top: Option<usize>,
    overlay: Arc<RwLock<CandidateOverlay>>,
    api: Arc<dyn RecruitApi>,
    notifier: Arc<dyn Notifier>,
}

impl ScreeningStageView {
    pub fn new(state: &AppState, stage: ScreeningStage, job_id: u64) -> Self {
        Self {
            stage,
            job_id,
            top: None,
            overlay: state.candidates.clone(),
            api: state.api.clone(),
            notifier: state.notifier.clone(),
        }
    }

    pub fn stage(&self) -> ScreeningStage {
        self.stage
    }

    pub fn top(&self) -> Option<usize> {
        self.top
    }

    /// Restricts the list to the best `n` candidates by score, or clears the
    /// restriction with `None`.
    pub fn set_top(&mut self, top: Option<usize>) -> Result<(), AppError> {
        match top {
            Some(0) => Err(AppError::InvalidInput(
                "Top count must be at least 1".to_string(),
            )),
            Some(n) => {
                self.top = Some(n);
                notify::success(
                    self.notifier.as_ref(),
                    format!("Showing top {n} candidates"),
                );
                Ok(())
            }
            None => {
                self.top = None;
                notify::success(
                    self.notifier.as_ref(),
                    "Filter cleared - showing all candidates",
                );
                Ok(())
            }
        }
    }

    /// Candidates of this job and stage in display order.
    ///
    /// Without a top-N filter the final stage orders by status priority, then
    /// score; the initial stage by score. With the filter, score comes first
    /// and the list is truncated.
    pub fn select(&self, overlay: &CandidateOverlay) -> Vec<Candidate> {
        let mut list: Vec<Candidate> = overlay
            .candidates()
            .iter()
            .filter(|c| c.job_id == self.job_id && self.stage.includes(c.status))
            .cloned()
            .collect();

        let by_score = |a: &Candidate, b: &Candidate| b.score.total_cmp(&a.score);
        let by_priority =
            |a: &Candidate, b: &Candidate| b.status.priority().cmp(&a.status.priority());

        match (self.top, self.stage) {
            (Some(n), _) => {
                list.sort_by(|a, b| by_score(a, b).then_with(|| by_priority(a, b)));
                list.truncate(n);
            }
            (None, ScreeningStage::Final) => {
                list.sort_by(|a, b| by_priority(a, b).then_with(|| by_score(a, b)));
            }
            (None, ScreeningStage::Initial) => list.sort_by(|a, b| by_score(a, b)),
        }
        list
    }

    pub async fn candidates(&self) -> Vec<Candidate> {
        self.select(&*self.overlay.read().await)
    }

    pub async fn has_unsaved_changes(&self) -> bool {
        self.overlay.read().await.has_unsaved_changes()
    }

    /// Re-fetches the candidate list; unsaved changes are kept on top.
    pub async fn refresh(&self) -> Result<usize, AppError> {
        let records = match self.api.fetch_applications().await {
            Ok(records) => records,
            Err(e) => {
                warn!(job_id = self.job_id, "Candidate fetch failed: {e}");
                notify::error(self.notifier.as_ref(), "Failed to load candidates");
                return Err(e.into());
            }
        };
        Ok(self.overlay.write().await.apply_fetched(records))
    }

    /// Rejects at whichever stage this view shows.
    pub async fn reject(&self, candidate_id: u64) -> Result<bool, AppError> {
        let transition = match self.stage {
            ScreeningStage::Initial => Transition::RejectAtInitial,
            ScreeningStage::Final => Transition::RejectAtFinal,
        };
        self.act(candidate_id, transition).await
    }

    /// Only offered by the initial view.
    pub async fn refer_to_final(&self, candidate_id: u64) -> Result<bool, AppError> {
        self.require_stage(ScreeningStage::Initial, Transition::ReferToFinal)?;
        self.act(candidate_id, Transition::ReferToFinal).await
    }

    /// Only offered by the final view.
    pub async fn shortlist(&self, candidate_id: u64) -> Result<bool, AppError> {
        self.require_stage(ScreeningStage::Final, Transition::Shortlist)?;
        self.act(candidate_id, Transition::Shortlist).await
    }

    fn require_stage(
        &self,
        stage: ScreeningStage,
        transition: Transition,
    ) -> Result<(), AppError> {
        if self.stage == stage {
            return Ok(());
        }
        let err = AppError::InvalidInput(format!(
            "Cannot {transition} from the {} screening view",
            self.stage
        ));
        notify::error(self.notifier.as_ref(), err.user_message());
        Err(err)
    }

    async fn act(&self, candidate_id: u64, transition: Transition) -> Result<bool, AppError> {
        let applied = self
            .overlay
            .write()
            .await
            .apply(candidate_id, self.job_id, transition);
        match applied {
            Ok(true) => {
                notify::success(
                    self.notifier.as_ref(),
                    format!("Candidate status updated to {}", transition.target()),
                );
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                notify::error(self.notifier.as_ref(), e.user_message());
                Err(e)
            }
        }
    }

    /// Persists every staged change in one request. The overlay lock is
    /// released while the request is in flight.
    pub async fn save_changes(&self) -> Result<usize, AppError> {
        let begun = self.overlay.write().await.begin_save();
        let pending = match begun {
            Ok(Some(pending)) => pending,
            Ok(None) => return Ok(0),
            Err(e) => return Err(e),
        };

        let result = self.api.update_applications(&pending.candidates).await;
        let saved = self.overlay.write().await.complete_save(&pending, result);

        match &saved {
            Ok(count) => {
                info!(job_id = self.job_id, count, "Saved candidate updates");
                notify::success(
                    self.notifier.as_ref(),
                    format!("Successfully saved {count} candidate updates"),
                );
            }
            Err(e) => {
                warn!(job_id = self.job_id, "Saving candidate updates failed: {e}");
                notify::error(
                    self.notifier.as_ref(),
                    "Failed to save changes. Please try again.",
                );
            }
        }
        saved
    }

    /// Drops staged changes. With `revert`, the list is re-fetched so the
    /// displayed statuses go back to what the server has.
    pub async fn discard_changes(&self, revert: bool) -> Result<usize, AppError> {
        let discarded = self.overlay.write().await.discard_changes();
        if revert {
            self.refresh().await?;
        }
        Ok(discarded)
    }

    /// Downloads the spreadsheet report for this job.
    pub async fn export_report(&self) -> Result<Bytes, AppError> {
        match self.api.export_report(Some(self.job_id)).await {
            Ok(report) => {
                info!(job_id = self.job_id, bytes = report.len(), "Report exported");
                notify::success(self.notifier.as_ref(), "Excel report downloaded successfully!");
                Ok(report)
            }
            Err(e) => {
                warn!(job_id = self.job_id, "Report export failed: {e}");
                notify::error(self.notifier.as_ref(), "Failed to generate Excel report");
                Err(e.into())
            }
        }
    }

    pub async fn submit_feedback(
        &self,
        candidate_id: u64,
        feedback_text: &str,
        suggested_score: u8,
    ) -> Result<(), AppError> {
        if suggested_score > 100 {
            return Err(AppError::InvalidInput(
                "Suggested score must be between 0 and 100".to_string(),
            ));
        }
        let feedback_text = feedback_text.trim();
        if feedback_text.is_empty() {
            return Err(AppError::InvalidInput(
                "Feedback text is required".to_string(),
            ));
        }

        let request = FeedbackRequest {
            candidate_id,
            job_id: self.job_id,
            feedback_text: feedback_text.to_string(),
            suggested_score,
        };
        match self.api.submit_feedback(&request).await {
            Ok(()) => {
                notify::success(self.notifier.as_ref(), "Feedback submitted successfully!");
                Ok(())
            }
            Err(e) => {
                let reason = e.server_message().unwrap_or("please try again").to_string();
                notify::error(
                    self.notifier.as_ref(),
                    format!("Failed to submit feedback: {reason}"),
                );
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::api_client::fake::{application, FakeApi};
    use crate::config::Config;
    use crate::models::candidate::DirtyKey;
    use crate::notify::{Level, MemoryNotifier};

    async fn state_with(
        applications: Vec<serde_json::Value>,
    ) -> (AppState, Arc<FakeApi>, Arc<MemoryNotifier>) {
        let api = Arc::new(FakeApi::with_applications(applications));
        let notifier = Arc::new(MemoryNotifier::new());
        let state = AppState::new(
            Config::default_with_base_url("http://localhost:8000"),
            api.clone(),
            notifier.clone(),
        );
        state
            .candidates
            .write()
            .await
            .fetch_candidates(api.as_ref())
            .await
            .unwrap();
        (state, api, notifier)
    }

    fn ids(list: &[Candidate]) -> Vec<u64> {
        list.iter().map(|c| c.candidate_id).collect()
    }

    #[tokio::test]
    async fn test_stage_filters() {
        let (state, _, _) = state_with(vec![
            application(1, 3, "initial_screening", 50.0),
            application(2, 3, "final_screening", 60.0),
            application(3, 3, "rejected", 70.0),
            application(4, 3, "rejected_by_hr", 80.0),
            application(5, 3, "not_selected", 90.0),
            application(6, 4, "initial_screening", 99.0),
        ])
        .await;

        let initial = ScreeningStageView::new(&state, ScreeningStage::Initial, 3);
        assert_eq!(ids(&initial.candidates().await), vec![5, 3, 1]);

        let final_view = ScreeningStageView::new(&state, ScreeningStage::Final, 3);
        assert_eq!(ids(&final_view.candidates().await), vec![2, 1, 4]);
    }

    #[tokio::test]
    async fn test_final_order_and_top_filter() {
        let (state, _, notifier) = state_with(vec![
            application(1, 3, "initial_screening", 95.0),
            application(2, 3, "final_screening", 60.0),
            application(3, 3, "final_screening", 75.0),
            application(4, 3, "rejected_by_hr", 99.0),
            application(5, 3, "initial_screening", 70.0),
        ])
        .await;
        let mut view = ScreeningStageView::new(&state, ScreeningStage::Final, 3);

        assert_eq!(ids(&view.candidates().await), vec![3, 2, 1, 5, 4]);

        view.set_top(Some(2)).unwrap();
        assert_eq!(ids(&view.candidates().await), vec![4, 1]);

        view.set_top(None).unwrap();
        assert_eq!(view.candidates().await.len(), 5);
        assert!(view.set_top(Some(0)).is_err());

        assert_eq!(
            notifier.messages(),
            vec![
                (Level::Success, "Showing top 2 candidates".to_string()),
                (
                    Level::Success,
                    "Filter cleared - showing all candidates".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_top_ties_fall_back_to_priority() {
        let (state, _, _) = state_with(vec![
            application(1, 3, "rejected_by_hr", 80.0),
            application(2, 3, "final_screening", 80.0),
            application(3, 3, "initial_screening", 80.0),
        ])
        .await;
        let mut view = ScreeningStageView::new(&state, ScreeningStage::Final, 3);
        view.set_top(Some(3)).unwrap();
        assert_eq!(ids(&view.candidates().await), vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn test_actions_stage_and_save() {
        let (state, api, notifier) = state_with(vec![
            application(7, 3, "initial_screening", 70.0),
            application(9, 3, "initial_screening", 80.0),
        ])
        .await;
        let initial = ScreeningStageView::new(&state, ScreeningStage::Initial, 3);
        let final_view = ScreeningStageView::new(&state, ScreeningStage::Final, 3);

        assert!(initial.reject(7).await.unwrap());
        assert!(final_view.shortlist(9).await.unwrap());
        assert!(final_view.has_unsaved_changes().await);

        let saved = final_view.save_changes().await.unwrap();

        assert_eq!(saved, 2);
        assert!(!final_view.has_unsaved_changes().await);
        assert_eq!(api.update_calls.lock().unwrap()[0].len(), 2);
        assert_eq!(
            notifier.messages(),
            vec![
                (
                    Level::Success,
                    "Candidate status updated to rejected".to_string()
                ),
                (
                    Level::Success,
                    "Candidate status updated to final_screening".to_string()
                ),
                (
                    Level::Success,
                    "Successfully saved 2 candidate updates".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_save_notifies_and_keeps_changes() {
        let (state, api, notifier) =
            state_with(vec![application(7, 3, "initial_screening", 70.0)]).await;
        api.set_update_status(None);
        let view = ScreeningStageView::new(&state, ScreeningStage::Final, 3);
        view.reject(7).await.unwrap();

        assert!(view.save_changes().await.is_err());
        assert!(view.has_unsaved_changes().await);
        assert_eq!(
            notifier.errors(),
            vec!["Failed to save changes. Please try again."]
        );

        api.set_update_status(Some(200));
        assert_eq!(view.save_changes().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_illegal_action_is_reported() {
        let (state, _, notifier) = state_with(vec![application(7, 3, "rejected", 70.0)]).await;
        let view = ScreeningStageView::new(&state, ScreeningStage::Final, 3);

        assert!(view.shortlist(7).await.is_err());
        assert_eq!(
            notifier.errors(),
            vec!["Cannot shortlist candidate 7-3 from status 'rejected'"]
        );
        // Unknown candidates are absorbed silently.
        assert!(!view.shortlist(42).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_releases_lock_while_in_flight() {
        let (state, api, _) = state_with(vec![
            application(7, 3, "initial_screening", 70.0),
            application(9, 3, "initial_screening", 80.0),
        ])
        .await;
        let gate = api.gate_updates();
        let view = Arc::new(ScreeningStageView::new(&state, ScreeningStage::Initial, 3));
        view.reject(7).await.unwrap();

        let saving = {
            let view = view.clone();
            tokio::spawn(async move { view.save_changes().await })
        };
        while !state.candidates.read().await.is_saving() {
            tokio::task::yield_now().await;
        }

        // The overlay stays usable during the request.
        assert!(view.reject(9).await.unwrap());
        assert!(matches!(view.save_changes().await, Err(AppError::SaveInProgress)));

        gate.notify_one();
        assert_eq!(saving.await.unwrap().unwrap(), 1);
        let dirty: Vec<_> = state.candidates.read().await.dirty_keys().iter().copied().collect();
        assert_eq!(dirty, vec![DirtyKey::new(9, 3)]);
    }

    #[tokio::test]
    async fn test_discard_with_revert_refetches() {
        let (state, api, _) = state_with(vec![application(7, 3, "initial_screening", 70.0)]).await;
        let view = ScreeningStageView::new(&state, ScreeningStage::Initial, 3);
        view.reject(7).await.unwrap();

        assert_eq!(view.discard_changes(true).await.unwrap(), 1);

        let list = view.candidates().await;
        assert_eq!(list[0].status, CandidateStatus::InitialScreening);
        assert!(!view.has_unsaved_changes().await);
        assert_eq!(api.fetch_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_feedback_validation_and_submit() {
        let (state, api, notifier) = state_with(Vec::new()).await;
        let view = ScreeningStageView::new(&state, ScreeningStage::Final, 3);

        assert!(matches!(
            view.submit_feedback(7, "too low", 101).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            view.submit_feedback(7, "   ", 50).await,
            Err(AppError::InvalidInput(_))
        ));

        view.submit_feedback(7, " Strong Rust background ", 85)
            .await
            .unwrap();
        let sent = api.feedback.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![FeedbackRequest {
                candidate_id: 7,
                job_id: 3,
                feedback_text: "Strong Rust background".to_string(),
                suggested_score: 85,
            }]
        );
        assert_eq!(
            notifier.messages().last().unwrap().1,
            "Feedback submitted successfully!"
        );
    }

    #[test]
    fn test_stage_parses_case_insensitively() {
        assert_eq!("Final".parse::<ScreeningStage>(), Ok(ScreeningStage::Final));
        assert!("middle".parse::<ScreeningStage>().is_err());
    }

    #[tokio::test]
    async fn test_actions_limited_to_their_view() {
        let (state, api, notifier) =
            state_with(vec![application(7, 3, "initial_screening", 70.0)]).await;
        let initial = ScreeningStageView::new(&state, ScreeningStage::Initial, 3);
        let final_view = ScreeningStageView::new(&state, ScreeningStage::Final, 3);

        assert!(matches!(initial.shortlist(7).await, Err(AppError::InvalidInput(_))));
        assert!(matches!(
            final_view.refer_to_final(7).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(!final_view.has_unsaved_changes().await);
        assert_eq!(
            notifier.errors(),
            vec![
                "Cannot shortlist from the initial screening view",
                "Cannot refer to final screening from the final screening view",
            ]
        );

        assert!(initial.refer_to_final(7).await.unwrap());
        assert!(final_view.shortlist(7).await.unwrap());
        assert_eq!(final_view.save_changes().await.unwrap(), 1);
        assert_eq!(
            api.update_calls.lock().unwrap()[0][0].status,
            CandidateStatus::FinalScreening
        );
    }

    #[tokio::test]
    async fn test_refresh_failure_notifies() {
        let (state, api, notifier) =
            state_with(vec![application(7, 3, "initial_screening", 70.0)]).await;
        api.fail_fetches();
        let view = ScreeningStageView::new(&state, ScreeningStage::Initial, 3);

        assert!(matches!(view.refresh().await, Err(AppError::Transfer(_))));
        assert_eq!(notifier.errors(), vec!["Failed to load candidates"]);
        // The last good list stays on screen.
        assert_eq!(ids(&view.candidates().await), vec![7]);
    }

    #[tokio::test]
    async fn test_discard_with_failed_revert_still_drops_changes() {
        let (state, api, notifier) =
            state_with(vec![application(7, 3, "initial_screening", 70.0)]).await;
        let view = ScreeningStageView::new(&state, ScreeningStage::Initial, 3);
        view.reject(7).await.unwrap();
        api.fail_fetches();

        assert!(matches!(
            view.discard_changes(true).await,
            Err(AppError::Transfer(_))
        ));
        assert!(!view.has_unsaved_changes().await);
        assert_eq!(notifier.errors(), vec!["Failed to load candidates"]);
    }

    #[tokio::test]
    async fn test_export_report_notices() {
        let (state, api, notifier) = state_with(Vec::new()).await;
        let view = ScreeningStageView::new(&state, ScreeningStage::Final, 3);

        let report = view.export_report().await.unwrap();
        assert!(report.starts_with(b"PK"));
        assert_eq!(
            notifier.messages().last().unwrap().1,
            "Excel report downloaded successfully!"
        );

        api.fail_exports();
        assert!(view.export_report().await.is_err());
        assert_eq!(notifier.errors(), vec!["Failed to generate Excel report"]);
        assert_eq!(*api.export_calls.lock().unwrap(), vec![Some(3), Some(3)]);
    }

    #[test]
    fn test_report_file_name() {
        let name = report_file_name(Some(3));
        assert!(name.starts_with("HR_Report_Job3_"));
        assert!(name.ends_with(".xlsx"));
        let stamp = &name["HR_Report_Job3_".len()..name.len() - ".xlsx".len()];
        assert!(stamp.parse::<i64>().is_ok());

        assert!(report_file_name(None).starts_with("HR_Report_1"));
    }
}
