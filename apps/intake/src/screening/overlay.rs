//! Local candidate list with explicitly tracked, not-yet-persisted status
//! changes.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use tracing::{debug, info, warn};

use crate::api_client::wire::{ApplicationRecord, UpdateOutcome};
use crate::api_client::{ApiError, RecruitApi};
use crate::errors::AppError;
use crate::models::candidate::{Candidate, CandidateStatus, DirtyKey};

/// Named status changes a reviewer can make. There is no generic setter in
/// the views; every change goes through one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    RejectAtInitial,
    /// Makes the candidate eligible for the final-screening view. The stored
    /// status stays `initial_screening`.
    ReferToFinal,
    Shortlist,
    RejectAtFinal,
}

impl Transition {
    pub fn target(&self) -> CandidateStatus {
        match self {
            Transition::RejectAtInitial => CandidateStatus::Rejected,
            Transition::ReferToFinal => CandidateStatus::InitialScreening,
            Transition::Shortlist => CandidateStatus::FinalScreening,
            Transition::RejectAtFinal => CandidateStatus::RejectedByHr,
        }
    }

    /// Every transition starts from `initial_screening`. Repeating a
    /// transition that already holds is accepted.
    pub fn allowed_from(&self, from: CandidateStatus) -> bool {
        from == CandidateStatus::InitialScreening || from == self.target()
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Transition::RejectAtInitial => "reject at initial screening",
            Transition::ReferToFinal => "refer to final screening",
            Transition::Shortlist => "shortlist",
            Transition::RejectAtFinal => "reject at final screening",
        })
    }
}

/// Snapshot of the dirty candidates taken when a save starts.
#[derive(Debug, Clone)]
pub struct PendingSave {
    pub candidates: Vec<Candidate>,
}

impl PendingSave {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct CandidateOverlay {
    candidates: Vec<Candidate>,
    dirty: BTreeSet<DirtyKey>,
    saving: bool,
}

impl CandidateOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidates(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn get(&self, key: DirtyKey) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.key() == key)
    }

    pub fn dirty_keys(&self) -> &BTreeSet<DirtyKey> {
        &self.dirty
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Replaces the status of one candidate and marks it dirty. An unknown
    /// key is logged and ignored; returns whether a candidate was updated.
    pub fn set_status_locally(
        &mut self,
        candidate_id: u64,
        job_id: u64,
        status: CandidateStatus,
    ) -> bool {
        let key = DirtyKey::new(candidate_id, job_id);
        let Some(candidate) = self.candidates.iter_mut().find(|c| c.key() == key) else {
            warn!(key = %key, "Status change for unknown candidate ignored");
            return false;
        };

        candidate.status = status;
        self.dirty.insert(key);
        debug!(key = %key, status = %status, dirty = self.dirty.len(), "Staged status change");
        true
    }

    /// Applies a named transition. `Ok(false)` means the candidate is gone.
    pub fn apply(
        &mut self,
        candidate_id: u64,
        job_id: u64,
        transition: Transition,
    ) -> Result<bool, AppError> {
        let key = DirtyKey::new(candidate_id, job_id);
        let Some(current) = self.get(key).map(|c| c.status) else {
            warn!(key = %key, %transition, "Transition for unknown candidate ignored");
            return Ok(false);
        };
        if !transition.allowed_from(current) {
            return Err(AppError::IllegalTransition {
                key,
                from: current,
                transition,
            });
        }
        Ok(self.set_status_locally(candidate_id, job_id, transition.target()))
    }

    /// Starts a save: snapshots exactly the dirty candidates. `Ok(None)` when
    /// there is nothing to save.
    pub fn begin_save(&mut self) -> Result<Option<PendingSave>, AppError> {
        if self.saving {
            return Err(AppError::SaveInProgress);
        }
        if self.dirty.is_empty() {
            return Ok(None);
        }

        let candidates: Vec<Candidate> = self
            .candidates
            .iter()
            .filter(|c| self.dirty.contains(&c.key()))
            .cloned()
            .collect();
        self.saving = true;
        Ok(Some(PendingSave { candidates }))
    }

    /// Finishes a save started with `begin_save`. On success the saved keys
    /// are cleared, except those edited again while the request was in
    /// flight. On failure nothing is cleared.
    pub fn complete_save(
        &mut self,
        pending: &PendingSave,
        result: Result<UpdateOutcome, ApiError>,
    ) -> Result<usize, AppError> {
        self.saving = false;

        let outcome = result?;
        if outcome.partial {
            info!(count = pending.len(), "Batch update partially applied by server");
        }

        for saved in &pending.candidates {
            let key = saved.key();
            let unchanged = self.get(key).map_or(true, |c| c.status == saved.status);
            if unchanged {
                self.dirty.remove(&key);
            } else {
                debug!(key = %key, "Candidate edited during save, keeping it dirty");
            }
        }
        Ok(pending.len())
    }

    /// Persists all dirty candidates in one request. Callers that share the
    /// overlay behind a lock use `begin_save`/`complete_save` instead so the
    /// lock is not held across the request.
    pub async fn save_changes(&mut self, api: &dyn RecruitApi) -> Result<usize, AppError> {
        let Some(pending) = self.begin_save()? else {
            return Ok(0);
        };
        let result = api.update_applications(&pending.candidates).await;
        self.complete_save(&pending, result)
    }

    /// Forgets every staged change without touching the displayed statuses.
    pub fn discard_changes(&mut self) -> usize {
        let count = self.dirty.len();
        self.dirty.clear();
        count
    }

    /// Replaces the list with freshly fetched records, then puts unsaved
    /// local statuses back on top by key.
    pub fn apply_fetched(&mut self, records: Vec<ApplicationRecord>) -> usize {
        let staged: HashMap<DirtyKey, CandidateStatus> = self
            .candidates
            .iter()
            .filter(|c| self.dirty.contains(&c.key()))
            .map(|c| (c.key(), c.status))
            .collect();

        self.candidates = records.into_iter().map(Candidate::from).collect();

        let mut dropped = Vec::new();
        for key in &self.dirty {
            match (
                self.candidates.iter_mut().find(|c| c.key() == *key),
                staged.get(key),
            ) {
                (Some(candidate), Some(status)) => candidate.status = *status,
                _ => dropped.push(*key),
            }
        }
        if !dropped.is_empty() {
            let keys: Vec<String> = dropped.iter().map(DirtyKey::to_string).collect();
            warn!(keys = %keys.join(","), "Dropping unsaved changes for candidates no longer listed");
            for key in &dropped {
                self.dirty.remove(key);
            }
        }

        debug!(
            count = self.candidates.len(),
            dirty = self.dirty.len(),
            "Candidate list refreshed"
        );
        self.candidates.len()
    }

    pub async fn fetch_candidates(&mut self, api: &dyn RecruitApi) -> Result<usize, AppError> {
        let records = api.fetch_applications().await?;
        Ok(self.apply_fetched(records))
    }
}
