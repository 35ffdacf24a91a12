use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use crate::bulk::progress::TransferProgress;
use crate::models::upload::{EntryStatus, ErrorDetail, UploadEntry};

/// Where the orchestrator is within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    /// Synthetic per-file progress ticks before the transfer.
    Preflight,
    /// The multipart request is in flight.
    Transfer,
}

/// Ordered set of staged files backing the upload surface.
#[derive(Debug, Default)]
pub struct UploadBatch {
    entries: Vec<UploadEntry>,
    phase: RunPhase,
    upload_error: Option<String>,
    transfer: TransferProgress,
}

impl UploadBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[UploadEntry] {
        &self.entries
    }

    pub fn get(&self, id: Uuid) -> Option<&UploadEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends entries in order. Same name and size as an existing entry is
    /// fine; a colliding id is replaced with a fresh one.
    pub fn add_entries(&mut self, entries: impl IntoIterator<Item = UploadEntry>) {
        let mut ids: HashSet<Uuid> = self.entries.iter().map(|e| e.id).collect();
        for mut entry in entries {
            while !ids.insert(entry.id) {
                debug!(id = %entry.id, file = %entry.name, "Regenerating duplicate entry id");
                entry.id = Uuid::new_v4();
            }
            self.entries.push(entry);
        }
    }

    /// Removes a pending entry while no run is active. Returns whether
    /// anything was removed.
    pub fn remove_entry(&mut self, id: Uuid) -> bool {
        if self.is_busy() {
            return false;
        }
        match self.entries.iter().position(|e| e.id == id) {
            Some(idx) if self.entries[idx].status == EntryStatus::Pending => {
                self.entries.remove(idx);
                true
            }
            _ => false,
        }
    }

    /// Drops every entry (and the file handles they own) and resets run state.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.phase = RunPhase::Idle;
        self.upload_error = None;
        self.transfer.reset();
    }

    /// Unknown ids and terminal entries are ignored; late progress events are
    /// expected.
    pub fn set_progress(&mut self, id: Uuid, value: u8) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) if !entry.status.is_terminal() => {
                entry.progress = value.min(100);
                true
            }
            _ => false,
        }
    }

    /// Terminal statuses force `progress = 100`; `error_detail` is only kept
    /// for `Error`. Terminal entries do not move again while a run is active.
    pub fn set_status(
        &mut self,
        id: Uuid,
        status: EntryStatus,
        error_detail: Option<ErrorDetail>,
    ) -> bool {
        let busy = self.is_busy();
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        if busy && entry.status.is_terminal() {
            debug!(id = %id, file = %entry.name, "Ignoring status change on finished entry");
            return false;
        }

        entry.status = status;
        entry.error_detail = match status {
            EntryStatus::Error => error_detail,
            _ => None,
        };
        if status.is_terminal() {
            entry.progress = 100;
        }
        true
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: RunPhase) {
        self.phase = phase;
    }

    /// True only while the network transfer is in flight.
    pub fn is_uploading(&self) -> bool {
        self.phase == RunPhase::Transfer
    }

    /// True for the whole run, pre-flight included.
    pub fn is_busy(&self) -> bool {
        self.phase != RunPhase::Idle
    }

    pub fn upload_error(&self) -> Option<&str> {
        self.upload_error.as_deref()
    }

    pub(crate) fn set_upload_error(&mut self, message: Option<String>) {
        self.upload_error = message;
    }

    pub fn transfer(&self) -> &TransferProgress {
        &self.transfer
    }

    /// Overall transfer percentage, derived from the byte counters.
    pub fn aggregate_progress(&self) -> u8 {
        self.transfer.percent()
    }

    pub fn pending_ids(&self) -> Vec<Uuid> {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Pending)
            .map(|e| e.id)
            .collect()
    }

    pub fn completed_count(&self) -> usize {
        self.count(EntryStatus::Completed)
    }

    pub fn error_count(&self) -> usize {
        self.count(EntryStatus::Error)
    }

    pub fn is_processing_complete(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|e| e.status.is_terminal())
    }

    fn count(&self, status: EntryStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }
}
