//! Turns raw selections (picked files, picked folders, dropped items) into
//! validated upload entries.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::bulk::validator::{classify, RejectionReason};
use crate::models::upload::{FileSource, UploadEntry};

#[derive(Debug, Clone)]
pub enum SelectionItem {
    /// A single file picked by the user.
    File(PathBuf),
    /// A folder; every file below it is considered.
    Folder(PathBuf),
    /// Contents already in memory, with the MIME type the source reported.
    Blob {
        name: String,
        mime_type: Option<String>,
        contents: Bytes,
    },
}

#[derive(Debug, Default)]
pub struct SelectionOutcome {
    pub accepted: Vec<UploadEntry>,
    pub rejected: Vec<RejectionReason>,
}

/// Classifies every file in `items`. A rejected file never stops the rest.
pub fn collect(items: impl IntoIterator<Item = SelectionItem>) -> SelectionOutcome {
    let mut outcome = SelectionOutcome::default();

    for item in items {
        match item {
            SelectionItem::File(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                stage_path(&mut outcome, path, name);
            }
            SelectionItem::Folder(root) => collect_folder(&mut outcome, &root),
            SelectionItem::Blob {
                name,
                mime_type,
                contents,
            } => match classify(&name, mime_type.as_deref()) {
                Ok(kind) => outcome
                    .accepted
                    .push(UploadEntry::from_bytes(name, kind, contents)),
                Err(reason) => outcome.rejected.push(reason),
            },
        }
    }

    debug!(
        accepted = outcome.accepted.len(),
        rejected = outcome.rejected.len(),
        "Selection classified"
    );
    outcome
}

fn collect_folder(outcome: &mut SelectionOutcome, root: &Path) {
    // Names are reported relative to the folder's parent, so they keep the
    // folder name itself as the first segment.
    let base = root.parent().unwrap_or(root);

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let file_name = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                warn!(file = %file_name, "Skipping unreadable folder entry: {e}");
                outcome.rejected.push(RejectionReason::Unreadable {
                    file_name,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let name = relative_name(&path, base);
        stage_path(outcome, path, name);
    }
}

fn stage_path(outcome: &mut SelectionOutcome, path: PathBuf, name: String) {
    let mime_type = mime_guess::from_path(&path).first_raw();
    let kind = match classify(&name, mime_type) {
        Ok(kind) => kind,
        Err(reason) => {
            outcome.rejected.push(reason);
            return;
        }
    };

    match std::fs::metadata(&path) {
        Ok(meta) => outcome
            .accepted
            .push(UploadEntry::new(name, meta.len(), kind, FileSource::Path(path))),
        Err(e) => {
            warn!(file = %name, "Cannot stat selected file: {e}");
            outcome.rejected.push(RejectionReason::Unreadable {
                file_name: name,
                reason: e.to_string(),
            });
        }
    }
}

fn relative_name(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
