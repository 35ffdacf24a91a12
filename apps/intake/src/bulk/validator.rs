use thiserror::Error;

use crate::models::upload::FileKind;

const ACCEPTED: &[(FileKind, &str, &str)] = &[
    (FileKind::Pdf, ".pdf", "application/pdf"),
    (
        FileKind::Docx,
        ".docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (FileKind::Doc, ".doc", "application/msword"),
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("This format is not accepted: {file_name}. Please upload PDF or Word documents only.")]
    UnsupportedType {
        file_name: String,
        mime_type: Option<String>,
    },

    #[error("Could not read {file_name}: {reason}")]
    Unreadable { file_name: String, reason: String },
}

impl RejectionReason {
    pub fn file_name(&self) -> &str {
        match self {
            RejectionReason::UnsupportedType { file_name, .. }
            | RejectionReason::Unreadable { file_name, .. } => file_name,
        }
    }
}

/// Decides whether a file is an acceptable resume document.
///
/// Accepted when the declared MIME type is one of the three document types or
/// the name ends in `.pdf`, `.doc` or `.docx` (case-insensitive). The
/// extension decides the kind when it matches; the MIME type is the fallback.
pub fn classify(file_name: &str, mime_type: Option<&str>) -> Result<FileKind, RejectionReason> {
    let lower = file_name.to_lowercase();
    if let Some((kind, _, _)) = ACCEPTED.iter().find(|(_, ext, _)| lower.ends_with(ext)) {
        return Ok(*kind);
    }

    let declared = mime_type.map(|m| {
        m.split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    });
    if let Some(declared) = declared.as_deref() {
        if let Some((kind, _, _)) = ACCEPTED.iter().find(|(_, _, mime)| *mime == declared) {
            return Ok(*kind);
        }
    }

    Err(RejectionReason::UnsupportedType {
        file_name: file_name.to_string(),
        mime_type: mime_type.map(str::to_string),
    })
}
