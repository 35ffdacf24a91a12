use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Key used for messages that are not attached to a specific field.
pub const GENERAL_FIELD: &str = "non_field_errors";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Docx,
    Doc,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::Doc => "doc",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            FileKind::Pdf => "application/pdf",
            FileKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileKind::Doc => "application/msword",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl EntryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryStatus::Completed | EntryStatus::Error)
    }
}

/// Structured error attached to an entry: field name → messages.
///
/// The server sends either a plain string or a mapping whose values are a
/// string or a list of strings; both shapes normalise to the same map.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "Value", into = "BTreeMap<String, Vec<String>>")]
pub struct ErrorDetail {
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ErrorDetail {
    pub fn message(message: impl Into<String>) -> Self {
        Self::field(GENERAL_FIELD, message)
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), vec![message.into()]);
        Self { fields }
    }

    /// One display line per field; general messages are rendered bare.
    pub fn lines(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|(field, messages)| {
                if field == GENERAL_FIELD {
                    messages.join(", ")
                } else {
                    format!("{field}: {}", messages.join(", "))
                }
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        self.lines().join("; ")
    }
}

impl From<Value> for ErrorDetail {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                let fields = map
                    .into_iter()
                    .map(|(field, v)| (field, value_messages(v)))
                    .collect();
                Self { fields }
            }
            other => {
                let messages = value_messages(other);
                let mut fields = BTreeMap::new();
                fields.insert(GENERAL_FIELD.to_string(), messages);
                Self { fields }
            }
        }
    }
}

impl From<ErrorDetail> for BTreeMap<String, Vec<String>> {
    fn from(detail: ErrorDetail) -> Self {
        detail.fields
    }
}

fn value_messages(value: Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s],
        Value::Array(items) => items.into_iter().flat_map(value_messages).collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// The file handle an entry owns; dropped with the entry.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Bytes),
}

/// One file staged for bulk upload.
#[derive(Debug, Clone)]
pub struct UploadEntry {
    pub id: Uuid,
    /// Display name; folder selections keep their relative path here.
    pub name: String,
    /// Bare file name sent as the multipart filename.
    pub upload_name: String,
    pub size: u64,
    pub kind: FileKind,
    pub status: EntryStatus,
    pub progress: u8,
    pub error_detail: Option<ErrorDetail>,
    pub source: FileSource,
}

impl UploadEntry {
    pub fn new(name: impl Into<String>, size: u64, kind: FileKind, source: FileSource) -> Self {
        let name: String = name.into();
        let upload_name = name.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            id: Uuid::new_v4(),
            name,
            upload_name,
            size,
            kind,
            status: EntryStatus::Pending,
            progress: 0,
            error_detail: None,
            source,
        }
    }

    /// In-memory entry, as produced by a drop of already-read blobs.
    pub fn from_bytes(name: impl Into<String>, kind: FileKind, bytes: Bytes) -> Self {
        let size = bytes.len() as u64;
        Self::new(name, size, kind, FileSource::Memory(bytes))
    }

    /// Loads the entry's contents for the transfer.
    pub async fn read_contents(&self) -> std::io::Result<Bytes> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }
}

/// Formats a byte count the way the upload list displays it.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut exponent = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && exponent < UNITS.len() - 1 {
        scaled /= 1024;
        exponent += 1;
    }
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[exponent])
}
