//! Data model shared by the gateway client and the intake worker.
//!
//! Records owned by the collaborator service use its camelCase wire names;
//! the Rust field names describe what the worker does with them.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults::{IMAGE_EXTENSIONS, PDF_EXTENSION};

// =============================================================================
// UPLOADED DOCUMENTS
// =============================================================================

/// Processing status of an uploaded document.
///
/// `Uploaded` is set by the upload endpoint; the worker moves a document to
/// `Processing` and then to exactly one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Uploaded,
    Processing,
    Processed,
    Error,
}

impl FileStatus {
    /// Terminal states are never left by the worker.
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Processed | FileStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Uploaded => "uploaded",
            FileStatus::Processing => "processing",
            FileStatus::Processed => "processed",
            FileStatus::Error => "error",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document uploaded against a patient case, as stored by the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    pub id: String,
    pub patient_id: String,
    pub original_name: String,
    #[serde(rename = "fileName")]
    pub stored_name: String,
    #[serde(rename = "filePath")]
    pub stored_path: String,
    /// File extension as recorded at upload, usually with a leading dot.
    #[serde(rename = "fileType")]
    pub document_type: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(rename = "size", default)]
    pub size_bytes: u64,
    pub status: FileStatus,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadedDocument {
    /// Lowercased extension without the leading dot.
    ///
    /// Falls back to the stored file name when the recorded type is blank.
    pub fn extension(&self) -> String {
        let recorded = normalize_extension(&self.document_type);
        if !recorded.is_empty() {
            return recorded;
        }
        std::path::Path::new(&self.stored_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(normalize_extension)
            .unwrap_or_default()
    }

    pub fn kind(&self) -> DocumentKind {
        DocumentKind::from_extension(&self.extension())
    }
}

/// Normalize an extension: trimmed, lowercased, no leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Broad document category used for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Image,
    Pdf,
    Unsupported,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Self {
        let ext = normalize_extension(ext);
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            DocumentKind::Image
        } else if ext == PDF_EXTENSION {
            DocumentKind::Pdf
        } else {
            DocumentKind::Unsupported
        }
    }
}

// =============================================================================
// EXTRACTION
// =============================================================================

/// Raw output of a text extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    /// Recognized text; may be empty for a blank page.
    pub text: String,
    /// Backend-specific details (page counts, engine, language).
    pub metadata: JsonValue,
    /// Set when every backend failed and `text` is a placeholder.
    pub degraded: bool,
}

impl ExtractedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: JsonValue::Object(Default::default()),
            degraded: false,
        }
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }

    /// True when the text contains something other than whitespace.
    pub fn is_usable(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Structured fields derived from raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFields {
    pub diagnosis: String,
    pub prescription: String,
    pub notes: String,
}

/// Transient result of processing one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub raw_text: String,
    pub parsed_fields: ParsedFields,
}

// =============================================================================
// CASE NOTES
// =============================================================================

/// Lifecycle state of a case note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseNoteStatus {
    #[default]
    Draft,
    Completed,
}

/// Body of a case note creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCaseNote {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    #[serde(rename = "doctor")]
    pub author: String,
    pub diagnosis: String,
    pub prescription: String,
    #[serde(rename = "notes")]
    pub clinical_notes: String,
    pub attachments: Vec<String>,
    pub status: CaseNoteStatus,
}

impl NewCaseNote {
    /// Build a draft note from parsed fields, stamped with the local time.
    pub fn draft(fields: ParsedFields, author: &str, attachments: Vec<String>) -> Self {
        Self::draft_at(fields, author, attachments, Local::now())
    }

    pub fn draft_at(
        fields: ParsedFields,
        author: &str,
        attachments: Vec<String>,
        at: DateTime<Local>,
    ) -> Self {
        Self {
            date: at.format("%Y-%m-%d").to_string(),
            time: at.format("%H:%M").to_string(),
            author: author.to_string(),
            diagnosis: fields.diagnosis,
            prescription: fields.prescription,
            clinical_notes: fields.notes,
            attachments,
            status: CaseNoteStatus::Draft,
        }
    }
}

/// A case note as persisted by the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseNote {
    pub id: String,
    pub patient_id: String,
    pub date: String,
    pub time: String,
    #[serde(rename = "doctor")]
    pub author: String,
    pub diagnosis: String,
    pub prescription: String,
    #[serde(rename = "notes")]
    pub clinical_notes: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub status: CaseNoteStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// STARTUP
// =============================================================================

/// Login of the seeded administrative account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Answer of the seed-admin call (created or already existing).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminAccount {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub credentials: Option<AdminCredentials>,
}

// =============================================================================
// WORKER JOBS
// =============================================================================

/// Kind of an in-process worker job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Run the intake pipeline on the document in the payload.
    ProcessDocument,
}

/// Entry of the worker's in-process job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerJob {
    pub id: Uuid,
    pub kind: JobKind,
    pub payload: JsonValue,
    pub enqueued_at: DateTime<Utc>,
}

impl WorkerJob {
    pub fn new(kind: JobKind, payload: JsonValue) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            payload,
            enqueued_at: Utc::now(),
        }
    }

    /// Job that runs the intake pipeline on `document`.
    pub fn process_document(document: &UploadedDocument) -> crate::Result<Self> {
        Ok(Self::new(
            JobKind::ProcessDocument,
            serde_json::to_value(document)?,
        ))
    }
}
