//! Trait seams the intake worker is written against.
//!
//! The HTTP client in `casewise-gateway` implements the gateway traits; the
//! extractors in `casewise-jobs` implement [`TextExtractor`]. Tests swap in
//! in-memory implementations.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::{
    AdminAccount, CaseNote, ExtractedText, FileStatus, NewCaseNote, Result, UploadedDocument,
};

// =============================================================================
// COLLABORATOR GATEWAYS
// =============================================================================

/// Read pending uploads and record their processing status.
#[async_trait]
pub trait FileStatusGateway: Send + Sync {
    /// Documents with status `uploaded`, oldest first.
    async fn list_pending_files(&self) -> Result<Vec<UploadedDocument>>;

    /// Set a document's status and metadata.
    ///
    /// Idempotent: repeating the call with the same arguments leaves the
    /// same stored state.
    async fn set_file_status(
        &self,
        file_id: &str,
        status: FileStatus,
        metadata: Option<JsonValue>,
    ) -> Result<()>;
}

/// Persist structured case notes.
#[async_trait]
pub trait CaseNoteGateway: Send + Sync {
    /// Create a note for `patient_id`. Either the note is fully persisted
    /// and returned, or an error is returned and nothing was stored.
    async fn create_case_note(&self, patient_id: &str, note: &NewCaseNote) -> Result<CaseNote>;
}

/// Service-level calls used around the poll loop.
#[async_trait]
pub trait SystemGateway: Send + Sync {
    /// Liveness of the collaborator.
    async fn health_check(&self) -> Result<bool>;

    /// Remove stale uploads left by a previous run. Returns the service's message.
    async fn cleanup(&self) -> Result<String>;

    /// Ensure the default administrative account exists.
    async fn seed_admin(&self) -> Result<AdminAccount>;
}

// =============================================================================
// TEXT EXTRACTION
// =============================================================================

/// Turns a document on disk into raw text.
///
/// Implementations only read the file; they never move or delete it.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from the document at `path`.
    async fn extract(&self, path: &Path) -> Result<ExtractedText>;

    /// Check if the extractor's external dependencies are available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this extractor.
    fn name(&self) -> &str;
}
