//! In-memory collaborator for deterministic testing.
//!
//! Stores documents, case notes, and status writes in memory and implements
//! every gateway trait, with switches to make individual calls fail.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use casewise_gateway::mock::InMemoryCollaborator;
//!
//! let collaborator = InMemoryCollaborator::new()
//!     .with_document(doc)
//!     .with_failing_note_for_patient("p2");
//!
//! // ... run a worker cycle against it ...
//! assert_eq!(collaborator.notes().len(), 1);
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;

use casewise_core::{
    AdminAccount, AdminCredentials, CaseNote, CaseNoteGateway, Error, FileStatus,
    FileStatusGateway, NewCaseNote, Result, SystemGateway, UploadedDocument,
};

/// One recorded `set_file_status` call.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusWrite {
    pub file_id: String,
    pub status: FileStatus,
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Default)]
struct State {
    documents: Vec<UploadedDocument>,
    notes: Vec<CaseNote>,
    status_writes: Vec<StatusWrite>,
    list_calls: usize,
    health_calls: usize,
    cleanup_calls: usize,
    seed_calls: usize,
}

#[derive(Debug, Default)]
struct Faults {
    unhealthy: bool,
    fail_list: bool,
    fail_status: HashSet<(String, FileStatus)>,
    fail_notes_for_patient: HashSet<String>,
    cleanup_failures: u32,
    seed_failures: u32,
}

/// In-memory stand-in for the collaborator service.
#[derive(Clone, Default)]
pub struct InMemoryCollaborator {
    state: Arc<Mutex<State>>,
    faults: Arc<Mutex<Faults>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unavailable(what: &str) -> Error {
    Error::Gateway {
        status: 503,
        message: format!("{} unavailable", what),
    }
}

impl InMemoryCollaborator {
    /// Create an empty, healthy collaborator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stored document.
    pub fn with_document(self, document: UploadedDocument) -> Self {
        lock(&self.state).documents.push(document);
        self
    }

    /// Report the service as down on health checks.
    pub fn with_unhealthy(self) -> Self {
        lock(&self.faults).unhealthy = true;
        self
    }

    /// Fail every pending-list fetch.
    pub fn with_failing_list(self) -> Self {
        lock(&self.faults).fail_list = true;
        self
    }

    /// Fail status writes of `status` for `file_id`.
    pub fn with_failing_status(self, file_id: &str, status: FileStatus) -> Self {
        lock(&self.faults)
            .fail_status
            .insert((file_id.to_string(), status));
        self
    }

    /// Reject case notes for `patient_id`.
    pub fn with_failing_note_for_patient(self, patient_id: &str) -> Self {
        lock(&self.faults)
            .fail_notes_for_patient
            .insert(patient_id.to_string());
        self
    }

    /// Fail the first `n` cleanup calls.
    pub fn with_cleanup_failures(self, n: u32) -> Self {
        lock(&self.faults).cleanup_failures = n;
        self
    }

    /// Fail the first `n` seed calls (`u32::MAX` fails forever).
    pub fn with_seed_failures(self, n: u32) -> Self {
        lock(&self.faults).seed_failures = n;
        self
    }

    /// Snapshot of a stored document.
    pub fn document(&self, file_id: &str) -> Option<UploadedDocument> {
        lock(&self.state)
            .documents
            .iter()
            .find(|d| d.id == file_id)
            .cloned()
    }

    /// Current status of a stored document.
    pub fn status_of(&self, file_id: &str) -> Option<FileStatus> {
        self.document(file_id).map(|d| d.status)
    }

    /// All created case notes, in creation order.
    pub fn notes(&self) -> Vec<CaseNote> {
        lock(&self.state).notes.clone()
    }

    /// All status writes that succeeded, in call order.
    pub fn status_writes(&self) -> Vec<StatusWrite> {
        lock(&self.state).status_writes.clone()
    }

    pub fn list_calls(&self) -> usize {
        lock(&self.state).list_calls
    }

    pub fn health_calls(&self) -> usize {
        lock(&self.state).health_calls
    }

    pub fn cleanup_calls(&self) -> usize {
        lock(&self.state).cleanup_calls
    }

    pub fn seed_calls(&self) -> usize {
        lock(&self.state).seed_calls
    }
}

#[async_trait]
impl FileStatusGateway for InMemoryCollaborator {
    async fn list_pending_files(&self) -> Result<Vec<UploadedDocument>> {
        let fail = lock(&self.faults).fail_list;
        let mut state = lock(&self.state);
        state.list_calls += 1;
        if fail {
            return Err(unavailable("pending list"));
        }

        let mut pending: Vec<_> = state
            .documents
            .iter()
            .filter(|d| d.status == FileStatus::Uploaded)
            .cloned()
            .collect();
        pending.sort_by_key(|d| d.created_at);
        Ok(pending)
    }

    async fn set_file_status(
        &self,
        file_id: &str,
        status: FileStatus,
        metadata: Option<JsonValue>,
    ) -> Result<()> {
        if lock(&self.faults)
            .fail_status
            .contains(&(file_id.to_string(), status))
        {
            return Err(unavailable("status update"));
        }

        let mut state = lock(&self.state);
        let doc = state
            .documents
            .iter_mut()
            .find(|d| d.id == file_id)
            .ok_or_else(|| Error::Gateway {
                status: 404,
                message: format!("File not found: {}", file_id),
            })?;

        // Same arguments, same stored state: leave updated_at alone.
        if doc.status != status || doc.metadata != metadata {
            doc.status = status;
            doc.metadata = metadata.clone();
            doc.updated_at = Utc::now();
        }

        state.status_writes.push(StatusWrite {
            file_id: file_id.to_string(),
            status,
            metadata,
        });
        Ok(())
    }
}

#[async_trait]
impl CaseNoteGateway for InMemoryCollaborator {
    async fn create_case_note(&self, patient_id: &str, note: &NewCaseNote) -> Result<CaseNote> {
        let failing = lock(&self.faults)
            .fail_notes_for_patient
            .contains(patient_id);
        if failing {
            return Err(Error::Gateway {
                status: 500,
                message: "Internal server error".to_string(),
            });
        }

        let mut state = lock(&self.state);
        let now = Utc::now();
        let created = CaseNote {
            id: format!("note-{}", state.notes.len() + 1),
            patient_id: patient_id.to_string(),
            date: note.date.clone(),
            time: note.time.clone(),
            author: note.author.clone(),
            diagnosis: note.diagnosis.clone(),
            prescription: note.prescription.clone(),
            clinical_notes: note.clinical_notes.clone(),
            attachments: note.attachments.clone(),
            status: note.status,
            created_at: Some(now),
            updated_at: Some(now),
        };
        state.notes.push(created.clone());
        Ok(created)
    }
}

#[async_trait]
impl SystemGateway for InMemoryCollaborator {
    async fn health_check(&self) -> Result<bool> {
        lock(&self.state).health_calls += 1;
        Ok(!lock(&self.faults).unhealthy)
    }

    async fn cleanup(&self) -> Result<String> {
        lock(&self.state).cleanup_calls += 1;
        let mut faults = lock(&self.faults);
        if faults.cleanup_failures > 0 {
            faults.cleanup_failures -= 1;
            return Err(Error::Network("connection refused".to_string()));
        }
        Ok("System cleanup completed".to_string())
    }

    async fn seed_admin(&self) -> Result<AdminAccount> {
        lock(&self.state).seed_calls += 1;
        let mut faults = lock(&self.faults);
        if faults.seed_failures > 0 {
            if faults.seed_failures != u32::MAX {
                faults.seed_failures -= 1;
            }
            return Err(Error::Network("connection refused".to_string()));
        }
        Ok(AdminAccount {
            message: Some("Admin user seeded successfully".to_string()),
            credentials: Some(AdminCredentials {
                email: "admin@casewise.com".to_string(),
                password: "admin".to_string(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casewise_core::CaseNoteStatus;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn doc(id: &str, minutes: i64) -> UploadedDocument {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let created = base + Duration::minutes(minutes);
        UploadedDocument {
            id: id.to_string(),
            patient_id: "p1".to_string(),
            original_name: format!("{}.png", id),
            stored_name: format!("{}.png", id),
            stored_path: format!("/uploads/{}.png", id),
            document_type: ".png".to_string(),
            mime_type: "image/png".to_string(),
            size_bytes: 1,
            status: FileStatus::Uploaded,
            metadata: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[tokio::test]
    async fn test_pending_list_is_filtered_and_ordered() {
        let collab = InMemoryCollaborator::new()
            .with_document(doc("late", 10))
            .with_document(doc("early", 1));
        collab
            .set_file_status("late", FileStatus::Processing, None)
            .await
            .unwrap();
        collab
            .set_file_status("late", FileStatus::Uploaded, None)
            .await
            .unwrap();
        let collab = collab.with_document(doc("done", 0));
        collab
            .set_file_status("done", FileStatus::Processed, None)
            .await
            .unwrap();

        let pending = collab.list_pending_files().await.unwrap();
        let ids: Vec<_> = pending.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(collab.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_set_status_is_idempotent() {
        let collab = InMemoryCollaborator::new().with_document(doc("f1", 0));
        let meta = Some(json!({"extractedText": "abc"}));

        collab
            .set_file_status("f1", FileStatus::Processed, meta.clone())
            .await
            .unwrap();
        let once = collab.document("f1").unwrap();

        collab
            .set_file_status("f1", FileStatus::Processed, meta)
            .await
            .unwrap();
        let twice = collab.document("f1").unwrap();

        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_set_status_unknown_file() {
        let collab = InMemoryCollaborator::new();
        let err = collab
            .set_file_status("nope", FileStatus::Processing, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Gateway { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_failing_status_write() {
        let collab = InMemoryCollaborator::new()
            .with_document(doc("f1", 0))
            .with_failing_status("f1", FileStatus::Processing);
        assert!(collab
            .set_file_status("f1", FileStatus::Processing, None)
            .await
            .is_err());
        assert_eq!(collab.status_of("f1"), Some(FileStatus::Uploaded));
        assert!(collab.status_writes().is_empty());
    }

    #[tokio::test]
    async fn test_case_note_failure_persists_nothing() {
        let collab = InMemoryCollaborator::new().with_failing_note_for_patient("p1");
        let note = NewCaseNote {
            date: "2026-01-01".into(),
            time: "10:00".into(),
            author: "System upload".into(),
            diagnosis: "d".into(),
            prescription: "p".into(),
            clinical_notes: "n".into(),
            attachments: vec![],
            status: CaseNoteStatus::Draft,
        };
        assert!(collab.create_case_note("p1", &note).await.is_err());
        assert!(collab.notes().is_empty());

        let created = collab.create_case_note("p2", &note).await.unwrap();
        assert_eq!(created.id, "note-1");
        assert_eq!(created.patient_id, "p2");
    }

    #[tokio::test]
    async fn test_seed_failures_count_down() {
        let collab = InMemoryCollaborator::new().with_seed_failures(2);
        assert!(collab.seed_admin().await.is_err());
        assert!(collab.seed_admin().await.is_err());
        assert!(collab.seed_admin().await.is_ok());
        assert_eq!(collab.seed_calls(), 3);
    }

    #[tokio::test]
    async fn test_seed_failures_forever() {
        let collab = InMemoryCollaborator::new().with_seed_failures(u32::MAX);
        for _ in 0..10 {
            assert!(collab.seed_admin().await.is_err());
        }
    }
}
