//! Intake worker: polls for pending uploads and turns them into case notes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value as JsonValue};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use casewise_core::defaults::{
    ERROR_BACKOFF_MS, EVENT_BUS_CAPACITY, NOTE_AUTHOR, NO_DATA_SENTINEL, POLL_INTERVAL_MS,
    UNSUPPORTED_TYPE_MESSAGE,
};
use casewise_core::{
    CaseNoteGateway, Error, ExtractionResult, FileStatus, FileStatusGateway, JobKind, NewCaseNote,
    Result, SystemGateway, TextExtractor, UploadedDocument, WorkerJob,
};

use crate::extraction::ExtractorRegistry;
use crate::parser::FieldParser;
use crate::queue::JobQueue;

/// Configuration for the intake worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between poll cycles in milliseconds.
    pub poll_interval_ms: u64,
    /// Sleep after a cycle that failed as a whole, in milliseconds.
    pub error_backoff_ms: u64,
    /// Whether to run the poll loop at all.
    pub enabled: bool,
    /// Author recorded on created case notes.
    pub note_author: String,
    /// Placeholder for fields the parser could not derive.
    pub sentinel: String,
    /// Where processed files are moved; `None` leaves them in place.
    pub processed_dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: POLL_INTERVAL_MS,
            error_backoff_ms: ERROR_BACKOFF_MS,
            enabled: true,
            note_author: NOTE_AUTHOR.to_string(),
            sentinel: NO_DATA_SENTINEL.to_string(),
            processed_dir: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_ENABLED` | `true` | Enable/disable the poll loop |
    /// | `WORKER_POLL_INTERVAL_MS` | `30000` | Sleep between cycles |
    /// | `WORKER_ERROR_BACKOFF_MS` | `5000` | Sleep after a failed cycle |
    /// | `NOTE_AUTHOR` | `System upload` | Case note author |
    /// | `NO_DATA_SENTINEL` | `No Data found` | Placeholder for missing fields |
    /// | `PROCESSED_DIR` | unset | Archive directory for processed files |
    pub fn from_env() -> Self {
        let enabled = std::env::var("WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let poll_interval_ms = std::env::var("WORKER_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(POLL_INTERVAL_MS);

        let error_backoff_ms = std::env::var("WORKER_ERROR_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(ERROR_BACKOFF_MS);

        let note_author = std::env::var("NOTE_AUTHOR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| NOTE_AUTHOR.to_string());

        let sentinel = std::env::var("NO_DATA_SENTINEL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| NO_DATA_SENTINEL.to_string());

        let processed_dir = std::env::var("PROCESSED_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            poll_interval_ms,
            error_backoff_ms,
            enabled,
            note_author,
            sentinel,
            processed_dir,
        }
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_error_backoff(mut self, ms: u64) -> Self {
        self.error_backoff_ms = ms;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_note_author(mut self, author: impl Into<String>) -> Self {
        self.note_author = author.into();
        self
    }

    pub fn with_processed_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.processed_dir = Some(dir.into());
        self
    }
}

/// Event emitted by the intake worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Poll loop started.
    WorkerStarted,
    /// A poll cycle finished.
    CycleCompleted {
        processed: usize,
        failed: usize,
        unsupported: usize,
    },
    /// A document was extracted and filed as a case note.
    DocumentProcessed {
        file_id: String,
        case_note_id: String,
        degraded: bool,
    },
    /// A document of an unsupported type was marked processed without a note.
    DocumentUnsupported { file_id: String, extension: String },
    /// A document ended in `error`.
    DocumentFailed { file_id: String, error: String },
    /// Poll loop exited.
    WorkerStopped,
}

/// How one document ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Processed {
        case_note_id: String,
        degraded: bool,
    },
    Unsupported,
    Failed { error: String },
}

/// Tally of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Collaborator liveness as reported at the start of the cycle.
    pub backend_healthy: bool,
    pub processed: usize,
    pub failed: usize,
    pub unsupported: usize,
    /// Queue jobs discarded because their payload was not a document.
    pub discarded_jobs: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &DocumentOutcome) {
        match outcome {
            DocumentOutcome::Processed { .. } => self.processed += 1,
            DocumentOutcome::Unsupported => self.unsupported += 1,
            DocumentOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Documents that reached a terminal status this cycle.
    pub fn total(&self) -> usize {
        self.processed + self.failed + self.unsupported
    }
}

/// Handle for controlling a running worker.
///
/// Dropping the handle stops the loop once the current cycle ends.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    running: Arc<AtomicBool>,
    queue: Arc<JobQueue>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Ask the worker to stop. The document in flight is finished first.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        // Wakes the loop if it is sleeping; a full channel already holds a wake-up.
        let _ = self.shutdown_tx.try_send(());
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }

    /// Queue a job for the next cycle.
    pub fn enqueue(&self, job: WorkerJob) {
        self.queue.push(job);
    }

    /// Wait for the poll loop to exit.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Worker task failed: {}", e)))
    }
}

/// Single-instance intake worker.
///
/// Documents are processed strictly one at a time, in the order the
/// collaborator lists them, then queued jobs in FIFO order. Running two
/// workers against the same collaborator can process a document twice; a
/// multi-worker setup would need an atomic `uploaded → processing` claim at
/// the gateway.
pub struct IntakeWorker {
    files: Arc<dyn FileStatusGateway>,
    notes: Arc<dyn CaseNoteGateway>,
    system: Arc<dyn SystemGateway>,
    registry: Arc<ExtractorRegistry>,
    parser: FieldParser,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
    running: Arc<AtomicBool>,
    queue: Arc<JobQueue>,
}

impl IntakeWorker {
    /// Create a worker over separate gateway implementations.
    pub fn new(
        files: Arc<dyn FileStatusGateway>,
        notes: Arc<dyn CaseNoteGateway>,
        system: Arc<dyn SystemGateway>,
        registry: ExtractorRegistry,
        config: WorkerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            files,
            notes,
            system,
            registry: Arc::new(registry),
            parser: FieldParser::new(config.sentinel.clone()),
            config,
            event_tx,
            running: Arc::new(AtomicBool::new(true)),
            queue: Arc::new(JobQueue::new()),
        }
    }

    /// Create a worker over one collaborator implementing every gateway.
    pub fn with_gateway<G>(
        gateway: Arc<G>,
        registry: ExtractorRegistry,
        config: WorkerConfig,
    ) -> Self
    where
        G: FileStatusGateway + CaseNoteGateway + SystemGateway + 'static,
    {
        Self::new(gateway.clone(), gateway.clone(), gateway, registry, config)
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Queue a job for the next cycle.
    pub fn enqueue(&self, job: WorkerJob) {
        self.queue.push(job);
    }

    pub fn queued_jobs(&self) -> usize {
        self.queue.len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn emit(&self, event: WorkerEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Start the poll loop and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();
        let running = self.running.clone();
        let queue = self.queue.clone();

        let task = tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
            running,
            queue,
            task,
        }
    }

    /// Poll loop: cycle, sleep, repeat until shut down.
    ///
    /// A cycle that fails as a whole (pending list unavailable) is followed by
    /// the shorter error backoff instead of the poll interval.
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Intake worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            error_backoff_ms = self.config.error_backoff_ms,
            extensions = ?self.registry.supported_extensions(),
            "Intake worker started"
        );
        self.emit(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let error_backoff = Duration::from_millis(self.config.error_backoff_ms);

        loop {
            if !self.is_running() {
                info!("Intake worker received shutdown signal");
                break;
            }

            let pause = match self.run_cycle().await {
                Ok(_) => poll_interval,
                Err(e) => {
                    error!(
                        error = %e,
                        backoff_ms = self.config.error_backoff_ms,
                        "Poll cycle failed"
                    );
                    error_backoff
                }
            };

            if !self.is_running() {
                info!("Intake worker received shutdown signal");
                break;
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Intake worker received shutdown signal");
                    break;
                }
                _ = sleep(pause) => {}
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Intake worker stopped");
        self.emit(WorkerEvent::WorkerStopped);
    }

    /// Run one poll cycle: liveness check, pending list, then queued jobs.
    ///
    /// Per-document failures are contained and counted; only a failure to
    /// fetch the pending list fails the cycle.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        report.backend_healthy = match self.system.health_check().await {
            Ok(true) => true,
            Ok(false) => {
                warn!("Collaborator health check reported unhealthy");
                false
            }
            Err(e) => {
                warn!(error = %e, "Collaborator health check failed");
                false
            }
        };

        let pending = self.files.list_pending_files().await?;
        debug!(count = pending.len(), "Fetched pending documents");

        for doc in &pending {
            if !self.is_running() {
                info!("Shutdown requested, leaving remaining documents for the next run");
                break;
            }
            let outcome = self.process_document(doc).await;
            report.record(&outcome);
        }

        while self.is_running() {
            let Some(job) = self.queue.pop() else {
                break;
            };
            let decoded: serde_json::Result<UploadedDocument> = match job.kind {
                JobKind::ProcessDocument => serde_json::from_value(job.payload),
            };
            match decoded {
                Ok(doc) => {
                    debug!(job_id = %job.id, file_id = %doc.id, "Processing queued document");
                    let outcome = self.process_document(&doc).await;
                    report.record(&outcome);
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Discarding job with undecodable payload");
                    report.discarded_jobs += 1;
                }
            }
        }

        if report.total() > 0 {
            info!(
                processed = report.processed,
                failed = report.failed,
                unsupported = report.unsupported,
                "Poll cycle completed"
            );
        } else {
            debug!("Poll cycle completed, nothing pending");
        }
        self.emit(WorkerEvent::CycleCompleted {
            processed: report.processed,
            failed: report.failed,
            unsupported: report.unsupported,
        });

        Ok(report)
    }

    /// Drive one document from `uploaded` to `processed` or `error`.
    ///
    /// Never returns an error: every failure ends in the `error` status with
    /// the message in metadata.
    #[instrument(skip(self, doc), fields(file_id = %doc.id, patient_id = %doc.patient_id))]
    pub async fn process_document(&self, doc: &UploadedDocument) -> DocumentOutcome {
        let start = Instant::now();

        if let Err(e) = self
            .files
            .set_file_status(&doc.id, FileStatus::Processing, None)
            .await
        {
            warn!(error = %e, "Could not mark document processing, continuing");
        }

        let extension = doc.extension();
        let outcome = match self.registry.resolve(&extension) {
            None => self.mark_unsupported(doc, &extension).await,
            Some(extractor) => match self.extract_and_file(doc, extractor.as_ref()).await {
                Ok(outcome) => outcome,
                Err(e) => self.mark_failed(doc, &e).await,
            },
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            DocumentOutcome::Processed {
                case_note_id,
                degraded,
            } => {
                info!(case_note_id = %case_note_id, degraded, duration_ms, "Document processed");
                self.emit(WorkerEvent::DocumentProcessed {
                    file_id: doc.id.clone(),
                    case_note_id: case_note_id.clone(),
                    degraded: *degraded,
                });
                self.archive(doc).await;
            }
            DocumentOutcome::Unsupported => {
                info!(
                    document_type = %extension,
                    duration_ms,
                    "Unsupported document type, skipped extraction"
                );
                self.emit(WorkerEvent::DocumentUnsupported {
                    file_id: doc.id.clone(),
                    extension,
                });
            }
            DocumentOutcome::Failed { error } => {
                self.emit(WorkerEvent::DocumentFailed {
                    file_id: doc.id.clone(),
                    error: error.clone(),
                });
            }
        }

        outcome
    }

    /// Extract, parse, create the note, then commit `processed`.
    ///
    /// The status is committed only after the note exists, so a processed
    /// document always has its note.
    async fn extract_and_file(
        &self,
        doc: &UploadedDocument,
        extractor: &dyn TextExtractor,
    ) -> Result<DocumentOutcome> {
        debug!(document_type = %doc.extension(), extractor = extractor.name(), "Extracting text");
        let extracted = extractor.extract(Path::new(&doc.stored_path)).await?;
        if extracted.degraded {
            warn!(
                extractor = extractor.name(),
                "Extraction degraded, filing placeholder text"
            );
        }

        let result = ExtractionResult {
            parsed_fields: self.parser.parse_output(&extracted.text),
            raw_text: extracted.text,
        };

        let note = NewCaseNote::draft(
            result.parsed_fields,
            &self.config.note_author,
            vec![doc.stored_name.clone()],
        );
        let created = self.notes.create_case_note(&doc.patient_id, &note).await?;

        let metadata = json!({
            "extractedText": result.raw_text,
            "caseNoteId": created.id,
            "extractor": extractor.name(),
            "degraded": extracted.degraded,
        });
        if let Err(e) = self
            .files
            .set_file_status(&doc.id, FileStatus::Processed, Some(metadata))
            .await
        {
            error!(
                case_note_id = %created.id,
                error = %e,
                "Case note created but processed status not recorded"
            );
            return Err(e);
        }

        Ok(DocumentOutcome::Processed {
            case_note_id: created.id,
            degraded: extracted.degraded,
        })
    }

    async fn mark_unsupported(&self, doc: &UploadedDocument, extension: &str) -> DocumentOutcome {
        let metadata = json!({ "message": UNSUPPORTED_TYPE_MESSAGE });
        match self
            .files
            .set_file_status(&doc.id, FileStatus::Processed, Some(metadata))
            .await
        {
            Ok(()) => DocumentOutcome::Unsupported,
            Err(e) => {
                warn!(document_type = %extension, error = %e, "Could not record unsupported type");
                self.mark_failed(doc, &e).await
            }
        }
    }

    async fn mark_failed(&self, doc: &UploadedDocument, err: &Error) -> DocumentOutcome {
        let message = err.to_string();
        error!(error = %message, "Document processing failed");

        let metadata: JsonValue = json!({ "error": message });
        if let Err(e) = self
            .files
            .set_file_status(&doc.id, FileStatus::Error, Some(metadata))
            .await
        {
            error!(error = %e, "Could not record error status, document left in processing");
        }

        DocumentOutcome::Failed { error: message }
    }

    /// Move a processed file into `processed_dir`. Failures only warn.
    async fn archive(&self, doc: &UploadedDocument) {
        let Some(dir) = &self.config.processed_dir else {
            return;
        };
        let source = Path::new(&doc.stored_path);
        let target = dir.join(&doc.stored_name);

        if let Err(e) = move_file(source, dir, &target).await {
            warn!(
                source = %source.display(),
                target = %target.display(),
                error = %e,
                "Could not archive processed file"
            );
        } else {
            debug!(target = %target.display(), "Archived processed file");
        }
    }
}

async fn move_file(source: &Path, dir: &Path, target: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    if tokio::fs::rename(source, target).await.is_ok() {
        return Ok(());
    }
    // rename fails across filesystems
    tokio::fs::copy(source, target).await?;
    tokio::fs::remove_file(source).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval_ms, 30_000);
        assert_eq!(config.error_backoff_ms, 5_000);
        assert!(config.enabled);
        assert_eq!(config.note_author, "System upload");
        assert_eq!(config.sentinel, "No Data found");
        assert!(config.processed_dir.is_none());
    }

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::default()
            .with_poll_interval(10)
            .with_error_backoff(1)
            .with_enabled(false)
            .with_note_author("Dr. Intake")
            .with_processed_dir("/tmp/processed");
        assert_eq!(config.poll_interval_ms, 10);
        assert_eq!(config.error_backoff_ms, 1);
        assert!(!config.enabled);
        assert_eq!(config.note_author, "Dr. Intake");
        assert_eq!(config.processed_dir, Some(PathBuf::from("/tmp/processed")));
    }

    #[test]
    fn test_cycle_report_tally() {
        let mut report = CycleReport::default();
        report.record(&DocumentOutcome::Processed {
            case_note_id: "n1".into(),
            degraded: false,
        });
        report.record(&DocumentOutcome::Failed {
            error: "boom".into(),
        });
        report.record(&DocumentOutcome::Unsupported);
        report.record(&DocumentOutcome::Processed {
            case_note_id: "n2".into(),
            degraded: true,
        });
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.unsupported, 1);
        assert_eq!(report.total(), 4);
    }

    #[tokio::test]
    async fn test_move_file_creates_directory() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_root = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("Ab3dE9xQ.png");
        std::fs::write(&source, b"img").unwrap();

        let dir = dst_root.path().join("processed");
        let target = dir.join("Ab3dE9xQ.png");
        move_file(&source, &dir, &target).await.unwrap();

        assert!(!source.exists());
        assert_eq!(std::fs::read(&target).unwrap(), b"img");
    }

    #[tokio::test]
    async fn test_move_file_missing_source() {
        let dst_root = tempfile::tempdir().unwrap();
        let dir = dst_root.path().join("processed");
        let result = move_file(Path::new("/nonexistent/x.png"), &dir, &dir.join("x.png")).await;
        assert!(result.is_err());
    }
}
