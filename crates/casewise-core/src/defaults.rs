//! Centralized default constants for the casewise intake worker.
//!
//! **This module is the single source of truth** for shared default values.
//! Every `from_env()` constructor falls back to these constants so the worker
//! runs with zero configuration in a development setting.

// =============================================================================
// COLLABORATOR SERVICE
// =============================================================================

/// Default base URL of the collaborator service.
pub const BACKEND_URL: &str = "http://localhost:3001";

/// Default shared service credential (development only).
pub const WORKER_API_KEY: &str = "worker-secret-key";

/// Header carrying the service credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Timeout for liveness checks in seconds.
pub const HTTP_TIMEOUT_SHORT_SECS: u64 = 5;

/// Timeout for data operations (pending list, status, notes, cleanup, seed) in seconds.
pub const HTTP_TIMEOUT_LONG_SECS: u64 = 10;

// =============================================================================
// WORKER LOOP
// =============================================================================

/// Sleep between poll cycles in milliseconds.
pub const POLL_INTERVAL_MS: u64 = 30_000;

/// Sleep after a cycle that failed as a whole, in milliseconds.
pub const ERROR_BACKOFF_MS: u64 = 5_000;

/// Capacity of the worker event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Author recorded on case notes created by the worker.
pub const NOTE_AUTHOR: &str = "System upload";

/// Placeholder for a case note field the parser could not derive.
pub const NO_DATA_SENTINEL: &str = "No Data found";

/// Metadata message recorded for documents of an unsupported type.
pub const UNSUPPORTED_TYPE_MESSAGE: &str = "File type not supported";

// =============================================================================
// STARTUP
// =============================================================================

/// Cleanup attempts before giving up (non-fatal).
pub const CLEANUP_ATTEMPTS: u32 = 3;

/// Delay between cleanup attempts in milliseconds.
pub const CLEANUP_RETRY_DELAY_MS: u64 = 5_000;

/// Admin seeding attempts before startup is declared fatal.
pub const SEED_ATTEMPTS: u32 = 5;

/// Delay between seeding attempts in milliseconds.
pub const SEED_RETRY_DELAY_MS: u64 = 2_000;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Image extensions routed to OCR.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Extension routed to PDF extraction.
pub const PDF_EXTENSION: &str = "pdf";

/// Default tesseract language.
pub const OCR_LANGUAGE: &str = "eng";

/// Default rendering resolution for PDF pages sent to OCR.
pub const OCR_DPI: u32 = 300;

/// Default interpreter for the external OCR script.
pub const OCR_SCRIPT_INTERPRETER: &str = "python3";

/// Default external OCR script path.
pub const OCR_SCRIPT: &str = "ocr_extractor.py";

/// Page threshold for batch PDF extraction.
pub const LARGE_PDF_PAGE_THRESHOLD: usize = 100;

/// Pages per batch for large PDF extraction.
pub const PDF_BATCH_PAGES: usize = 50;

/// Per-command timeout for external extraction tools (seconds).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

/// Timeout for a tool availability check (`--version` / `-v`), in seconds.
pub const TOOL_CHECK_TIMEOUT_SECS: u64 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_ordered() {
        const {
            assert!(HTTP_TIMEOUT_SHORT_SECS < HTTP_TIMEOUT_LONG_SECS);
            assert!(ERROR_BACKOFF_MS < POLL_INTERVAL_MS);
        }
    }

    #[test]
    fn image_extensions_are_normalized() {
        for ext in IMAGE_EXTENSIONS {
            assert!(!ext.starts_with('.'));
            assert_eq!(*ext, ext.to_lowercase());
        }
        assert!(!IMAGE_EXTENSIONS.contains(&PDF_EXTENSION));
    }

    #[test]
    fn pdf_batching_is_consistent() {
        const {
            assert!(PDF_BATCH_PAGES < LARGE_PDF_PAGE_THRESHOLD);
        }
    }
}
