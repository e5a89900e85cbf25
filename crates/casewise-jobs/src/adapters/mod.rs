//! Text extractor implementations and the command plumbing they share.

pub mod image_ocr;
pub mod pdf_fallback;
pub mod pdf_ocr;
pub mod pdf_text;
pub mod script_ocr;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use casewise_core::defaults;
use casewise_core::{Error, Result};

pub use image_ocr::ImageOcrExtractor;
pub use pdf_fallback::PdfOcrFallbackExtractor;
pub use pdf_ocr::PdfOcrExtractor;
pub use pdf_text::PdfTextExtractor;
pub use script_ocr::ScriptOcrExtractor;

/// Which OCR implementation backs image and PDF extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrBackend {
    /// tesseract and poppler-utils invoked directly.
    Native,
    /// An external OCR script handles every supported type.
    Script,
}

impl OcrBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "native" => Some(OcrBackend::Native),
            "script" => Some(OcrBackend::Script),
            _ => None,
        }
    }
}

/// Settings shared by the extractor implementations.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub backend: OcrBackend,
    /// tesseract language code.
    pub language: String,
    /// Render resolution for PDF pages sent to OCR.
    pub dpi: u32,
    pub script_path: PathBuf,
    pub script_interpreter: String,
    /// Per-command timeout in seconds.
    pub cmd_timeout_secs: u64,
    /// Text returned when every PDF backend comes up empty.
    pub sentinel: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            backend: OcrBackend::Native,
            language: defaults::OCR_LANGUAGE.to_string(),
            dpi: defaults::OCR_DPI,
            script_path: PathBuf::from(defaults::OCR_SCRIPT),
            script_interpreter: defaults::OCR_SCRIPT_INTERPRETER.to_string(),
            cmd_timeout_secs: defaults::EXTRACTION_CMD_TIMEOUT_SECS,
            sentinel: defaults::NO_DATA_SENTINEL.to_string(),
        }
    }
}

impl ExtractorConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `OCR_BACKEND` | `native` | `native` or `script` |
    /// | `OCR_LANGUAGE` | `eng` | tesseract language |
    /// | `OCR_DPI` | `300` | PDF render resolution |
    /// | `OCR_SCRIPT` | `ocr_extractor.py` | Script for the `script` backend |
    /// | `OCR_SCRIPT_INTERPRETER` | `python3` | Interpreter for the script |
    /// | `EXTRACTION_CMD_TIMEOUT_SECS` | `60` | Per-command timeout |
    /// | `NO_DATA_SENTINEL` | `No Data found` | Degraded PDF placeholder |
    pub fn from_env() -> Self {
        let base = Self::default();

        let backend = std::env::var("OCR_BACKEND")
            .ok()
            .and_then(|v| OcrBackend::parse(&v))
            .unwrap_or(base.backend);

        let dpi = std::env::var("OCR_DPI")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|dpi| *dpi > 0)
            .unwrap_or(base.dpi);

        let cmd_timeout_secs = std::env::var("EXTRACTION_CMD_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(base.cmd_timeout_secs)
            .max(1);

        Self {
            backend,
            language: non_empty_var("OCR_LANGUAGE").unwrap_or(base.language),
            dpi,
            script_path: non_empty_var("OCR_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or(base.script_path),
            script_interpreter: non_empty_var("OCR_SCRIPT_INTERPRETER")
                .unwrap_or(base.script_interpreter),
            cmd_timeout_secs,
            sentinel: non_empty_var("NO_DATA_SENTINEL").unwrap_or(base.sentinel),
        }
    }

    pub fn with_backend(mut self, backend: OcrBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_script(
        mut self,
        interpreter: impl Into<String>,
        script_path: impl Into<PathBuf>,
    ) -> Self {
        self.script_interpreter = interpreter.into();
        self.script_path = script_path.into();
        self
    }

    pub fn with_cmd_timeout(mut self, secs: u64) -> Self {
        self.cmd_timeout_secs = secs;
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Fail with `Extraction` unless `path` is an existing regular file.
pub(crate) async fn ensure_readable(path: &Path) -> Result<()> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|_| Error::Extraction(format!("File not found: {}", path.display())))?;
    if !meta.is_file() {
        return Err(Error::Extraction(format!(
            "Not a regular file: {}",
            path.display()
        )));
    }
    Ok(())
}

async fn run_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<std::process::Output> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    debug!(program = %program, timeout_secs, "Running external command");

    // A command abandoned on timeout must not outlive the extraction.
    cmd.kill_on_drop(true);

    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::Extraction(format!(
                "`{}` timed out after {}s",
                program, timeout_secs
            ))
        })?
        .map_err(|e| Error::Extraction(format!("Failed to execute `{}`: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extraction(format!(
            "`{}` failed ({}): {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    Ok(output)
}

/// Run a command with a timeout, returning stdout as a string.
pub(crate) async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = run_with_timeout(cmd, timeout_secs).await?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a command that writes to files rather than stdout.
pub(crate) async fn run_cmd_status(cmd: &mut Command, timeout_secs: u64) -> Result<()> {
    run_with_timeout(cmd, timeout_secs).await.map(|_| ())
}

/// Whether `program` can be spawned. `ok_codes` lists exit codes other than 0
/// that still mean the binary is present (poppler's `-v` exits 99 on some
/// versions). A check that hangs counts as unavailable.
pub(crate) async fn tool_available(program: &str, arg: &str, ok_codes: &[i32]) -> bool {
    tool_available_within(
        program,
        arg,
        ok_codes,
        Duration::from_secs(defaults::TOOL_CHECK_TIMEOUT_SECS),
    )
    .await
}

async fn tool_available_within(
    program: &str,
    arg: &str,
    ok_codes: &[i32],
    limit: Duration,
) -> bool {
    let mut cmd = Command::new(program);
    cmd.arg(arg).kill_on_drop(true);

    match tokio::time::timeout(limit, cmd.output()).await {
        Ok(Ok(output)) => {
            output.status.success()
                || output
                    .status
                    .code()
                    .map(|c| ok_codes.contains(&c))
                    .unwrap_or(false)
        }
        Ok(Err(_)) => false,
        Err(_) => {
            warn!(
                program,
                limit_ms = limit.as_millis() as u64,
                "Tool availability check timed out"
            );
            false
        }
    }
}
