//! ScriptOcrExtractor: delegates OCR to an external script.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tracing::debug;

use casewise_core::defaults::{EXTRACTION_CMD_TIMEOUT_SECS, OCR_SCRIPT, OCR_SCRIPT_INTERPRETER};
use casewise_core::{ExtractedText, Result, TextExtractor};

use super::{ensure_readable, run_cmd_with_timeout, tool_available};

/// Runs `<interpreter> <script> <document>` and takes stdout as the text.
///
/// A non-zero exit is an `Extraction` error carrying the script's stderr.
pub struct ScriptOcrExtractor {
    interpreter: String,
    script: PathBuf,
    timeout_secs: u64,
}

impl ScriptOcrExtractor {
    pub fn new(
        interpreter: impl Into<String>,
        script: impl Into<PathBuf>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            timeout_secs,
        }
    }
}

impl Default for ScriptOcrExtractor {
    fn default() -> Self {
        Self::new(
            OCR_SCRIPT_INTERPRETER,
            OCR_SCRIPT,
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
    }
}

#[async_trait]
impl TextExtractor for ScriptOcrExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractedText> {
        ensure_readable(path).await?;

        debug!(
            path = %path.display(),
            interpreter = %self.interpreter,
            script = %self.script.display(),
            "Running OCR script"
        );
        let raw = run_cmd_with_timeout(
            Command::new(&self.interpreter).arg(&self.script).arg(path),
            self.timeout_secs,
        )
        .await?;

        let text = raw.trim().to_string();
        let metadata = json!({
            "engine": "script",
            "script": self.script.display().to_string(),
            "char_count": text.len(),
        });
        Ok(ExtractedText::new(text).with_metadata(metadata))
    }

    async fn health_check(&self) -> Result<bool> {
        let script_present = tokio::fs::metadata(&self.script)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        Ok(script_present && tool_available(&self.interpreter, "--version", &[]).await)
    }

    fn name(&self) -> &str {
        "script_ocr"
    }
}
