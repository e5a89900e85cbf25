//! ImageOcrExtractor: OCRs a whole image with `tesseract`.

use std::path::Path;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tracing::debug;

use casewise_core::defaults::{EXTRACTION_CMD_TIMEOUT_SECS, OCR_LANGUAGE};
use casewise_core::{ExtractedText, Result, TextExtractor};

use super::{ensure_readable, run_cmd_with_timeout, tool_available};

/// Runs `tesseract <image> stdout -l <lang>` on jpg/jpeg/png/gif/webp uploads.
///
/// A blank image yields an empty string, not an error.
pub struct ImageOcrExtractor {
    language: String,
    timeout_secs: u64,
}

impl ImageOcrExtractor {
    pub fn new(language: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            language: language.into(),
            timeout_secs,
        }
    }
}

impl Default for ImageOcrExtractor {
    fn default() -> Self {
        Self::new(OCR_LANGUAGE, EXTRACTION_CMD_TIMEOUT_SECS)
    }
}

#[async_trait]
impl TextExtractor for ImageOcrExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractedText> {
        ensure_readable(path).await?;

        debug!(path = %path.display(), language = %self.language, "OCRing image");
        let raw = run_cmd_with_timeout(
            Command::new("tesseract")
                .arg(path)
                .arg("stdout")
                .arg("-l")
                .arg(&self.language),
            self.timeout_secs,
        )
        .await?;

        let text = raw.trim().to_string();
        let metadata = json!({
            "engine": "tesseract",
            "language": self.language,
            "char_count": text.len(),
            "line_count": text.lines().count(),
        });
        Ok(ExtractedText::new(text).with_metadata(metadata))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(tool_available("tesseract", "--version", &[]).await)
    }

    fn name(&self) -> &str {
        "image_ocr"
    }
}
