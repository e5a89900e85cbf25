//! PdfOcrExtractor: OCRs scanned PDFs using pdftoppm + tesseract.
//!
//! Pipeline: PDF → pdftoppm (pages to PNG) → tesseract (OCR each page) → join with "\n".

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

use casewise_core::defaults::{EXTRACTION_CMD_TIMEOUT_SECS, OCR_DPI, OCR_LANGUAGE};
use casewise_core::{Error, ExtractedText, Result, TextExtractor};

use super::{ensure_readable, run_cmd_status, run_cmd_with_timeout, tool_available};

pub struct PdfOcrExtractor {
    dpi: u32,
    language: String,
    timeout_secs: u64,
}

impl PdfOcrExtractor {
    pub fn new(dpi: u32, language: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            dpi,
            language: language.into(),
            timeout_secs,
        }
    }
}

impl Default for PdfOcrExtractor {
    fn default() -> Self {
        Self::new(OCR_DPI, OCR_LANGUAGE, EXTRACTION_CMD_TIMEOUT_SECS)
    }
}

/// Rendered page images in page order.
async fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("png") {
            pages.push(path);
        }
    }
    // pdftoppm zero-pads page numbers to a common width.
    pages.sort();
    Ok(pages)
}

#[async_trait]
impl TextExtractor for PdfOcrExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractedText> {
        ensure_readable(path).await?;

        let img_dir = TempDir::new()?;
        let img_prefix = img_dir.path().join("page");

        debug!(
            path = %path.display(),
            dpi = self.dpi,
            language = %self.language,
            "Rendering PDF pages for OCR"
        );

        run_cmd_status(
            Command::new("pdftoppm")
                .arg("-png")
                .arg("-r")
                .arg(self.dpi.to_string())
                .arg(path)
                .arg(&img_prefix),
            self.timeout_secs.saturating_mul(3),
        )
        .await?;

        let pages = rendered_pages(img_dir.path()).await?;
        if pages.is_empty() {
            return Ok(ExtractedText::new(String::new()).with_metadata(json!({
                "engine": "tesseract",
                "ocr_pages": 0,
                "dpi": self.dpi,
                "language": self.language,
                "warning": "No pages rendered from PDF",
            })));
        }

        debug!(path = %path.display(), pages = pages.len(), "OCRing rendered pages");

        let mut page_texts = Vec::with_capacity(pages.len());
        let mut failed_pages = Vec::new();
        for (i, page) in pages.iter().enumerate() {
            let result = run_cmd_with_timeout(
                Command::new("tesseract")
                    .arg(page)
                    .arg("stdout")
                    .arg("-l")
                    .arg(&self.language),
                self.timeout_secs,
            )
            .await;

            match result {
                Ok(text) => page_texts.push(text.trim().to_string()),
                Err(e) => {
                    warn!(page = i + 1, error = %e, "OCR failed for page, skipping");
                    failed_pages.push(i + 1);
                }
            }
        }

        if page_texts.is_empty() {
            return Err(Error::Extraction(format!(
                "OCR failed on all {} pages of {}",
                pages.len(),
                path.display()
            )));
        }

        let text = page_texts.join("\n");
        let metadata = json!({
            "engine": "tesseract",
            "ocr_pages": pages.len(),
            "failed_pages": failed_pages,
            "dpi": self.dpi,
            "language": self.language,
            "char_count": text.len(),
        });
        Ok(ExtractedText::new(text).with_metadata(metadata))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(tool_available("pdftoppm", "-v", &[99]).await
            && tool_available("tesseract", "--version", &[]).await)
    }

    fn name(&self) -> &str {
        "pdf_ocr"
    }
}
