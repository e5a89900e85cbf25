//! PdfOcrFallbackExtractor: text layer first, OCR second, sentinel last.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use casewise_core::defaults::NO_DATA_SENTINEL;
use casewise_core::{ExtractedText, Result, TextExtractor};

use super::{ensure_readable, PdfOcrExtractor, PdfTextExtractor};

/// Composite PDF extractor.
///
/// The primary (text layer) result is used when it contains non-whitespace
/// text. Otherwise, whether the primary failed or came back blank, the
/// fallback (page OCR) is tried. When neither yields text the extraction does
/// not fail: it returns the sentinel with `degraded = true` and logs a
/// warning, so the document still gets a case note that says nothing was
/// found.
///
/// A missing file is still an error; there is nothing to fall back on.
pub struct PdfOcrFallbackExtractor {
    primary: Arc<dyn TextExtractor>,
    fallback: Arc<dyn TextExtractor>,
    sentinel: String,
}

impl PdfOcrFallbackExtractor {
    pub fn new(
        primary: Arc<dyn TextExtractor>,
        fallback: Arc<dyn TextExtractor>,
        sentinel: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            fallback,
            sentinel: sentinel.into(),
        }
    }
}

impl Default for PdfOcrFallbackExtractor {
    fn default() -> Self {
        Self::new(
            Arc::new(PdfTextExtractor::default()),
            Arc::new(PdfOcrExtractor::default()),
            NO_DATA_SENTINEL,
        )
    }
}

fn tag(mut extracted: ExtractedText, method: &str) -> ExtractedText {
    match extracted.metadata.as_object_mut() {
        Some(obj) => {
            obj.insert("method".to_string(), json!(method));
        }
        None => extracted.metadata = json!({ "method": method }),
    }
    extracted
}

#[async_trait]
impl TextExtractor for PdfOcrFallbackExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractedText> {
        ensure_readable(path).await?;

        let text_layer_issue = match self.primary.extract(path).await {
            Ok(extracted) if extracted.is_usable() => {
                debug!(
                    path = %path.display(),
                    extractor = self.primary.name(),
                    "Using PDF text layer"
                );
                return Ok(tag(extracted, "text_layer"));
            }
            Ok(_) => "no text layer".to_string(),
            Err(e) => e.to_string(),
        };
        debug!(path = %path.display(), reason = %text_layer_issue, "Falling back to OCR");

        let ocr_issue = match self.fallback.extract(path).await {
            Ok(extracted) if extracted.is_usable() => {
                return Ok(tag(extracted, "ocr"));
            }
            Ok(_) => "OCR produced no text".to_string(),
            Err(e) => e.to_string(),
        };

        warn!(
            path = %path.display(),
            text_layer = %text_layer_issue,
            ocr = %ocr_issue,
            "PDF extraction degraded, no text recovered"
        );

        Ok(ExtractedText {
            text: self.sentinel.clone(),
            metadata: json!({
                "method": "sentinel",
                "text_layer_error": text_layer_issue,
                "ocr_error": ocr_issue,
            }),
            degraded: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        let primary = self.primary.health_check().await.unwrap_or(false);
        let fallback = self.fallback.health_check().await.unwrap_or(false);
        Ok(primary || fallback)
    }

    fn name(&self) -> &str {
        "pdf_ocr_fallback"
    }
}
