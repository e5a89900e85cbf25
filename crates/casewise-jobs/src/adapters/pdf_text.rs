//! PdfTextExtractor: reads a PDF's text layer with `pdftotext` (poppler-utils).

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tokio::process::Command;
use tracing::{debug, warn};

use casewise_core::defaults::{
    EXTRACTION_CMD_TIMEOUT_SECS, LARGE_PDF_PAGE_THRESHOLD, PDF_BATCH_PAGES,
};
use casewise_core::{ExtractedText, Result, TextExtractor};

use super::{ensure_readable, run_cmd_with_timeout, tool_available};

/// Extracts the embedded text layer of a PDF.
///
/// Large PDFs (more than 100 pages according to `pdfinfo`) are extracted in
/// 50-page batches to bound memory use. A scanned PDF without a text layer
/// comes back as (near) empty text, which is the cue for the OCR fallback.
pub struct PdfTextExtractor {
    timeout_secs: u64,
}

impl PdfTextExtractor {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new(EXTRACTION_CMD_TIMEOUT_SECS)
    }
}

/// Parse `pdfinfo` output into a JSON metadata object.
fn parse_pdfinfo(output: &str) -> JsonValue {
    let mut metadata = serde_json::Map::new();

    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_lowercase().replace(' ', "_");
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if key == "pages" {
                if let Ok(pages) = value.parse::<u64>() {
                    metadata.insert(key, JsonValue::Number(pages.into()));
                    continue;
                }
            }
            metadata.insert(key, JsonValue::String(value.to_string()));
        }
    }

    JsonValue::Object(metadata)
}

fn page_count(metadata: &JsonValue) -> usize {
    metadata.get("pages").and_then(|v| v.as_u64()).unwrap_or(0) as usize
}

/// Inclusive 1-based page ranges for batched extraction.
fn page_batches(pages: usize) -> Vec<(usize, usize)> {
    let mut batches = Vec::new();
    let mut start = 1usize;
    while start <= pages {
        let end = (start + PDF_BATCH_PAGES - 1).min(pages);
        batches.push((start, end));
        start = end + 1;
    }
    batches
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractedText> {
        ensure_readable(path).await?;

        let mut pdfinfo = Command::new("pdfinfo");
        pdfinfo.arg(path);
        let mut metadata = match run_cmd_with_timeout(&mut pdfinfo, self.timeout_secs).await {
            Ok(output) => parse_pdfinfo(&output),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "pdfinfo failed, continuing without page count"
                );
                json!({})
            }
        };

        let pages = page_count(&metadata);
        let text = if pages > LARGE_PDF_PAGE_THRESHOLD {
            debug!(path = %path.display(), pages, "Large PDF, extracting in batches");
            let mut chunks = Vec::new();
            for (first, last) in page_batches(pages) {
                let chunk = run_cmd_with_timeout(
                    Command::new("pdftotext")
                        .arg("-f")
                        .arg(first.to_string())
                        .arg("-l")
                        .arg(last.to_string())
                        .arg(path)
                        .arg("-"),
                    self.timeout_secs,
                )
                .await?;
                chunks.push(chunk);
            }
            chunks.join("")
        } else {
            run_cmd_with_timeout(
                Command::new("pdftotext").arg(path).arg("-"),
                self.timeout_secs,
            )
            .await?
        };

        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("engine".to_string(), json!("pdftotext"));
            obj.insert("char_count".to_string(), json!(text.len()));
            obj.insert("line_count".to_string(), json!(text.lines().count()));
        }

        Ok(ExtractedText::new(text).with_metadata(metadata))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(tool_available("pdftotext", "-v", &[99]).await)
    }

    fn name(&self) -> &str {
        "pdf_text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_PDF: &[u8] = b"%PDF-1.0
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj

2 0 obj
<< /Type /Pages /Kids [3 0 R] /Count 1 >>
endobj

3 0 obj
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792]
   /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>
endobj

4 0 obj
<< /Length 44 >>
stream
BT /F1 12 Tf 100 700 Td (Hypertension) Tj ET
endstream
endobj

5 0 obj
<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>
endobj

xref
0 6
0000000000 65535 f
0000000009 00000 n
0000000059 00000 n
0000000117 00000 n
0000000247 00000 n
0000000342 00000 n

trailer
<< /Size 6 /Root 1 0 R >>
startxref
413
%%EOF";

    #[test]
    fn test_parse_pdfinfo() {
        let output = "Title:          Discharge summary\n\
                      Producer:       scanner\n\
                      Pages:          3\n\
                      Encrypted:      no\n";
        let meta = parse_pdfinfo(output);
        assert_eq!(meta["title"], "Discharge summary");
        assert_eq!(meta["pages"], 3);
        assert_eq!(page_count(&meta), 3);
    }

    #[test]
    fn test_page_count_missing() {
        assert_eq!(page_count(&json!({})), 0);
        assert_eq!(page_count(&json!({"pages": "many"})), 0);
    }

    #[test]
    fn test_page_batches() {
        assert_eq!(page_batches(0), vec![]);
        assert_eq!(page_batches(50), vec![(1, 50)]);
        assert_eq!(page_batches(120), vec![(1, 50), (51, 100), (101, 120)]);
    }

    #[test]
    fn test_pdf_text_name() {
        assert_eq!(PdfTextExtractor::default().name(), "pdf_text");
    }

    #[tokio::test]
    async fn test_pdf_text_missing_file() {
        let err = PdfTextExtractor::default()
            .extract(Path::new("/nonexistent/report.pdf"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[tokio::test]
    async fn test_pdf_text_extraction() {
        let extractor = PdfTextExtractor::default();
        if !extractor.health_check().await.unwrap_or(false) {
            eprintln!("Skipping test_pdf_text_extraction: pdftotext not installed");
            return;
        }

        let file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        std::fs::write(file.path(), HELLO_PDF).unwrap();

        let extracted = extractor.extract(file.path()).await.unwrap();
        assert!(
            extracted.text.contains("Hypertension"),
            "got {:?}",
            extracted.text
        );
        assert!(!extracted.degraded);
        assert_eq!(extracted.metadata["engine"], "pdftotext");
    }
}
