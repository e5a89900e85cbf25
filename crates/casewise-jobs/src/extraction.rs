//! Extractor registry: dispatches documents to extractors by file extension.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use casewise_core::defaults::{IMAGE_EXTENSIONS, PDF_EXTENSION};
use casewise_core::{normalize_extension, TextExtractor};

use crate::adapters::{
    ExtractorConfig, ImageOcrExtractor, OcrBackend, PdfOcrExtractor, PdfOcrFallbackExtractor,
    PdfTextExtractor, ScriptOcrExtractor,
};

/// Registry mapping normalized file extensions to extractors.
///
/// An extension with no registered extractor is an unsupported type; the
/// worker marks such documents processed without extracting anything.
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Build the standard registry for `config`.
    ///
    /// `native`: images go to tesseract, PDFs to the text-layer/OCR composite.
    /// `script`: one script extractor serves every supported extension.
    pub fn from_config(config: &ExtractorConfig) -> Self {
        let mut registry = Self::new();

        match config.backend {
            OcrBackend::Native => {
                registry.register(
                    IMAGE_EXTENSIONS,
                    Arc::new(ImageOcrExtractor::new(
                        config.language.clone(),
                        config.cmd_timeout_secs,
                    )),
                );
                let pdf = PdfOcrFallbackExtractor::new(
                    Arc::new(PdfTextExtractor::new(config.cmd_timeout_secs)),
                    Arc::new(PdfOcrExtractor::new(
                        config.dpi,
                        config.language.clone(),
                        config.cmd_timeout_secs,
                    )),
                    config.sentinel.clone(),
                );
                registry.register(&[PDF_EXTENSION], Arc::new(pdf));
            }
            OcrBackend::Script => {
                let script: Arc<dyn TextExtractor> = Arc::new(ScriptOcrExtractor::new(
                    config.script_interpreter.clone(),
                    config.script_path.clone(),
                    config.cmd_timeout_secs,
                ));
                registry.register(IMAGE_EXTENSIONS, script.clone());
                registry.register(&[PDF_EXTENSION], script);
            }
        }

        registry
    }

    /// Register an extractor for each of `extensions`, replacing any
    /// existing registration.
    pub fn register(&mut self, extensions: &[&str], extractor: Arc<dyn TextExtractor>) {
        for ext in extensions {
            let ext = normalize_extension(ext);
            debug!(extension = %ext, extractor = extractor.name(), "Registered extractor");
            self.extractors.insert(ext, extractor.clone());
        }
    }

    /// Extractor for `extension` (any case, with or without leading dot).
    pub fn resolve(&self, extension: &str) -> Option<Arc<dyn TextExtractor>> {
        self.extractors
            .get(&normalize_extension(extension))
            .cloned()
    }

    pub fn has_extractor(&self, extension: &str) -> bool {
        self.extractors
            .contains_key(&normalize_extension(extension))
    }

    /// Registered extensions, sorted.
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.extractors.keys().cloned().collect();
        exts.sort();
        exts
    }

    /// Run health checks on every distinct registered extractor, keyed by name.
    pub async fn health_check_all(&self) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for extractor in self.extractors.values() {
            let name = extractor.name().to_string();
            if results.contains_key(&name) {
                continue;
            }
            let healthy = extractor.health_check().await.unwrap_or(false);
            results.insert(name, healthy);
        }
        results
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::from_config(&ExtractorConfig::default())
    }
}
