//! # casewise-jobs
//!
//! Background intake worker for the casewise clinical-document pipeline.
//!
//! This crate provides:
//! - Text extractors for images and PDFs behind the `TextExtractor` trait,
//!   dispatched by file extension through [`ExtractorRegistry`]
//! - [`FieldParser`], the heuristic split of OCR text into case note fields
//! - [`IntakeWorker`], the poll loop that moves each pending document to
//!   `processed` or `error`, with events on a broadcast channel
//! - [`StartupSequencer`], the cleanup and admin seeding run before the loop
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use casewise_gateway::HttpGateway;
//! use casewise_jobs::{
//!     ExtractorConfig, ExtractorRegistry, IntakeWorker, StartupConfig, StartupSequencer,
//!     WorkerConfig,
//! };
//!
//! let gateway = Arc::new(HttpGateway::from_env()?);
//! let registry = ExtractorRegistry::from_config(&ExtractorConfig::from_env());
//! let worker = IntakeWorker::with_gateway(gateway.clone(), registry, WorkerConfig::from_env());
//!
//! // Fails with Error::FatalStartup if seeding never succeeds.
//! let sequencer = StartupSequencer::new(gateway, StartupConfig::from_env());
//! let (_report, handle) = sequencer.launch(worker).await?;
//!
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! handle.shutdown();
//! handle.join().await?;
//! ```

pub mod adapters;
pub mod extraction;
pub mod parser;
pub mod queue;
pub mod startup;
pub mod worker;

// Re-export core types
pub use casewise_core::*;

pub use adapters::{
    ExtractorConfig, ImageOcrExtractor, OcrBackend, PdfOcrExtractor, PdfOcrFallbackExtractor,
    PdfTextExtractor, ScriptOcrExtractor,
};
pub use extraction::ExtractorRegistry;
pub use parser::FieldParser;
pub use queue::JobQueue;
pub use startup::{StartupConfig, StartupReport, StartupSequencer};
pub use worker::{
    CycleReport, DocumentOutcome, IntakeWorker, WorkerConfig, WorkerEvent, WorkerHandle,
};
