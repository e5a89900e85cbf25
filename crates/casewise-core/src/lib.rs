//! # casewise-core
//!
//! Core types, traits, and abstractions for the casewise intake worker.
//!
//! This crate provides the data model shared by the gateway client and the
//! worker (uploaded documents, case notes, worker jobs), the error taxonomy,
//! and the trait seams the worker is written against.

pub mod defaults;
pub mod error;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
