//! # casewise-gateway
//!
//! Client for the collaborator service that owns uploaded files, case notes,
//! and user accounts.
//!
//! This crate provides:
//! - [`HttpGateway`], implementing the core gateway traits over HTTP with a
//!   static service credential and per-call timeouts
//! - [`GatewayConfig`], read from the environment with development defaults
//! - An in-memory collaborator (feature `mock`) for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use casewise_gateway::{GatewayConfig, HttpGateway};
//! use casewise_core::FileStatusGateway;
//!
//! #[tokio::main]
//! async fn main() -> casewise_core::Result<()> {
//!     let gateway = HttpGateway::new(GatewayConfig::from_env())?;
//!     for doc in gateway.list_pending_files().await? {
//!         println!("{} {}", doc.id, doc.original_name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use client::HttpGateway;
pub use config::GatewayConfig;
