#![forbid(unsafe_code)]
//! evalpath-core library.
//!
//! Derives a user's position in a long, resumable screen sequence from the
//! sparse per-screen records kept in a key-value store.
//!
//! # Conventions
//!
//! - **Errors**: [`error::FlowError`] / [`store::StoreError`] in library
//!   code, `anyhow::Result` at the edges (config, dataset loading).
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`, `trace!`).

pub mod catalog;
pub mod config;
pub mod dataset;
pub mod error;
pub mod keys;
pub mod migrate;
pub mod model;
pub mod navigation;
pub mod records;
pub mod resolve;
pub mod service;
pub mod store;

pub use error::{ErrorCode, FlowError};
pub use keys::{Flow, FlowKeys};
pub use service::{CompletionPayload, FlowService, PairGenerator};
