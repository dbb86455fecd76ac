//! # Catalog Indexer
//!
//! Keeps the films, genres and persons search indices in sync with the
//! relational media catalog by polling it for changed rows.
//!
//! ## Architecture
//!
//! Each index is fed by one pipeline following the Producer-Enricher-Loader pattern:
//!
//! 1. **Producers**: Poll one change-source each for rows modified after its watermark
//! 2. **Enricher**: Loads the denormalized entity for each changed id
//! 3. **Transformer**: Maps entities to index documents
//! 4. **Loader**: Bulk-writes documents and commits watermarks
//! 5. **Pipeline**: Supervises the tasks and restarts them with backoff
//!
//! Delivery is at-least-once: watermarks only move after a batch has been
//! fully indexed, and writes are idempotent upserts keyed by entity id.
//!
//! ## Modules
//!
//! - [`config`]: Settings and dependency initialization
//! - [`producer`]: Change-source polling
//! - [`enricher`]: Entity lookups
//! - [`transformer`]: Entity to document mapping
//! - [`loader`]: Bulk indexing and watermark commits
//! - [`pipeline`]: Task supervision and restart policy
//! - [`watermark`]: Per-source progress
//! - [`errors`]: Error types for the pipeline

pub mod batch;
pub mod config;
pub mod enricher;
pub mod errors;
pub mod events;
pub mod loader;
pub mod pipeline;
pub mod producer;
pub mod transformer;
pub mod watermark;

pub use config::Dependencies;
pub use errors::PipelineError;

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] PipelineError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
