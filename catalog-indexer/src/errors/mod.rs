//! Error types for the catalog indexer pipeline.

use thiserror::Error;
use uuid::Uuid;

use catalog_indexer_repository::SearchIndexError;

/// Errors that can occur in a pipeline stage.
///
/// Every variant except `ConnectionReleaseError` is fatal to the execution
/// it happens in: the pipeline stops all its tasks and restarts after backoff.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A producer failed to read changes from the catalog.
    #[error("Source query error ({source_name}): {message}")]
    SourceQueryError {
        source_name: String,
        message: String,
    },

    /// The enricher failed to load entities for a batch.
    #[error("Enrichment lookup error: {0}")]
    EnrichmentLookupError(String),

    /// The search index rejected part of a batch.
    #[error("Bulk write error: {failed} of {total} documents failed")]
    BulkWriteError { failed: usize, total: usize },

    /// The bulk request itself could not be performed.
    #[error("Search index error: {0}")]
    SearchIndexError(#[from] SearchIndexError),

    /// Failed to load or persist watermarks.
    #[error("Watermark error: {0}")]
    WatermarkError(String),

    /// Failed to close a catalog connection. Logged, never propagated.
    #[error("Connection release error: {0}")]
    ConnectionReleaseError(String),

    /// A downstream queue was closed unexpectedly.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// A pipeline task panicked or was aborted.
    #[error("Task error: {0}")]
    TaskError(String),

    /// An event reached the loader without an enriched payload.
    #[error("Event for {0} reached the loader without a payload")]
    MissingPayload(Uuid),

    /// A document could not be serialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PipelineError {
    /// Create a source query error.
    pub fn source_query(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceQueryError {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create an enrichment lookup error.
    pub fn enrichment(msg: impl Into<String>) -> Self {
        Self::EnrichmentLookupError(msg.into())
    }

    /// Create a watermark error.
    pub fn watermark(msg: impl Into<String>) -> Self {
        Self::WatermarkError(msg.into())
    }

    /// Create a connection release error.
    pub fn release(msg: impl Into<String>) -> Self {
        Self::ConnectionReleaseError(msg.into())
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }

    /// Create a task error.
    pub fn task(msg: impl Into<String>) -> Self {
        Self::TaskError(msg.into())
    }
}
