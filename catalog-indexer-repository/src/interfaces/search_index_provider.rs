//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, Elasticsearch, etc.).

use async_trait::async_trait;

use catalog_indexer_shared::EntityKind;

use crate::errors::SearchIndexError;
use crate::types::{BulkDocument, BulkWriteSummary};

/// Abstracts the underlying search index implementation (OpenSearch, Elasticsearch, etc.).
///
/// Implementations are injected into the loader to enable dependency injection and easy
/// testing with mock implementations.
///
/// # Note on Document Creation
///
/// There is no separate create operation. `bulk_upsert` writes each document under its
/// entity id, replacing any previous version, so replaying the same batch is harmless.
///
/// # Index Initialization
///
/// Implementations should call `ensure_index_exists` during application startup to ensure
/// each index is properly configured before performing document operations.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Ensure the index for the given entity kind exists, creating it if necessary.
    ///
    /// # Arguments
    ///
    /// * `kind` - The entity kind whose index should be prepared
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index is ready for use
    /// * `Err(SearchIndexError)` - If initialization fails
    async fn ensure_index_exists(&self, kind: EntityKind) -> Result<(), SearchIndexError>;

    /// Upsert a batch of documents with a single bulk request.
    ///
    /// Per-item rejections do not make this method fail; they are counted in the returned
    /// summary so the caller can decide what a partial failure means.
    ///
    /// # Arguments
    ///
    /// * `kind` - The entity kind selecting the target index
    /// * `documents` - Documents to write, keyed by id
    ///
    /// # Returns
    ///
    /// * `Ok(BulkWriteSummary)` - Total, succeeded and failed counts with failure details
    /// * `Err(SearchIndexError)` - If the request could not be sent or its response parsed
    async fn bulk_upsert(
        &self,
        kind: EntityKind,
        documents: &[BulkDocument],
    ) -> Result<BulkWriteSummary, SearchIndexError>;
}
