//! Error types for the catalog indexer repository.
//!
//! One error type per external system: the catalog source, the search index
//! and the watermark storage.

mod catalog_source_error;
mod search_index_error;
mod watermark_storage_error;

pub use catalog_source_error::CatalogSourceError;
pub use search_index_error::SearchIndexError;
pub use watermark_storage_error::WatermarkStorageError;
