//! Interface definitions for the external systems of the catalog indexer.
//!
//! These traits allow for dependency injection and swappable backend
//! implementations, and make every pipeline stage testable with in-memory
//! mocks.

mod catalog_source;
mod search_index_provider;
mod watermark_storage;

pub use catalog_source::{CatalogConnection, CatalogSource};
pub use search_index_provider::SearchIndexProvider;
pub use watermark_storage::WatermarkStorage;
