//! PostgreSQL implementations of the catalog source and watermark storage.

mod catalog_source;
mod queries;
mod watermark_storage;

pub use catalog_source::{PostgresCatalogConnection, PostgresCatalogSource};
pub use watermark_storage::PostgresWatermarkStorage;
