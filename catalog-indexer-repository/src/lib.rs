//! # Catalog Indexer Repository
//!
//! This crate provides traits and implementations for the external systems the
//! catalog indexer talks to: the relational catalog it reads changes from, the
//! search index it writes documents to, and the durable store holding its
//! watermarks. It includes definitions for errors, interfaces, and concrete
//! implementations backed by PostgreSQL and OpenSearch.

pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod postgres;
pub mod types;

pub use errors::{CatalogSourceError, SearchIndexError, WatermarkStorageError};
pub use interfaces::{CatalogConnection, CatalogSource, SearchIndexProvider, WatermarkStorage};
pub use opensearch::OpenSearchProvider;
pub use postgres::{PostgresCatalogSource, PostgresWatermarkStorage};
pub use types::{
    BulkDocument, BulkItemFailure, BulkWriteSummary, ChangeSource, ChangeWindow, ChangedRow,
    Watermark,
};
