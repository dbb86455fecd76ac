//! Relational catalog source trait definitions.
//!
//! A `CatalogSource` hands out exclusive connections. Each long-running task
//! (producer or enricher) owns one connection for its whole lifetime and must
//! `close` it on every exit path.

use async_trait::async_trait;
use uuid::Uuid;

use catalog_indexer_shared::{FilmEntity, GenreEntity, PersonEntity};

use crate::errors::CatalogSourceError;
use crate::types::{ChangeSource, ChangeWindow, ChangedRow};

/// Factory of exclusive catalog connections.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Open a new connection dedicated to the caller.
    ///
    /// # Returns
    ///
    /// * `Ok(Box<dyn CatalogConnection>)` - A connection owned by the caller
    /// * `Err(CatalogSourceError)` - If the database cannot be reached
    async fn connect(&self) -> Result<Box<dyn CatalogConnection>, CatalogSourceError>;
}

/// An open connection to the relational catalog.
///
/// All reads go through `&mut self`: a connection serves one task and runs
/// one query at a time.
#[async_trait]
pub trait CatalogConnection: Send {
    /// Fetch one page of rows changed after the window's watermark.
    ///
    /// # Arguments
    ///
    /// * `source` - Which change query to run
    /// * `window` - Watermark, keyset cursor and page size
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ChangedRow>)` - At most `window.limit` rows, ordered by
    ///   `(modified, id)` ascending
    /// * `Err(CatalogSourceError)` - If the query fails
    async fn fetch_changes(
        &mut self,
        source: ChangeSource,
        window: &ChangeWindow,
    ) -> Result<Vec<ChangedRow>, CatalogSourceError>;

    /// Load denormalized films for the given ids. Missing ids are omitted.
    async fn films_by_ids(&mut self, ids: &[Uuid]) -> Result<Vec<FilmEntity>, CatalogSourceError>;

    /// Load genres for the given ids. Missing ids are omitted.
    async fn genres_by_ids(&mut self, ids: &[Uuid])
        -> Result<Vec<GenreEntity>, CatalogSourceError>;

    /// Load denormalized persons for the given ids. Missing ids are omitted.
    async fn persons_by_ids(
        &mut self,
        ids: &[Uuid],
    ) -> Result<Vec<PersonEntity>, CatalogSourceError>;

    /// Release the connection.
    async fn close(self: Box<Self>) -> Result<(), CatalogSourceError>;
}
