//! Joined catalog lookups, one per entity kind.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use catalog_indexer_repository::{CatalogConnection, CatalogSourceError};
use catalog_indexer_shared::{DenormalizedEntity, EntityKind};

/// Loads denormalized entities of one kind by id.
#[async_trait]
pub trait EntityLookup: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Fetch the entities for `ids`. Ids without a catalog row are omitted.
    async fn lookup(
        &self,
        conn: &mut dyn CatalogConnection,
        ids: &[Uuid],
    ) -> Result<Vec<DenormalizedEntity>, CatalogSourceError>;
}

pub struct FilmLookup;

#[async_trait]
impl EntityLookup for FilmLookup {
    fn kind(&self) -> EntityKind {
        EntityKind::Film
    }

    async fn lookup(
        &self,
        conn: &mut dyn CatalogConnection,
        ids: &[Uuid],
    ) -> Result<Vec<DenormalizedEntity>, CatalogSourceError> {
        let films = conn.films_by_ids(ids).await?;
        Ok(films.into_iter().map(DenormalizedEntity::Film).collect())
    }
}

pub struct GenreLookup;

#[async_trait]
impl EntityLookup for GenreLookup {
    fn kind(&self) -> EntityKind {
        EntityKind::Genre
    }

    async fn lookup(
        &self,
        conn: &mut dyn CatalogConnection,
        ids: &[Uuid],
    ) -> Result<Vec<DenormalizedEntity>, CatalogSourceError> {
        let genres = conn.genres_by_ids(ids).await?;
        Ok(genres.into_iter().map(DenormalizedEntity::Genre).collect())
    }
}

pub struct PersonLookup;

#[async_trait]
impl EntityLookup for PersonLookup {
    fn kind(&self) -> EntityKind {
        EntityKind::Person
    }

    async fn lookup(
        &self,
        conn: &mut dyn CatalogConnection,
        ids: &[Uuid],
    ) -> Result<Vec<DenormalizedEntity>, CatalogSourceError> {
        let persons = conn.persons_by_ids(ids).await?;
        Ok(persons.into_iter().map(DenormalizedEntity::Person).collect())
    }
}

/// The lookup serving `kind`.
pub fn lookup_for(kind: EntityKind) -> Arc<dyn EntityLookup> {
    match kind {
        EntityKind::Film => Arc::new(FilmLookup),
        EntityKind::Genre => Arc::new(GenreLookup),
        EntityKind::Person => Arc::new(PersonLookup),
    }
}
