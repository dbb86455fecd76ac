//! # Catalog Indexer Shared
//!
//! This crate defines the data structures shared across the catalog indexer:
//! the denormalized entities read from the relational catalog and the
//! documents written to the search index.

pub mod types;

pub use types::document::{
    FilmDocument, GenreDocument, IndexDocument, PersonDocument, PersonFilmDocument, PersonRef,
};
pub use types::entity::{
    DenormalizedEntity, EntityKind, FilmEntity, FilmPerson, GenreEntity, PersonEntity, PersonFilm,
};
pub use types::role::Role;
