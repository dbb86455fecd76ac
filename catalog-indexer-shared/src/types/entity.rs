//! Denormalized catalog entities.
//!
//! These are the joined views of a film, genre or person assembled by the
//! enricher from the normalized relational catalog.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::role::{deserialize_optional_role, Role};

/// The entity types the indexer maintains, each bound to one search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Film,
    Genre,
    Person,
}

impl EntityKind {
    /// Name of the search index holding documents of this kind.
    pub fn index_name(&self) -> &'static str {
        match self {
            EntityKind::Film => "films",
            EntityKind::Genre => "genres",
            EntityKind::Person => "persons",
        }
    }
}

/// A genre as it appears both standalone and inside a film.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreEntity {
    pub id: Uuid,
    pub name: String,
}

/// A person credited on a film, with their role on that film.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmPerson {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default, deserialize_with = "deserialize_optional_role")]
    pub role: Option<Role>,
}

/// A film with its genres and credited people.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmEntity {
    pub id: Uuid,
    /// Catalog film type, e.g. `movie` or `tv_show`.
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: Option<String>,
    pub rating: Option<f64>,
    #[serde(default)]
    pub genres: Vec<GenreEntity>,
    #[serde(default)]
    pub persons: Vec<FilmPerson>,
}

/// A film a person took part in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonFilm {
    pub film_id: Uuid,
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_optional_role")]
    pub role: Option<Role>,
}

/// A person with every film association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonEntity {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub films: Vec<PersonFilm>,
}

/// Any denormalized entity carried as a change event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DenormalizedEntity {
    Film(FilmEntity),
    Genre(GenreEntity),
    Person(PersonEntity),
}

impl DenormalizedEntity {
    /// Primary key of the underlying catalog row.
    pub fn id(&self) -> Uuid {
        match self {
            DenormalizedEntity::Film(film) => film.id,
            DenormalizedEntity::Genre(genre) => genre.id,
            DenormalizedEntity::Person(person) => person.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            DenormalizedEntity::Film(_) => EntityKind::Film,
            DenormalizedEntity::Genre(_) => EntityKind::Genre,
            DenormalizedEntity::Person(_) => EntityKind::Person,
        }
    }
}
