//! Search index document types.
//!
//! This module defines the document structures written to the search engine,
//! one per entity kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::entity::EntityKind;
use crate::types::role::Role;

/// Minimal reference to a person embedded in a film document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: Uuid,
    pub full_name: String,
}

/// Film document with credits fanned out by role.
///
/// `actors`, `writers` and `directors` are disjoint: each credit of the
/// source entity lands in exactly the list matching its role, and credits
/// without a known role are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmDocument {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: Option<String>,
    pub imdb_rating: Option<f64>,
    pub genre: Vec<GenreDocument>,
    pub actors: Vec<PersonRef>,
    pub writers: Vec<PersonRef>,
    pub directors: Vec<PersonRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreDocument {
    pub id: Uuid,
    pub name: String,
}

/// A film association inside a person document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonFilmDocument {
    pub film_id: Uuid,
    pub title: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonDocument {
    pub id: Uuid,
    pub full_name: String,
    pub films: Vec<PersonFilmDocument>,
}

/// Any document the loader can write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndexDocument {
    Film(FilmDocument),
    Genre(GenreDocument),
    Person(PersonDocument),
}

impl IndexDocument {
    /// Document id, identical to the source entity id.
    pub fn id(&self) -> Uuid {
        match self {
            IndexDocument::Film(doc) => doc.id,
            IndexDocument::Genre(doc) => doc.id,
            IndexDocument::Person(doc) => doc.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            IndexDocument::Film(_) => EntityKind::Film,
            IndexDocument::Genre(_) => EntityKind::Genre,
            IndexDocument::Person(_) => EntityKind::Person,
        }
    }

    /// JSON body as stored in the index.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
