//! Transformer module for the catalog indexer pipeline.
//!
//! Maps denormalized entities to index documents. Pure and deterministic:
//! the same entity always produces the same document.

use catalog_indexer_shared::{
    DenormalizedEntity, FilmDocument, FilmEntity, GenreDocument, GenreEntity, IndexDocument,
    PersonDocument, PersonEntity, PersonFilmDocument, PersonRef, Role,
};

/// Items partitioned into disjoint lists by role.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleFanOut<T> {
    pub actors: Vec<T>,
    pub writers: Vec<T>,
    pub directors: Vec<T>,
}

impl<T> Default for RoleFanOut<T> {
    fn default() -> Self {
        Self {
            actors: Vec::new(),
            writers: Vec::new(),
            directors: Vec::new(),
        }
    }
}

impl<T> RoleFanOut<T> {
    /// Place each item in the list of its role, preserving input order.
    ///
    /// Items without a role are left out.
    pub fn partition<I>(items: I) -> Self
    where
        I: IntoIterator<Item = (T, Option<Role>)>,
    {
        let mut fan_out = Self::default();
        for (item, role) in items {
            match role {
                Some(Role::Actor) => fan_out.actors.push(item),
                Some(Role::Writer) => fan_out.writers.push(item),
                Some(Role::Director) => fan_out.directors.push(item),
                None => {}
            }
        }
        fan_out
    }
}

/// Map any denormalized entity to its index document.
pub fn transform(entity: &DenormalizedEntity) -> IndexDocument {
    match entity {
        DenormalizedEntity::Film(film) => IndexDocument::Film(film_document(film)),
        DenormalizedEntity::Genre(genre) => IndexDocument::Genre(genre_document(genre)),
        DenormalizedEntity::Person(person) => IndexDocument::Person(person_document(person)),
    }
}

fn film_document(film: &FilmEntity) -> FilmDocument {
    let credits = RoleFanOut::partition(film.persons.iter().map(|p| {
        (
            PersonRef {
                id: p.id,
                full_name: p.full_name.clone(),
            },
            p.role,
        )
    }));

    FilmDocument {
        id: film.id,
        kind: film.kind.clone(),
        title: film.title.clone(),
        description: film.description.clone(),
        imdb_rating: film.rating,
        genre: film.genres.iter().map(genre_document).collect(),
        actors: credits.actors,
        writers: credits.writers,
        directors: credits.directors,
    }
}

fn genre_document(genre: &GenreEntity) -> GenreDocument {
    GenreDocument {
        id: genre.id,
        name: genre.name.clone(),
    }
}

fn person_document(person: &PersonEntity) -> PersonDocument {
    PersonDocument {
        id: person.id,
        full_name: person.full_name.clone(),
        films: person
            .films
            .iter()
            .filter_map(|film| {
                film.role.map(|role| PersonFilmDocument {
                    film_id: film.film_id,
                    title: film.title.clone(),
                    role,
                })
            })
            .collect(),
    }
}
