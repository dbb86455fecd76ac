//! PostgreSQL implementation of the catalog source.
//!
//! Every `connect` opens a dedicated `PgConnection` rather than borrowing from
//! a pool, so a long-running task keeps the same session for its lifetime and
//! closing it is explicit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::types::Json;
use sqlx::Connection;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use catalog_indexer_shared::{FilmEntity, FilmPerson, GenreEntity, PersonEntity, PersonFilm};

use crate::errors::CatalogSourceError;
use crate::interfaces::{CatalogConnection, CatalogSource};
use crate::postgres::queries;
use crate::types::{ChangeSource, ChangeWindow, ChangedRow};

/// Factory of PostgreSQL catalog connections.
#[derive(Debug, Clone)]
pub struct PostgresCatalogSource {
    options: PgConnectOptions,
}

impl PostgresCatalogSource {
    /// Creates a catalog source from a `postgres://` connection URL.
    ///
    /// No connection is opened until `connect` is called.
    pub fn new(database_url: &str) -> Result<Self, CatalogSourceError> {
        let options = PgConnectOptions::from_str(database_url)
            .map_err(|e| CatalogSourceError::connection(e.to_string()))?;
        Ok(Self { options })
    }

    /// Creates a catalog source from already parsed connection options.
    pub fn from_options(options: PgConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl CatalogSource for PostgresCatalogSource {
    async fn connect(&self) -> Result<Box<dyn CatalogConnection>, CatalogSourceError> {
        let conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(|e| CatalogSourceError::connection(e.to_string()))?;
        debug!("Opened catalog connection");
        Ok(Box::new(PostgresCatalogConnection { conn }))
    }
}

/// An exclusive PostgreSQL session on the catalog.
pub struct PostgresCatalogConnection {
    conn: PgConnection,
}

#[derive(sqlx::FromRow)]
struct ChangeRow {
    id: Uuid,
    modified: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct FilmRow {
    id: Uuid,
    kind: String,
    title: String,
    description: Option<String>,
    rating: Option<f64>,
    persons: Json<Vec<FilmPerson>>,
    genres: Json<Vec<GenreEntity>>,
}

#[derive(sqlx::FromRow)]
struct GenreRow {
    id: Uuid,
    name: String,
}

#[derive(sqlx::FromRow)]
struct PersonRow {
    id: Uuid,
    full_name: String,
    films: Json<Vec<PersonFilm>>,
}

impl From<FilmRow> for FilmEntity {
    fn from(row: FilmRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            title: row.title,
            description: row.description,
            rating: row.rating,
            genres: row.genres.0,
            persons: row.persons.0,
        }
    }
}

impl From<PersonRow> for PersonEntity {
    fn from(row: PersonRow) -> Self {
        Self {
            id: row.id,
            full_name: row.full_name,
            films: row.films.0,
        }
    }
}

#[async_trait]
impl CatalogConnection for PostgresCatalogConnection {
    async fn fetch_changes(
        &mut self,
        source: ChangeSource,
        window: &ChangeWindow,
    ) -> Result<Vec<ChangedRow>, CatalogSourceError> {
        let cursor = window.cursor();
        let limit = i64::try_from(window.limit).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, ChangeRow>(queries::change_query(source))
            .bind(cursor.modified)
            .bind(cursor.id)
            .bind(limit)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| CatalogSourceError::query(format!("{}: {}", source.name(), e)))?;

        Ok(rows
            .into_iter()
            .map(|row| ChangedRow {
                id: row.id,
                modified: row.modified,
            })
            .collect())
    }

    async fn films_by_ids(&mut self, ids: &[Uuid]) -> Result<Vec<FilmEntity>, CatalogSourceError> {
        let rows = sqlx::query_as::<_, FilmRow>(queries::FILMS_BY_IDS)
            .bind(ids)
            .fetch_all(&mut self.conn)
            .await?;
        Ok(rows.into_iter().map(FilmEntity::from).collect())
    }

    async fn genres_by_ids(
        &mut self,
        ids: &[Uuid],
    ) -> Result<Vec<GenreEntity>, CatalogSourceError> {
        let rows = sqlx::query_as::<_, GenreRow>(queries::GENRES_BY_IDS)
            .bind(ids)
            .fetch_all(&mut self.conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| GenreEntity {
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    async fn persons_by_ids(
        &mut self,
        ids: &[Uuid],
    ) -> Result<Vec<PersonEntity>, CatalogSourceError> {
        let rows = sqlx::query_as::<_, PersonRow>(queries::PERSONS_BY_IDS)
            .bind(ids)
            .fetch_all(&mut self.conn)
            .await?;
        Ok(rows.into_iter().map(PersonEntity::from).collect())
    }

    async fn close(self: Box<Self>) -> Result<(), CatalogSourceError> {
        self.conn
            .close()
            .await
            .map_err(|e| CatalogSourceError::close(e.to_string()))
    }
}
