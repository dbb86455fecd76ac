//! PostgreSQL implementation of the watermark storage.
//!
//! Stores each pipeline's whole watermark map as one JSONB record in an
//! `indexer_state` table, so a write replaces the map atomically.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::collections::HashMap;

use crate::errors::WatermarkStorageError;
use crate::interfaces::WatermarkStorage;
use crate::postgres::queries;

/// PostgreSQL-backed watermark storage.
///
/// Several pipelines may share the table; each owns the record named after it.
pub struct PostgresWatermarkStorage {
    /// PostgreSQL connection pool
    pool: PgPool,
    /// Key of this pipeline's record
    name: String,
}

impl PostgresWatermarkStorage {
    /// Creates a new PostgreSQL watermark storage instance.
    ///
    /// # Arguments
    ///
    /// * `pool` - Configured PostgreSQL connection pool
    /// * `name` - Record key, one per pipeline
    pub fn new(pool: PgPool, name: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
        }
    }

    /// Opens a small pool dedicated to watermark writes.
    pub async fn connect_pool(database_url: &str) -> Result<PgPool, WatermarkStorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await?;
        Ok(pool)
    }

    /// Creates the `indexer_state` table when it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), WatermarkStorageError> {
        sqlx::query(queries::CREATE_STATE_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WatermarkStorage for PostgresWatermarkStorage {
    async fn get_all(&self) -> Result<HashMap<String, String>, WatermarkStorageError> {
        let state: Option<Json<HashMap<String, String>>> = sqlx::query_scalar(queries::SELECT_STATE)
            .bind(&self.name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(state.map(|Json(values)| values).unwrap_or_default())
    }

    async fn set_all(&self, values: &HashMap<String, String>) -> Result<(), WatermarkStorageError> {
        sqlx::query(queries::UPSERT_STATE)
            .bind(&self.name)
            .bind(Json(values))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
