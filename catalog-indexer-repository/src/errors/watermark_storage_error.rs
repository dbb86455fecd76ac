use thiserror::Error;

#[derive(Debug, Error)]
/// Represents errors that can occur within the watermark storage.
///
/// This enum consolidates the error conditions of the durable store holding
/// the watermark map, such as SQLx errors during database operations.
pub enum WatermarkStorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for WatermarkStorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}
