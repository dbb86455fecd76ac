use thiserror::Error;

/// Errors raised while reading from the relational catalog.
#[derive(Debug, Error)]
pub enum CatalogSourceError {
    /// Failed to open a connection to the catalog database.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A change or lookup query failed.
    #[error("Query error: {0}")]
    QueryError(String),

    /// Failed to close a connection cleanly.
    #[error("Close error: {0}")]
    CloseError(String),
}

impl CatalogSourceError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryError(msg.into())
    }

    pub fn close(msg: impl Into<String>) -> Self {
        Self::CloseError(msg.into())
    }
}

impl From<sqlx::Error> for CatalogSourceError {
    fn from(err: sqlx::Error) -> Self {
        Self::QueryError(err.to_string())
    }
}
