use std::collections::HashMap;

use crate::errors::WatermarkStorageError;

/// Trait for interacting with the durable watermark storage.
///
/// The map is always read and written as a whole: `set_all` replaces the
/// stored record atomically. Values are RFC 3339 timestamps keyed by
/// change-source name.
#[async_trait::async_trait]
pub trait WatermarkStorage: Send + Sync {
    async fn get_all(&self) -> Result<HashMap<String, String>, WatermarkStorageError>;
    async fn set_all(&self, values: &HashMap<String, String>) -> Result<(), WatermarkStorageError>;
}
