//! Durable per-source watermarks.
//!
//! A watermark is the `(modified, id)` position of the last row of a source
//! that reached the index. The store keeps an in-memory view of the persisted
//! map. The view only changes after the storage accepted the new map, so a
//! reader never sees a watermark that would be lost on restart.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use catalog_indexer_repository::{Watermark, WatermarkStorage};

use crate::errors::PipelineError;

/// `0001-01-01T00:00:00Z`, the watermark of a source never committed.
pub fn min_watermark() -> Watermark {
    Watermark::origin()
}

/// Watermark map backed by a `WatermarkStorage`.
///
/// Single writer (the loader), many readers (the producers). Values never
/// move backwards: `commit` merges by maximum.
pub struct WatermarkStore {
    storage: Arc<dyn WatermarkStorage>,
    values: Mutex<HashMap<String, Watermark>>,
}

impl WatermarkStore {
    /// Load the persisted map.
    ///
    /// Entries that cannot be decoded are skipped with a warning, which makes their source
    /// start from `min_watermark()`. A bare RFC 3339 timestamp is accepted.
    pub async fn load(storage: Arc<dyn WatermarkStorage>) -> Result<Self, PipelineError> {
        let raw = storage
            .get_all()
            .await
            .map_err(|e| PipelineError::watermark(e.to_string()))?;

        let mut values = HashMap::with_capacity(raw.len());
        for (source, stored) in raw {
            match Watermark::decode(&stored) {
                Some(watermark) => {
                    values.insert(source, watermark);
                }
                None => {
                    warn!(source = %source, value = %stored, "Ignoring unreadable watermark");
                }
            }
        }

        debug!(sources = values.len(), "Loaded watermarks");
        Ok(Self {
            storage,
            values: Mutex::new(values),
        })
    }

    /// Last committed watermark of `source_name`.
    pub async fn get(&self, source_name: &str) -> Watermark {
        self.values
            .lock()
            .await
            .get(source_name)
            .copied()
            .unwrap_or_else(min_watermark)
    }

    /// Copy of the whole map.
    pub async fn snapshot(&self) -> HashMap<String, Watermark> {
        self.values.lock().await.clone()
    }

    /// Merge `updates` into the map by maximum and persist the result.
    ///
    /// The whole map is written in one storage call. On failure nothing changes.
    #[instrument(skip(self, updates), fields(sources = updates.len()))]
    pub async fn commit(
        &self,
        updates: &HashMap<String, Watermark>,
    ) -> Result<(), PipelineError> {
        let mut values = self.values.lock().await;

        let mut merged = values.clone();
        for (source, position) in updates {
            merged
                .entry(source.clone())
                .and_modify(|current| {
                    if *position > *current {
                        *current = *position;
                    }
                })
                .or_insert(*position);
        }

        if merged == *values {
            return Ok(());
        }

        let serialized: HashMap<String, String> = merged
            .iter()
            .map(|(source, position)| (source.clone(), position.encode()))
            .collect();

        self.storage
            .set_all(&serialized)
            .await
            .map_err(|e| PipelineError::watermark(e.to_string()))?;

        *values = merged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog_indexer_repository::WatermarkStorageError;
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// In-memory storage counting writes, optionally failing them.
    struct MemoryStorage {
        values: std::sync::Mutex<HashMap<String, String>>,
        writes: AtomicUsize,
        fail_writes: AtomicBool,
    }

    impl MemoryStorage {
        fn with(values: HashMap<String, String>) -> Self {
            Self {
                values: std::sync::Mutex::new(values),
                writes: AtomicUsize::new(0),
                fail_writes: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl WatermarkStorage for MemoryStorage {
        async fn get_all(&self) -> Result<HashMap<String, String>, WatermarkStorageError> {
            Ok(self.values.lock().unwrap().clone())
        }

        async fn set_all(
            &self,
            values: &HashMap<String, String>,
        ) -> Result<(), WatermarkStorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(WatermarkStorageError::DatabaseError(
                    "connection refused".to_string(),
                ));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            *self.values.lock().unwrap() = values.clone();
            Ok(())
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    fn pos(d: u32) -> Watermark {
        Watermark::new(day(d), Uuid::from_u128(u128::from(d)))
    }

    #[tokio::test]
    async fn test_unseen_source_returns_minimum() {
        let store = WatermarkStore::load(Arc::new(MemoryStorage::with(HashMap::new())))
            .await
            .unwrap();

        let watermark = store.get("FilmworkModified").await;
        assert_eq!(watermark, min_watermark());
        assert_eq!(watermark.modified.to_rfc3339(), "0001-01-01T00:00:00+00:00");
        assert!(watermark.id.is_nil());
    }

    #[tokio::test]
    async fn test_load_skips_unreadable_values() {
        let mut raw = HashMap::new();
        raw.insert("GenreModified".to_string(), pos(2).encode());
        raw.insert("FilmworkModified".to_string(), day(3).to_rfc3339());
        raw.insert("PersonModified".to_string(), "yesterday".to_string());

        let store = WatermarkStore::load(Arc::new(MemoryStorage::with(raw)))
            .await
            .unwrap();

        assert_eq!(store.get("GenreModified").await, pos(2));
        assert_eq!(store.get("FilmworkModified").await, Watermark::from(day(3)));
        assert_eq!(store.get("PersonModified").await, min_watermark());
    }

    #[tokio::test]
    async fn test_commit_merges_by_max() {
        let storage = Arc::new(MemoryStorage::with(HashMap::new()));
        let store = WatermarkStore::load(storage.clone()).await.unwrap();

        store
            .commit(&HashMap::from([("FilmworkModified".to_string(), pos(5))]))
            .await
            .unwrap();
        store
            .commit(&HashMap::from([
                ("FilmworkModified".to_string(), pos(3)),
                ("FilmworkGenreModified".to_string(), pos(4)),
            ]))
            .await
            .unwrap();

        assert_eq!(store.get("FilmworkModified").await, pos(5));
        assert_eq!(store.get("FilmworkGenreModified").await, pos(4));

        // The whole map is persisted on every write.
        let persisted = storage.values.lock().unwrap().clone();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted["FilmworkModified"], pos(5).encode());
    }

    #[tokio::test]
    async fn test_commit_without_progress_skips_write() {
        let storage = Arc::new(MemoryStorage::with(HashMap::new()));
        let store = WatermarkStore::load(storage.clone()).await.unwrap();

        let update = HashMap::from([("GenreModified".to_string(), pos(2))]);
        store.commit(&update).await.unwrap();
        store.commit(&update).await.unwrap();

        assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_view_unchanged() {
        let storage = Arc::new(MemoryStorage::with(HashMap::new()));
        let store = WatermarkStore::load(storage.clone()).await.unwrap();
        storage.fail_writes.store(true, Ordering::SeqCst);

        let result = store
            .commit(&HashMap::from([("PersonModified".to_string(), pos(9))]))
            .await;

        assert!(matches!(result, Err(PipelineError::WatermarkError(_))));
        assert_eq!(store.get("PersonModified").await, min_watermark());
    }

    #[tokio::test]
    async fn test_commit_advances_within_a_timestamp() {
        let storage = Arc::new(MemoryStorage::with(HashMap::new()));
        let store = WatermarkStore::load(storage.clone()).await.unwrap();

        let first = Watermark::new(day(1), Uuid::from_u128(10));
        let second = Watermark::new(day(1), Uuid::from_u128(20));
        store
            .commit(&HashMap::from([("GenreModified".to_string(), first)]))
            .await
            .unwrap();
        store
            .commit(&HashMap::from([("GenreModified".to_string(), second)]))
            .await
            .unwrap();
        store
            .commit(&HashMap::from([("GenreModified".to_string(), first)]))
            .await
            .unwrap();

        assert_eq!(store.get("GenreModified").await, second);
        assert_eq!(storage.writes.load(Ordering::SeqCst), 2);
    }
}
