//! Loader module for the catalog indexer pipeline.
//!
//! Transforms enriched events into documents, writes each batch with a single
//! bulk request and, only when every document was accepted, commits the
//! batch's watermarks.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument};

use catalog_indexer_repository::{BulkDocument, BulkWriteSummary, SearchIndexProvider, Watermark};
use catalog_indexer_shared::EntityKind;

use crate::batch::next_batch;
use crate::errors::PipelineError;
use crate::events::{ChangeEvent, QueueMessage};
use crate::transformer::transform;
use crate::watermark::WatermarkStore;

/// Configuration for the search loader.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Maximum number of documents per bulk request.
    pub batch_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

/// Loader that indexes documents into the search engine.
///
/// The loader is responsible for:
/// - Batching events for efficient bulk indexing
/// - Transforming entities into documents
/// - Advancing watermarks once a batch is fully indexed
pub struct SearchLoader {
    provider: Arc<dyn SearchIndexProvider>,
    kind: EntityKind,
    watermarks: Arc<WatermarkStore>,
    config: LoaderConfig,
}

impl SearchLoader {
    /// Create a new search loader writing documents of `kind`.
    pub fn new(
        provider: Arc<dyn SearchIndexProvider>,
        kind: EntityKind,
        watermarks: Arc<WatermarkStore>,
        config: LoaderConfig,
    ) -> Self {
        Self {
            provider,
            kind,
            watermarks,
            config,
        }
    }

    /// Consume the load queue until its end marker or until `shutdown` fires.
    #[instrument(skip_all, fields(index = self.kind.index_name()))]
    pub async fn run(
        &self,
        mut rx: mpsc::Receiver<QueueMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), PipelineError> {
        tokio::select! {
            result = self.load_loop(&mut rx) => result,
            _ = shutdown.recv() => {
                debug!("Loader stopping");
                Ok(())
            }
        }
    }

    async fn load_loop(&self, rx: &mut mpsc::Receiver<QueueMessage>) -> Result<(), PipelineError> {
        loop {
            let batch = next_batch(rx, self.config.batch_size).await;

            if !batch.events.is_empty() {
                self.load_batch(&batch.events).await?;
            }

            if batch.end_of_stream {
                info!("Load queue drained");
                return Ok(());
            }
        }
    }

    /// Index one batch and commit its watermarks.
    ///
    /// Exactly one bulk request is issued. If any document is rejected the whole
    /// batch fails and no watermark moves, so every event of it will be produced again.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkWriteSummary)` - All documents were accepted and watermarks committed
    /// * `Err(PipelineError)` - The bulk write or the commit failed
    #[instrument(skip(self, events), fields(event_count = events.len()))]
    pub async fn load_batch(
        &self,
        events: &[ChangeEvent],
    ) -> Result<BulkWriteSummary, PipelineError> {
        let documents = events
            .iter()
            .map(|event| -> Result<BulkDocument, PipelineError> {
                let entity = event
                    .payload
                    .as_ref()
                    .ok_or(PipelineError::MissingPayload(event.entity_id))?;
                let document = transform(entity);
                let body = document
                    .to_value()
                    .map_err(|e| PipelineError::SerializationError(e.to_string()))?;
                Ok(BulkDocument {
                    id: document.id().to_string(),
                    body,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        let summary = self.provider.bulk_upsert(self.kind, &documents).await?;

        if summary.failed > 0 {
            error!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Bulk update completed with failures, watermarks not advanced"
            );
            return Err(PipelineError::BulkWriteError {
                failed: summary.failed,
                total: summary.total,
            });
        }

        let watermarks = batch_watermarks(events);
        self.watermarks.commit(&watermarks).await?;

        info!(
            count = summary.succeeded,
            watermarks = ?watermarks,
            "Batch indexed"
        );
        Ok(summary)
    }
}

/// Highest `(modified, id)` position per source within a batch.
pub fn batch_watermarks(events: &[ChangeEvent]) -> HashMap<String, Watermark> {
    let mut watermarks: HashMap<String, Watermark> = HashMap::new();
    for event in events {
        let position = event.position();
        watermarks
            .entry(event.source_name().to_string())
            .and_modify(|max| {
                if position > *max {
                    *max = position;
                }
            })
            .or_insert(position);
    }
    watermarks
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog_indexer_repository::{
        BulkItemFailure, ChangeSource, ChangedRow, SearchIndexError, WatermarkStorage,
        WatermarkStorageError,
    };
    use catalog_indexer_shared::{DenormalizedEntity, GenreEntity};
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Mock search provider for testing.
    struct MockSearchProvider {
        bulk_calls: AtomicUsize,
        reject: usize,
    }

    impl MockSearchProvider {
        fn new(reject: usize) -> Self {
            Self {
                bulk_calls: AtomicUsize::new(0),
                reject,
            }
        }
    }

    #[async_trait]
    impl SearchIndexProvider for MockSearchProvider {
        async fn ensure_index_exists(&self, _kind: EntityKind) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn bulk_upsert(
            &self,
            _kind: EntityKind,
            documents: &[BulkDocument],
        ) -> Result<BulkWriteSummary, SearchIndexError> {
            self.bulk_calls.fetch_add(1, Ordering::SeqCst);
            let failed = self.reject.min(documents.len());
            Ok(BulkWriteSummary {
                total: documents.len(),
                succeeded: documents.len() - failed,
                failed,
                failures: documents
                    .iter()
                    .take(failed)
                    .map(|d| BulkItemFailure {
                        id: d.id.clone(),
                        error: "rejected".to_string(),
                    })
                    .collect(),
            })
        }
    }

    struct NullStorage;

    #[async_trait]
    impl WatermarkStorage for NullStorage {
        async fn get_all(&self) -> Result<HashMap<String, String>, WatermarkStorageError> {
            Ok(HashMap::new())
        }

        async fn set_all(
            &self,
            _values: &HashMap<String, String>,
        ) -> Result<(), WatermarkStorageError> {
            Ok(())
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn genre_event(hour: u32) -> ChangeEvent {
        let id = Uuid::new_v4();
        let mut event = ChangeEvent::detected(
            ChangeSource::GenreModified,
            &ChangedRow {
                id,
                modified: at(hour),
            },
        );
        event.payload = Some(DenormalizedEntity::Genre(GenreEntity {
            id,
            name: format!("genre-{}", hour),
        }));
        event
    }

    async fn loader(provider: Arc<MockSearchProvider>) -> (SearchLoader, Arc<WatermarkStore>) {
        let watermarks = Arc::new(WatermarkStore::load(Arc::new(NullStorage)).await.unwrap());
        loader_with(provider, watermarks)
    }

    fn loader_with(
        provider: Arc<MockSearchProvider>,
        watermarks: Arc<WatermarkStore>,
    ) -> (SearchLoader, Arc<WatermarkStore>) {
        let loader = SearchLoader::new(
            provider,
            EntityKind::Genre,
            watermarks.clone(),
            LoaderConfig::default(),
        );
        (loader, watermarks)
    }

    #[tokio::test]
    async fn test_successful_batch_commits_max_watermark() {
        let provider = Arc::new(MockSearchProvider::new(0));
        let (loader, watermarks) = loader(provider.clone()).await;

        let events = vec![genre_event(3), genre_event(7), genre_event(5)];
        let summary = loader.load_batch(&events).await.unwrap();

        assert_eq!(summary.succeeded, 3);
        assert_eq!(provider.bulk_calls.load(Ordering::SeqCst), 1);
        assert_eq!(watermarks.get("GenreModified").await, events[1].position());
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_commit() {
        let provider = Arc::new(MockSearchProvider::new(1));
        let (loader, watermarks) = loader(provider.clone()).await;

        let result = loader.load_batch(&[genre_event(3), genre_event(4)]).await;

        assert!(matches!(
            result,
            Err(PipelineError::BulkWriteError {
                failed: 1,
                total: 2
            })
        ));
        assert_eq!(watermarks.get("GenreModified").await, crate::watermark::min_watermark());
    }

    #[tokio::test]
    async fn test_unenriched_event_is_rejected() {
        let provider = Arc::new(MockSearchProvider::new(0));
        let (loader, _) = loader(provider.clone()).await;

        let mut event = genre_event(1);
        event.payload = None;

        let result = loader.load_batch(&[event]).await;

        assert!(matches!(result, Err(PipelineError::MissingPayload(_))));
        assert_eq!(provider.bulk_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_batch_watermarks_groups_by_source() {
        let mut film = genre_event(9);
        film.source = ChangeSource::FilmworkModified;
        let events = vec![genre_event(2), film, genre_event(4)];

        let watermarks = batch_watermarks(&events);

        assert_eq!(watermarks.len(), 2);
        assert_eq!(watermarks["GenreModified"].modified, at(4));
        assert_eq!(watermarks["FilmworkModified"], events[1].position());
    }

    #[test]
    fn test_batch_watermarks_break_ties_by_id() {
        let mut events = vec![genre_event(6), genre_event(6), genre_event(6)];
        for (n, event) in events.iter_mut().enumerate() {
            event.entity_id = Uuid::from_u128(10 - n as u128);
        }

        let watermarks = batch_watermarks(&events);

        assert_eq!(
            watermarks["GenreModified"],
            Watermark::new(at(6), Uuid::from_u128(10))
        );
    }

    #[tokio::test]
    async fn test_failed_batch_keeps_earlier_tied_position() {
        let provider = Arc::new(MockSearchProvider::new(0));
        let (loader, watermarks) = loader(provider.clone()).await;

        let mut events = vec![genre_event(8), genre_event(8), genre_event(8)];
        events.sort_by_key(|e| e.entity_id);

        loader.load_batch(&events[..2]).await.unwrap();
        assert_eq!(watermarks.get("GenreModified").await, events[1].position());

        let rejecting = Arc::new(MockSearchProvider::new(1));
        let (failing, _) = loader_with(rejecting, watermarks.clone());
        assert!(failing.load_batch(&events[2..]).await.is_err());

        let committed = watermarks.get("GenreModified").await;
        assert_eq!(committed.modified, events[2].observed_modified);
        assert!(committed < events[2].position());
    }
}
