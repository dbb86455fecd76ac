//! Messages flowing through the pipeline queues.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use catalog_indexer_repository::{ChangeSource, ChangedRow, Watermark};
use catalog_indexer_shared::DenormalizedEntity;

/// A detected change to one catalog entity.
///
/// Created by a producer without payload, enriched once by the enricher and
/// consumed by the loader. Identity is `(source, entity_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// The change-source that detected the change.
    pub source: ChangeSource,
    /// Id of the entity to reindex.
    pub entity_id: Uuid,
    /// Change timestamp as read from the catalog.
    pub observed_modified: DateTime<Utc>,
    /// Denormalized entity, attached by the enricher.
    pub payload: Option<DenormalizedEntity>,
}

impl ChangeEvent {
    /// Create an unenriched event from a changed catalog row.
    pub fn detected(source: ChangeSource, row: &ChangedRow) -> Self {
        Self {
            source,
            entity_id: row.id,
            observed_modified: row.modified,
            payload: None,
        }
    }

    /// Watermark key of the originating change-source.
    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Position of the detected row in its source's `(modified, id)` order.
    pub fn position(&self) -> Watermark {
        Watermark::new(self.observed_modified, self.entity_id)
    }
}

/// Message carried by the change and load queues.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueMessage {
    Event(ChangeEvent),
    /// No more events will follow on this queue.
    End,
}
