//! Enricher module for the catalog indexer pipeline.
//!
//! Turns id-only change events into events carrying the denormalized entity,
//! with one joined catalog lookup per batch.

mod lookup;

pub use lookup::{lookup_for, EntityLookup, FilmLookup, GenreLookup, PersonLookup};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use catalog_indexer_repository::{CatalogConnection, CatalogSource};

use crate::batch::next_batch;
use crate::errors::PipelineError;
use crate::events::{ChangeEvent, QueueMessage};
use crate::producer::release_connection;

/// Configuration for the enricher.
#[derive(Debug, Clone)]
pub struct EnricherConfig {
    /// Maximum number of events looked up together.
    pub batch_size: usize,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

/// Attaches denormalized entities to change events.
pub struct Enricher {
    lookup: Arc<dyn EntityLookup>,
    catalog: Arc<dyn CatalogSource>,
    config: EnricherConfig,
}

impl Enricher {
    pub fn new(
        lookup: Arc<dyn EntityLookup>,
        catalog: Arc<dyn CatalogSource>,
        config: EnricherConfig,
    ) -> Self {
        Self {
            lookup,
            catalog,
            config,
        }
    }

    /// Consume the change queue until its end, forwarding enriched events.
    ///
    /// The end marker is forwarded to the load queue before returning. The catalog
    /// connection opened at start is closed on every exit path.
    #[instrument(skip_all, fields(kind = ?self.lookup.kind()))]
    pub async fn run(
        &self,
        mut rx: mpsc::Receiver<QueueMessage>,
        tx: mpsc::Sender<QueueMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), PipelineError> {
        let mut conn = self
            .catalog
            .connect()
            .await
            .map_err(|e| PipelineError::enrichment(e.to_string()))?;

        let result = tokio::select! {
            result = self.enrich_loop(conn.as_mut(), &mut rx, &tx) => result,
            _ = shutdown.recv() => {
                debug!("Enricher stopping");
                Ok(())
            }
        };

        release_connection(conn).await;
        result
    }

    async fn enrich_loop(
        &self,
        conn: &mut dyn CatalogConnection,
        rx: &mut mpsc::Receiver<QueueMessage>,
        tx: &mpsc::Sender<QueueMessage>,
    ) -> Result<(), PipelineError> {
        loop {
            let batch = next_batch(rx, self.config.batch_size).await;

            if !batch.events.is_empty() {
                let enriched = self.enrich_batch(conn, batch.events).await?;
                for event in enriched {
                    tx.send(QueueMessage::Event(event))
                        .await
                        .map_err(|_| PipelineError::channel("load queue closed"))?;
                }
            }

            if batch.end_of_stream {
                debug!("Change queue ended, forwarding end marker");
                tx.send(QueueMessage::End)
                    .await
                    .map_err(|_| PipelineError::channel("load queue closed"))?;
                return Ok(());
            }
        }
    }

    /// Look up the entities of a batch and attach them to its events.
    ///
    /// Events whose entity no longer exists in the catalog are dropped with a warning.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ChangeEvent>)` - Enriched events, in input order
    /// * `Err(PipelineError)` - If the lookup fails
    pub async fn enrich_batch(
        &self,
        conn: &mut dyn CatalogConnection,
        events: Vec<ChangeEvent>,
    ) -> Result<Vec<ChangeEvent>, PipelineError> {
        let mut seen = HashSet::with_capacity(events.len());
        let ids: Vec<Uuid> = events
            .iter()
            .map(|e| e.entity_id)
            .filter(|id| seen.insert(*id))
            .collect();

        let entities: HashMap<Uuid, _> = self
            .lookup
            .lookup(conn, &ids)
            .await
            .map_err(|e| PipelineError::enrichment(e.to_string()))?
            .into_iter()
            .map(|entity| (entity.id(), entity))
            .collect();

        let mut enriched = Vec::with_capacity(events.len());
        for mut event in events {
            match entities.get(&event.entity_id) {
                Some(entity) => {
                    event.payload = Some(entity.clone());
                    enriched.push(event);
                }
                None => {
                    warn!(
                        entity_id = %event.entity_id,
                        source = event.source_name(),
                        "Entity vanished before enrichment, dropping event"
                    );
                }
            }
        }

        debug!(count = enriched.len(), "Items enriched");
        Ok(enriched)
    }
}
