//! Change producers.
//!
//! A producer repeatedly reads the rows of one change-source that changed
//! after the source's committed watermark and pushes them into the change
//! queue. It never commits progress itself: the same rows are re-read on
//! every pass until the loader has committed a newer watermark, which gives
//! at-least-once delivery.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use catalog_indexer_repository::{CatalogConnection, CatalogSource, ChangeSource, ChangeWindow};

use crate::errors::PipelineError;
use crate::events::{ChangeEvent, QueueMessage};
use crate::watermark::WatermarkStore;

/// Configuration for a change producer.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Rows fetched per query page.
    pub chunk_size: usize,
    /// Pause between two passes.
    pub poll_interval: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// Polls one change-source and emits change events.
pub struct ChangeProducer {
    source: ChangeSource,
    catalog: Arc<dyn CatalogSource>,
    watermarks: Arc<WatermarkStore>,
    config: ProducerConfig,
}

impl ChangeProducer {
    pub fn new(
        source: ChangeSource,
        catalog: Arc<dyn CatalogSource>,
        watermarks: Arc<WatermarkStore>,
        config: ProducerConfig,
    ) -> Self {
        Self {
            source,
            catalog,
            watermarks,
            config,
        }
    }

    pub fn source(&self) -> ChangeSource {
        self.source
    }

    /// Run until `shutdown` fires or an error occurs.
    ///
    /// The catalog connection opened at start is closed on every exit path.
    #[instrument(skip_all, fields(source = self.source.name()))]
    pub async fn run(
        &self,
        tx: mpsc::Sender<QueueMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), PipelineError> {
        let mut conn = self
            .catalog
            .connect()
            .await
            .map_err(|e| PipelineError::source_query(self.source.name(), e.to_string()))?;

        let result = tokio::select! {
            result = self.poll_loop(conn.as_mut(), &tx) => result,
            _ = shutdown.recv() => {
                debug!("Producer stopping");
                Ok(())
            }
        };

        release_connection(conn).await;
        result
    }

    async fn poll_loop(
        &self,
        conn: &mut dyn CatalogConnection,
        tx: &mpsc::Sender<QueueMessage>,
    ) -> Result<(), PipelineError> {
        loop {
            let produced = self.poll_once(conn, tx).await?;
            if produced > 0 {
                info!(count = produced, "Produced change events");
            } else {
                debug!("No changes detected");
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// Run one pass: emit every row changed after the committed watermark.
    ///
    /// Pages through the change query in `(modified, id)` order until a short
    /// page comes back. Suspends on a full queue.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of events emitted in this pass
    /// * `Err(PipelineError)` - If the query fails or the queue is closed
    pub async fn poll_once(
        &self,
        conn: &mut dyn CatalogConnection,
        tx: &mpsc::Sender<QueueMessage>,
    ) -> Result<usize, PipelineError> {
        let chunk_size = self.config.chunk_size.max(1);
        let watermark = self.watermarks.get(self.source.name()).await;
        let mut window = ChangeWindow::starting_at(watermark, chunk_size);
        let mut produced = 0;

        loop {
            let rows = conn
                .fetch_changes(self.source, &window)
                .await
                .map_err(|e| PipelineError::source_query(self.source.name(), e.to_string()))?;

            for row in &rows {
                tx.send(QueueMessage::Event(ChangeEvent::detected(self.source, row)))
                    .await
                    .map_err(|_| PipelineError::channel("change queue closed"))?;
                produced += 1;
            }

            match rows.last() {
                Some(last) if rows.len() >= chunk_size => window = window.next_after(last),
                _ => break,
            }
        }

        Ok(produced)
    }
}

/// Close a catalog connection, logging instead of propagating failures.
pub(crate) async fn release_connection(conn: Box<dyn CatalogConnection>) {
    if let Err(e) = conn.close().await {
        let err = PipelineError::release(e.to_string());
        warn!(error = %err, "Failed to release catalog connection");
    }
}
