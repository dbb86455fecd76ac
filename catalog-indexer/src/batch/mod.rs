//! Queue batching shared by the enricher and the loader.
//!
//! A batch is cut when it reaches its size limit or when the queue is
//! momentarily empty, whichever comes first. The first message is awaited;
//! the rest are only taken if already queued.

use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::events::{ChangeEvent, QueueMessage};

/// Events taken from a queue in one go.
#[derive(Debug, Default)]
pub struct Batch {
    pub events: Vec<ChangeEvent>,
    /// An end marker was seen or the queue was closed.
    pub end_of_stream: bool,
}

/// Receive the next batch of at most `max_size` events.
///
/// Returns an empty batch with `end_of_stream` set once the queue has ended.
pub async fn next_batch(rx: &mut mpsc::Receiver<QueueMessage>, max_size: usize) -> Batch {
    let max_size = max_size.max(1);
    let mut batch = Batch {
        events: Vec::with_capacity(max_size),
        end_of_stream: false,
    };

    match rx.recv().await {
        Some(QueueMessage::Event(event)) => batch.events.push(event),
        Some(QueueMessage::End) | None => {
            batch.end_of_stream = true;
            return batch;
        }
    }

    while batch.events.len() < max_size {
        match rx.try_recv() {
            Ok(QueueMessage::Event(event)) => batch.events.push(event),
            Ok(QueueMessage::End) | Err(TryRecvError::Disconnected) => {
                batch.end_of_stream = true;
                break;
            }
            Err(TryRecvError::Empty) => break,
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_repository::{ChangeSource, ChangedRow};
    use chrono::Utc;
    use uuid::Uuid;

    fn event() -> QueueMessage {
        let row = ChangedRow {
            id: Uuid::new_v4(),
            modified: Utc::now(),
        };
        QueueMessage::Event(ChangeEvent::detected(ChangeSource::GenreModified, &row))
    }

    #[tokio::test]
    async fn test_batch_stops_at_max_size() {
        let (tx, mut rx) = mpsc::channel(10);
        for _ in 0..5 {
            tx.send(event()).await.unwrap();
        }

        let batch = next_batch(&mut rx, 3).await;
        assert_eq!(batch.events.len(), 3);
        assert!(!batch.end_of_stream);

        let batch = next_batch(&mut rx, 3).await;
        assert_eq!(batch.events.len(), 2);
        assert!(!batch.end_of_stream);
    }

    #[tokio::test]
    async fn test_batch_flushes_on_end_marker() {
        let (tx, mut rx) = mpsc::channel(10);
        tx.send(event()).await.unwrap();
        tx.send(QueueMessage::End).await.unwrap();

        let batch = next_batch(&mut rx, 100).await;
        assert_eq!(batch.events.len(), 1);
        assert!(batch.end_of_stream);
    }

    #[tokio::test]
    async fn test_end_marker_alone() {
        let (tx, mut rx) = mpsc::channel(10);
        tx.send(QueueMessage::End).await.unwrap();

        let batch = next_batch(&mut rx, 100).await;
        assert!(batch.events.is_empty());
        assert!(batch.end_of_stream);
    }

    #[tokio::test]
    async fn test_closed_queue_counts_as_end() {
        let (tx, mut rx) = mpsc::channel(10);
        tx.send(event()).await.unwrap();
        drop(tx);

        let batch = next_batch(&mut rx, 100).await;
        assert_eq!(batch.events.len(), 1);
        assert!(batch.end_of_stream);
    }
}
