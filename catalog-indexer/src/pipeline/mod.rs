//! Pipeline module for the catalog indexer.
//!
//! Wires N producers, one enricher and one loader through two bounded
//! queues, supervises their tasks and restarts the whole set after a failure:
//!
//! ```text
//! producers ──► [change queue] ──► enricher ──► [load queue] ──► loader ──► index
//!                                                                   └─────► watermarks
//! ```

mod backoff;

pub use backoff::{Backoff, BackoffConfig};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::enricher::Enricher;
use crate::errors::PipelineError;
use crate::events::QueueMessage;
use crate::loader::SearchLoader;
use crate::producer::ChangeProducer;

/// Configuration for a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capacity of the queue shared by the producers and the enricher.
    pub change_queue_capacity: usize,
    /// Capacity of the queue between the enricher and the loader.
    pub load_queue_capacity: usize,
    /// Restart policy after a failed execution.
    pub backoff: BackoffConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            change_queue_capacity: 500,
            load_queue_capacity: 10_000,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Lifecycle of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Starting,
    Running,
    Failed,
    BackingOff,
    Stopped,
}

/// A supervised set of producers, one enricher and one loader.
pub struct Pipeline {
    name: String,
    producers: Vec<Arc<ChangeProducer>>,
    enricher: Arc<Enricher>,
    loader: Arc<SearchLoader>,
    config: PipelineConfig,
    shutdown_tx: broadcast::Sender<()>,
    stopping: AtomicBool,
    state_tx: watch::Sender<PipelineState>,
    /// Number of executions started since creation.
    executions: AtomicU64,
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        producers: Vec<ChangeProducer>,
        enricher: Enricher,
        loader: SearchLoader,
        config: PipelineConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (state_tx, _) = watch::channel(PipelineState::Starting);

        Self {
            name: name.into(),
            producers: producers.into_iter().map(Arc::new).collect(),
            enricher: Arc::new(enricher),
            loader: Arc::new(loader),
            config,
            shutdown_tx,
            stopping: AtomicBool::new(false),
            state_tx,
            executions: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        *self.state_tx.borrow()
    }

    /// Receiver notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    /// Number of executions started so far.
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::SeqCst)
    }

    /// Run executions until `shutdown` is called, restarting after every failure.
    ///
    /// Failures never end this loop: each one is logged and followed by a
    /// backoff delay that doubles with every consecutive failure. An execution
    /// ending on its own without a shutdown request is treated as a failure.
    /// The delay resets after an execution that stayed up for at least the
    /// maximum delay.
    #[instrument(skip(self), fields(pipeline = %self.name))]
    pub async fn run(&self) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut delays = self.config.backoff.delays();

        while !self.stopping.load(Ordering::SeqCst) {
            let started = Instant::now();
            let outcome = self.execute().await;
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }

            if started.elapsed() >= self.config.backoff.max {
                delays = self.config.backoff.delays();
            }
            let delay = delays.next().unwrap_or(self.config.backoff.max);
            match outcome {
                Ok(()) => warn!(
                    delay_ms = delay.as_millis() as u64,
                    "Pipeline execution ended unexpectedly, restarting after backoff"
                ),
                Err(e) => error!(
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Pipeline execution failed, restarting after backoff"
                ),
            }

            self.set_state(PipelineState::BackingOff);
            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown.recv() => {}
            }
        }

        self.set_state(PipelineState::Stopped);
        info!("Pipeline stopped");
    }

    /// Run one execution: spawn every task and wait for all of them.
    ///
    /// Fresh queues are created for every execution. On the first task failure the remaining
    /// tasks are told to stop, and the failure is returned once all of them have released
    /// their connections.
    pub async fn execute(&self) -> Result<(), PipelineError> {
        let mut external = self.shutdown_tx.subscribe();
        if self.stopping.load(Ordering::SeqCst) {
            return Ok(());
        }

        let attempt = self.executions.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(PipelineState::Starting);
        debug!(attempt = attempt, "Starting pipeline execution");

        let (change_tx, change_rx) =
            mpsc::channel::<QueueMessage>(self.config.change_queue_capacity.max(1));
        let (load_tx, load_rx) =
            mpsc::channel::<QueueMessage>(self.config.load_queue_capacity.max(1));
        let (abort_tx, _) = broadcast::channel::<()>(1);

        let mut tasks = JoinSet::new();

        for producer in &self.producers {
            let producer = Arc::clone(producer);
            let tx = change_tx.clone();
            let stop = abort_tx.subscribe();
            tasks.spawn(async move { producer.run(tx, stop).await });
        }
        // The change queue closes once every producer has exited.
        drop(change_tx);

        let enricher = Arc::clone(&self.enricher);
        let stop = abort_tx.subscribe();
        tasks.spawn(async move { enricher.run(change_rx, load_tx, stop).await });

        let loader = Arc::clone(&self.loader);
        let stop = abort_tx.subscribe();
        tasks.spawn(async move { loader.run(load_rx, stop).await });

        self.set_state(PipelineState::Running);
        info!(producers = self.producers.len(), attempt = attempt, "Pipeline running");

        let mut failure = None;
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(e))) => {
                        failure = Some(e);
                        break;
                    }
                    Some(Err(join_error)) => {
                        failure = Some(PipelineError::task(join_error.to_string()));
                        break;
                    }
                },
                _ = external.recv() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        if abort_tx.send(()).is_err() {
            debug!("Every task had already exited");
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Err(e)) => debug!(error = %e, "Task failed while stopping"),
                Err(e) => warn!(error = %e, "Task panicked while stopping"),
                Ok(Ok(())) => {}
            }
        }

        match failure {
            Some(e) => {
                self.set_state(PipelineState::Failed);
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// Trigger a graceful shutdown.
    ///
    /// The running execution stops its tasks and `run` returns.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        if self.shutdown_tx.send(()).is_err() {
            debug!(pipeline = %self.name, "Pipeline not running");
        }
    }

    fn set_state(&self, state: PipelineState) {
        self.state_tx.send_replace(state);
    }
}
