//! Dependency initialization and wiring for the catalog indexer.

use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use catalog_indexer_repository::opensearch::IndexConfig;
use catalog_indexer_repository::{
    CatalogSource, ChangeSource, OpenSearchProvider, PostgresCatalogSource,
    PostgresWatermarkStorage, SearchIndexProvider, WatermarkStorage,
};
use catalog_indexer_shared::EntityKind;

use crate::config::Settings;
use crate::enricher::{lookup_for, Enricher};
use crate::errors::PipelineError;
use crate::loader::SearchLoader;
use crate::pipeline::Pipeline;
use crate::producer::ChangeProducer;
use crate::watermark::WatermarkStore;
use crate::IndexingError;

/// Connection mode for OpenSearch at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if the index cannot be reached.
    FailFast,
    /// Retry every retry interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse connection mode from environment variable.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive)
    /// Defaults to "retry" if not set or invalid.
    pub fn from_env() -> Self {
        Self::parse(&env::var("OPENSEARCH_CONNECTION_MODE").unwrap_or_else(|_| "retry".to_string()))
    }

    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// One pipeline per index, ready to run.
    pub pipelines: Vec<Arc<Pipeline>>,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// Opens the catalog source, the watermark state table and the OpenSearch
    /// client, makes sure every index exists and builds the films, genres and
    /// persons pipelines. See [`Settings::from_env`] for the variables read.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails
    pub async fn new() -> Result<Self, IndexingError> {
        let settings = Settings::from_env()?;
        let connection_mode = ConnectionMode::from_env();

        info!(
            opensearch_url = %settings.opensearch_url,
            index_version = settings.index_version,
            connection_mode = ?connection_mode,
            retry_interval_secs = settings.retry_interval.as_secs(),
            "Initializing dependencies"
        );

        let catalog: Arc<dyn CatalogSource> = Arc::new(
            PostgresCatalogSource::new(&settings.database_url)
                .map_err(|e| IndexingError::config(format!("Invalid DATABASE_URL: {}", e)))?,
        );

        let state_pool = PostgresWatermarkStorage::connect_pool(&settings.database_url)
            .await
            .map_err(|e| IndexingError::config(format!("Failed to connect state database: {}", e)))?;

        let provider = OpenSearchProvider::new(
            &settings.opensearch_url,
            IndexConfig::new(settings.index_version),
        )
        .await
        .map_err(|e| IndexingError::config(format!("Failed to create OpenSearch provider: {}", e)))?;
        let provider: Arc<dyn SearchIndexProvider> = Arc::new(provider);

        let mut pipelines = Vec::new();
        for kind in [EntityKind::Film, EntityKind::Genre, EntityKind::Person] {
            Self::ensure_index(
                provider.as_ref(),
                kind,
                connection_mode,
                settings.retry_interval,
            )
            .await?;

            let storage = PostgresWatermarkStorage::new(state_pool.clone(), kind.index_name());
            storage.ensure_schema().await.map_err(|e| {
                IndexingError::config(format!("Failed to prepare state table: {}", e))
            })?;

            let pipeline = build_pipeline(
                kind,
                Arc::clone(&catalog),
                Arc::clone(&provider),
                Arc::new(storage),
                &settings,
            )
            .await?;
            pipelines.push(Arc::new(pipeline));
        }

        info!(pipelines = pipelines.len(), "Pipelines created");

        Ok(Self { pipelines })
    }

    /// Create the index of `kind` if missing, retrying according to `mode`.
    async fn ensure_index(
        provider: &dyn SearchIndexProvider,
        kind: EntityKind,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<(), IndexingError> {
        loop {
            match provider.ensure_index_exists(kind).await {
                Ok(()) => return Ok(()),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(IndexingError::config(format!(
                            "Failed to ensure index {} exists: {}",
                            kind.index_name(),
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            index = kind.index_name(),
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to reach OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }
}

/// Build the pipeline feeding the index of `kind`.
///
/// One producer per change-source of `kind`, all sharing the watermark store
/// loaded from `storage`.
pub async fn build_pipeline(
    kind: EntityKind,
    catalog: Arc<dyn CatalogSource>,
    provider: Arc<dyn SearchIndexProvider>,
    storage: Arc<dyn WatermarkStorage>,
    settings: &Settings,
) -> Result<Pipeline, PipelineError> {
    let watermarks = Arc::new(WatermarkStore::load(storage).await?);

    let producers = ChangeSource::for_kind(kind)
        .iter()
        .map(|source| {
            ChangeProducer::new(
                *source,
                Arc::clone(&catalog),
                Arc::clone(&watermarks),
                settings.producer(),
            )
        })
        .collect();

    let enricher = Enricher::new(lookup_for(kind), catalog, settings.enricher());
    let loader = SearchLoader::new(provider, kind, watermarks, settings.loader());

    Ok(Pipeline::new(
        kind.index_name(),
        producers,
        enricher,
        loader,
        settings.pipeline(),
    ))
}
