//! Runtime settings read from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::enricher::EnricherConfig;
use crate::loader::LoaderConfig;
use crate::pipeline::{BackoffConfig, PipelineConfig};
use crate::producer::ProducerConfig;
use crate::IndexingError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

const DEFAULT_PRODUCER_CHUNK_SIZE: usize = 500;
const DEFAULT_PRODUCER_QUEUE_SIZE: usize = 500;
const DEFAULT_PRODUCER_CHECK_INTERVAL_SECS: u64 = 10;
const DEFAULT_ENRICHER_CHUNK_SIZE: usize = 100;
const DEFAULT_LOADER_CHUNK_SIZE: usize = 100;
const DEFAULT_LOADER_QUEUE_SIZE: usize = 10_000;
const DEFAULT_BACKOFF_INITIAL_MS: u64 = 100;
const DEFAULT_BACKOFF_MAX_SECS: u64 = 10;

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Every tunable of the indexer.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub opensearch_url: String,
    pub index_version: u32,
    pub producer_chunk_size: usize,
    pub producer_queue_size: usize,
    pub producer_check_interval: Duration,
    pub enricher_chunk_size: usize,
    pub loader_chunk_size: usize,
    pub loader_queue_size: usize,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
    pub retry_interval: Duration,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `DATABASE_URL`: catalog and state database (required)
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `INDEX_VERSION`: suffix of the physical index names (default: 0)
    /// - `ETL_PRODUCER_CHUNK_SIZE`: rows per change query page (default: 500)
    /// - `ETL_PRODUCER_QUEUE_SIZE`: change queue capacity (default: 500)
    /// - `ETL_PRODUCER_CHECK_INTERVAL_SECS`: pause between polls (default: 10)
    /// - `ETL_ENRICHER_CHUNK_SIZE`: events per lookup (default: 100)
    /// - `ETL_LOADER_CHUNK_SIZE`: documents per bulk request (default: 100)
    /// - `ETL_LOADER_QUEUE_SIZE`: load queue capacity (default: 10000)
    /// - `ETL_BACKOFF_INITIAL_MS`: first restart delay (default: 100)
    /// - `ETL_BACKOFF_MAX_SECS`: restart delay cap (default: 10)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: startup retry interval (default: 15)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns the raw value of a variable.
    ///
    /// Unparsable numbers fall back to their default with a warning.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| IndexingError::config("DATABASE_URL is not set"))?;

        Ok(Self {
            database_url,
            opensearch_url: lookup("OPENSEARCH_URL")
                .unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
            index_version: parse_or(&lookup, "INDEX_VERSION", 0),
            producer_chunk_size: parse_or(&lookup, "ETL_PRODUCER_CHUNK_SIZE", DEFAULT_PRODUCER_CHUNK_SIZE),
            producer_queue_size: parse_or(&lookup, "ETL_PRODUCER_QUEUE_SIZE", DEFAULT_PRODUCER_QUEUE_SIZE),
            producer_check_interval: Duration::from_secs(parse_or(
                &lookup,
                "ETL_PRODUCER_CHECK_INTERVAL_SECS",
                DEFAULT_PRODUCER_CHECK_INTERVAL_SECS,
            )),
            enricher_chunk_size: parse_or(&lookup, "ETL_ENRICHER_CHUNK_SIZE", DEFAULT_ENRICHER_CHUNK_SIZE),
            loader_chunk_size: parse_or(&lookup, "ETL_LOADER_CHUNK_SIZE", DEFAULT_LOADER_CHUNK_SIZE),
            loader_queue_size: parse_or(&lookup, "ETL_LOADER_QUEUE_SIZE", DEFAULT_LOADER_QUEUE_SIZE),
            backoff_initial: Duration::from_millis(parse_or(
                &lookup,
                "ETL_BACKOFF_INITIAL_MS",
                DEFAULT_BACKOFF_INITIAL_MS,
            )),
            backoff_max: Duration::from_secs(parse_or(
                &lookup,
                "ETL_BACKOFF_MAX_SECS",
                DEFAULT_BACKOFF_MAX_SECS,
            )),
            retry_interval: Duration::from_secs(parse_or(
                &lookup,
                "OPENSEARCH_RETRY_INTERVAL_SECS",
                DEFAULT_RETRY_INTERVAL_SECS,
            )),
        })
    }

    pub fn producer(&self) -> ProducerConfig {
        ProducerConfig {
            chunk_size: self.producer_chunk_size,
            poll_interval: self.producer_check_interval,
        }
    }

    pub fn enricher(&self) -> EnricherConfig {
        EnricherConfig {
            batch_size: self.enricher_chunk_size,
        }
    }

    pub fn loader(&self) -> LoaderConfig {
        LoaderConfig {
            batch_size: self.loader_chunk_size,
        }
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            change_queue_capacity: self.producer_queue_size,
            load_queue_capacity: self.loader_queue_size,
            backoff: BackoffConfig {
                initial: self.backoff_initial,
                max: self.backoff_max,
            },
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = key, value = %raw, "Invalid value, using default");
            default
        }),
    }
}
