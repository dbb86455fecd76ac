//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use opensearch::{
    http::request::JsonBody,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use url::Url;

use catalog_indexer_shared::EntityKind;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::IndexConfig;
use crate::types::{BulkDocument, BulkItemFailure, BulkWriteSummary};

/// OpenSearch provider implementation.
///
/// Writes documents with the `_bulk` API using `index` actions keyed by the
/// entity id, which replaces any previous version of the document.
///
/// # Example
///
/// ```ignore
/// use catalog_indexer_repository::opensearch::IndexConfig;
/// let provider = OpenSearchProvider::new("http://localhost:9200", IndexConfig::default()).await?;
/// provider.ensure_index_exists(EntityKind::Film).await?;
/// let summary = provider.bulk_upsert(EntityKind::Film, &documents).await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index configuration containing the index version
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            version = index_config.version,
            "Created OpenSearch provider"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    /// Build the newline-delimited bulk body: one action line and one source line per document.
    fn bulk_body(documents: &[BulkDocument]) -> Vec<JsonBody<Value>> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);
        for doc in documents {
            body.push(json!({"index": {"_id": doc.id}}).into());
            body.push(doc.body.clone().into());
        }
        body
    }
}

/// Turn a `_bulk` response body into a summary.
///
/// Items carrying an `error` object or a non-2xx `status` are failures. Items
/// missing from the response altogether are counted as failed too, so that
/// `succeeded` never overstates what the backend acknowledged.
///
/// # Arguments
///
/// * `response` - Parsed JSON body of the bulk response
/// * `total` - Number of documents sent in the request
///
/// # Returns
///
/// * `Ok(BulkWriteSummary)` - Counts and failure details
/// * `Err(SearchIndexError)` - If the body has no `items` array
pub fn summarize_bulk_response(
    response: &Value,
    total: usize,
) -> Result<BulkWriteSummary, SearchIndexError> {
    let items = response
        .get("items")
        .and_then(|items| items.as_array())
        .ok_or_else(|| SearchIndexError::parse("Bulk response has no items array"))?;

    let mut failures = Vec::new();
    for item in items {
        // Each item is keyed by its action name, e.g. {"index": {...}}.
        let Some(outcome) = item.as_object().and_then(|obj| obj.values().next()) else {
            continue;
        };
        let id = outcome
            .get("_id")
            .and_then(|id| id.as_str())
            .unwrap_or_default()
            .to_string();
        let status = outcome.get("status").and_then(|s| s.as_u64()).unwrap_or(200);

        if let Some(err) = outcome.get("error") {
            let reason = err
                .get("reason")
                .and_then(|r| r.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            failures.push(BulkItemFailure { id, error: reason });
        } else if !(200..300).contains(&status) {
            failures.push(BulkItemFailure {
                id,
                error: format!("status {}", status),
            });
        }
    }

    let missing = total.saturating_sub(items.len());
    let failed = (failures.len() + missing).min(total);

    Ok(BulkWriteSummary {
        total,
        succeeded: total - failed,
        failed,
        failures,
    })
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    /// Ensure the alias for `kind` resolves, creating the versioned index behind it if not.
    async fn ensure_index_exists(&self, kind: EntityKind) -> Result<(), SearchIndexError> {
        let alias = self.index_config.alias(kind);

        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[alias]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if response.status_code().is_success() {
            debug!(alias = %alias, "Index already exists");
            return Ok(());
        }

        let index_name = self.index_config.versioned_index_name(kind);
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&index_name))
            .body(self.index_config.index_body(kind))
            .send()
            .await
            .map_err(|e| SearchIndexError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // Another indexer may have created it between the two calls.
            if error_body.contains("resource_already_exists_exception") {
                warn!(index = %index_name, "Index was created concurrently");
                return Ok(());
            }
            error!(status = %status, body = %error_body, "Index creation failed");
            return Err(SearchIndexError::index_creation(format!(
                "Creating {} failed with status {}: {}",
                index_name, status, error_body
            )));
        }

        info!(index = %index_name, alias = %alias, "Created search index");
        Ok(())
    }

    async fn bulk_upsert(
        &self,
        kind: EntityKind,
        documents: &[BulkDocument],
    ) -> Result<BulkWriteSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BulkWriteSummary::default());
        }

        let alias = self.index_config.alias(kind);
        let response = self
            .client
            .bulk(BulkParts::Index(alias))
            .body(Self::bulk_body(documents))
            .send()
            .await
            .map_err(|e| SearchIndexError::bulk_index(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(SearchIndexError::bulk_index(format!(
                "Bulk request failed with status {}: {}",
                status, error_body
            )));
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = summarize_bulk_response(&response_body, documents.len())?;
        for failure in &summary.failures {
            error!(index = %alias, id = %failure.id, error = %failure.error, "Document rejected");
        }
        debug!(
            index = %alias,
            total = summary.total,
            failed = summary.failed,
            "Bulk request completed"
        );

        Ok(summary)
    }
}
