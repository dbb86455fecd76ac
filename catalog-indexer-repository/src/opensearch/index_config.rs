//! OpenSearch index configuration and mappings.
//!
//! Every entity kind gets its own index. Writes always target the alias
//! (`films`, `genres`, `persons`); the physical index behind it carries a
//! version suffix so mappings can be migrated by reindexing under a new
//! version.

use serde_json::{json, Value};

use catalog_indexer_shared::EntityKind;

/// Configuration for the search indices.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// The version number for the physical indices (e.g., 0 for "films_v0").
    pub version: u32,
}

impl IndexConfig {
    /// Create a new index configuration.
    ///
    /// # Arguments
    ///
    /// * `version` - The version number
    pub fn new(version: u32) -> Self {
        Self { version }
    }

    /// Alias used for every read and write of the given kind.
    pub fn alias(&self, kind: EntityKind) -> &'static str {
        kind.index_name()
    }

    /// Versioned physical index name, e.g. `films_v0`.
    pub fn versioned_index_name(&self, kind: EntityKind) -> String {
        format!("{}_v{}", kind.index_name(), self.version)
    }

    /// Settings, mappings and alias for creating the index of `kind`.
    pub fn index_body(&self, kind: EntityKind) -> Value {
        let mut body = get_index_settings(kind);
        body["aliases"] = json!({ (self.alias(kind)): {} });
        body
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

fn person_ref_mapping() -> Value {
    json!({
        "type": "nested",
        "dynamic": "strict",
        "properties": {
            "id": { "type": "keyword" },
            "full_name": { "type": "text" }
        }
    })
}

/// Get the index settings and mappings for the index of an entity kind.
///
/// # Sharding Configuration
///
/// - 1 primary shard
/// - 1 replica for redundancy
pub fn get_index_settings(kind: EntityKind) -> Value {
    let properties = match kind {
        EntityKind::Film => json!({
            "id": { "type": "keyword" },
            "type": { "type": "keyword" },
            "title": {
                "type": "text",
                "fields": { "raw": { "type": "keyword" } }
            },
            "description": { "type": "text" },
            "imdb_rating": { "type": "float" },
            "genre": {
                "type": "nested",
                "dynamic": "strict",
                "properties": {
                    "id": { "type": "keyword" },
                    "name": { "type": "keyword" }
                }
            },
            "actors": person_ref_mapping(),
            "writers": person_ref_mapping(),
            "directors": person_ref_mapping()
        }),
        EntityKind::Genre => json!({
            "id": { "type": "keyword" },
            "name": {
                "type": "text",
                "fields": { "raw": { "type": "keyword" } }
            }
        }),
        EntityKind::Person => json!({
            "id": { "type": "keyword" },
            "full_name": {
                "type": "text",
                "fields": { "raw": { "type": "keyword" } }
            },
            "films": {
                "type": "nested",
                "dynamic": "strict",
                "properties": {
                    "film_id": { "type": "keyword" },
                    "title": { "type": "text" },
                    "role": { "type": "keyword" }
                }
            }
        }),
    };

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "dynamic": "strict",
            "properties": properties
        }
    })
}
