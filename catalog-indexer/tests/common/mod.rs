//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use catalog_indexer::config::Settings;
use catalog_indexer_repository::{
    BulkDocument, BulkItemFailure, BulkWriteSummary, CatalogConnection, CatalogSource,
    CatalogSourceError, ChangeSource, ChangeWindow, ChangedRow, SearchIndexError,
    SearchIndexProvider, Watermark, WatermarkStorage, WatermarkStorageError,
};
use catalog_indexer_shared::{EntityKind, FilmEntity, GenreEntity, PersonEntity};

pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
}

/// Settings for in-memory runs, with `overrides` applied on top.
pub fn test_settings(overrides: &[(&str, &str)]) -> Settings {
    let mut vars: HashMap<String, String> = [
        ("DATABASE_URL", "postgres://unused/catalog"),
        ("ETL_PRODUCER_CHECK_INTERVAL_SECS", "1"),
        ("ETL_BACKOFF_INITIAL_MS", "10"),
        ("ETL_BACKOFF_MAX_SECS", "1"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    Settings::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

/// Poll `condition` until it holds, panicking after a minute.
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(60), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[derive(Default)]
struct CatalogState {
    changes: HashMap<ChangeSource, Vec<ChangedRow>>,
    films: HashMap<Uuid, FilmEntity>,
    genres: HashMap<Uuid, GenreEntity>,
    persons: HashMap<Uuid, PersonEntity>,
}

/// Catalog kept in memory.
#[derive(Clone, Default)]
pub struct MemoryCatalog {
    state: Arc<Mutex<CatalogState>>,
    pub connects: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub lookups: Arc<AtomicUsize>,
    pub fetches: Arc<AtomicUsize>,
    /// Number of upcoming `fetch_changes` calls that fail.
    pub failing_fetches: Arc<AtomicUsize>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_change(&self, source: ChangeSource, id: Uuid, modified: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        state
            .changes
            .entry(source)
            .or_default()
            .push(ChangedRow { id, modified });
    }

    pub fn upsert_genre(&self, name: &str, modified: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().genres.insert(
            id,
            GenreEntity {
                id,
                name: name.to_string(),
            },
        );
        self.add_change(ChangeSource::GenreModified, id, modified);
        id
    }

    pub fn rename_genre(&self, id: Uuid, name: &str, modified: DateTime<Utc>) {
        if let Some(genre) = self.state.lock().unwrap().genres.get_mut(&id) {
            genre.name = name.to_string();
        }
        self.add_change(ChangeSource::GenreModified, id, modified);
    }

    pub fn upsert_film(&self, film: FilmEntity, modified: DateTime<Utc>) {
        let id = film.id;
        self.state.lock().unwrap().films.insert(id, film);
        self.add_change(ChangeSource::FilmworkModified, id, modified);
    }

    pub fn upsert_person(&self, person: PersonEntity, modified: DateTime<Utc>) {
        let id = person.id;
        self.state.lock().unwrap().persons.insert(id, person);
        self.add_change(ChangeSource::PersonModified, id, modified);
    }

    pub fn film_mut<F: FnOnce(&mut FilmEntity)>(&self, id: Uuid, update: F) {
        if let Some(film) = self.state.lock().unwrap().films.get_mut(&id) {
            update(film);
        }
    }

    pub fn remove_genre(&self, id: Uuid) {
        self.state.lock().unwrap().genres.remove(&id);
    }
}

#[async_trait]
impl CatalogSource for MemoryCatalog {
    async fn connect(&self) -> Result<Box<dyn CatalogConnection>, CatalogSourceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            catalog: self.clone(),
        }))
    }
}

pub struct MemoryConnection {
    catalog: MemoryCatalog,
}

impl MemoryConnection {
    fn lookup<T: Clone>(&self, ids: &[Uuid], pick: impl Fn(&CatalogState) -> &HashMap<Uuid, T>) -> Vec<T> {
        self.catalog.lookups.fetch_add(1, Ordering::SeqCst);
        let state = self.catalog.state.lock().unwrap();
        let table = pick(&state);
        ids.iter().filter_map(|id| table.get(id).cloned()).collect()
    }
}

#[async_trait]
impl CatalogConnection for MemoryConnection {
    async fn fetch_changes(
        &mut self,
        source: ChangeSource,
        window: &ChangeWindow,
    ) -> Result<Vec<ChangedRow>, CatalogSourceError> {
        self.catalog.fetches.fetch_add(1, Ordering::SeqCst);
        let failing = self.catalog.failing_fetches.load(Ordering::SeqCst);
        if failing > 0 {
            self.catalog
                .failing_fetches
                .store(failing - 1, Ordering::SeqCst);
            return Err(CatalogSourceError::query("connection reset"));
        }

        let cursor = window.cursor();
        let state = self.catalog.state.lock().unwrap();
        let mut rows: Vec<ChangedRow> = state
            .changes
            .get(&source)
            .map(|rows| {
                rows.iter()
                    .filter(|row| Watermark::from(*row) > cursor)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|row| (row.modified, row.id));
        rows.truncate(window.limit);
        Ok(rows)
    }

    async fn films_by_ids(&mut self, ids: &[Uuid]) -> Result<Vec<FilmEntity>, CatalogSourceError> {
        Ok(self.lookup(ids, |state| &state.films))
    }

    async fn genres_by_ids(&mut self, ids: &[Uuid]) -> Result<Vec<GenreEntity>, CatalogSourceError> {
        Ok(self.lookup(ids, |state| &state.genres))
    }

    async fn persons_by_ids(
        &mut self,
        ids: &[Uuid],
    ) -> Result<Vec<PersonEntity>, CatalogSourceError> {
        Ok(self.lookup(ids, |state| &state.persons))
    }

    async fn close(self: Box<Self>) -> Result<(), CatalogSourceError> {
        self.catalog.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Search index kept in memory.
#[derive(Default)]
pub struct MemoryIndex {
    documents: Mutex<HashMap<(String, String), Value>>,
    pub bulk_calls: AtomicUsize,
    /// Number of upcoming bulk calls that reject their first document.
    pub failing_bulks: AtomicUsize,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: EntityKind, id: Uuid) -> Option<Value> {
        self.documents
            .lock()
            .unwrap()
            .get(&(kind.index_name().to_string(), id.to_string()))
            .cloned()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.documents
            .lock()
            .unwrap()
            .keys()
            .filter(|(index, _)| index == kind.index_name())
            .count()
    }

    pub fn snapshot(&self) -> HashMap<(String, String), Value> {
        self.documents.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchIndexProvider for MemoryIndex {
    async fn ensure_index_exists(&self, _kind: EntityKind) -> Result<(), SearchIndexError> {
        Ok(())
    }

    async fn bulk_upsert(
        &self,
        kind: EntityKind,
        documents: &[BulkDocument],
    ) -> Result<BulkWriteSummary, SearchIndexError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);

        let reject_first = self
            .failing_bulks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let mut summary = BulkWriteSummary {
            total: documents.len(),
            ..Default::default()
        };
        let mut stored = self.documents.lock().unwrap();
        for (position, document) in documents.iter().enumerate() {
            if reject_first && position == 0 {
                summary.failed += 1;
                summary.failures.push(BulkItemFailure {
                    id: document.id.clone(),
                    error: "mapper_parsing_exception".to_string(),
                });
                continue;
            }
            stored.insert(
                (kind.index_name().to_string(), document.id.clone()),
                document.body.clone(),
            );
            summary.succeeded += 1;
        }
        Ok(summary)
    }
}

/// Watermark storage kept in memory, recording every write.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
    history: Mutex<Vec<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, source: ChangeSource) -> Option<DateTime<Utc>> {
        self.position(source).map(|position| position.modified)
    }

    pub fn position(&self, source: ChangeSource) -> Option<Watermark> {
        self.values
            .lock()
            .unwrap()
            .get(source.name())
            .and_then(|raw| Watermark::decode(raw))
    }

    /// Store a watermark as if committed by an earlier run.
    pub fn seed(&self, source: ChangeSource, position: impl Into<Watermark>) {
        self.values
            .lock()
            .unwrap()
            .insert(source.name().to_string(), position.into().encode());
    }

    pub fn history(&self) -> Vec<HashMap<String, String>> {
        self.history.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.values.lock().unwrap().clear();
    }
}

#[async_trait]
impl WatermarkStorage for MemoryStorage {
    async fn get_all(&self) -> Result<HashMap<String, String>, WatermarkStorageError> {
        Ok(self.values.lock().unwrap().clone())
    }

    async fn set_all(&self, values: &HashMap<String, String>) -> Result<(), WatermarkStorageError> {
        *self.values.lock().unwrap() = values.clone();
        self.history.lock().unwrap().push(values.clone());
        Ok(())
    }
}
