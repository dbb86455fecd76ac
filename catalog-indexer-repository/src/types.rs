//! Request and response types for catalog and search index operations.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use catalog_indexer_shared::EntityKind;

/// The change-detection query shapes.
///
/// Each variant is one independent change-source with its own watermark. Its
/// `name` is the key under which that watermark is stored, so renaming a
/// variant's name resets its progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeSource {
    /// A film row itself changed.
    FilmworkModified,
    /// A genre changed; yields the ids of the films linked to it.
    FilmworkGenreModified,
    /// A person changed; yields the ids of the films they are credited on.
    FilmworkPersonModified,
    /// A genre row changed.
    GenreModified,
    /// A person row changed.
    PersonModified,
}

impl ChangeSource {
    /// Stable name used as the watermark key and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ChangeSource::FilmworkModified => "FilmworkModified",
            ChangeSource::FilmworkGenreModified => "FilmworkGenreModified",
            ChangeSource::FilmworkPersonModified => "FilmworkPersonModified",
            ChangeSource::GenreModified => "GenreModified",
            ChangeSource::PersonModified => "PersonModified",
        }
    }

    /// Every source feeding the index of `kind`.
    pub fn for_kind(kind: EntityKind) -> &'static [ChangeSource] {
        match kind {
            EntityKind::Film => &[
                ChangeSource::FilmworkModified,
                ChangeSource::FilmworkGenreModified,
                ChangeSource::FilmworkPersonModified,
            ],
            EntityKind::Genre => &[ChangeSource::GenreModified],
            EntityKind::Person => &[ChangeSource::PersonModified],
        }
    }

    /// The entity kind whose ids this source emits.
    pub fn target(&self) -> EntityKind {
        match self {
            ChangeSource::FilmworkModified
            | ChangeSource::FilmworkGenreModified
            | ChangeSource::FilmworkPersonModified => EntityKind::Film,
            ChangeSource::GenreModified => EntityKind::Genre,
            ChangeSource::PersonModified => EntityKind::Person,
        }
    }
}

/// Position of a change in `(modified, id)` order.
///
/// The committed watermark of a source is the position of the last row it
/// indexed. Resuming strictly after it re-reads nothing already indexed and
/// skips nothing sharing that row's timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark {
    pub modified: DateTime<Utc>,
    pub id: Uuid,
}

impl Watermark {
    pub fn new(modified: DateTime<Utc>, id: Uuid) -> Self {
        Self { modified, id }
    }

    /// `0001-01-01T00:00:00Z`, the position of a source never committed.
    pub fn origin() -> Self {
        let modified =
            DateTime::from_timestamp(-62_135_596_800, 0).unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self::from(modified)
    }

    /// Storage form: `<RFC 3339 timestamp>|<uuid>`.
    pub fn encode(&self) -> String {
        format!("{}|{}", self.modified.to_rfc3339(), self.id)
    }

    /// Parse the storage form. A bare RFC 3339 timestamp is read as the
    /// position before every row of that instant.
    pub fn decode(raw: &str) -> Option<Self> {
        let (ts, id) = match raw.split_once('|') {
            Some((ts, id)) => (ts, Uuid::parse_str(id.trim()).ok()?),
            None => (raw, Uuid::nil()),
        };
        let modified = DateTime::parse_from_rfc3339(ts.trim()).ok()?;
        Some(Self::new(modified.with_timezone(&Utc), id))
    }
}

impl From<DateTime<Utc>> for Watermark {
    fn from(modified: DateTime<Utc>) -> Self {
        Self::new(modified, Uuid::nil())
    }
}

impl From<&ChangedRow> for Watermark {
    fn from(row: &ChangedRow) -> Self {
        Self::new(row.modified, row.id)
    }
}

/// Bounds of one page of a change query.
///
/// Rows are returned when `(modified, id)` sorts strictly after the cursor,
/// ordered by `(modified, id)` ascending. The cursor starts at the committed
/// watermark and moves to the last row of each page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeWindow {
    pub watermark: Watermark,
    /// Position of the last row of the previous page, `None` for the first page.
    pub after: Option<Watermark>,
    pub limit: usize,
}

impl ChangeWindow {
    /// Window for the first page of a pass.
    pub fn starting_at(watermark: impl Into<Watermark>, limit: usize) -> Self {
        Self {
            watermark: watermark.into(),
            after: None,
            limit,
        }
    }

    /// Keyset cursor, defaulting to the watermark itself on the first page.
    pub fn cursor(&self) -> Watermark {
        self.after.unwrap_or(self.watermark)
    }

    /// Window for the page following `row`.
    pub fn next_after(&self, row: &ChangedRow) -> Self {
        Self {
            after: Some(Watermark::from(row)),
            ..*self
        }
    }
}

/// One detected change: the id of the entity to reindex and the change time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangedRow {
    pub id: Uuid,
    pub modified: DateTime<Utc>,
}

/// A document to upsert, keyed by its id.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkDocument {
    pub id: String,
    pub body: Value,
}

/// A single rejected item of a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemFailure {
    pub id: String,
    pub error: String,
}

/// Summary of a bulk write containing aggregate counts and the failed items.
///
/// `succeeded + failed == total` always holds. Callers treat any failure as a
/// failure of the whole batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BulkWriteSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Details for each failed item.
    pub failures: Vec<BulkItemFailure>,
}
