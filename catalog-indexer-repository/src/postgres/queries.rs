//! SQL issued against the `content` catalog schema.
//!
//! Change queries share one parameter layout: `$1`/`$2` keyset cursor
//! `(modified, id)`, `$3` page size. Rows come back as `(id, modified)`
//! ordered by `(modified, id)` ascending, strictly after the cursor. The
//! `modified >= $1` term only bounds the index range scan.

use crate::types::ChangeSource;

const FILMWORK_MODIFIED: &str = r#"
    SELECT fw.id AS id, fw.modified AS modified
    FROM content.film_work fw
    WHERE fw.modified >= $1
      AND (fw.modified, fw.id) > ($1, $2)
    ORDER BY fw.modified ASC, fw.id ASC
    LIMIT $3
"#;

const FILMWORK_GENRE_MODIFIED: &str = r#"
    SELECT gfw.film_work_id AS id, g.modified AS modified
    FROM content.genre g
    JOIN content.genre_film_work gfw ON gfw.genre_id = g.id
    WHERE g.modified >= $1
      AND (g.modified, gfw.film_work_id) > ($1, $2)
    ORDER BY g.modified ASC, gfw.film_work_id ASC
    LIMIT $3
"#;

const FILMWORK_PERSON_MODIFIED: &str = r#"
    SELECT pfw.film_work_id AS id, p.modified AS modified
    FROM content.person p
    JOIN content.person_film_work pfw ON pfw.person_id = p.id
    WHERE p.modified >= $1
      AND (p.modified, pfw.film_work_id) > ($1, $2)
    ORDER BY p.modified ASC, pfw.film_work_id ASC
    LIMIT $3
"#;

const GENRE_MODIFIED: &str = r#"
    SELECT g.id AS id, g.modified AS modified
    FROM content.genre g
    WHERE g.modified >= $1
      AND (g.modified, g.id) > ($1, $2)
    ORDER BY g.modified ASC, g.id ASC
    LIMIT $3
"#;

const PERSON_MODIFIED: &str = r#"
    SELECT p.id AS id, p.modified AS modified
    FROM content.person p
    WHERE p.modified >= $1
      AND (p.modified, p.id) > ($1, $2)
    ORDER BY p.modified ASC, p.id ASC
    LIMIT $3
"#;

pub(crate) fn change_query(source: ChangeSource) -> &'static str {
    match source {
        ChangeSource::FilmworkModified => FILMWORK_MODIFIED,
        ChangeSource::FilmworkGenreModified => FILMWORK_GENRE_MODIFIED,
        ChangeSource::FilmworkPersonModified => FILMWORK_PERSON_MODIFIED,
        ChangeSource::GenreModified => GENRE_MODIFIED,
        ChangeSource::PersonModified => PERSON_MODIFIED,
    }
}

pub(crate) const FILMS_BY_IDS: &str = r#"
    SELECT
        fw.id,
        fw.type AS kind,
        fw.title,
        fw.description,
        fw.rating::float8 AS rating,
        COALESCE(
            json_agg(
                DISTINCT jsonb_build_object(
                    'id', p.id,
                    'role', pfw.role,
                    'full_name', p.full_name
                )
            ) FILTER (WHERE p.id IS NOT NULL),
            '[]'
        ) AS persons,
        COALESCE(
            json_agg(
                DISTINCT jsonb_build_object(
                    'id', g.id,
                    'name', g.name
                )
            ) FILTER (WHERE g.id IS NOT NULL),
            '[]'
        ) AS genres
    FROM content.film_work fw
    LEFT JOIN content.genre_film_work gfw ON gfw.film_work_id = fw.id
    LEFT JOIN content.genre g ON g.id = gfw.genre_id
    LEFT JOIN content.person_film_work pfw ON pfw.film_work_id = fw.id
    LEFT JOIN content.person p ON p.id = pfw.person_id
    WHERE fw.id = ANY($1)
    GROUP BY fw.id
"#;

pub(crate) const GENRES_BY_IDS: &str = r#"
    SELECT g.id, g.name
    FROM content.genre g
    WHERE g.id = ANY($1)
"#;

pub(crate) const PERSONS_BY_IDS: &str = r#"
    SELECT
        p.id,
        p.full_name,
        COALESCE(
            json_agg(
                DISTINCT jsonb_build_object(
                    'film_id', fw.id,
                    'role', pfw.role,
                    'title', fw.title
                )
            ) FILTER (WHERE fw.id IS NOT NULL),
            '[]'
        ) AS films
    FROM content.person p
    LEFT JOIN content.person_film_work pfw ON pfw.person_id = p.id
    LEFT JOIN content.film_work fw ON fw.id = pfw.film_work_id
    WHERE p.id = ANY($1)
    GROUP BY p.id
"#;

pub(crate) const CREATE_STATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS indexer_state (
        name TEXT PRIMARY KEY,
        state JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

pub(crate) const SELECT_STATE: &str = "SELECT state FROM indexer_state WHERE name = $1";

pub(crate) const UPSERT_STATE: &str = r#"
    INSERT INTO indexer_state (name, state, updated_at)
    VALUES ($1, $2, now())
    ON CONFLICT (name) DO UPDATE SET state = EXCLUDED.state, updated_at = EXCLUDED.updated_at
"#;
