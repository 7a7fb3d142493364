//! SQLite-backed implementation of `DreamRepository`.
//!
//! The connection sits behind a mutex and every statement runs on tokio's
//! blocking pool, so async callers never block their executor thread. SQLite
//! serializes statement execution itself; each operation here is a single
//! statement and therefore atomic at the row level.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, ErrorCode, Row, params, params_from_iter};

use crate::domain::{Dream, DreamPatch, Mood, NewDream};
use crate::error::{DreamError, Result};
use crate::id::StampClock;
use crate::store::query::{ListOptions, WhereClause};
use crate::store::traits::{DreamRepository, UpdateOutcome};

const DREAM_COLUMNS: &str = "id, title, description, date, mood, images, audio_url, favorite, created_at, updated_at";

/// Owns the database connection for the dreams table.
///
/// Cheap to clone; clones share the connection and the timestamp clock.
#[derive(Clone)]
pub struct DreamStore {
    /// Database file, `None` for in-memory stores
    path: Option<PathBuf>,

    /// SQLite connection
    db: Arc<Mutex<Connection>>,

    /// Source of created_at/updated_at stamps
    clock: Arc<StampClock>,
}

impl std::fmt::Debug for DreamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DreamStore").field("path", &self.path).finish_non_exhaustive()
    }
}

impl DreamStore {
    /// Open or create the database file and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| DreamError::Connection(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        let db = Connection::open(path)
            .map_err(|e| DreamError::Connection(format!("Failed to open {}: {}", path.display(), e)))?;

        let store = Self::from_connection(db, Some(path.to_path_buf()))?;
        info!("Opened dream store at {}", path.display());
        Ok(store)
    }

    /// Store backed by a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()
            .map_err(|e| DreamError::Connection(format!("Failed to open in-memory database: {}", e)))?;
        Self::from_connection(db, None)
    }

    fn from_connection(db: Connection, path: Option<PathBuf>) -> Result<Self> {
        Self::init_schema(&db).map_err(|e| DreamError::Connection(format!("Failed to initialize schema: {}", e)))?;

        let clock = match Self::newest_stamp(&db)? {
            Some(floor) => StampClock::starting_after(floor),
            None => StampClock::new(),
        };

        Ok(Self {
            path,
            db: Arc::new(Mutex::new(db)),
            clock: Arc::new(clock),
        })
    }

    /// Create the table and indexes if missing. Existing rows are untouched.
    fn init_schema(db: &Connection) -> rusqlite::Result<()> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS dreams (
                id TEXT PRIMARY KEY NOT NULL,
                title TEXT,
                description TEXT NOT NULL CHECK (length(trim(description)) > 0),
                date TEXT NOT NULL,
                mood INTEGER CHECK (mood IS NULL OR (mood >= 0 AND mood <= 5)),
                images TEXT,
                audio_url TEXT,
                favorite INTEGER NOT NULL DEFAULT 0 CHECK (favorite IN (0, 1)),
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_dreams_date ON dreams(date, created_at);
            CREATE INDEX IF NOT EXISTS idx_dreams_favorite ON dreams(favorite);
            "#,
        )
    }

    /// Latest `updated_at` on disk, so new stamps always sort after it.
    fn newest_stamp(db: &Connection) -> Result<Option<DateTime<Utc>>> {
        let newest: Option<String> = db.query_row("SELECT max(updated_at) FROM dreams", [], |row| row.get(0))?;
        Ok(newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|at| at.with_timezone(&Utc)))
    }

    /// Re-run schema creation. Safe on every start.
    pub async fn init(&self) -> Result<()> {
        self.with_conn(|db| {
            Self::init_schema(db).map_err(|e| DreamError::Connection(format!("Failed to initialize schema: {}", e)))
        })
        .await
    }

    /// Database file path, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|e| DreamError::Connection(format!("Connection lock poisoned: {}", e)))?;
            f(&conn)
        })
        .await?
    }
}

#[async_trait]
impl DreamRepository for DreamStore {
    async fn list_dreams(&self, options: &ListOptions) -> Result<Vec<Dream>> {
        let clause = WhereClause::from_predicates(&options.predicates()?);
        let order = options.sort_order.as_sql();
        let sql = format!(
            "SELECT {DREAM_COLUMNS} FROM dreams{} ORDER BY date {order}, created_at {order}, rowid {order} LIMIT ? OFFSET ?",
            clause.sql
        );

        let mut values = clause.params;
        values.push(Value::Integer(i64::from(options.limit)));
        values.push(Value::Integer(i64::from(options.offset)));
        debug!("list_dreams: {} ({} params)", sql, values.len());

        self.with_conn(move |db| {
            let mut stmt = db.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), row_to_dream)?;
            let dreams = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(dreams)
        })
        .await
        .map_err(into_query_error)
    }

    async fn count_dreams(&self, options: &ListOptions) -> Result<u64> {
        let clause = WhereClause::from_predicates(&options.predicates()?);
        let sql = format!("SELECT COUNT(*) FROM dreams{}", clause.sql);
        let values = clause.params;

        self.with_conn(move |db| {
            let count: i64 = db.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
        .map_err(into_query_error)
    }

    async fn list_all_dream_dates(&self) -> Result<Vec<String>> {
        self.with_conn(|db| {
            let mut stmt = db.prepare("SELECT date FROM dreams ORDER BY date DESC")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let dates = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(dates)
        })
        .await
        .map_err(into_query_error)
    }

    async fn get_dream_by_id(&self, id: &str) -> Result<Option<Dream>> {
        let id = id.to_string();
        self.with_conn(move |db| {
            let sql = format!("SELECT {DREAM_COLUMNS} FROM dreams WHERE id = ?1");
            match db.query_row(&sql, [&id], row_to_dream) {
                Ok(dream) => Ok(Some(dream)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(into_query_error)
    }

    async fn create_dream(&self, dream: NewDream) -> Result<Dream> {
        dream.validate()?;
        let images = serde_json::to_string(&dream.images)?;
        let clock = Arc::clone(&self.clock);
        debug!("create_dream: {}", dream.id);

        self.with_conn(move |db| {
            // Stamped under the connection lock so stamp order is execution order
            let stamp = clock.next_string();
            let inserted = db.execute(
                r#"
                INSERT INTO dreams
                (id, title, description, date, mood, images, audio_url, favorite, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    dream.id,
                    dream.title,
                    dream.description,
                    dream.date,
                    dream.mood.map(Mood::level),
                    images,
                    dream.audio_url,
                    i64::from(dream.favorite),
                    stamp,
                    stamp,
                ],
            );

            match inserted {
                Ok(_) => Ok(Dream {
                    id: dream.id,
                    title: dream.title,
                    description: dream.description,
                    date: dream.date,
                    mood: dream.mood,
                    images: dream.images,
                    audio_url: dream.audio_url,
                    favorite: dream.favorite,
                    created_at: stamp.clone(),
                    updated_at: stamp,
                }),
                Err(e) if is_duplicate_key(&e) => Err(DreamError::DuplicateId(dream.id)),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn update_dream(&self, id: &str, patch: &DreamPatch) -> Result<UpdateOutcome> {
        patch.validate()?;

        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(title) = &patch.title {
            assignments.push("title = ?");
            values.push(optional_text(title));
        }
        if let Some(description) = &patch.description {
            assignments.push("description = ?");
            values.push(Value::Text(description.clone()));
        }
        if let Some(date) = &patch.date {
            assignments.push("date = ?");
            values.push(Value::Text(date.clone()));
        }
        if let Some(mood) = patch.mood {
            assignments.push("mood = ?");
            values.push(mood.map_or(Value::Null, |m| Value::Integer(m.level())));
        }
        if let Some(images) = &patch.images {
            assignments.push("images = ?");
            values.push(Value::Text(serde_json::to_string(images)?));
        }
        if let Some(audio_url) = &patch.audio_url {
            assignments.push("audio_url = ?");
            values.push(optional_text(audio_url));
        }
        if let Some(favorite) = patch.favorite {
            assignments.push("favorite = ?");
            values.push(Value::Integer(i64::from(favorite)));
        }

        assignments.push("updated_at = ?");
        let sql = format!("UPDATE dreams SET {} WHERE id = ?", assignments.join(", "));
        debug!("update_dream: {} ({} fields)", id, assignments.len() - 1);

        let id = id.to_string();
        let clock = Arc::clone(&self.clock);
        let (affected, stamp) = self
            .with_conn(move |db| {
                let stamp = clock.next_string();
                values.push(Value::Text(stamp.clone()));
                values.push(Value::Text(id));
                let affected = db.execute(&sql, params_from_iter(values.iter()))?;
                Ok((affected, stamp))
            })
            .await?;

        if affected == 0 {
            Ok(UpdateOutcome::NotFound)
        } else {
            Ok(UpdateOutcome::Updated { updated_at: stamp })
        }
    }

    async fn delete_dream(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        debug!("delete_dream: {}", id);
        let affected = self
            .with_conn(move |db| Ok(db.execute("DELETE FROM dreams WHERE id = ?1", [&id])?))
            .await?;
        Ok(affected > 0)
    }
}

/// Map a row selected with `DREAM_COLUMNS` onto a `Dream`.
fn row_to_dream(row: &Row<'_>) -> rusqlite::Result<Dream> {
    let images: Option<String> = row.get(5)?;
    let images = match images.as_deref() {
        None | Some("") => Vec::new(),
        Some(json) => serde_json::from_str::<Option<Vec<String>>>(json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?
            .unwrap_or_default(),
    };
    let mood: Option<i64> = row.get(4)?;
    let favorite: i64 = row.get(7)?;

    Ok(Dream {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        date: row.get(3)?,
        mood: mood.map(Mood::from_level_clamped),
        images,
        audio_url: row.get(6)?,
        favorite: favorite != 0,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn optional_text(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::Text)
}

fn is_duplicate_key(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
    )
}

/// Driver failures on the read path surface as query errors.
fn into_query_error(err: DreamError) -> DreamError {
    match err {
        DreamError::Storage(e) => DreamError::Query(e.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::query::{DateRange, SortOrder};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn create_temp_store() -> (DreamStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = DreamStore::open(&temp_dir.path().join("dreams.db")).unwrap();
        (store, temp_dir)
    }

    fn dream(id: &str, description: &str, date: &str) -> NewDream {
        NewDream::with_id(id, description, date)
    }

    async fn seed(store: &DreamStore, dreams: Vec<NewDream>) {
        for d in dreams {
            store.create_dream(d).await.unwrap();
        }
    }

    fn ids(dreams: &[Dream]) -> Vec<&str> {
        dreams.iter().map(|d| d.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_open_creates_database_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dreams.db");
        let store = DreamStore::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_init_is_idempotent_and_keeps_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dreams.db");

        {
            let store = DreamStore::open(&path).unwrap();
            store
                .create_dream(dream("a1", "Flying over mountains", "2024-03-01T10:00:00Z"))
                .await
                .unwrap();
            store.init().await.unwrap();
            store.init().await.unwrap();
        }

        let store = DreamStore::open(&path).unwrap();
        let found = store.get_dream_by_id("a1").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (store, _temp) = create_temp_store();

        let new = dream("a1", "Flying over mountains", "2024-03-01T10:00:00Z")
            .title("Sky")
            .mood(Mood::VeryPositive)
            .images(vec!["file:///a.jpg".to_string(), "file:///b.jpg".to_string()])
            .audio_url("file:///memo.m4a");
        let created = store.create_dream(new.clone()).await.unwrap();

        let retrieved = store.get_dream_by_id("a1").await.unwrap().unwrap();
        assert_eq!(retrieved, created);
        assert_eq!(retrieved.title, new.title);
        assert_eq!(retrieved.description, new.description);
        assert_eq!(retrieved.date, new.date);
        assert_eq!(retrieved.mood, Some(Mood::VeryPositive));
        assert_eq!(retrieved.images.len(), 2);
        assert_eq!(retrieved.audio_url.as_deref(), Some("file:///memo.m4a"));
        assert!(!retrieved.favorite);
        assert_eq!(retrieved.created_at, retrieved.updated_at);
        assert!(DateTime::parse_from_rfc3339(&retrieved.created_at).is_ok());
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (store, _temp) = create_temp_store();
        assert!(store.get_dream_by_id("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_id_fails() {
        let (store, _temp) = create_temp_store();
        store
            .create_dream(dream("a1", "first", "2024-03-01T10:00:00Z"))
            .await
            .unwrap();

        let err = store
            .create_dream(dream("a1", "second", "2024-03-02T10:00:00Z"))
            .await
            .unwrap_err();
        assert!(matches!(err, DreamError::DuplicateId(ref id) if id == "a1"));

        let kept = store.get_dream_by_id("a1").await.unwrap().unwrap();
        assert_eq!(kept.description, "first");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_description() {
        let (store, _temp) = create_temp_store();
        let err = store
            .create_dream(dream("a1", "", "2024-03-01T10:00:00Z"))
            .await
            .unwrap_err();
        assert!(matches!(err, DreamError::Validation(_)));
        assert!(store.get_dream_by_id("a1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_bumps_updated_at_and_keeps_other_fields() {
        let (store, _temp) = create_temp_store();
        let before = store
            .create_dream(dream("a1", "Flying over mountains", "2024-03-01T10:00:00Z").title("Sky"))
            .await
            .unwrap();

        let outcome = store
            .update_dream("a1", &DreamPatch::new().favorite(true))
            .await
            .unwrap();
        assert!(outcome.is_found());

        let after = store.get_dream_by_id("a1").await.unwrap().unwrap();
        assert!(after.favorite);
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.title, before.title);
        assert_eq!(after.description, before.description);
        assert_eq!(after.date, before.date);
        assert_eq!(outcome, UpdateOutcome::Updated { updated_at: after.updated_at });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_updates_keep_newest_stamp() {
        let (store, _temp) = create_temp_store();
        store
            .create_dream(dream("a1", "Flying over mountains", "2024-03-01T10:00:00Z"))
            .await
            .unwrap();

        for round in 0..20 {
            let handles: Vec<_> = (0..16)
                .map(|n| {
                    let store = store.clone();
                    tokio::spawn(async move {
                        let patch = DreamPatch::new().title(Some(format!("round {} writer {}", round, n)));
                        store.update_dream("a1", &patch).await.unwrap()
                    })
                })
                .collect();

            let mut newest = String::new();
            for handle in handles {
                if let UpdateOutcome::Updated { updated_at } = handle.await.unwrap() {
                    newest = newest.max(updated_at);
                }
            }

            let stored = store.get_dream_by_id("a1").await.unwrap().unwrap();
            assert_eq!(stored.updated_at, newest, "round {}", round);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_creates_stamp_in_insertion_order() {
        let (store, _temp) = create_temp_store();

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .create_dream(dream(&format!("c{:02}", n), "same night", "2024-03-01T10:00:00Z"))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let stamps = store
            .with_conn(|db| {
                let mut stmt = db.prepare("SELECT created_at FROM dreams ORDER BY rowid")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
            .unwrap();
        assert_eq!(stamps.len(), 16);
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_update_can_clear_nullable_fields() {
        let (store, _temp) = create_temp_store();
        store
            .create_dream(dream("a1", "text", "2024-03-01T10:00:00Z").title("Sky").mood(Mood::Neutral))
            .await
            .unwrap();

        store
            .update_dream("a1", &DreamPatch::new().title(None).mood(None).images(vec![]))
            .await
            .unwrap();

        let after = store.get_dream_by_id("a1").await.unwrap().unwrap();
        assert_eq!(after.title, None);
        assert_eq!(after.mood, None);
        assert!(after.images.is_empty());
    }

    #[tokio::test]
    async fn test_update_nonexistent_reports_not_found() {
        let (store, _temp) = create_temp_store();
        let outcome = store
            .update_dream("ghost", &DreamPatch::new().favorite(true))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_update_rejects_blank_description() {
        let (store, _temp) = create_temp_store();
        store
            .create_dream(dream("a1", "text", "2024-03-01T10:00:00Z"))
            .await
            .unwrap();
        let err = store
            .update_dream("a1", &DreamPatch::new().description("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, DreamError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _temp) = create_temp_store();
        store
            .create_dream(dream("a1", "text", "2024-03-01T10:00:00Z"))
            .await
            .unwrap();

        assert!(store.delete_dream("a1").await.unwrap());
        assert!(store.get_dream_by_id("a1").await.unwrap().is_none());
        assert!(!store.delete_dream("a1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_sorts_by_date_then_created_at() {
        let (store, _temp) = create_temp_store();
        seed(
            &store,
            vec![
                dream("early", "one", "2024-01-01T08:00:00Z"),
                dream("tie-first", "two", "2024-02-01T08:00:00Z"),
                dream("tie-second", "three", "2024-02-01T08:00:00Z"),
                dream("late", "four", "2024-03-01T08:00:00Z"),
            ],
        )
        .await;

        let desc = store.list_dreams(&ListOptions::new()).await.unwrap();
        assert_eq!(ids(&desc), vec!["late", "tie-second", "tie-first", "early"]);

        let asc = store
            .list_dreams(&ListOptions::new().sort_order(SortOrder::Asc))
            .await
            .unwrap();
        assert_eq!(ids(&asc), vec!["early", "tie-first", "tie-second", "late"]);
    }

    #[tokio::test]
    async fn test_pages_partition_result_set() {
        let (store, _temp) = create_temp_store();
        let mut all = Vec::new();
        for i in 0..7 {
            // Several dreams share a date so the created_at tie-break matters
            let date = format!("2024-03-0{}T09:00:00Z", 1 + i / 2);
            all.push(dream(&format!("d{}", i), "dream", &date));
        }
        seed(&store, all).await;

        let full = store.list_dreams(&ListOptions::new().limit(100)).await.unwrap();
        let first = store.list_dreams(&ListOptions::new().limit(3)).await.unwrap();
        let second = store.list_dreams(&ListOptions::new().limit(3).offset(3)).await.unwrap();
        let third = store.list_dreams(&ListOptions::new().limit(3).offset(6)).await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);
        assert_eq!(third.len(), 1);

        let stitched: Vec<Dream> = first.into_iter().chain(second).chain(third).collect();
        assert_eq!(stitched, full);
    }

    #[tokio::test]
    async fn test_search_matches_title_or_description_case_insensitive() {
        let (store, _temp) = create_temp_store();
        seed(
            &store,
            vec![
                dream("title-hit", "walking", "2024-03-01T10:00:00Z").title("Flying high"),
                dream("desc-hit", "I was FLYING over the sea", "2024-03-02T10:00:00Z"),
                dream("miss", "falling", "2024-03-03T10:00:00Z"),
            ],
        )
        .await;

        let found = store.list_dreams(&ListOptions::new().search("flying")).await.unwrap();
        assert_eq!(ids(&found), vec!["desc-hit", "title-hit"]);
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let (store, _temp) = create_temp_store();
        seed(
            &store,
            vec![
                dream("pct", "100% lucid", "2024-03-01T10:00:00Z"),
                dream("plain", "100 lucid", "2024-03-02T10:00:00Z"),
            ],
        )
        .await;

        let found = store.list_dreams(&ListOptions::new().search("100%")).await.unwrap();
        assert_eq!(ids(&found), vec!["pct"]);
    }

    #[tokio::test]
    async fn test_search_and_favorite_compose_as_intersection() {
        let (store, _temp) = create_temp_store();
        seed(
            &store,
            vec![
                dream("both", "flying", "2024-03-01T10:00:00Z").favorite(true),
                dream("search-only", "flying", "2024-03-02T10:00:00Z"),
                dream("fav-only", "falling", "2024-03-03T10:00:00Z").favorite(true),
            ],
        )
        .await;

        let found = store
            .list_dreams(&ListOptions::new().search("fly").favorite(true))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["both"]);

        let not_fav = store.list_dreams(&ListOptions::new().favorite(false)).await.unwrap();
        assert_eq!(ids(&not_fav), vec!["search-only"]);
    }

    #[tokio::test]
    async fn test_date_filter_ignores_time_of_day() {
        let (store, _temp) = create_temp_store();
        seed(
            &store,
            vec![
                dream("morning", "a", "2024-03-01T06:00:00Z"),
                dream("night", "b", "2024-03-01T23:59:00Z"),
                dream("next", "c", "2024-03-02T00:01:00Z"),
            ],
        )
        .await;

        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let found = store.list_dreams(&ListOptions::new().date(day)).await.unwrap();
        assert_eq!(ids(&found), vec!["night", "morning"]);
    }

    #[tokio::test]
    async fn test_date_filter_uses_stored_offset() {
        let (store, _temp) = create_temp_store();
        seed(
            &store,
            vec![
                // 2024-03-02T04:30Z in UTC, but written as the evening of the 1st
                dream("evening", "a", "2024-03-01T23:30:00-05:00"),
                dream("utc", "b", "2024-03-02T01:00:00Z"),
            ],
        )
        .await;

        let first = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let found = store.list_dreams(&ListOptions::new().date(first)).await.unwrap();
        assert_eq!(ids(&found), vec!["evening"]);

        let second = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let found = store.list_dreams(&ListOptions::new().date(second)).await.unwrap();
        assert_eq!(ids(&found), vec!["utc"]);
    }

    #[tokio::test]
    async fn test_mood_range_is_inclusive() {
        let (store, _temp) = create_temp_store();
        seed(
            &store,
            vec![
                dream("low", "a", "2024-03-01T10:00:00Z").mood(Mood::VeryNegative),
                dream("mid", "b", "2024-03-02T10:00:00Z").mood(Mood::Neutral),
                dream("high", "c", "2024-03-03T10:00:00Z").mood(Mood::Positive),
                dream("unrated", "d", "2024-03-04T10:00:00Z"),
            ],
        )
        .await;

        let found = store
            .list_dreams(&ListOptions::new().mood_range(Mood::Neutral, Mood::Positive))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec!["high", "mid"]);
    }

    #[tokio::test]
    async fn test_inverted_mood_range_is_query_error() {
        let (store, _temp) = create_temp_store();
        let err = store
            .list_dreams(&ListOptions::new().mood_range(Mood::Positive, Mood::Negative))
            .await
            .unwrap_err();
        assert!(matches!(err, DreamError::Query(_)));
    }

    #[tokio::test]
    async fn test_date_range_filter() {
        let (store, _temp) = create_temp_store();
        seed(
            &store,
            vec![
                dream("before", "a", "2024-02-28T10:00:00Z"),
                dream("inside", "b", "2024-03-05T10:00:00Z"),
                dream("after", "c", "2024-04-01T10:00:00Z"),
            ],
        )
        .await;

        let range = DateRange::new("2024-03-01T00:00:00Z", "2024-03-31T23:59:59Z");
        let found = store.list_dreams(&ListOptions::new().date_range(range)).await.unwrap();
        assert_eq!(ids(&found), vec!["inside"]);
    }

    #[tokio::test]
    async fn test_count_ignores_paging() {
        let (store, _temp) = create_temp_store();
        seed(
            &store,
            vec![
                dream("a", "fly", "2024-03-01T10:00:00Z"),
                dream("b", "fly", "2024-03-02T10:00:00Z"),
                dream("c", "swim", "2024-03-03T10:00:00Z"),
            ],
        )
        .await;

        let options = ListOptions::new().search("fly").limit(1).offset(1);
        assert_eq!(store.count_dreams(&options).await.unwrap(), 2);
        assert_eq!(store.count_dreams(&ListOptions::new()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_list_all_dream_dates() {
        let (store, _temp) = create_temp_store();
        seed(
            &store,
            vec![
                dream("a", "x", "2024-03-01T10:00:00Z").favorite(true),
                dream("b", "y", "2024-03-02T10:00:00Z"),
            ],
        )
        .await;

        let dates = store.list_all_dream_dates().await.unwrap();
        assert_eq!(dates, vec!["2024-03-02T10:00:00Z", "2024-03-01T10:00:00Z"]);
    }

    #[tokio::test]
    async fn test_null_images_read_as_empty() {
        let (store, _temp) = create_temp_store();
        {
            let db = store.db.lock().unwrap();
            db.execute(
                "INSERT INTO dreams (id, description, date, images, created_at, updated_at) VALUES ('raw', 'legacy', '2024-03-01T10:00:00Z', NULL, '2024-03-01T10:00:00.000000Z', '2024-03-01T10:00:00.000000Z')",
                [],
            )
            .unwrap();
        }

        let found = store.get_dream_by_id("raw").await.unwrap().unwrap();
        assert!(found.images.is_empty());
        assert!(!found.favorite);
    }

    #[tokio::test]
    async fn test_schema_rejects_out_of_range_values() {
        let (store, _temp) = create_temp_store();
        let db = store.db.lock().unwrap();
        let bad_mood = db.execute(
            "INSERT INTO dreams (id, description, date, mood) VALUES ('m', 'x', '2024-03-01T10:00:00Z', 6)",
            [],
        );
        assert!(bad_mood.is_err());
        let bad_favorite = db.execute(
            "INSERT INTO dreams (id, description, date, favorite) VALUES ('f', 'x', '2024-03-01T10:00:00Z', 2)",
            [],
        );
        assert!(bad_favorite.is_err());
    }

    #[tokio::test]
    async fn test_reopen_stamps_after_existing_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dreams.db");
        {
            let store = DreamStore::open(&path).unwrap();
            let db = store.db.lock().unwrap();
            // A row stamped far in the future by some earlier writer
            db.execute(
                "INSERT INTO dreams (id, description, date, created_at, updated_at) VALUES ('future', 'x', '2024-03-01T10:00:00Z', '2999-01-01T00:00:00.000000Z', '2999-01-01T00:00:00.000000Z')",
                [],
            )
            .unwrap();
        }

        let store = DreamStore::open(&path).unwrap();
        store
            .update_dream("future", &DreamPatch::new().favorite(true))
            .await
            .unwrap();
        let after = store.get_dream_by_id("future").await.unwrap().unwrap();
        assert!(after.updated_at > after.created_at);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = DreamStore::open_in_memory().unwrap();
        assert!(store.path().is_none());
        store
            .create_dream(dream("a1", "text", "2024-03-01T10:00:00Z"))
            .await
            .unwrap();
        assert_eq!(store.list_dreams(&ListOptions::new()).await.unwrap().len(), 1);
    }
}
