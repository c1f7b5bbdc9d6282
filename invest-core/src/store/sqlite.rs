use super::{round2, CorpusStats, Example, ExampleId, NewExample, Store, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS examples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_text TEXT NOT NULL,
    normalized_text TEXT NOT NULL UNIQUE,
    judgment TEXT NOT NULL,
    is_golden INTEGER NOT NULL DEFAULT 0,
    score INTEGER NOT NULL DEFAULT 0,
    usage_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_examples_golden ON examples(is_golden);
CREATE INDEX IF NOT EXISTS idx_examples_score ON examples(score);
";

const COLUMNS: &str = "id, original_text, normalized_text, judgment, is_golden, score, \
                       usage_count, created_at, updated_at";

/// SQLite-backed corpus (single connection behind a mutex).
///
/// Every query runs on the blocking pool so the async runtime never waits
/// on disk I/O.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database file and make sure the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        info!("Opening story corpus at {}", path.display());

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreError> {
            let conn = Connection::open(&path)?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            Ok(conn)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))??;

        Self::with_connection(conn).await
    }

    /// A private in-memory database, mostly for tests.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(store)
    }

    async fn call<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

fn row_to_example(row: &Row<'_>) -> rusqlite::Result<Example> {
    let score: i64 = row.get(5)?;
    let usage: i64 = row.get(6)?;
    Ok(Example {
        id: ExampleId(row.get(0)?),
        original_text: row.get(1)?,
        normalized_text: row.get(2)?,
        judgment: row.get(3)?,
        is_golden: row.get(4)?,
        score: score.clamp(0, 6) as u8,
        usage_count: usage.max(0) as u64,
        created_at: row.get::<_, DateTime<Utc>>(7)?,
        updated_at: row.get::<_, DateTime<Utc>>(8)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn find_all_examples(&self, only_golden: bool) -> Result<Vec<Example>, StoreError> {
        self.call(move |conn| {
            let sql = if only_golden {
                format!("SELECT {COLUMNS} FROM examples WHERE is_golden = 1 ORDER BY id")
            } else {
                format!("SELECT {COLUMNS} FROM examples ORDER BY id")
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], row_to_example)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn upsert_example(&self, example: NewExample) -> Result<ExampleId, StoreError> {
        self.call(move |conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO examples
                    (original_text, normalized_text, judgment, is_golden, score,
                     usage_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
                 ON CONFLICT(normalized_text) DO UPDATE SET
                    judgment = CASE WHEN is_golden > excluded.is_golden
                        THEN judgment ELSE excluded.judgment END,
                    score = MAX(score, excluded.score),
                    is_golden = MAX(is_golden, excluded.is_golden),
                    updated_at = excluded.updated_at",
                params![
                    example.original_text,
                    example.normalized_text,
                    example.judgment,
                    example.is_golden,
                    i64::from(example.score),
                    now,
                ],
            )?;
            let id: i64 = conn.query_row(
                "SELECT id FROM examples WHERE normalized_text = ?1",
                params![example.normalized_text],
                |row| row.get(0),
            )?;
            Ok(ExampleId(id))
        })
        .await
    }

    async fn increment_usage(&self, normalized_text: &str) -> Result<(), StoreError> {
        let key = normalized_text.to_string();
        self.call(move |conn| {
            conn.execute(
                "UPDATE examples SET usage_count = usage_count + 1, updated_at = ?2
                 WHERE normalized_text = ?1",
                params![key, Utc::now()],
            )?;
            Ok(())
        })
        .await
    }

    async fn statistics(&self) -> Result<CorpusStats, StoreError> {
        self.call(|conn| {
            let (total, golden, usage): (i64, i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_golden), 0), COALESCE(SUM(usage_count), 0)
                 FROM examples",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
            let average: Option<f64> = conn.query_row(
                "SELECT AVG(score) FROM examples WHERE is_golden = 1 AND score > 0",
                [],
                |row| row.get(0),
            )?;
            Ok(CorpusStats {
                total: total.max(0) as u64,
                golden: golden.max(0) as u64,
                average_score: average.map(round2).unwrap_or(0.0),
                total_usage: usage.max(0) as u64,
            })
        })
        .await
    }

    async fn paginate(&self, page: usize, page_size: usize) -> Result<Vec<Example>, StoreError> {
        let limit = i64::try_from(page_size).unwrap_or(i64::MAX);
        let offset = i64::try_from(page.saturating_mul(page_size)).unwrap_or(i64::MAX);
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM examples
                 ORDER BY is_golden DESC, score DESC, id ASC
                 LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt
                .query_map(params![limit, offset], row_to_example)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn get_by_id(&self, id: ExampleId) -> Result<Option<Example>, StoreError> {
        self.call(move |conn| {
            let example = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM examples WHERE id = ?1"),
                    params![id.0],
                    row_to_example,
                )
                .optional()?;
            Ok(example)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let id = store
            .upsert_example(NewExample::new("Как клиент, я хочу войти", "ok").with_score(5))
            .await
            .unwrap();

        let row = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.normalized_text, "как клиент я хочу войти");
        assert_eq!(row.score, 5);
        assert_eq!(row.usage_count, 0);
        assert!(store.get_by_id(ExampleId(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_is_unique_by_normalized_text() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let a = store
            .upsert_example(NewExample::new("A b c", "first").with_golden(true).with_score(6))
            .await
            .unwrap();
        let b = store
            .upsert_example(NewExample::new("a, b, c", "second").with_score(2))
            .await
            .unwrap();

        assert_eq!(a, b);
        let all = store.find_all_examples(false).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].is_golden);
    }

    #[tokio::test]
    async fn test_plain_resave_keeps_golden_judgment_and_best_score() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let story = "Как клиент банка, я хочу видеть баланс счета, чтобы планировать расходы";
        let id = store
            .upsert_example(NewExample::new(story, "gold").with_golden(true).with_score(5))
            .await
            .unwrap();
        store.upsert_example(NewExample::new(story, "plain")).await.unwrap();

        let row = store.get_by_id(id).await.unwrap().unwrap();
        assert!(row.is_golden);
        assert_eq!(row.score, 5);
        assert_eq!(row.judgment, "gold");
        assert_eq!(store.statistics().await.unwrap().average_score, 5.0);
    }

    #[tokio::test]
    async fn test_golden_resave_replaces_plain_judgment() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let id = store
            .upsert_example(NewExample::new("a b c", "plain").with_score(3))
            .await
            .unwrap();
        store
            .upsert_example(NewExample::new("a b c", "gold").with_golden(true).with_score(5))
            .await
            .unwrap();

        let row = store.get_by_id(id).await.unwrap().unwrap();
        assert!(row.is_golden);
        assert_eq!(row.score, 5);
        assert_eq!(row.judgment, "gold");
    }

    #[tokio::test]
    async fn test_usage_and_statistics() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store
            .upsert_example(NewExample::new("one", "j").with_golden(true).with_score(5))
            .await
            .unwrap();
        store
            .upsert_example(NewExample::new("two", "j").with_golden(true).with_score(6))
            .await
            .unwrap();
        store.upsert_example(NewExample::new("three", "j")).await.unwrap();
        store.increment_usage("one").await.unwrap();
        store.increment_usage("three").await.unwrap();
        store.increment_usage("three").await.unwrap();

        let stats = store.statistics().await.unwrap();
        assert_eq!(
            stats,
            CorpusStats {
                total: 3,
                golden: 2,
                average_score: 5.5,
                total_usage: 3,
            }
        );
        assert_eq!(store.find_all_examples(true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_statistics() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        assert_eq!(store.statistics().await.unwrap(), CorpusStats::default());
    }

    #[tokio::test]
    async fn test_paginate_order() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.upsert_example(NewExample::new("plain", "j").with_score(6)).await.unwrap();
        store
            .upsert_example(NewExample::new("gold low", "j").with_golden(true).with_score(4))
            .await
            .unwrap();
        store
            .upsert_example(NewExample::new("gold high", "j").with_golden(true).with_score(6))
            .await
            .unwrap();

        let page: Vec<String> = store
            .paginate(0, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.normalized_text)
            .collect();
        assert_eq!(page, ["gold high", "gold low"]);
        assert_eq!(store.paginate(1, 2).await.unwrap()[0].normalized_text, "plain");
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.db");
        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.upsert_example(NewExample::new("kept", "j")).await.unwrap();
        }
        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.statistics().await.unwrap().total, 1);
    }
}
