//! `SQLite`-backed implementation of [`BatchLoader`].
//!
//! Uses a single `Mutex<Connection>` for thread safety and runs statements
//! on the blocking pool. Each destination becomes a local table named
//! `<dataset>__<table>`; the project is ignored.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use feedline_types::row::DATETIME_FMT;
use feedline_types::{LoadError, LoadResult, TableRef, WarehouseRow};
use rusqlite::Connection;

use crate::backend::BatchLoader;
use crate::error::{self, SinkError};
use crate::identifier::{quote, validate_identifier};

struct Inner {
    conn: Connection,
    created_tables: HashSet<String>,
}

/// `SQLite` destination.
///
/// Create with [`SqliteLoader::open`] for file-backed storage or
/// [`SqliteLoader::in_memory`] for tests. `row_id` is the primary key and
/// duplicates are skipped, so replays never double-insert.
#[derive(Clone)]
pub struct SqliteLoader {
    inner: Arc<Mutex<Inner>>,
}

impl SqliteLoader {
    /// Open or create a `SQLite` database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Io`] if the directory can't be created,
    /// or [`SinkError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory `SQLite` destination (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Sqlite`] if the database can't be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                conn,
                created_tables: HashSet::new(),
            })),
        }
    }

    /// Local table name for a destination.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::InvalidIdentifier`] if dataset or table is unsafe.
    pub fn local_table_name(destination: &TableRef) -> error::Result<String> {
        let dataset = validate_identifier(&destination.dataset)?;
        let table = validate_identifier(&destination.table)?;
        Ok(format!("{dataset}__{table}"))
    }

    /// Number of rows currently stored for `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] on storage failure or unsafe identifiers.
    pub fn count_rows(&self, destination: &TableRef) -> error::Result<i64> {
        let table = Self::local_table_name(destination)?;
        let guard = lock(&self.inner)?;
        let exists: i64 = guard.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [&table],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Ok(0);
        }
        let count = guard
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", quote(&table)), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }

    /// Stored `row_id`s for `destination`, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] on storage failure or unsafe identifiers.
    pub fn row_ids(&self, destination: &TableRef) -> error::Result<Vec<i64>> {
        let table = Self::local_table_name(destination)?;
        let guard = lock(&self.inner)?;
        let mut stmt = guard
            .conn
            .prepare(&format!("SELECT row_id FROM {} ORDER BY row_id", quote(&table)))?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }
}

fn lock(inner: &Mutex<Inner>) -> error::Result<MutexGuard<'_, Inner>> {
    inner.lock().map_err(|_| SinkError::LockPoisoned)
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            row_id INTEGER PRIMARY KEY,
            ingestion_timestamp TEXT NOT NULL,
            observation_timestamp TEXT NOT NULL,
            payload TEXT NOT NULL,
            columns TEXT
        )",
        quote(table)
    )
}

/// Insert rows in one transaction, returning how many were new.
fn insert_rows(inner: &Mutex<Inner>, table: &str, rows: &[WarehouseRow]) -> error::Result<u64> {
    let mut guard = lock(inner)?;
    if !guard.created_tables.contains(table) {
        guard.conn.execute_batch(&create_table_sql(table))?;
        guard.created_tables.insert(table.to_string());
    }

    let tx = guard.conn.unchecked_transaction()?;
    let mut written = 0u64;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} (row_id, ingestion_timestamp, observation_timestamp, payload, columns) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(row_id) DO NOTHING",
            quote(table)
        ))?;
        for row in rows {
            let columns = if row.columns.is_empty() {
                None
            } else {
                Some(serde_json::Value::Object(row.columns.clone().into_iter().collect()).to_string())
            };
            let inserted = stmt.execute(rusqlite::params![
                row.row_id,
                row.ingestion_timestamp.format(DATETIME_FMT).to_string(),
                row.observation_timestamp.format(DATETIME_FMT).to_string(),
                row.payload,
                columns,
            ])?;
            written += inserted as u64;
        }
    }
    tx.commit()?;
    Ok(written)
}

#[async_trait]
impl BatchLoader for SqliteLoader {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn append(
        &self,
        rows: &[WarehouseRow],
        destination: &TableRef,
    ) -> Result<LoadResult, LoadError> {
        let attempted = rows.len() as u64;
        let to_load_error = |e: SinkError| LoadError::batch(destination.clone(), attempted, e.to_string());

        let table = Self::local_table_name(destination).map_err(to_load_error)?;
        let inner = Arc::clone(&self.inner);
        let owned_rows = rows.to_vec();

        let written = tokio::task::spawn_blocking(move || insert_rows(&inner, &table, &owned_rows))
            .await
            .map_err(|e| to_load_error(SinkError::Task(e.to_string())))?
            .map_err(to_load_error)?;

        Ok(LoadResult {
            destination: destination.clone(),
            rows_attempted: attempted,
            rows_written: written,
            rejections: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn row(row_id: i64) -> WarehouseRow {
        WarehouseRow {
            ingestion_timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap(),
            observation_timestamp: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap(),
            row_id,
            payload: format!("{{\"time_epoch\":{row_id}}}"),
            columns: BTreeMap::new(),
        }
    }

    fn table() -> TableRef {
        TableRef::new("team-god", "weather_data", "raw_weatherapp")
    }

    #[tokio::test]
    async fn appends_rows_into_local_table() {
        let loader = SqliteLoader::in_memory().unwrap();
        let result = loader.load(&[row(1), row(2), row(3)], &table()).await.unwrap();
        assert_eq!(result.rows_attempted, 3);
        assert_eq!(result.rows_written, 3);
        assert_eq!(loader.count_rows(&table()).unwrap(), 3);
    }

    #[tokio::test]
    async fn replayed_rows_are_skipped_by_row_id() {
        let loader = SqliteLoader::in_memory().unwrap();
        loader.load(&[row(1), row(2)], &table()).await.unwrap();

        let replay = loader.load(&[row(2), row(3)], &table()).await.unwrap();
        assert_eq!(replay.rows_attempted, 2);
        assert_eq!(replay.rows_written, 1);
        assert_eq!(replay.rows_skipped(), 1);
        assert_eq!(loader.row_ids(&table()).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_batch_creates_nothing() {
        let loader = SqliteLoader::in_memory().unwrap();
        let result = loader.load(&[], &table()).await.unwrap();
        assert_eq!(result.rows_attempted, 0);
        assert_eq!(loader.count_rows(&table()).unwrap(), 0);
    }

    #[tokio::test]
    async fn cohorts_land_in_separate_tables() {
        let loader = SqliteLoader::in_memory().unwrap();
        let first = TableRef::with_suffix("p", "google_trends", "searchwords_new", Some("1"));
        let second = TableRef::with_suffix("p", "google_trends", "searchwords_new", Some("2"));
        loader.load(&[row(10)], &first).await.unwrap();
        loader.load(&[row(10), row(11)], &second).await.unwrap();
        assert_eq!(loader.count_rows(&first).unwrap(), 1);
        assert_eq!(loader.count_rows(&second).unwrap(), 2);
    }

    #[tokio::test]
    async fn unsafe_table_name_is_a_load_error() {
        let loader = SqliteLoader::in_memory().unwrap();
        let bad = TableRef::new("p", "d", "t; DROP TABLE x");
        let err = loader.load(&[row(1)], &bad).await.unwrap_err();
        assert_eq!(err.destination, bad);
        assert!(err.errors[0].contains("invalid identifier"));
    }

    #[tokio::test]
    async fn file_backed_database_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("feedline.db");
        {
            let loader = SqliteLoader::open(&path).unwrap();
            loader.load(&[row(1)], &table()).await.unwrap();
        }
        let reopened = SqliteLoader::open(&path).unwrap();
        assert_eq!(reopened.count_rows(&table()).unwrap(), 1);
    }
}
