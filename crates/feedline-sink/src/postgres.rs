//! `PostgreSQL`-backed implementation of [`BatchLoader`].
//!
//! Destinations map to `"<dataset>"."<table>"`; the project is ignored.
//! Tables are created on first use with `row_id` as primary key, and rows
//! are appended with multi-value `INSERT ... ON CONFLICT (row_id) DO NOTHING`
//! so replays never double-insert. A batch is committed as one
//! transaction: it lands whole or not at all.

use std::collections::HashSet;

use async_trait::async_trait;
use feedline_types::{LoadError, LoadResult, TableRef, WarehouseRow};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};

use crate::backend::BatchLoader;
use crate::error::{self, SinkError};
use crate::identifier::{quote, validate_identifier};

/// Maximum rows per multi-value INSERT statement.
/// Five parameters per row keeps each statement far below the 65535 limit.
const INSERT_CHUNK_SIZE: usize = 1000;

/// `PostgreSQL` connection settings.
#[derive(Clone, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
}

fn default_port() -> u16 {
    5432
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

impl PostgresConfig {
    /// Connection settings as a typed [`tokio_postgres::Config`].
    ///
    /// Values are passed through verbatim, so passwords may contain spaces
    /// or quotes.
    #[must_use]
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.host)
            .port(self.port)
            .user(&self.user)
            .dbname(&self.database);
        if !self.password.is_empty() {
            pg.password(&self.password);
        }
        pg
    }
}

struct Inner {
    client: Client,
    created_tables: HashSet<String>,
}

/// `PostgreSQL` destination.
///
/// A single `Mutex<Client>` serializes batches; each batch is one
/// transaction.
pub struct PostgresLoader {
    inner: Mutex<Inner>,
}

impl PostgresLoader {
    /// Connect and spawn the connection driver on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Postgres`] if the connection fails.
    pub async fn connect(config: &PostgresConfig) -> error::Result<Self> {
        let loader = Self::connect_with(&config.to_pg_config()).await?;
        tracing::info!(
            host = config.host,
            port = config.port,
            database = config.database,
            "Connected to PostgreSQL destination"
        );
        Ok(loader)
    }

    /// Connect using a libpq-style connection string or `PostgreSQL` URI:
    /// - `"host=localhost port=5432 dbname=warehouse user=postgres"`
    /// - `"postgresql://postgres@localhost/warehouse"`
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Postgres`] if the string is malformed or the
    /// connection fails.
    pub async fn connect_str(connstr: &str) -> error::Result<Self> {
        let pg: tokio_postgres::Config = connstr.parse()?;
        Self::connect_with(&pg).await
    }

    async fn connect_with(pg: &tokio_postgres::Config) -> error::Result<Self> {
        let (client, connection) = pg.connect(NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self {
            inner: Mutex::new(Inner {
                client,
                created_tables: HashSet::new(),
            }),
        })
    }

    /// Qualified, quoted `"<dataset>"."<table>"`.
    fn qualified_table(destination: &TableRef) -> error::Result<(String, String)> {
        let schema = validate_identifier(&destination.dataset)?;
        let table = validate_identifier(&destination.table)?;
        Ok((quote(schema), format!("{}.{}", quote(schema), quote(table))))
    }

    /// Number of rows currently stored for `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the table name is invalid or the query fails.
    pub async fn count_rows(&self, destination: &TableRef) -> error::Result<i64> {
        let (_, qualified) = Self::qualified_table(destination)?;
        let inner = self.inner.lock().await;
        let row = inner
            .client
            .query_one(&format!("SELECT COUNT(*) FROM {qualified}"), &[])
            .await?;
        Ok(row.get(0))
    }
}

async fn ensure_table(inner: &mut Inner, schema: &str, qualified: &str) -> error::Result<()> {
    if inner.created_tables.contains(qualified) {
        return Ok(());
    }
    let ddl = format!(
        "CREATE SCHEMA IF NOT EXISTS {schema};
         CREATE TABLE IF NOT EXISTS {qualified} (
             row_id BIGINT PRIMARY KEY,
             ingestion_timestamp TIMESTAMPTZ NOT NULL,
             observation_timestamp TIMESTAMP NOT NULL,
             payload TEXT NOT NULL,
             columns TEXT
         );"
    );
    inner.client.batch_execute(&ddl).await?;
    inner.created_tables.insert(qualified.to_string());
    Ok(())
}

/// Insert every chunk inside one transaction; a failing chunk rolls back
/// the whole batch.
async fn insert_rows(client: &mut Client, qualified: &str, rows: &[WarehouseRow]) -> error::Result<u64> {
    let columns: Vec<Option<String>> = rows
        .iter()
        .map(|row| {
            (!row.columns.is_empty()).then(|| {
                serde_json::Value::Object(row.columns.clone().into_iter().collect()).to_string()
            })
        })
        .collect();

    let tx = client.transaction().await?;
    let mut written = 0u64;
    for (chunk_index, chunk) in rows.chunks(INSERT_CHUNK_SIZE).enumerate() {
        let offset = chunk_index * INSERT_CHUNK_SIZE;
        let sql = insert_statement(qualified, chunk.len());
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(chunk.len() * 5);
        for (i, row) in chunk.iter().enumerate() {
            params.push(&row.row_id);
            params.push(&row.ingestion_timestamp);
            params.push(&row.observation_timestamp);
            params.push(&row.payload);
            params.push(&columns[offset + i]);
        }
        written += tx.execute(&sql, &params).await?;
    }
    tx.commit().await?;
    Ok(written)
}

/// Build `INSERT INTO t (...) VALUES ($1,...,$5), ($6,...) ON CONFLICT (row_id) DO NOTHING`.
fn insert_statement(qualified: &str, rows: usize) -> String {
    let values = (0..rows)
        .map(|r| {
            let base = r * 5;
            format!(
                "(${}, ${}, ${}, ${}, ${})",
                base + 1,
                base + 2,
                base + 3,
                base + 4,
                base + 5
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {qualified} (row_id, ingestion_timestamp, observation_timestamp, payload, columns) \
         VALUES {values} ON CONFLICT (row_id) DO NOTHING"
    )
}

#[async_trait]
impl BatchLoader for PostgresLoader {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn append(
        &self,
        rows: &[WarehouseRow],
        destination: &TableRef,
    ) -> Result<LoadResult, LoadError> {
        let attempted = rows.len() as u64;
        let to_load_error = |e: SinkError| LoadError::batch(destination.clone(), attempted, e.to_string());

        let (schema, qualified) = Self::qualified_table(destination).map_err(to_load_error)?;
        let mut inner = self.inner.lock().await;
        ensure_table(&mut inner, &schema, &qualified)
            .await
            .map_err(to_load_error)?;
        let written = insert_rows(&mut inner.client, &qualified, rows)
            .await
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
    use tokio_postgres::config::Host;

    fn config(password: &str) -> PostgresConfig {
        PostgresConfig {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: password.into(),
            database: "warehouse".into(),
        }
    }

    #[test]
    fn pg_config_omits_empty_password() {
        let pg = config("").to_pg_config();
        assert_eq!(pg.get_hosts(), &[Host::Tcp("localhost".into())]);
        assert_eq!(pg.get_ports(), &[5432]);
        assert_eq!(pg.get_user(), Some("postgres"));
        assert_eq!(pg.get_dbname(), Some("warehouse"));
        assert!(pg.get_password().is_none());
    }

    #[test]
    fn pg_config_keeps_password_with_spaces_and_quotes() {
        let pg = config("it's a secret").to_pg_config();
        assert_eq!(pg.get_password(), Some("it's a secret".as_bytes()));
    }

    #[test]
    fn debug_masks_password() {
        let rendered = format!("{:?}", config("hunter2"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn config_defaults_port() {
        let config: PostgresConfig = serde_json::from_value(serde_json::json!({
            "host": "db",
            "user": "loader",
            "database": "warehouse"
        }))
        .unwrap();
        assert_eq!(config.port, 5432);
        assert!(config.password.is_empty());
    }

    #[test]
    fn insert_statement_numbers_parameters_per_row() {
        let sql = insert_statement("\"raw\".\"t\"", 2);
        assert!(sql.starts_with("INSERT INTO \"raw\".\"t\" (row_id,"));
        assert!(sql.contains("($1, $2, $3, $4, $5), ($6, $7, $8, $9, $10)"));
        assert!(sql.ends_with("ON CONFLICT (row_id) DO NOTHING"));
    }

    #[test]
    fn qualified_table_quotes_dataset_and_table() {
        let (schema, qualified) =
            PostgresLoader::qualified_table(&TableRef::new("p", "google_trends", "searchwords_new_1"))
                .unwrap();
        assert_eq!(schema, "\"google_trends\"");
        assert_eq!(qualified, "\"google_trends\".\"searchwords_new_1\"");

        assert!(PostgresLoader::qualified_table(&TableRef::new("p", "bad-name", "t")).is_err());
    }

    /// Helper: get Postgres connection string from env or skip test.
    fn test_connstr() -> String {
        std::env::var("TEST_POSTGRES_URL")
            .expect("TEST_POSTGRES_URL not set, skipping Postgres integration test")
    }

    fn row(row_id: i64, payload: &str) -> WarehouseRow {
        WarehouseRow {
            ingestion_timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap(),
            observation_timestamp: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap(),
            row_id,
            payload: payload.to_string(),
            columns: BTreeMap::new(),
        }
    }

    /// Helper: fresh loader and an empty, uniquely named table.
    async fn fresh_table(name: &str) -> (PostgresLoader, TableRef) {
        let loader = PostgresLoader::connect_str(&test_connstr()).await.unwrap();
        {
            let inner = loader.inner.lock().await;
            inner
                .client
                .batch_execute(&format!("DROP TABLE IF EXISTS \"feedline_test\".\"{name}\""))
                .await
                .unwrap();
        }
        (loader, TableRef::new("local", "feedline_test", name))
    }

    #[tokio::test]
    #[ignore = "requires TEST_POSTGRES_URL"]
    async fn append_and_replay_roundtrip() {
        let (loader, table) = fresh_table("roundtrip").await;

        let first = loader
            .load(&[row(1, "{}"), row(2, "{}")], &table)
            .await
            .unwrap();
        assert_eq!(first.rows_written, 2);

        let replay = loader
            .load(&[row(2, "{}"), row(3, "{}")], &table)
            .await
            .unwrap();
        assert_eq!(replay.rows_attempted, 2);
        assert_eq!(replay.rows_written, 1);
        assert_eq!(replay.rows_skipped(), 1);
        assert_eq!(loader.count_rows(&table).await.unwrap(), 3);
    }

    #[tokio::test]
    #[ignore = "requires TEST_POSTGRES_URL"]
    async fn failing_chunk_rolls_back_whole_batch() {
        let (loader, table) = fresh_table("rollback").await;

        // 1500 rows span two INSERT chunks; a NUL byte in the second chunk
        // is refused by the server.
        let rows: Vec<WarehouseRow> = (0..1500_i64)
            .map(|id| row(id, if id == 1200 { "bad\u{0}" } else { "{}" }))
            .collect();
        let err = loader.load(&rows, &table).await.unwrap_err();
        assert_eq!(err.rows_attempted, 1500);
        assert_eq!(err.rows_written, 0);
        assert_eq!(loader.count_rows(&table).await.unwrap(), 0);
    }
}
