//! SQLite probe log backend
//!
//! Stores records in a single append-only `probe_records` table. Timestamps
//! are kept as Unix milliseconds so time-window queries stay index friendly.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument};

use super::backend::ProbeLog;
use super::error::{StorageError, StorageResult};
use super::schema::{ProbeRecord, RecordStatus};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS probe_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER NOT NULL,
        host TEXT NOT NULL,
        name TEXT NOT NULL,
        status TEXT NOT NULL,
        latency_ms REAL
    )
"#;

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_probe_records_timestamp ON probe_records (timestamp)";

pub struct SqliteLog {
    pool: Pool<Sqlite>,
}

impl SqliteLog {
    /// Open (or create) the database file and make sure the table exists.
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!("initializing SQLite probe log at: {}", db_path.display());

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_INDEX).execute(&pool).await?;
        debug!("probe_records table ready");

        Ok(Self { pool })
    }

    fn millis_to_timestamp(millis: i64) -> StorageResult<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| StorageError::CorruptRecord(format!("invalid timestamp {millis}")))
    }

    /// Records with `start <= timestamp <= end`, oldest first.
    #[instrument(skip(self))]
    pub async fn records_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<ProbeRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT timestamp, host, name, status, latency_ms
            FROM probe_records
            WHERE timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(start.timestamp_millis())
        .bind(end.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let status: String = row.get("status");
                Ok(ProbeRecord {
                    timestamp: Self::millis_to_timestamp(row.get("timestamp"))?,
                    host: row.get("host"),
                    name: row.get("name"),
                    status: status
                        .parse::<RecordStatus>()
                        .map_err(StorageError::CorruptRecord)?,
                    latency_ms: row.get("latency_ms"),
                })
            })
            .collect()
    }
}

#[async_trait]
impl ProbeLog for SqliteLog {
    #[instrument(skip_all, fields(host = %record.host))]
    async fn append(&self, record: &ProbeRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO probe_records (timestamp, host, name, status, latency_ms)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.timestamp.timestamp_millis())
        .bind(&record.host)
        .bind(&record.name)
        .bind(record.status.label())
        .bind(record.latency_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
