//! Durable probe log
//!
//! Every probe outcome becomes one immutable [`ProbeRecord`]. The log is the
//! only interface to report generation, so it is strictly append-only.
//!
//! ## Backends
//!
//! - **CSV** (default): one row per record, easy to consume from any tool
//! - **SQLite**: single table with time-window queries (`storage-sqlite` feature)
//! - **In-Memory**: no persistence, for `backend: none` and tests

use std::sync::Arc;

use tracing::info;

use crate::config::StorageConfig;

pub mod backend;
pub mod csv;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::ProbeLog;
pub use error::{StorageError, StorageResult};
pub use schema::{ProbeRecord, RecordStatus};

/// Open the configured backend.
pub async fn open(config: &StorageConfig) -> StorageResult<Arc<dyn ProbeLog>> {
    let log: Arc<dyn ProbeLog> = match config {
        StorageConfig::None => {
            info!("probe records are kept in memory only");
            Arc::new(memory::MemoryLog::new())
        }
        StorageConfig::Csv { path } => Arc::new(csv::CsvLog::new(path).await?),
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => Arc::new(sqlite::SqliteLog::new(path).await?),
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            return Err(StorageError::ConnectionFailed(String::from(
                "built without the storage-sqlite feature",
            )));
        }
    };

    Ok(log)
}
