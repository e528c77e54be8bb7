//! CSV file backend
//!
//! Appends one `timestamp,host,name,status,latency` row per record. The file
//! is opened in append mode for every write so external rotation keeps
//! working.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::SecondsFormat;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use super::backend::ProbeLog;
use super::error::StorageResult;
use super::schema::ProbeRecord;

pub struct CsvLog {
    path: PathBuf,
    /// Serializes appends so rows from parallel probes never interleave
    write_lock: Mutex<()>,
}

impl CsvLog {
    pub async fn new(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!("appending probe records to {}", path.display());

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProbeLog for CsvLog {
    #[instrument(skip_all, fields(host = %record.host))]
    async fn append(&self, record: &ProbeRecord) -> StorageResult<()> {
        let line = format_row(record);

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "csv"
    }
}

pub fn format_row(record: &ProbeRecord) -> String {
    let latency = record
        .latency_ms
        .map(|ms| format!("{ms:.2}"))
        .unwrap_or_default();

    let fields = [
        record.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        escape(&record.host),
        escape(&record.name),
        record.status.label().to_string(),
        latency,
    ];

    format!("{}\n", fields.join(","))
}

/// Quote a field when it contains a separator, quote or line break.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
