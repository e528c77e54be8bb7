//! In-memory probe log (no persistence)
//!
//! Used when `backend: none` is configured and throughout the tests. All
//! records are lost on restart.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::backend::ProbeLog;
use super::error::StorageResult;
use super::schema::ProbeRecord;

#[derive(Debug, Default)]
pub struct MemoryLog {
    records: RwLock<Vec<ProbeRecord>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in append order
    pub async fn records(&self) -> Vec<ProbeRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ProbeLog for MemoryLog {
    async fn append(&self, record: &ProbeRecord) -> StorageResult<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
