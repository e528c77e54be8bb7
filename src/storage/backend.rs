//! Probe log trait definition

use async_trait::async_trait;

use super::error::StorageResult;
use super::schema::ProbeRecord;

/// Append-only sink for probe records
///
/// Implementations must be `Send + Sync` as the scheduler may append from
/// several probe tasks at once. Records are never updated or deleted.
#[async_trait]
pub trait ProbeLog: Send + Sync {
    /// Durably append a single record
    async fn append(&self, record: &ProbeRecord) -> StorageResult<()>;

    /// Short backend name for logging
    fn backend_name(&self) -> &'static str;
}
