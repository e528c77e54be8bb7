//! Probe record definition
//!
//! One record is written per probe outcome and never touched again. The
//! record stream is the only thing the report generator reads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Target;
use crate::monitors::probe::ProbeOutcome;
use crate::monitors::state::{TargetState, TargetStatus};

/// Status label stored with a record.
///
/// Successful probes store the status after the update, failed probes always
/// store `fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Unknown,
    Ok,
    Warn,
    Down,
    Fail,
}

impl RecordStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RecordStatus::Unknown => "unknown",
            RecordStatus::Ok => "ok",
            RecordStatus::Warn => "warn",
            RecordStatus::Down => "down",
            RecordStatus::Fail => "fail",
        }
    }
}

impl From<TargetStatus> for RecordStatus {
    fn from(status: TargetStatus) -> Self {
        match status {
            TargetStatus::Unknown => RecordStatus::Unknown,
            TargetStatus::Ok => RecordStatus::Ok,
            TargetStatus::Warn => RecordStatus::Warn,
            TargetStatus::Down => RecordStatus::Down,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(RecordStatus::Unknown),
            "ok" => Ok(RecordStatus::Ok),
            "warn" => Ok(RecordStatus::Warn),
            "down" => Ok(RecordStatus::Down),
            "fail" => Ok(RecordStatus::Fail),
            other => Err(format!("unknown status label '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeRecord {
    /// When the probe finished (always UTC)
    pub timestamp: DateTime<Utc>,
    pub host: String,
    pub name: String,
    pub status: RecordStatus,
    pub latency_ms: Option<f64>,
}

impl ProbeRecord {
    pub fn from_outcome(
        target: &Target,
        outcome: &ProbeOutcome,
        state: &TargetState,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let status = if outcome.success {
            state.status.into()
        } else {
            RecordStatus::Fail
        };

        Self {
            timestamp,
            host: target.host.clone(),
            name: target.name.clone(),
            status,
            latency_ms: outcome.latency_ms,
        }
    }
}
