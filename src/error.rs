//! Error taxonomy shared across the crate
//!
//! Probe failures are not errors: an unreachable target is a regular
//! [`ProbeOutcome`](crate::monitors::probe::ProbeOutcome) that drives the state
//! machine. Everything else that can go wrong is typed here.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration could not be loaded or failed validation.
///
/// Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid target list (line {line}): {message}")]
    Targets { line: usize, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The alert/command channel could not be reached or rejected a request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("channel answered with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("channel rejected the request: {0}")]
    Api(String),

    #[error("attachment {0} does not exist")]
    MissingAttachment(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The privileged maintenance action failed.
///
/// Reported back to the requesting operator, never escalated.
#[derive(Debug, Error)]
pub enum DelegateError {
    #[error("crontab is not available: {0}")]
    Unavailable(#[source] std::io::Error),

    #[error("crontab rejected the new rules (exit code {code:?}): {stderr}")]
    Rejected { code: Option<i32>, stderr: String },
}
