//! ICMP reachability probes via the system `ping` binary

use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, instrument, trace, warn};

use crate::Target;

static LATENCY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time[=<]\s*([0-9]+(?:\.[0-9]+)?)").expect("valid regex"));

/// Result of a single reachability check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub success: bool,
    /// Round trip time in milliseconds, when the probe reported one
    pub latency_ms: Option<f64>,
}

impl ProbeOutcome {
    pub fn reachable(latency_ms: Option<f64>) -> Self {
        Self {
            success: true,
            latency_ms,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            success: false,
            latency_ms: None,
        }
    }
}

/// Errors of the probing mechanism itself (not of the target).
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ping command not found ({0})")]
    ToolMissing(String),

    #[error("failed to run ping: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ping did not finish within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait Prober: Send + Sync {
    /// Check a target once. Never fails: problems are folded into an
    /// unreachable outcome.
    async fn probe(&self, target: &Target) -> ProbeOutcome;
}

/// Probes targets by spawning `ping -c 1 -W <timeout> <host>`.
#[derive(Debug, Clone)]
pub struct PingProber {
    program: String,
    timeout: Duration,
}

impl PingProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: String::from("ping"),
            timeout,
        }
    }

    /// Use a different ping executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, host: &str, timeout: Duration) -> Command {
        let wait_secs = timeout.as_secs().max(1);
        let mut command = Command::new(&self.program);
        command
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(wait_secs.to_string())
            .arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }

    fn spawn_error(&self, err: std::io::Error) -> ProbeError {
        if err.kind() == ErrorKind::NotFound {
            ProbeError::ToolMissing(self.program.clone())
        } else {
            ProbeError::Spawn(err)
        }
    }

    /// Verify that the ping executable can be started at all.
    pub async fn check_available(&self) -> Result<(), ProbeError> {
        self.command("127.0.0.1", Duration::from_secs(1))
            .status()
            .await
            .map(|_| ())
            .map_err(|e| self.spawn_error(e))
    }

    async fn run(&self, host: &str) -> Result<ProbeOutcome, ProbeError> {
        // the child gets one extra second on top of its own deadline
        let deadline = self.timeout + Duration::from_secs(1);
        let output = tokio::time::timeout(deadline, self.command(host, self.timeout).output())
            .await
            .map_err(|_| ProbeError::Timeout(deadline))?
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Ok(ProbeOutcome::unreachable());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(ProbeOutcome::reachable(parse_latency(&stdout)))
    }
}

#[async_trait]
impl Prober for PingProber {
    #[instrument(skip(self, target), fields(host = %target.host))]
    async fn probe(&self, target: &Target) -> ProbeOutcome {
        match self.run(&target.host).await {
            Ok(outcome) => {
                trace!("probe finished: {outcome:?}");
                outcome
            }
            Err(e @ ProbeError::ToolMissing(_)) => {
                error!("{e}");
                ProbeOutcome::unreachable()
            }
            Err(e) => {
                warn!("{e}");
                ProbeOutcome::unreachable()
            }
        }
    }
}

/// Extract the round trip time from the first `time=` fragment of ping output.
pub fn parse_latency(output: &str) -> Option<f64> {
    LATENCY_PATTERN
        .captures(output)
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
