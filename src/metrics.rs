//! Prometheus textfile metrics
//!
//! The whole document is rewritten on every refresh. It is written next to the
//! destination and renamed over it, so a scraper only ever sees a complete
//! snapshot of the current targets.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{instrument, trace};

use crate::Target;
use crate::monitors::state::{StateTracker, TargetSnapshot, TargetStatus};

pub struct MetricsWriter {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl MetricsWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the parent directory of the metrics file.
    pub async fn ensure_parent(&self) -> std::io::Result<()> {
        match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => tokio::fs::create_dir_all(parent).await,
            None => Ok(()),
        }
    }

    #[instrument(skip_all, fields(targets = snapshots.len()))]
    pub async fn write(&self, snapshots: &[TargetSnapshot]) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_locked(snapshots).await
    }

    /// Snapshot `targets` and write them.
    ///
    /// The snapshot is taken while holding the write lock, so the last
    /// refresh to finish always reflects the latest recorded states.
    #[instrument(skip_all, fields(targets = targets.len()))]
    pub async fn refresh(&self, tracker: &StateTracker, targets: &[Target]) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshots = tracker.snapshot_all(targets).await;
        self.write_locked(&snapshots).await
    }

    async fn write_locked(&self, snapshots: &[TargetSnapshot]) -> std::io::Result<()> {
        let document = render(snapshots);
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, document.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        trace!("metrics written to {}", self.path.display());
        Ok(())
    }
}

/// Render the gauges of every snapshot in text exposition format.
pub fn render(snapshots: &[TargetSnapshot]) -> String {
    let families: [(&str, &str, fn(&TargetSnapshot) -> u32); 3] = [
        ("ip_up", "1 if the target is in state ok, 0 otherwise", |s| {
            u32::from(s.state.status == TargetStatus::Ok)
        }),
        (
            "ip_success_streak",
            "Consecutive successful probes",
            |s| s.state.success_streak,
        ),
        (
            "ip_fail_streak",
            "Consecutive failed probes",
            |s| s.state.fail_streak,
        ),
    ];

    let mut out = String::new();
    for (name, help, value) in families {
        let _ = writeln!(out, "# HELP {name} {help}");
        let _ = writeln!(out, "# TYPE {name} gauge");
        for snapshot in snapshots {
            let _ = writeln!(
                out,
                "{name}{{target=\"{}\",name=\"{}\"}} {}",
                escape_label(&snapshot.target.host),
                escape_label(&snapshot.target.name),
                value(snapshot)
            );
        }
    }
    out
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
