//! Cron rules for scheduled reports
//!
//! The privileged `/rebuildcron` command regenerates one crontab line per
//! enabled report schedule and swaps it into the user's crontab between a
//! pair of marker comments. Everything outside the markers is left alone.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::error::DelegateError;
use crate::{Recipient, ReportOptions};

pub const BLOCK_BEGIN: &str = "# BEGIN ip-monitor reports";
pub const BLOCK_END: &str = "# END ip-monitor reports";

/// The privileged maintenance action triggered by operators.
#[async_trait]
pub trait MaintenanceDelegate: Send + Sync {
    async fn rebuild(&self) -> Result<(), DelegateError>;
}

/// Access to the crontab of the current user.
#[async_trait]
pub trait CrontabStore: Send + Sync {
    async fn read(&self) -> Result<String, DelegateError>;

    async fn install(&self, content: &str) -> Result<(), DelegateError>;
}

/// The real crontab, managed through the `crontab` binary.
#[derive(Debug, Clone)]
pub struct SystemCrontab {
    program: String,
}

impl Default for SystemCrontab {
    fn default() -> Self {
        Self {
            program: String::from("crontab"),
        }
    }
}

#[async_trait]
impl CrontabStore for SystemCrontab {
    async fn read(&self) -> Result<String, DelegateError> {
        let output = Command::new(&self.program)
            .arg("-l")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(DelegateError::Unavailable)?;

        // `crontab -l` fails when the user has no crontab yet
        if !output.status.success() {
            debug!("no existing crontab");
            return Ok(String::new());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn install(&self, content: &str) -> Result<(), DelegateError> {
        let mut child = Command::new(&self.program)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(DelegateError::Unavailable)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(content.as_bytes())
                .await
                .map_err(DelegateError::Unavailable)?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(DelegateError::Unavailable)?;

        if !output.status.success() {
            return Err(DelegateError::Rejected {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Regenerates the report schedule block of the crontab.
pub struct CronRebuilder<S = SystemCrontab> {
    recipients: Arc<[Recipient]>,
    report_command: String,
    store: S,
}

impl CronRebuilder<SystemCrontab> {
    pub fn new(recipients: Vec<Recipient>, report_command: impl Into<String>) -> Self {
        Self::with_store(recipients, report_command, SystemCrontab::default())
    }
}

impl<S: CrontabStore> CronRebuilder<S> {
    pub fn with_store(
        recipients: Vec<Recipient>,
        report_command: impl Into<String>,
        store: S,
    ) -> Self {
        Self {
            recipients: recipients.into(),
            report_command: report_command.into(),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: CrontabStore> MaintenanceDelegate for CronRebuilder<S> {
    #[instrument(skip(self))]
    async fn rebuild(&self) -> Result<(), DelegateError> {
        let block = render_block(&self.recipients, &self.report_command);
        let current = self.store.read().await?;
        self.store.install(&splice(&current, &block)).await?;

        info!("cron rules rebuilt ({} lines)", block.lines().count() - 2);
        Ok(())
    }
}

/// Cron time expression for a report period. Unknown periods run daily.
pub fn schedule(period: &str, options: &ReportOptions) -> String {
    let ReportOptions {
        minute,
        hour,
        dow,
        day,
        ..
    } = options;

    match period {
        "weekly" => format!("{minute} {hour} * * {dow}"),
        "monthly" => format!("{minute} {hour} {day} * *"),
        _ => format!("{minute} {hour} * * *"),
    }
}

/// The complete marker-delimited block, ending with a newline.
pub fn render_block(recipients: &[Recipient], report_command: &str) -> String {
    let mut lines = vec![BLOCK_BEGIN.to_string()];

    for recipient in recipients {
        for (period, options) in recipient.reports.iter().filter(|(_, o)| o.enabled) {
            lines.push(format!(
                "{} {report_command} --period {period} --chat-id {}",
                schedule(period, options),
                recipient.id
            ));
        }
    }

    lines.push(BLOCK_END.to_string());
    lines.join("\n") + "\n"
}

/// Replace any previous block in `current` with `block`.
pub fn splice(current: &str, block: &str) -> String {
    let mut kept = vec![];
    let mut inside = false;

    for line in current.lines() {
        match line.trim() {
            BLOCK_BEGIN => inside = true,
            BLOCK_END => inside = false,
            _ if !inside => kept.push(line),
            _ => {}
        }
    }

    if kept.is_empty() {
        return block.to_string();
    }

    format!("{}\n{block}", kept.join("\n"))
}
