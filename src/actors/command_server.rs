//! CommandServer - Answers operator commands received over the alert channel
//!
//! ## Message Flow
//!
//! ```text
//! getUpdates(offset) → InboundUpdate → Command::parse → CommandHandler::respond → sendMessage
//!        ↑                                                      │
//!        └───── offset = update_id + 1 ◄────────────────────────┘
//! ```
//!
//! The cursor only ever moves forward, so no update is handled twice. Replies
//! go out through the same notifier that delivers alerts.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::channel::{InboundMessage, UpdateSource};
use crate::cron::MaintenanceDelegate;
use crate::monitor::Monitor;

/// Pause between two successful polls
pub const IDLE_DELAY: Duration = Duration::from_secs(1);

/// Pause after a failed poll
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

pub const REPLY_UNCONFIGURED: &str = "You are not configured as a recipient";
pub const REPLY_NO_RESOURCES: &str = "No accessible resources";
pub const REPLY_PERMISSION_DENIED: &str = "Permission denied: admin role required";
pub const REPLY_CRON_UPDATED: &str = "Cron rules updated";
pub const REPLY_UNKNOWN: &str = "Unknown command";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    WhoAmI,
    Status,
    RebuildCron,
    Unknown(String),
}

impl Command {
    /// Parse the leading command word of `text`.
    ///
    /// Returns `None` for text that is not a command. Matching ignores case
    /// and a trailing `@botname`.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim_start().split_whitespace().next()?;
        let word = word.strip_prefix('/')?;
        let word = word.split('@').next().unwrap_or(word).to_lowercase();

        let command = match word.as_str() {
            "whoami" => Command::WhoAmI,
            "status" => Command::Status,
            "rebuildcron" => Command::RebuildCron,
            _ => Command::Unknown(word),
        };
        Some(command)
    }
}

/// Computes replies to operator commands.
#[derive(Clone)]
pub struct CommandHandler {
    monitor: Arc<Monitor>,
    delegate: Arc<dyn MaintenanceDelegate>,
}

impl CommandHandler {
    pub fn new(monitor: Arc<Monitor>, delegate: Arc<dyn MaintenanceDelegate>) -> Self {
        Self { monitor, delegate }
    }

    /// Reply text for a message from `sender`, or `None` if `text` is not a
    /// command.
    #[instrument(skip(self, text))]
    pub async fn respond(&self, sender: &str, text: &str) -> Option<String> {
        let command = Command::parse(text)?;
        debug!("command {command:?}");

        let reply = match command {
            Command::WhoAmI => self.whoami(sender),
            Command::Status => self.status(sender).await,
            Command::RebuildCron => self.rebuild_cron(sender).await,
            Command::Unknown(_) => REPLY_UNKNOWN.to_string(),
        };
        Some(reply)
    }

    fn whoami(&self, sender: &str) -> String {
        match self.monitor.recipient(sender) {
            Some(recipient) => format!(
                "role: {}\nresources: {}\ntimezone: {}",
                recipient.role, recipient.scope, recipient.timezone
            ),
            None => REPLY_UNCONFIGURED.to_string(),
        }
    }

    async fn status(&self, sender: &str) -> String {
        let Some(recipient) = self.monitor.recipient(sender) else {
            return REPLY_NO_RESOURCES.to_string();
        };

        let snapshots = self.monitor.visible_snapshots(recipient).await;
        if snapshots.is_empty() {
            return REPLY_NO_RESOURCES.to_string();
        }

        snapshots
            .iter()
            .map(|s| {
                format!(
                    "{}: {} (fail {}, ok {})",
                    s.target, s.state.status, s.state.fail_streak, s.state.success_streak
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn rebuild_cron(&self, sender: &str) -> String {
        let is_admin = self
            .monitor
            .recipient(sender)
            .is_some_and(|recipient| recipient.is_admin());
        if !is_admin {
            warn!("{sender} is not allowed to rebuild cron rules");
            return REPLY_PERMISSION_DENIED.to_string();
        }

        match self.delegate.rebuild().await {
            Ok(()) => REPLY_CRON_UPDATED.to_string(),
            Err(e) => {
                error!("cron rebuild failed: {e}");
                format!("Cron update failed: {e}")
            }
        }
    }
}

pub struct CommandServerActor {
    handler: CommandHandler,

    source: Arc<dyn UpdateSource>,

    /// Long-poll duration of one request
    poll_timeout: Duration,

    /// Next update id to request
    offset: Option<i64>,

    cancel: CancellationToken,
}

impl CommandServerActor {
    pub fn new(
        handler: CommandHandler,
        source: Arc<dyn UpdateSource>,
        poll_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            handler,
            source,
            poll_timeout,
            offset: None,
            cancel,
        }
    }

    /// Run the polling loop until the cancellation token fires
    ///
    /// A pending long-poll is abandoned on cancellation. Updates that were
    /// already received are all handled before the loop exits.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        info!("listening for commands");

        loop {
            let polled = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                polled = self.source.poll_updates(self.offset, self.poll_timeout) => polled,
            };

            let pause = match polled {
                Ok(updates) => {
                    for update in updates {
                        if self.offset.is_some_and(|offset| update.update_id < offset) {
                            debug!("skipping already handled update {}", update.update_id);
                            continue;
                        }
                        self.offset = Some(update.update_id + 1);

                        if let Some(message) = update.message {
                            self.handle(message).await;
                        }
                    }
                    IDLE_DELAY
                }
                Err(e) => {
                    warn!("failed to poll commands: {e}");
                    ERROR_BACKOFF
                }
            };

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!("command server stopped");
    }

    async fn handle(&self, message: InboundMessage) {
        let Some(reply) = self.handler.respond(&message.sender, &message.text).await else {
            return;
        };

        if let Err(e) = self
            .handler
            .monitor
            .notifier()
            .send_message(&message.sender, &reply)
            .await
        {
            error!("failed to reply to {}: {e}", message.sender);
        }
    }

    pub fn offset(&self) -> Option<i64> {
        self.offset
    }
}

/// Handle for a running CommandServerActor
pub struct CommandServerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CommandServerHandle {
    /// Spawn a new command server
    ///
    /// The server stops when `cancel` or the handle's own shutdown fires.
    pub fn spawn(
        handler: CommandHandler,
        source: Arc<dyn UpdateSource>,
        poll_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Self {
        let cancel = cancel.child_token();
        let actor = CommandServerActor::new(handler, source, poll_timeout, cancel.clone());
        let task = tokio::spawn(actor.run());

        Self { cancel, task }
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the actor to exit
    pub async fn join(self) -> Result<()> {
        self.task.await.context("command server task failed")
    }
}
