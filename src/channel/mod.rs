//! Alert and command channel abstraction
//!
//! Outbound notifications and inbound operator messages travel over the same
//! channel. The traits keep the state machine and command handling independent
//! of the concrete transport; [`telegram::TelegramClient`] implements both.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

pub mod telegram;

/// One entry of the inbound stream.
///
/// Every update advances the cursor, even when it carries no text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    /// Monotonic cursor of the message source
    pub update_id: i64,
    pub message: Option<InboundMessage>,
}

/// An inbound operator message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Channel identifier of the sender (matches [`Recipient::id`](crate::Recipient))
    pub sender: String,
    pub text: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), TransportError>;

    async fn send_document(
        &self,
        recipient: &str,
        path: &Path,
        caption: &str,
    ) -> Result<(), TransportError>;
}

#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Long-poll for messages at or after `offset`, waiting at most `timeout`.
    async fn poll_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<InboundUpdate>, TransportError>;
}
