//! Telegram Bot API client
//!
//! Implements both directions of the channel:
//! - `sendMessage` / `sendDocument` for alerts and command replies
//! - `getUpdates` long-polling for operator commands

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, trace, warn};

use super::{InboundMessage, InboundUpdate, Notifier, UpdateSource};
use crate::error::TransportError;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

const SEND_MESSAGE_TIMEOUT: Duration = Duration::from_secs(10);
const SEND_DOCUMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time granted to the HTTP request on top of the long-poll duration.
const POLL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
    edited_message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

impl From<Update> for InboundUpdate {
    fn from(update: Update) -> Self {
        let message = update
            .message
            .or(update.edited_message)
            .map(|message| InboundMessage {
                sender: message.chat.id.to_string(),
                text: message.text.unwrap_or_default(),
            });

        InboundUpdate {
            update_id: update.update_id,
            message,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    /// `<api>/bot<token>`
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Self {
        Self::with_api_url(DEFAULT_API_URL, token)
    }

    pub fn with_api_url(api_url: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    /// Turn a non-success answer into a typed error.
    async fn check_response(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

// reqwest errors carry the request URL, which contains the bot token
fn request_error(err: reqwest::Error) -> TransportError {
    TransportError::Request(err.without_url())
}

#[async_trait]
impl Notifier for TelegramClient {
    #[instrument(skip(self, text))]
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        let payload = json!({ "chat_id": recipient, "text": text });

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(SEND_MESSAGE_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(request_error)?;

        Self::check_response(response).await?;
        debug!("message delivered");
        Ok(())
    }

    #[instrument(skip(self, caption))]
    async fn send_document(
        &self,
        recipient: &str,
        path: &Path,
        caption: &str,
    ) -> Result<(), TransportError> {
        let content = match tokio::fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("attachment {} does not exist", path.display());
                return Err(TransportError::MissingAttachment(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| String::from("document"));

        let form = Form::new()
            .text("chat_id", recipient.to_string())
            .text("caption", caption.to_string())
            .part("document", Part::bytes(content).file_name(file_name));

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .timeout(SEND_DOCUMENT_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(request_error)?;

        Self::check_response(response).await?;
        debug!("document delivered");
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    #[instrument(skip(self))]
    async fn poll_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<InboundUpdate>, TransportError> {
        let mut query = vec![("timeout", timeout.as_secs().to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .timeout(timeout + POLL_GRACE)
            .query(&query)
            .send()
            .await
            .map_err(request_error)?;

        let response = Self::check_response(response).await?;
        let payload: ApiResponse<Vec<Update>> = response.json().await.map_err(request_error)?;

        if !payload.ok {
            return Err(TransportError::Api(
                payload
                    .description
                    .unwrap_or_else(|| String::from("getUpdates returned ok=false")),
            ));
        }

        let updates = payload.result.unwrap_or_default();
        trace!("received {} updates", updates.len());

        Ok(updates.into_iter().map(InboundUpdate::from).collect())
    }
}
