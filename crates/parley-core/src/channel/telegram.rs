//! Telegram Channel Implementation
//!
//! Sends replies and receives text messages through the Telegram Bot API
//! using long-polling.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::chunk::{TELEGRAM_MAX_LEN, chunk_markdown};
use super::traits::{Channel, InboundStream};
use super::types::{ChannelType, InboundMessage, OutboundMessage, ParseMode};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
/// Default timeout for Telegram API calls (seconds)
const API_TIMEOUT_SECS: u64 = 30;

#[cfg(not(test))]
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);
#[cfg(test)]
const POLL_ERROR_BACKOFF: Duration = Duration::from_millis(20);

/// Telegram channel configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub bot_token: String,
    /// Long-poll timeout in seconds (default: 30)
    #[serde(default = "default_polling_timeout")]
    pub polling_timeout: u32,
    /// Bot API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_polling_timeout() -> u32 {
    30
}

fn default_api_base() -> String {
    TELEGRAM_API_BASE.to_string()
}

impl TelegramConfig {
    /// Create a new config with just the bot token
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            polling_timeout: default_polling_timeout(),
            api_base: default_api_base(),
        }
    }

    /// Set polling timeout
    pub fn with_polling_timeout(mut self, timeout: u32) -> Self {
        self.polling_timeout = timeout;
        self
    }

    /// Point the channel at a different Bot API server
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[redacted]")
            .field("polling_timeout", &self.polling_timeout)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Error reported by the Bot API (`ok: false` or a non-2xx status).
#[derive(Debug, thiserror::Error)]
#[error("Telegram API error ({status}): {description}")]
pub struct TelegramApiError {
    pub status: u16,
    pub description: String,
}

impl TelegramApiError {
    /// Telegram rejected the message's Markdown entities.
    pub fn is_markdown_rejection(&self) -> bool {
        self.description.contains("can't parse entities")
    }

    /// The bot token was refused (401) or names no bot (404).
    pub fn is_invalid_token(&self) -> bool {
        matches!(self.status, 401 | 404)
    }
}

/// Where a sendMessage call goes.
struct ChatTarget<'a> {
    chat_id: &'a str,
    thread_id: Option<i64>,
    reply_to: Option<i64>,
}

/// Telegram channel implementation
#[derive(Clone)]
pub struct TelegramChannel {
    config: TelegramConfig,
    client: Client,
    /// Whether polling is active
    polling_active: Arc<AtomicBool>,
    /// Last update ID for long-polling
    last_update_id: Arc<AtomicI64>,
}

impl TelegramChannel {
    /// Parse conversation_id into (chat_id, thread_id)
    /// Format: "chat_id" or "chat_id:thread_id"
    fn parse_conversation_id(conversation_id: &str) -> (String, Option<i64>) {
        match conversation_id.split_once(':') {
            Some((chat_id, thread)) => (chat_id.to_string(), thread.parse::<i64>().ok()),
            None => (conversation_id.to_string(), None),
        }
    }

    fn build_conversation_id(chat_id: i64, message_thread_id: Option<i64>) -> String {
        match message_thread_id {
            Some(thread_id) => format!("{}:{}", chat_id, thread_id),
            None => chat_id.to_string(),
        }
    }

    fn build_message_id(message_id: i64) -> String {
        format!("tg_{}", message_id)
    }

    /// Telegram message id from an `InboundMessage::id`
    fn parse_message_id(id: &str) -> Option<i64> {
        id.strip_prefix("tg_")?.parse().ok()
    }

    /// Create a new Telegram channel
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: parley_ai::build_http_client(),
            polling_active: Arc::new(AtomicBool::new(false)),
            last_update_id: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Create with just bot token
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self::new(TelegramConfig::new(bot_token))
    }

    /// Return current last processed update ID.
    pub fn last_update_id(&self) -> i64 {
        self.last_update_id.load(Ordering::SeqCst)
    }

    pub fn is_polling(&self) -> bool {
        self.polling_active.load(Ordering::SeqCst)
    }

    /// Ask the polling task to exit after its current long-poll.
    pub fn stop_polling(&self) {
        self.polling_active.store(false, Ordering::SeqCst);
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base, self.config.bot_token, method
        )
    }

    /// POST a Bot API method and unwrap the `result` field.
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(params)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: Option<TelegramResponse<T>> = serde_json::from_str(&body).ok();

        match parsed {
            Some(TelegramResponse {
                ok: true,
                result: Some(result),
                ..
            }) if status.is_success() => Ok(result),
            Some(TelegramResponse {
                ok: true,
                result: None,
                ..
            }) if status.is_success() => Err(anyhow!("Telegram returned ok but no result")),
            Some(api) => Err(TelegramApiError {
                status: status.as_u16(),
                description: api.description.unwrap_or_default(),
            }
            .into()),
            None => Err(TelegramApiError {
                status: status.as_u16(),
                description: body,
            }
            .into()),
        }
    }

    /// Send one message via Telegram API
    async fn send_message(
        &self,
        target: &ChatTarget<'_>,
        text: &str,
        parse_mode: ParseMode,
    ) -> Result<TelegramMessageResponse> {
        let mut params = serde_json::json!({
            "chat_id": target.chat_id,
            "text": text,
        });

        if let Some(mode) = parse_mode.telegram_value() {
            params["parse_mode"] = serde_json::Value::String(mode.to_string());
        }

        // Add message_thread_id for Telegram forum/supergroup topics
        if let Some(thread_id) = target.thread_id {
            params["message_thread_id"] = serde_json::Value::Number(thread_id.into());
        }

        if let Some(message_id) = target.reply_to {
            params["reply_parameters"] = serde_json::json!({
                "message_id": message_id,
                "allow_sending_without_reply": true,
            });
        }

        self.call(
            "sendMessage",
            &params,
            Duration::from_secs(API_TIMEOUT_SECS),
        )
        .await
    }

    /// Send one chunk, retrying as plain text if Telegram rejects the Markdown.
    async fn send_chunk(
        &self,
        target: &ChatTarget<'_>,
        text: &str,
        parse_mode: ParseMode,
    ) -> Result<()> {
        match self.send_message(target, text, parse_mode).await {
            Ok(_) => Ok(()),
            Err(e)
                if parse_mode != ParseMode::Plain
                    && e
                        .downcast_ref::<TelegramApiError>()
                        .is_some_and(TelegramApiError::is_markdown_rejection) =>
            {
                warn!(
                    "Markdown rejected for chat {}, resending as plain text: {}",
                    target.chat_id, e
                );
                self.send_message(target, text, ParseMode::Plain)
                    .await
                    .map(|_| ())
            }
            Err(e) => Err(e),
        }
    }

    /// Poll for updates using long-polling
    async fn poll_updates(&self) -> Result<Vec<TelegramUpdate>> {
        let offset = self.last_update_id.load(Ordering::SeqCst);
        let params = serde_json::json!({
            "offset": if offset > 0 { offset + 1 } else { 0 },
            "timeout": self.config.polling_timeout,
            "allowed_updates": ["message"],
        });

        let updates: Vec<TelegramUpdate> = self
            .call(
                "getUpdates",
                &params,
                Duration::from_secs(self.config.polling_timeout as u64 + 10),
            )
            .await?;

        if let Some(last) = updates.last() {
            self.last_update_id.store(last.update_id, Ordering::SeqCst);
        }

        Ok(updates)
    }

    /// Convert Telegram update to InboundMessage. Only text messages with a
    /// known sender are relayed.
    fn convert_update(update: TelegramUpdate) -> Option<InboundMessage> {
        let message = update.message?;
        let from = message.from?;
        let text = message.text?;
        let conversation_id =
            Self::build_conversation_id(message.chat.id, message.message_thread_id);

        let sender_name = from.username.clone().or_else(|| {
            let full = format!(
                "{} {}",
                from.first_name.as_deref().unwrap_or(""),
                from.last_name.as_deref().unwrap_or("")
            );
            let full = full.trim();
            (!full.is_empty()).then(|| full.to_string())
        });

        let metadata = serde_json::json!({
            "chat_type": message.chat.r#type,
            "update_id": update.update_id,
        });

        let mut inbound = InboundMessage::new(
            Self::build_message_id(message.message_id),
            ChannelType::Telegram,
            from.id.to_string(),
            conversation_id,
            text,
        )
        .with_metadata(metadata);
        if let Some(name) = sender_name {
            inbound = inbound.with_sender_name(name);
        }
        Some(inbound)
    }

    /// Test the connection by calling getMe
    pub async fn test_connection(&self) -> Result<TelegramUser> {
        self.call(
            "getMe",
            &serde_json::json!({}),
            Duration::from_secs(API_TIMEOUT_SECS),
        )
        .await
    }

    async fn polling_loop(self, tx: mpsc::UnboundedSender<InboundMessage>) {
        info!("Starting Telegram polling");

        while self.polling_active.load(Ordering::SeqCst) && !tx.is_closed() {
            match self.poll_updates().await {
                Ok(updates) => {
                    for update in updates {
                        let Some(message) = Self::convert_update(update) else {
                            continue;
                        };
                        debug!(
                            "Received Telegram message: {} from {}",
                            message.id, message.sender_id
                        );
                        if tx.send(message).is_err() {
                            warn!("Message receiver dropped, stopping polling");
                            self.polling_active.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!("Telegram polling error: {}", e);
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                }
            }
        }

        self.polling_active.store(false, Ordering::SeqCst);
        info!("Telegram polling stopped");
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Telegram
    }

    fn is_configured(&self) -> bool {
        !self.config.bot_token.is_empty()
    }

    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let (chat_id, thread_id) = Self::parse_conversation_id(&message.conversation_id);
        let mut target = ChatTarget {
            chat_id: &chat_id,
            thread_id,
            reply_to: message.reply_to.as_deref().and_then(Self::parse_message_id),
        };

        for chunk in chunk_markdown(&message.content, TELEGRAM_MAX_LEN) {
            self.send_chunk(&target, &chunk, message.parse_mode).await?;
            // only the first chunk quotes the question
            target.reply_to = None;
        }

        Ok(())
    }

    async fn send_typing(&self, conversation_id: &str) -> Result<()> {
        let (chat_id, thread_id) = Self::parse_conversation_id(conversation_id);
        let mut params = serde_json::json!({
            "chat_id": chat_id,
            "action": "typing",
        });
        if let Some(thread_id) = thread_id {
            params["message_thread_id"] = serde_json::Value::Number(thread_id.into());
        }

        let _: bool = self
            .call(
                "sendChatAction",
                &params,
                Duration::from_secs(API_TIMEOUT_SECS),
            )
            .await?;
        debug!("Sent typing indicator to {}", chat_id);
        Ok(())
    }

    fn start_receiving(&self) -> Option<InboundStream> {
        if !self.is_configured() {
            return None;
        }
        if self.polling_active.swap(true, Ordering::SeqCst) {
            warn!("Telegram polling already active");
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.clone().polling_loop(tx));

        Some(Box::pin(
            tokio_stream::wrappers::UnboundedReceiverStream::new(rx),
        ))
    }
}

// ============================================================================
// Telegram API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    from: Option<TelegramUser>,
    chat: TelegramChat,
    message_thread_id: Option<i64>,
    text: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
    r#type: String,
}

#[derive(Debug, Deserialize)]
struct TelegramMessageResponse {
    #[allow(dead_code)]
    message_id: i64,
}
