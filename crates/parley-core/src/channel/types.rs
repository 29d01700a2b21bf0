//! Channel Types
//!
//! Transport-neutral message types exchanged between a channel and the relay.

use serde::{Deserialize, Serialize};

/// Channel type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Telegram,
}

impl ChannelType {
    /// Display name for logs
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Telegram => "Telegram",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Formatting applied to an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    #[default]
    Plain,
    Markdown,
}

impl ParseMode {
    /// Value for Telegram's `parse_mode` parameter (None = plain text)
    pub fn telegram_value(&self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::Markdown => Some("Markdown"),
        }
    }
}

/// Inbound message from a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Unique message ID
    pub id: String,
    /// Channel this message came from
    pub channel_type: ChannelType,
    /// Sender identifier (user ID in the channel)
    pub sender_id: String,
    /// Sender display name (if available)
    pub sender_name: Option<String>,
    /// Conversation identifier (chat_id or chat_id:thread_id)
    pub conversation_id: String,
    /// Message content
    pub content: String,
    /// Timestamp (milliseconds since epoch)
    pub timestamp: i64,
    /// Channel-specific metadata
    pub metadata: Option<serde_json::Value>,
}

impl InboundMessage {
    /// Prefix that marks a command message
    pub const COMMAND_PREFIX: char = '/';

    /// Create a new inbound message
    pub fn new(
        id: impl Into<String>,
        channel_type: ChannelType,
        sender_id: impl Into<String>,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_type,
            sender_id: sender_id.into(),
            sender_name: None,
            conversation_id: conversation_id.into(),
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            metadata: None,
        }
    }

    /// Set sender name
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Set metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_command(&self) -> bool {
        self.content.trim_start().starts_with(Self::COMMAND_PREFIX)
    }

    /// Command name without prefix or `@botname` suffix, lower-cased.
    ///
    /// `"/Help@my_bot extra"` yields `Some("help")`. Returns None for
    /// non-commands and for a bare prefix.
    pub fn command_name(&self) -> Option<String> {
        let word = self.content.split_whitespace().next()?;
        let name = word.strip_prefix(Self::COMMAND_PREFIX)?;
        let name = name.split('@').next().unwrap_or_default();
        if name.is_empty() {
            None
        } else {
            Some(name.to_lowercase())
        }
    }
}

/// Outbound message to a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Conversation identifier
    pub conversation_id: String,
    /// Message content
    pub content: String,
    /// Formatting mode
    pub parse_mode: ParseMode,
    /// Inbound message id this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    /// Create a new plain-text outbound message
    pub fn new(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            content: content.into(),
            parse_mode: ParseMode::Plain,
            reply_to: None,
        }
    }

    /// Create a markdown-formatted outbound message
    pub fn markdown(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, content).with_parse_mode(ParseMode::Markdown)
    }

    /// Set parse mode
    pub fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    /// Quote the given inbound message
    pub fn with_reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }
}
