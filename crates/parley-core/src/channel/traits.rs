//! Channel Trait Definitions
//!
//! The seam between the relay and a chat transport.

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use super::types::{ChannelType, InboundMessage, OutboundMessage};

/// Stream of inbound messages produced by a channel.
pub type InboundStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// Communication channel that can deliver replies and yield inbound messages.
///
/// # Example
///
/// ```ignore
/// struct MyChannel { /* ... */ }
///
/// #[async_trait]
/// impl Channel for MyChannel {
///     fn channel_type(&self) -> ChannelType {
///         ChannelType::Telegram
///     }
///
///     fn is_configured(&self) -> bool {
///         !self.token.is_empty()
///     }
///
///     async fn send(&self, message: OutboundMessage) -> Result<()> {
///         // Send message via API
///         Ok(())
///     }
///
///     fn start_receiving(&self) -> Option<InboundStream> {
///         None
///     }
/// }
/// ```
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get channel type
    fn channel_type(&self) -> ChannelType;

    /// Get channel display name
    fn name(&self) -> &str {
        self.channel_type().display_name()
    }

    /// Check if channel is properly configured
    fn is_configured(&self) -> bool;

    /// Send a message to the channel
    async fn send(&self, message: OutboundMessage) -> Result<()>;

    /// Send a simple text message
    async fn send_text(&self, conversation_id: &str, text: &str) -> Result<()> {
        self.send(OutboundMessage::new(conversation_id, text)).await
    }

    /// Show a "typing" hint in the conversation. Best effort.
    async fn send_typing(&self, conversation_id: &str) -> Result<()> {
        let _ = conversation_id;
        Ok(())
    }

    /// Start receiving messages (returns None if channel doesn't support receiving)
    ///
    /// Messages are yielded as they arrive. The stream ends when the
    /// underlying receiver stops; callers may call this again to reconnect.
    fn start_receiving(&self) -> Option<InboundStream>;
}
