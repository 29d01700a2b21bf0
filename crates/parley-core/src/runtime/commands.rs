//! Bot command handling (/start, /help, /reset).
//!
//! Commands answer with fixed plain-text replies and never reach the LLM.
//! Unknown commands are ignored.

use anyhow::Result;
use tracing::debug;

use crate::channel::{Channel, InboundMessage, OutboundMessage};
use crate::conversation::ConversationStore;

pub const START_MESSAGE: &str =
    "👋 Hello! I am your personal AI assistant, ready to help you with anything.";
pub const HELP_MESSAGE: &str = "I can answer your questions, write code, brainstorm ideas, and more. Just send me a message!";
pub const RESET_MESSAGE: &str = "🧹 Conversation history cleared.";

/// Commands the relay understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Reset,
}

impl BotCommand {
    /// Parse a command name as returned by [`InboundMessage::command_name`].
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "reset" | "clear" => Some(Self::Reset),
            _ => None,
        }
    }

    pub fn reply_text(&self) -> &'static str {
        match self {
            Self::Start => START_MESSAGE,
            Self::Help => HELP_MESSAGE,
            Self::Reset => RESET_MESSAGE,
        }
    }
}

/// Handle a command message from an authorized sender.
///
/// Returns the command that was answered, or None if it was not recognized.
pub async fn handle_command(
    channel: &dyn Channel,
    store: &ConversationStore,
    message: &InboundMessage,
) -> Result<Option<BotCommand>> {
    let Some(command) = message.command_name().as_deref().and_then(BotCommand::parse) else {
        debug!(
            "Ignoring unknown command {:?} from {}",
            message.content.split_whitespace().next().unwrap_or_default(),
            message.sender_id
        );
        return Ok(None);
    };

    debug!("Handling command {:?} from {}", command, message.sender_id);

    if command == BotCommand::Reset {
        store.clear(&message.conversation_id);
    }

    channel
        .send(
            OutboundMessage::new(&message.conversation_id, command.reply_text())
                .with_reply_to(&message.id),
        )
        .await?;
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelType;
    use crate::channel::ParseMode;
    use crate::channel::mock::MockChannel;
    use crate::conversation::Exchange;

    fn command(content: &str) -> InboundMessage {
        InboundMessage::new("msg-1", ChannelType::Telegram, "42", "42", content)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(BotCommand::parse("start"), Some(BotCommand::Start));
        assert_eq!(BotCommand::parse("help"), Some(BotCommand::Help));
        assert_eq!(BotCommand::parse("reset"), Some(BotCommand::Reset));
        assert_eq!(BotCommand::parse("clear"), Some(BotCommand::Reset));
        assert_eq!(BotCommand::parse("weather"), None);
    }

    #[tokio::test]
    async fn test_start_and_help_reply_in_plain_text() {
        let channel = MockChannel::new(ChannelType::Telegram);
        let store = ConversationStore::default();

        let start = handle_command(&channel, &store, &command("/start"))
            .await
            .unwrap();
        let help = handle_command(&channel, &store, &command("/help@parley_bot"))
            .await
            .unwrap();

        assert_eq!(start, Some(BotCommand::Start));
        assert_eq!(help, Some(BotCommand::Help));

        let sent = channel.get_sent_messages().await;
        assert_eq!(sent[0].content, START_MESSAGE);
        assert_eq!(sent[1].content, HELP_MESSAGE);
        assert!(sent.iter().all(|m| m.parse_mode == ParseMode::Plain));
        assert!(sent.iter().all(|m| m.reply_to.as_deref() == Some("msg-1")));
    }

    #[tokio::test]
    async fn test_commands_do_not_touch_history_except_reset() {
        let channel = MockChannel::new(ChannelType::Telegram);
        let store = ConversationStore::default();
        store.append_exchange("42", Exchange::new("Hello", "Hi!"));

        handle_command(&channel, &store, &command("/help")).await.unwrap();
        assert_eq!(store.len("42"), 2);

        handle_command(&channel, &store, &command("/reset")).await.unwrap();
        assert!(store.is_empty("42"));
        assert_eq!(
            channel.get_sent_messages().await.last().unwrap().content,
            RESET_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_unknown_command_is_ignored() {
        let channel = MockChannel::new(ChannelType::Telegram);
        let store = ConversationStore::default();

        let handled = handle_command(&channel, &store, &command("/weather tomorrow"))
            .await
            .unwrap();

        assert_eq!(handled, None);
        assert!(channel.get_sent_messages().await.is_empty());
    }
}
