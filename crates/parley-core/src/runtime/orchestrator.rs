//! Message Orchestrator - runs one inbound message through the relay.
//!
//! Authorization, command handling, history snapshot, prompt assembly,
//! completion, commit and reply happen here, once per inbound message.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::auth::AuthorizationGate;
use crate::channel::{Channel, InboundMessage, OutboundMessage};
use crate::conversation::{ConversationStore, Exchange, PromptAssembler};

use super::commands::{BotCommand, handle_command};
use super::completion::CompletionClient;

/// Sent (as Markdown) to anyone who is not the operator.
pub const REJECTION_MESSAGE: &str = "Sorry, this bot is private. You are not authorized to use it.";

/// Sent and stored in place of a reply when the completion fails.
pub const COMPLETION_FAILED_MESSAGE: &str =
    "⚠️ Sorry, something went wrong while contacting the AI service.";

/// Configuration for the MessageOrchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Whether to send a typing indicator before calling the completion service.
    pub send_typing_indicator: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            send_typing_indicator: true,
        }
    }
}

/// Terminal state of one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Sender is not the operator; rejection sent.
    Rejected,
    /// Empty or whitespace-only text; nothing sent or stored.
    Discarded,
    /// A known command was answered.
    Command(BotCommand),
    /// Unknown command; nothing sent.
    Ignored,
    /// The completion reply was stored and sent.
    Completed,
    /// The completion failed; the apology was stored and sent.
    Degraded,
}

/// Relays operator messages to the completion service and back.
pub struct MessageOrchestrator {
    gate: AuthorizationGate,
    store: Arc<ConversationStore>,
    prompt: PromptAssembler,
    completion: Arc<dyn CompletionClient>,
    channel: Arc<dyn Channel>,
    config: OrchestratorConfig,
}

impl MessageOrchestrator {
    pub fn new(
        gate: AuthorizationGate,
        store: Arc<ConversationStore>,
        prompt: PromptAssembler,
        completion: Arc<dyn CompletionClient>,
        channel: Arc<dyn Channel>,
    ) -> Self {
        Self {
            gate,
            store,
            prompt,
            completion,
            channel,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Process one inbound message to a terminal outcome.
    ///
    /// Errors are reserved for transport failures while sending. A failed
    /// send after a completion never undoes the stored exchange.
    pub async fn dispatch(&self, message: &InboundMessage) -> Result<ExchangeOutcome> {
        // 1. Authorization
        if !self.gate.is_authorized(&message.sender_id) {
            info!(
                "Rejected message {} from unauthorized sender {}",
                message.id, message.sender_id
            );
            self.channel
                .send(
                    OutboundMessage::markdown(&message.conversation_id, REJECTION_MESSAGE)
                        .with_reply_to(&message.id),
                )
                .await?;
            return Ok(ExchangeOutcome::Rejected);
        }

        // 2. Commands never reach history or the completion service
        if message.is_command() {
            let outcome =
                match handle_command(self.channel.as_ref(), &self.store, message).await? {
                    Some(command) => ExchangeOutcome::Command(command),
                    None => ExchangeOutcome::Ignored,
                };
            return Ok(outcome);
        }

        let text = message.content.trim();
        if text.is_empty() {
            debug!("Discarding empty message {}", message.id);
            return Ok(ExchangeOutcome::Discarded);
        }

        // 3. Snapshot history and assemble the prompt. The store lock is
        //    released before the completion call.
        let history = self.store.read(&message.conversation_id);
        let prompt = match self.prompt.build(&history, text) {
            Ok(prompt) => prompt,
            Err(e) => {
                debug!("Discarding message {}: {}", message.id, e);
                return Ok(ExchangeOutcome::Discarded);
            }
        };

        info!(
            "Processing message {} for conversation {} ({} history turns)",
            message.id,
            message.conversation_id,
            history.len()
        );

        if self.config.send_typing_indicator
            && let Err(e) = self.channel.send_typing(&message.conversation_id).await
        {
            warn!("Failed to send typing indicator: {}", e);
        }

        // 4. Completion
        let (reply, outcome) = match self.completion.complete(prompt).await {
            Ok(reply) => (reply, ExchangeOutcome::Completed),
            Err(e) => {
                error!(
                    "Completion failed for conversation {}: {}",
                    message.conversation_id, e
                );
                (
                    COMPLETION_FAILED_MESSAGE.to_string(),
                    ExchangeOutcome::Degraded,
                )
            }
        };

        // 5. Commit against the latest history
        self.store.append_exchange(
            &message.conversation_id,
            Exchange::new(text, reply.as_str()),
        );

        // 6. Reply
        self.channel
            .send(
                OutboundMessage::markdown(&message.conversation_id, reply)
                    .with_reply_to(&message.id),
            )
            .await?;

        debug!("Message {} finished as {:?}", message.id, outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::OperatorId;
    use crate::channel::mock::MockChannel;
    use crate::channel::{ChannelType, ParseMode};
    use crate::conversation::Turn;
    use crate::runtime::commands::START_MESSAGE;
    use crate::runtime::completion::LlmCompletionClient;
    use parley_ai::{Message, MockLlmClient, MockStep};

    const OPERATOR: i64 = 12345;

    struct Harness {
        orchestrator: MessageOrchestrator,
        channel: Arc<MockChannel>,
        llm: MockLlmClient,
        store: Arc<ConversationStore>,
    }

    fn harness(steps: Vec<MockStep>) -> Harness {
        let channel = Arc::new(MockChannel::new(ChannelType::Telegram));
        let llm = MockLlmClient::from_steps("mock-model", steps);
        let store = Arc::new(ConversationStore::default());
        let orchestrator = MessageOrchestrator::new(
            AuthorizationGate::new(OperatorId::new(OPERATOR).unwrap()),
            store.clone(),
            PromptAssembler::new("sys"),
            Arc::new(LlmCompletionClient::new(Arc::new(llm.clone()))),
            channel.clone(),
        );
        Harness {
            orchestrator,
            channel,
            llm,
            store,
        }
    }

    fn from(sender: i64, content: &str) -> InboundMessage {
        InboundMessage::new(
            "msg-1",
            ChannelType::Telegram,
            sender.to_string(),
            sender.to_string(),
            content,
        )
    }

    #[tokio::test]
    async fn test_completed_exchange_is_stored_and_sent() {
        let h = harness(vec![MockStep::text("Hi!")]);

        let outcome = h.orchestrator.dispatch(&from(OPERATOR, " Hello ")).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Completed);
        assert_eq!(
            h.store.read("12345"),
            vec![Turn::user("Hello"), Turn::assistant("Hi!")]
        );
        let sent = h.channel.get_sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, "Hi!");
        assert_eq!(sent[0].parse_mode, ParseMode::Markdown);
        assert_eq!(sent[0].reply_to.as_deref(), Some("msg-1"));
        assert_eq!(h.channel.typing_conversations().await, vec!["12345"]);
        assert_eq!(
            h.llm.requests().await,
            vec![vec![Message::system("sys"), Message::user("Hello")]]
        );
    }

    #[tokio::test]
    async fn test_failure_degrades_to_apology() {
        let h = harness(vec![MockStep::timeout(1)]);

        let outcome = h.orchestrator.dispatch(&from(OPERATOR, "Hello")).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Degraded);
        assert_eq!(
            h.store.read("12345")[1],
            Turn::assistant(COMPLETION_FAILED_MESSAGE)
        );
        let sent = h.channel.get_sent_messages().await;
        assert_eq!(sent[0].content, COMPLETION_FAILED_MESSAGE);
        assert!(!sent[0].content.contains("timeout"));
    }

    #[tokio::test]
    async fn test_unauthorized_sender_is_rejected_without_side_effects() {
        let h = harness(vec![]);

        let outcome = h.orchestrator.dispatch(&from(999, "Hello")).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Rejected);
        assert_eq!(h.llm.request_count().await, 0);
        assert_eq!(h.store.conversation_count(), 0);
        let sent = h.channel.get_sent_messages().await;
        assert_eq!(sent[0].content, REJECTION_MESSAGE);
        assert_eq!(sent[0].parse_mode, ParseMode::Markdown);
    }

    #[tokio::test]
    async fn test_unauthorized_commands_are_rejected() {
        let h = harness(vec![]);

        let outcome = h.orchestrator.dispatch(&from(999, "/start")).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Rejected);
        assert_eq!(
            h.channel.get_sent_messages().await[0].content,
            REJECTION_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_empty_message_is_discarded() {
        let h = harness(vec![]);

        let outcome = h.orchestrator.dispatch(&from(OPERATOR, "  \n ")).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Discarded);
        assert!(h.channel.get_sent_messages().await.is_empty());
        assert!(h.store.is_empty("12345"));
        assert_eq!(h.llm.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_commands_skip_completion() {
        let h = harness(vec![]);

        let start = h.orchestrator.dispatch(&from(OPERATOR, "/start")).await.unwrap();
        let unknown = h.orchestrator.dispatch(&from(OPERATOR, "/nope")).await.unwrap();

        assert_eq!(start, ExchangeOutcome::Command(BotCommand::Start));
        assert_eq!(unknown, ExchangeOutcome::Ignored);
        assert_eq!(h.llm.request_count().await, 0);
        assert!(h.store.is_empty("12345"));
        let sent = h.channel.get_sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, START_MESSAGE);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_committed_exchange() {
        let h = harness(vec![MockStep::text("Hi!")]);
        h.channel.fail_sends();

        let result = h.orchestrator.dispatch(&from(OPERATOR, "Hello")).await;

        assert!(result.is_err());
        assert_eq!(h.store.len("12345"), 2);
    }

    #[tokio::test]
    async fn test_typing_indicator_can_be_disabled() {
        let h = harness(vec![]);
        let orchestrator = h.orchestrator.with_config(OrchestratorConfig {
            send_typing_indicator: false,
        });

        orchestrator.dispatch(&from(OPERATOR, "Hello")).await.unwrap();

        assert!(h.channel.typing_conversations().await.is_empty());
    }
}
