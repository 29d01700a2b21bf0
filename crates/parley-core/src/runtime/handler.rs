//! Channel Message Handler
//!
//! Pulls inbound messages from a channel and dispatches each one on its own
//! task, so slow completions never hold up other messages. On shutdown the
//! loop stops receiving and waits for in-flight exchanges to finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::channel::Channel;

use super::orchestrator::MessageOrchestrator;

#[cfg(test)]
const STREAM_RECONNECT_DELAY: Duration = Duration::from_millis(20);
#[cfg(not(test))]
const STREAM_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Message handler configuration
#[derive(Debug, Clone)]
pub struct MessageHandlerConfig {
    /// How long shutdown waits for in-flight exchanges before abandoning them.
    pub shutdown_grace: Duration,
}

impl Default for MessageHandlerConfig {
    fn default() -> Self {
        Self {
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// Summary of a finished handler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandlerStats {
    /// Messages dispatched to the orchestrator.
    pub dispatched: u64,
    /// Exchanges still running when the shutdown grace period ran out.
    pub abandoned: usize,
}

/// Receive and dispatch messages until `shutdown` is cancelled.
///
/// The stream is reopened whenever it ends. Each message runs on a tracked
/// task; after cancellation no new messages are accepted and in-flight tasks
/// get `shutdown_grace` to finish. An abandoned exchange is dropped at an
/// await point, which is never between the two turns of a commit.
pub async fn run_message_handler(
    channel: Arc<dyn Channel>,
    orchestrator: Arc<MessageOrchestrator>,
    config: MessageHandlerConfig,
    shutdown: CancellationToken,
) -> HandlerStats {
    let tracker = TaskTracker::new();
    let mut stats = HandlerStats::default();

    info!("Listening for messages on {}", channel.name());

    'receive: while !shutdown.is_cancelled() {
        let Some(mut stream) = channel.start_receiving() else {
            warn!(
                "Failed to start message stream for {}, retrying in {:?}",
                channel.name(),
                STREAM_RECONNECT_DELAY
            );
            tokio::select! {
                _ = shutdown.cancelled() => break 'receive,
                _ = sleep(STREAM_RECONNECT_DELAY) => {}
            }
            continue 'receive;
        };

        loop {
            let message = tokio::select! {
                _ = shutdown.cancelled() => break 'receive,
                next = stream.next() => match next {
                    Some(message) => message,
                    None => {
                        warn!(
                            "Message stream ended for {}, restarting in {:?}",
                            channel.name(),
                            STREAM_RECONNECT_DELAY
                        );
                        break;
                    }
                },
            };

            debug!(
                "Handler received message {} from {}",
                message.id, message.conversation_id
            );
            stats.dispatched += 1;

            let orchestrator = orchestrator.clone();
            tracker.spawn(async move {
                match orchestrator.dispatch(&message).await {
                    Ok(outcome) => {
                        debug!("Message {} handled: {:?}", message.id, outcome);
                    }
                    Err(e) => {
                        error!(
                            "Error handling message {} from {}: {}",
                            message.id, message.conversation_id, e
                        );
                    }
                }
            });
        }

        tokio::select! {
            _ = shutdown.cancelled() => break 'receive,
            _ = sleep(STREAM_RECONNECT_DELAY) => {}
        }
    }

    tracker.close();
    let in_flight = tracker.len();
    if in_flight > 0 {
        info!("Waiting for {} in-flight exchanges to finish", in_flight);
    }

    if tokio::time::timeout(config.shutdown_grace, tracker.wait())
        .await
        .is_err()
    {
        stats.abandoned = tracker.len();
        warn!(
            "Shutdown grace period elapsed, abandoning {} exchanges",
            stats.abandoned
        );
    }

    info!(
        "Message handler stopped after {} messages",
        stats.dispatched
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthorizationGate, OperatorId};
    use crate::channel::mock::MockChannel;
    use crate::channel::{
        Channel, ChannelType, InboundMessage, InboundStream, OutboundMessage,
    };
    use crate::conversation::{ConversationStore, PromptAssembler};
    use crate::runtime::completion::{CompletionClient, CompletionError, LlmCompletionClient};
    use anyhow::Result as AnyhowResult;
    use async_trait::async_trait;
    use parley_ai::{Message, MockLlmClient, MockStep};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;
    use tokio::time::timeout;

    fn message(id: &str, content: &str) -> InboundMessage {
        InboundMessage::new(id, ChannelType::Telegram, "1", "1", content)
    }

    fn orchestrator(
        channel: Arc<dyn Channel>,
        llm: MockLlmClient,
        store: Arc<ConversationStore>,
    ) -> Arc<MessageOrchestrator> {
        Arc::new(MessageOrchestrator::new(
            AuthorizationGate::new(OperatorId::new(1).unwrap()),
            store,
            PromptAssembler::default(),
            Arc::new(LlmCompletionClient::new(Arc::new(llm))),
            channel,
        ))
    }

    /// Channel that yields one batch per `start_receiving` call, then ends the stream.
    struct ReconnectTestChannel {
        batches: Mutex<Vec<Vec<InboundMessage>>>,
        sent_messages: Arc<Mutex<Vec<OutboundMessage>>>,
        start_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Channel for ReconnectTestChannel {
        fn channel_type(&self) -> ChannelType {
            ChannelType::Telegram
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn send(&self, message: OutboundMessage) -> AnyhowResult<()> {
            self.sent_messages.lock().await.push(message);
            Ok(())
        }

        fn start_receiving(&self) -> Option<InboundStream> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            let batch = self.batches.try_lock().ok()?.pop().unwrap_or_default();
            Some(Box::pin(tokio_stream::iter(batch)))
        }
    }

    #[tokio::test]
    async fn test_handler_recovers_after_stream_ends() {
        let channel = Arc::new(ReconnectTestChannel {
            // popped from the back
            batches: Mutex::new(vec![
                vec![message("msg-2", "second")],
                vec![message("msg-1", "first")],
            ]),
            sent_messages: Arc::new(Mutex::new(Vec::new())),
            start_calls: Arc::new(AtomicUsize::new(0)),
        });
        let sent = channel.sent_messages.clone();
        let start_calls = channel.start_calls.clone();
        let store = Arc::new(ConversationStore::default());
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(run_message_handler(
            channel.clone(),
            orchestrator(channel, MockLlmClient::new("m"), store.clone()),
            MessageHandlerConfig::default(),
            shutdown.clone(),
        ));

        timeout(Duration::from_secs(2), async {
            loop {
                if sent.lock().await.len() >= 2 && start_calls.load(Ordering::SeqCst) >= 2 {
                    break;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("message handler should reconnect after stream end");

        shutdown.cancel();
        let stats = handle.await.unwrap();
        assert_eq!(stats.dispatched, 2);
        assert_eq!(store.len("1"), 4);
    }

    /// Completion that only returns once `parties` calls are in flight together.
    struct RendezvousCompletion {
        barrier: tokio::sync::Barrier,
    }

    #[async_trait]
    impl CompletionClient for RendezvousCompletion {
        async fn complete(&self, messages: Vec<Message>) -> Result<String, CompletionError> {
            self.barrier.wait().await;
            Ok(messages
                .last()
                .map(|m| format!("re: {}", m.content))
                .unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_messages_are_processed_concurrently() {
        let channel = Arc::new(MockChannel::new(ChannelType::Telegram));
        let tx = channel.enable_receiving();
        let store = Arc::new(ConversationStore::default());
        // Handled one at a time, the first completion would wait forever.
        let orchestrator = Arc::new(MessageOrchestrator::new(
            AuthorizationGate::new(OperatorId::new(1).unwrap()),
            store.clone(),
            PromptAssembler::default(),
            Arc::new(RendezvousCompletion {
                barrier: tokio::sync::Barrier::new(2),
            }),
            channel.clone(),
        ));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(run_message_handler(
            channel.clone(),
            orchestrator,
            MessageHandlerConfig::default(),
            shutdown.clone(),
        ));

        tx.send(message("a", "first")).unwrap();
        tx.send(message("b", "second")).unwrap();

        timeout(Duration::from_secs(5), async {
            while channel.get_sent_messages().await.len() < 2 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("both completions should be in flight together");

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(store.len("1"), 4);
    }

    #[tokio::test]
    async fn test_shutdown_drains_in_flight_exchanges() {
        let channel = Arc::new(MockChannel::new(ChannelType::Telegram));
        let tx = channel.enable_receiving();
        let llm = MockLlmClient::from_steps("m", vec![MockStep::text("late").with_delay(100)]);
        let store = Arc::new(ConversationStore::default());
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(run_message_handler(
            channel.clone(),
            orchestrator(channel.clone(), llm.clone(), store.clone()),
            MessageHandlerConfig::default(),
            shutdown.clone(),
        ));

        tx.send(message("a", "hello")).unwrap();
        timeout(Duration::from_secs(1), async {
            while llm.request_count().await == 0 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("completion should start");

        shutdown.cancel();
        let stats = handle.await.unwrap();

        assert_eq!(stats.abandoned, 0);
        assert_eq!(store.len("1"), 2);
        assert_eq!(channel.get_sent_messages().await[0].content, "late");
    }

    #[tokio::test]
    async fn test_grace_period_abandons_without_partial_history() {
        let channel = Arc::new(MockChannel::new(ChannelType::Telegram));
        let tx = channel.enable_receiving();
        let llm = MockLlmClient::from_steps("m", vec![MockStep::text("never").with_delay(5_000)]);
        let store = Arc::new(ConversationStore::default());
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(run_message_handler(
            channel.clone(),
            orchestrator(channel.clone(), llm.clone(), store.clone()),
            MessageHandlerConfig {
                shutdown_grace: Duration::from_millis(50),
            },
            shutdown.clone(),
        ));

        tx.send(message("a", "hello")).unwrap();
        timeout(Duration::from_secs(1), async {
            while llm.request_count().await == 0 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("completion should start");

        shutdown.cancel();
        let stats = handle.await.unwrap();

        assert_eq!(stats.abandoned, 1);
        assert!(store.is_empty("1"));
    }
}
