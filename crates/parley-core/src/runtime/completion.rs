//! Completion seam between the relay and an LLM provider.

use std::sync::Arc;

use async_trait::async_trait;
use parley_ai::{AiError, CompletionRequest, FinishReason, LlmClient, Message};
use thiserror::Error;
use tracing::debug;

/// Why a completion produced no usable reply.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Backend(#[from] AiError),

    #[error("completion returned no content (finish reason: {0:?})")]
    EmptyReply(FinishReason),
}

/// Produces the assistant reply for an assembled prompt.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the trimmed, non-empty reply text.
    async fn complete(&self, messages: Vec<Message>) -> Result<String, CompletionError>;
}

/// [`CompletionClient`] backed by any [`LlmClient`].
pub struct LlmCompletionClient {
    llm: Arc<dyn LlmClient>,
}

impl LlmCompletionClient {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl CompletionClient for LlmCompletionClient {
    async fn complete(&self, messages: Vec<Message>) -> Result<String, CompletionError> {
        debug!(
            "Requesting completion from {}/{} with {} messages",
            self.llm.provider(),
            self.llm.model(),
            messages.len()
        );

        let response = self.llm.complete(CompletionRequest::new(messages)).await?;

        if let Some(usage) = &response.usage {
            debug!(
                "Completion used {} tokens ({} prompt, {} completion)",
                usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
        }

        match response.content.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(CompletionError::EmptyReply(response.finish_reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_ai::{MockLlmClient, MockStep};

    fn client(steps: Vec<MockStep>) -> (MockLlmClient, LlmCompletionClient) {
        let mock = MockLlmClient::from_steps("mock-model", steps);
        let adapter = LlmCompletionClient::new(Arc::new(mock.clone()));
        (mock, adapter)
    }

    #[tokio::test]
    async fn test_reply_is_trimmed() {
        let (mock, adapter) = client(vec![MockStep::text("  Hi there!\n")]);

        let reply = adapter
            .complete(vec![Message::system("sys"), Message::user("Hello")])
            .await
            .unwrap();

        assert_eq!(reply, "Hi there!");
        assert_eq!(
            mock.requests().await,
            vec![vec![Message::system("sys"), Message::user("Hello")]]
        );
    }

    #[tokio::test]
    async fn test_blank_or_missing_content_is_an_error() {
        let (_, adapter) = client(vec![MockStep::text("   "), MockStep::empty()]);

        for _ in 0..2 {
            let err = adapter.complete(vec![Message::user("x")]).await.unwrap_err();
            assert!(matches!(err, CompletionError::EmptyReply(FinishReason::Stop)));
        }
    }

    #[tokio::test]
    async fn test_backend_failure_is_wrapped() {
        let (_, adapter) = client(vec![MockStep::error("rate limit exceeded")]);

        let err = adapter.complete(vec![Message::user("x")]).await.unwrap_err();

        assert!(matches!(err, CompletionError::Backend(AiError::Llm(_))));
        assert!(err.to_string().contains("rate limit"));
    }
}
