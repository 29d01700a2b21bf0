//! Parley AI - LLM completion clients
//!
//! This crate provides:
//! - A provider-agnostic chat completion trait (`LlmClient`)
//! - An OpenAI-compatible chat completions client with retry/backoff
//! - A scripted mock client for tests (`test-utils` feature)

pub mod error;
mod http_client;
pub mod llm;

// Re-export commonly used types
pub use error::{AiError, Result};
pub use http_client::build_http_client;
pub use llm::{
    CompletionRequest, CompletionResponse, FinishReason, LlmClient, LlmRetryConfig, Message,
    OpenAIClient, Role, TokenUsage,
};

#[cfg(any(test, feature = "test-utils"))]
pub use llm::{MockLlmClient, MockStep, MockStepKind};
