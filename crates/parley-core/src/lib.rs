//! Parley Core - private Telegram-to-LLM relay
//!
//! One operator talks to an LLM through a Telegram bot. This crate holds
//! the pieces: operator authorization, bounded per-conversation history,
//! prompt assembly, the completion seam, the Telegram channel, and the
//! runtime that ties them together.

pub mod auth;
pub mod channel;
pub mod config;
pub mod conversation;
pub mod runtime;

pub use auth::{AuthorizationGate, OperatorId};
pub use config::{ConfigError, RelayConfig, RelaySettings};
pub use conversation::{ConversationStore, Exchange, PromptAssembler, Turn, TurnRole};
pub use runtime::{
    CompletionClient, CompletionError, ExchangeOutcome, LlmCompletionClient, MessageOrchestrator,
};
