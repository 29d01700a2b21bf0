//! Relay runtime: command handling, orchestration and the receive loop.

pub mod commands;
pub mod completion;
pub mod handler;
pub mod orchestrator;

pub use commands::{BotCommand, handle_command};
pub use completion::{CompletionClient, CompletionError, LlmCompletionClient};
pub use handler::{HandlerStats, MessageHandlerConfig, run_message_handler};
pub use orchestrator::{
    COMPLETION_FAILED_MESSAGE, ExchangeOutcome, MessageOrchestrator, OrchestratorConfig,
    REJECTION_MESSAGE,
};
