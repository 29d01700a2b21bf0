//! Conversation state and prompt construction.

mod prompt;
mod store;

pub use prompt::{DEFAULT_SYSTEM_PROMPT, PromptAssembler, PromptError};
pub use store::{ConversationStore, DEFAULT_HISTORY_LIMIT, Exchange, Turn, TurnRole};
