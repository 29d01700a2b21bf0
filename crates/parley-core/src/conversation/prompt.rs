//! Prompt assembly for one exchange.

use parley_ai::Message;
use thiserror::Error;

use super::store::{Turn, TurnRole};

/// Instruction sent as the first message of every prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, ever-advancing AI assistant integrated into a private Telegram bot. Answer concisely and helpfully. If code is requested, provide it in Markdown blocks.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("user message is empty")]
    EmptyInput,
}

/// Builds `[system, ...history, user]` message lists.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    system_prompt: String,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl PromptAssembler {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Assemble the prompt for `text` given the conversation so far.
    ///
    /// History turns keep their order and roles; the new message is last.
    pub fn build(&self, history: &[Turn], text: &str) -> Result<Vec<Message>, PromptError> {
        if text.trim().is_empty() {
            return Err(PromptError::EmptyInput);
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system_prompt.as_str()));
        messages.extend(history.iter().map(|turn| match turn.role() {
            TurnRole::User => Message::user(turn.content()),
            TurnRole::Assistant => Message::assistant(turn.content()),
        }));
        messages.push(Message::user(text));
        Ok(messages)
    }
}
