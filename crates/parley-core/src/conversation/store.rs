//! Bounded per-conversation history.
//!
//! Each conversation owns its own lock. A reader takes a snapshot and
//! releases the lock; a writer appends a whole exchange under the lock and
//! trims from the front. Nothing is held across an await, so a slow
//! completion for one exchange never blocks another.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

/// Default number of turns kept per conversation.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Speaker of a stored turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

/// One immutable message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    role: TurnRole,
    content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }

    pub fn role(&self) -> TurnRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// A user message and the reply it produced. Always stored together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    user: Turn,
    assistant: Turn,
}

impl Exchange {
    pub fn new(user_text: impl Into<String>, assistant_text: impl Into<String>) -> Self {
        Self {
            user: Turn::user(user_text),
            assistant: Turn::assistant(assistant_text),
        }
    }

    pub fn user(&self) -> &Turn {
        &self.user
    }

    pub fn assistant(&self) -> &Turn {
        &self.assistant
    }
}

type History = Arc<Mutex<VecDeque<Turn>>>;

/// In-memory conversation histories keyed by conversation ID.
#[derive(Debug)]
pub struct ConversationStore {
    histories: DashMap<String, History>,
    limit: usize,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ConversationStore {
    /// Create a store keeping at most `limit` turns per conversation.
    pub fn new(limit: usize) -> Self {
        Self {
            histories: DashMap::new(),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn history(&self, conversation_id: &str) -> Option<History> {
        self.histories
            .get(conversation_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn history_or_create(&self, conversation_id: &str) -> History {
        Arc::clone(
            self.histories
                .entry(conversation_id.to_string())
                .or_default()
                .value(),
        )
    }

    /// Snapshot of a conversation, oldest first. Unknown IDs yield an empty
    /// history and are not created.
    pub fn read(&self, conversation_id: &str) -> Vec<Turn> {
        match self.history(conversation_id) {
            Some(history) => history.lock().iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Append both turns of an exchange atomically, then trim the oldest
    /// turns until the conversation is within the limit.
    pub fn append_exchange(&self, conversation_id: &str, exchange: Exchange) {
        let history = self.history_or_create(conversation_id);
        let mut turns = history.lock();
        turns.push_back(exchange.user);
        turns.push_back(exchange.assistant);
        trim_front(&mut turns, self.limit);
        debug!(
            "Stored exchange for conversation {} ({} turns)",
            conversation_id,
            turns.len()
        );
    }

    /// Replace a conversation's history, keeping only the newest turns.
    pub fn seed(&self, conversation_id: &str, turns: impl IntoIterator<Item = Turn>) {
        let history = self.history_or_create(conversation_id);
        let mut guard = history.lock();
        guard.clear();
        guard.extend(turns);
        trim_front(&mut guard, self.limit);
    }

    /// Drop a conversation's history. Returns true if it existed.
    pub fn clear(&self, conversation_id: &str) -> bool {
        match self.history(conversation_id) {
            Some(history) => {
                history.lock().clear();
                true
            }
            None => false,
        }
    }

    /// Number of stored turns for a conversation.
    pub fn len(&self, conversation_id: &str) -> usize {
        self.history(conversation_id)
            .map_or(0, |history| history.lock().len())
    }

    pub fn is_empty(&self, conversation_id: &str) -> bool {
        self.len(conversation_id) == 0
    }

    /// Number of conversations that have ever been written.
    pub fn conversation_count(&self) -> usize {
        self.histories.len()
    }
}

fn trim_front(turns: &mut VecDeque<Turn>, limit: usize) {
    while turns.len() > limit {
        turns.pop_front();
    }
}
