//! Per-chat conversation memory
//!
//! Each chat id owns one [`Conversation`] behind its own mutex. The store is
//! an LRU, so idle chats are forgotten once `max_conversations` is exceeded.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;

use super::llm::ChatMessage;

/// One completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

/// Bounded history of one chat
#[derive(Debug)]
pub struct Conversation {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl Conversation {
    /// Empty conversation keeping at most `max_turns` turns
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns.min(64)),
            max_turns,
        }
    }

    /// Append a turn, evicting the oldest beyond the window
    pub fn push(&mut self, turn: Turn) {
        if self.max_turns == 0 {
            return;
        }
        while self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns, oldest first
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// History as alternating user/assistant messages
    #[must_use]
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .flat_map(|t| [ChatMessage::user(&t.user), ChatMessage::assistant(&t.assistant)])
            .collect()
    }
}

/// Conversations keyed by chat id
pub struct ConversationStore {
    conversations: Mutex<LruCache<String, Arc<Mutex<Conversation>>>>,
    history_turns: usize,
}

impl ConversationStore {
    /// Create a store holding up to `max_conversations` chats of `history_turns` turns each
    #[must_use]
    pub fn new(max_conversations: usize, history_turns: usize) -> Self {
        let capacity = NonZeroUsize::new(max_conversations).unwrap_or(NonZeroUsize::MIN);
        Self {
            conversations: Mutex::new(LruCache::new(capacity)),
            history_turns,
        }
    }

    /// Conversation for `key`, created empty on first use
    pub async fn conversation(&self, key: &str) -> Arc<Mutex<Conversation>> {
        let mut conversations = self.conversations.lock().await;
        Arc::clone(conversations.get_or_insert(key.to_string(), || {
            tracing::debug!(conversation = key, "new conversation");
            Arc::new(Mutex::new(Conversation::new(self.history_turns)))
        }))
    }

    /// Number of conversations currently held
    pub async fn len(&self) -> usize {
        self.conversations.lock().await.len()
    }
}
