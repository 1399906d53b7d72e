//! Bounded conversation history

use std::collections::VecDeque;

use crate::chat::ChatMessage;

/// Most recent conversation turns, oldest first
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ChatMessage>,
    capacity: usize,
}

impl ConversationHistory {
    /// Create an empty history holding at most `capacity` turns
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a turn, evicting the oldest when full
    pub fn push(&mut self, message: ChatMessage) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(message);
    }

    /// Copy of all retained turns
    #[must_use]
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.turns.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
