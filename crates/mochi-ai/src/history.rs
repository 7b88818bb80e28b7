//! Bounded conversation history.

use std::collections::VecDeque;

/// One user message and the reply it got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    user: String,
    assistant: String,
}

impl ConversationTurn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn assistant(&self) -> &str {
        &self.assistant
    }
}

/// FIFO-evicting ring of the most recent turns, oldest first.
#[derive(Debug, Clone)]
pub struct History {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a turn, evicting and returning the oldest one when full.
    pub fn push(&mut self, turn: ConversationTurn) -> Option<ConversationTurn> {
        if self.capacity == 0 {
            return Some(turn);
        }
        let evicted = if self.turns.len() >= self.capacity {
            self.turns.pop_front()
        } else {
            None
        };
        self.turns.push_back(turn);
        evicted
    }

    /// Turns from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
