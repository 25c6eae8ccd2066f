//! Conversation memory.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One completed question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// The question as the user asked it.
    pub question: String,
    /// The answer that was returned.
    pub answer: String,
}

impl Turn {
    /// Create a turn.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }
}

/// Ordered history of completed turns.
///
/// Append-only apart from [`reset`](Self::reset) and, when a bound is set,
/// eviction of the oldest turns.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: VecDeque<Turn>,
    max_turns: Option<usize>,
}

impl ConversationMemory {
    /// Create an unbounded memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory that keeps at most `max_turns` turns.
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self { turns: VecDeque::with_capacity(max_turns), max_turns: Some(max_turns) }
    }

    /// The configured bound, if any.
    pub fn max_turns(&self) -> Option<usize> {
        self.max_turns
    }

    /// Record a completed turn, evicting the oldest ones past the bound.
    pub fn append(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push_back(Turn::new(question, answer));
        if let Some(max) = self.max_turns {
            while self.turns.len() > max {
                self.turns.pop_front();
            }
        }
    }

    /// Turns oldest first.
    pub fn history(&self) -> impl DoubleEndedIterator<Item = &Turn> + ExactSizeIterator {
        self.turns.iter()
    }

    /// Forget every turn.
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
