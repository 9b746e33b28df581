//! Bounded conversation memory.

use mira_prompt::ChatTurn;
use std::collections::VecDeque;

/// The most recent exchanges, oldest first.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    turns: VecDeque<ChatTurn>,
    max_turns: usize,
}

impl ChatHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
        }
    }

    /// Record an exchange, evicting the oldest beyond the limit.
    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        if self.max_turns == 0 {
            return;
        }
        while self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(ChatTurn::new(question, answer));
    }

    pub fn turns(&self) -> Vec<ChatTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
