//! Per-session conversation history
//!
//! Holds the most recent turns of one session in chronological order.

use crate::models::{Role, Turn};
use std::collections::VecDeque;
use tokio::time::Instant;

/// Turns kept per session
pub const MAX_MEMORY_TURNS: usize = 10;

/// Conversation history for one session
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    /// Turns in append order (VecDeque for cheap front eviction)
    turns: VecDeque<Turn>,
    last_active: Instant,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self {
            turns: VecDeque::with_capacity(MAX_MEMORY_TURNS + 1),
            last_active: Instant::now(),
        }
    }

    /// Append a turn, dropping the oldest ones beyond capacity
    pub fn push(&mut self, role: Role, content: String) {
        self.turns.push_back(Turn { role, content });

        while self.turns.len() > MAX_MEMORY_TURNS {
            self.turns.pop_front();
        }

        self.touch();
    }

    pub fn to_vec(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}
