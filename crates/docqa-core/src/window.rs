//! Bounded conversation window.
//!
//! A [`ConversationWindow`] is the in-memory form of one user's
//! conversation log: an ordered sequence of turns that never holds more
//! than `max_turns` entries. Appending past the limit evicts from the
//! front, so the window always keeps the most recent turns in their
//! original order.

use std::collections::VecDeque;

use crate::models::ConversationTurn;

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationWindow {
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
}

impl ConversationWindow {
    /// Create an empty window. `max_turns` is clamped to at least 1.
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns: max_turns.max(1),
        }
    }

    /// Build a window from previously persisted turns, keeping only the
    /// newest `max_turns`.
    pub fn from_turns(turns: Vec<ConversationTurn>, max_turns: usize) -> Self {
        let mut window = Self::new(max_turns);
        window.extend(turns);
        window
    }

    /// Append one turn. Returns the number of turns evicted.
    pub fn push(&mut self, turn: ConversationTurn) -> usize {
        self.turns.push_back(turn);
        self.evict()
    }

    /// Append turns in order. Returns the number of turns evicted.
    pub fn extend<I>(&mut self, turns: I) -> usize
    where
        I: IntoIterator<Item = ConversationTurn>,
    {
        self.turns.extend(turns);
        self.evict()
    }

    fn evict(&mut self) -> usize {
        let mut evicted = 0;
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// Oldest-first copy of the turns.
    pub fn to_vec(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }
}
