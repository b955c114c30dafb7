//! Temporal search event list.
//!
//! A temporal search describes a sequence of events ("a man opens a door",
//! "he sits down", ...). The list always holds at least one entry (possibly
//! blank) and never more than `max_events`.

use serde::Serialize;

pub const DEFAULT_MAX_EVENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemporalEvents {
    events: Vec<String>,
    max_events: usize,
}

impl Default for TemporalEvents {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}

impl TemporalEvents {
    /// A single blank event. `max_events` is raised to 1 if zero.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: vec![String::new()],
            max_events: max_events.max(1),
        }
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= self.max_events
    }

    /// Append a blank event. Returns `false` at capacity.
    pub fn add(&mut self) -> bool {
        if self.is_full() {
            return false;
        }
        self.events.push(String::new());
        true
    }

    /// Remove an event. The last remaining event cannot be removed.
    pub fn remove(&mut self, index: usize) -> bool {
        if self.events.len() <= 1 || index >= self.events.len() {
            return false;
        }
        self.events.remove(index);
        true
    }

    pub fn set(&mut self, index: usize, text: &str) -> bool {
        match self.events.get_mut(index) {
            Some(slot) => {
                *slot = text.to_string();
                true
            }
            None => false,
        }
    }

    /// Non-blank events, trimmed, in order.
    pub fn valid_events(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect()
    }
}
