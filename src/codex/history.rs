//! Back/forward navigation over shown entries.

use crate::matcher::Matcher;
use crate::model::Match;

#[derive(Debug, Clone)]
pub struct History {
    items: Vec<Match>,
    index: usize,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            index: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current(&self) -> Option<&Match> {
        self.items.get(self.index)
    }

    /// Record a shown entry. Showing the current entry again is not a new step;
    /// anything ahead of the current position is discarded.
    pub fn add(&mut self, shown: Match) {
        if self.current().is_some_and(|c| c.same_entry(&shown)) {
            return;
        }
        self.items.truncate(self.index + 1);
        self.items.push(shown);
        if self.items.len() > self.capacity {
            let excess = self.items.len() - self.capacity;
            self.items.drain(..excess);
        }
        self.index = self.items.len() - 1;
    }

    pub fn can_go_back(&self) -> bool {
        self.index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.index + 1 < self.items.len()
    }

    pub fn back(&mut self) -> Option<&Match> {
        if !self.can_go_back() {
            return None;
        }
        self.index -= 1;
        self.current()
    }

    pub fn forward(&mut self) -> Option<&Match> {
        if !self.can_go_forward() {
            return None;
        }
        self.index += 1;
        self.current()
    }

    /// Point every item at the freshly loaded entry, dropping entries that are gone.
    /// Stays on the current entry if it survived, else moves to the newest.
    pub fn rebind(&mut self, matcher: &Matcher) {
        let current = self.current().cloned();
        self.items = self
            .items
            .iter()
            .filter_map(|m| matcher.find_entry(&m.book, m.entry.uid))
            .collect();
        self.index = current
            .and_then(|c| self.items.iter().position(|m| m.same_entry(&c)))
            .unwrap_or_else(|| self.items.len().saturating_sub(1));
    }
}
