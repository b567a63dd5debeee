//! Pending operations with supersede-on-request semantics.
//!
//! A debounced operation is requested, then fired later by whoever drives time
//! (a timer in an interactive client, directly in tests). Every request returns a
//! [`Token`]; a newer request makes older tokens stale and firing a stale token
//! does nothing. Nothing is ever queued: only the newest request survives.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u64);

#[derive(Debug)]
pub struct Debounced<T> {
    next: u64,
    pending: Option<(Token, T)>,
}

impl<T> Default for Debounced<T> {
    fn default() -> Self {
        Self {
            next: 0,
            pending: None,
        }
    }
}

impl<T> Debounced<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `value`, replacing whatever was pending.
    pub fn request(&mut self, value: T) -> Token {
        self.next += 1;
        let token = Token(self.next);
        self.pending = Some((token, value));
        token
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref().map(|(_, v)| v)
    }

    /// Take the pending value if `token` is still the current request.
    pub fn fire(&mut self, token: Token) -> Option<T> {
        let is_current = matches!(&self.pending, Some((current, _)) if *current == token);
        if is_current {
            self.take()
        } else {
            None
        }
    }

    /// Take the pending value regardless of token.
    pub fn take(&mut self) -> Option<T> {
        self.pending.take().map(|(_, v)| v)
    }
}

/// One [`Debounced`] slot per key.
#[derive(Debug)]
pub struct DebouncedMap<K: Ord, T> {
    next: u64,
    pending: BTreeMap<K, (Token, T)>,
}

impl<K: Ord, T> Default for DebouncedMap<K, T> {
    fn default() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }
}

impl<K: Ord, T> DebouncedMap<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, key: K, value: T) -> Token {
        self.next += 1;
        let token = Token(self.next);
        self.pending.insert(key, (token, value));
        token
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self, key: &K) -> Option<&T> {
        self.pending.get(key).map(|(_, v)| v)
    }

    pub fn fire(&mut self, key: &K, token: Token) -> Option<T> {
        let is_current = matches!(self.pending.get(key), Some((current, _)) if *current == token);
        if is_current {
            self.pending.remove(key).map(|(_, v)| v)
        } else {
            None
        }
    }

    /// Take every pending value, in key order.
    pub fn drain(&mut self) -> Vec<(K, T)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(k, (_, v))| (k, v))
            .collect()
    }
}
