//! # Matcher
//!
//! Finds the entries whose trigger keys occur in a text.
//!
//! Keys are compiled once when the matcher is built. An entry with a key that does
//! not compile is left out and listed in [`Matcher::rejected`]; the rest of the
//! scan is unaffected.
//!
//! Results come back in book load order, then in definition order within a book.
//! Callers cycling through matches reorder them with [`Matcher::order_by_occurrence`].

use std::collections::HashMap;

use crate::config::CodexConfig;
use crate::keys::{self, KeyOptions, KeyPattern};
use crate::model::{Book, Entry, Match, SecondaryKeyLogic};

/// Store-wide matching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchPolicy {
    /// Only keys carrying the `codex:` marker trigger.
    pub require_prefix: bool,
    pub case_sensitive: bool,
    pub whole_words: bool,
}

impl From<&CodexConfig> for MatchPolicy {
    fn from(config: &CodexConfig) -> Self {
        Self {
            require_prefix: config.require_prefix,
            case_sensitive: config.case_sensitive,
            whole_words: config.match_whole_words,
        }
    }
}

impl MatchPolicy {
    pub fn key_options(&self, entry: &Entry) -> KeyOptions {
        KeyOptions {
            case_sensitive: entry.is_case_sensitive.unwrap_or(self.case_sensitive),
            whole_words: entry.is_matching_whole_words.unwrap_or(self.whole_words),
        }
    }

    /// Whether the entry takes part in matching at all.
    pub fn is_candidate(&self, entry: &Entry) -> bool {
        if entry.key_list.is_empty() || entry.is_skipped() {
            return false;
        }
        !self.require_prefix || entry.key_list.iter().any(|k| keys::has_prefix(k, keys::PREFIX))
    }

    /// Bare keys that trigger the entry. With `require_prefix` on, only the marked ones.
    pub fn trigger_keys<'e>(&self, entry: &'e Entry) -> Vec<&'e str> {
        entry
            .key_list
            .iter()
            .filter(|k| !keys::is_directive(k))
            .filter_map(|k| match keys::split_prefix(k) {
                (false, _) if self.require_prefix => None,
                (_, bare) if bare.is_empty() => None,
                (_, bare) => Some(bare),
            })
            .collect()
    }
}

/// An entry left out of matching because one of its keys does not compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub book: String,
    pub uid: u64,
    pub key: String,
    pub reason: String,
}

#[derive(Debug)]
struct CompiledEntry {
    book: usize,
    entry: usize,
    primary: Vec<KeyPattern>,
    secondary: Vec<KeyPattern>,
    logic: SecondaryKeyLogic,
}

impl CompiledEntry {
    fn is_match(&self, text: &str) -> bool {
        if !self.primary.iter().any(|p| p.is_match(text)) {
            return false;
        }
        if self.secondary.is_empty() {
            return true;
        }
        let present = self.secondary.iter().filter(|p| p.is_match(text)).count();
        let all = self.secondary.len();
        match self.logic {
            SecondaryKeyLogic::AndAny => present > 0,
            SecondaryKeyLogic::AndAll => present == all,
            SecondaryKeyLogic::NotAny => present == 0,
            SecondaryKeyLogic::NotAll => present < all,
        }
    }

    fn first_occurrence(&self, text: &str) -> Option<usize> {
        self.primary.iter().filter_map(|p| p.first_at(text)).min()
    }
}

#[derive(Debug)]
pub struct Matcher {
    books: Vec<Book>,
    policy: MatchPolicy,
    compiled: Vec<CompiledEntry>,
    index: HashMap<(String, u64), usize>,
    rejected: Vec<RejectedEntry>,
}

impl Matcher {
    pub fn new(books: Vec<Book>, policy: MatchPolicy) -> Self {
        let mut compiled = Vec::new();
        let mut index = HashMap::new();
        let mut rejected = Vec::new();

        for (bi, book) in books.iter().enumerate() {
            for (ei, entry) in book.entries.iter().enumerate() {
                if !policy.is_candidate(entry) {
                    continue;
                }
                match compile_entry(&policy, entry) {
                    Ok((primary, secondary)) => {
                        if primary.is_empty() {
                            continue;
                        }
                        index.insert((book.name.clone(), entry.uid), compiled.len());
                        compiled.push(CompiledEntry {
                            book: bi,
                            entry: ei,
                            primary,
                            secondary,
                            logic: entry.secondary_key_logic,
                        });
                    }
                    Err((key, reason)) => {
                        tracing::warn!(book = %book.name, uid = entry.uid, %key, %reason, "skipping entry with invalid key");
                        rejected.push(RejectedEntry {
                            book: book.name.clone(),
                            uid: entry.uid,
                            key,
                            reason,
                        });
                    }
                }
            }
        }

        tracing::debug!(
            books = books.len(),
            candidates = compiled.len(),
            rejected = rejected.len(),
            "matcher ready"
        );
        Self {
            books,
            policy,
            compiled,
            index,
            rejected,
        }
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    pub fn rejected(&self) -> &[RejectedEntry] {
        &self.rejected
    }

    fn to_match(&self, c: &CompiledEntry) -> Match {
        let book = &self.books[c.book];
        Match::new(book.name.clone(), book.entries[c.entry].clone())
    }

    pub fn find_matches(&self, text: &str) -> Vec<Match> {
        self.compiled
            .iter()
            .filter(|c| c.is_match(text))
            .map(|c| self.to_match(c))
            .collect()
    }

    /// Every candidate entry, in match order.
    pub fn candidates(&self) -> Vec<Match> {
        self.compiled.iter().map(|c| self.to_match(c)).collect()
    }

    /// Look up any loaded entry, candidate or not.
    pub fn find_entry(&self, book: &str, uid: u64) -> Option<Match> {
        self.books
            .iter()
            .find(|b| b.name == book)
            .and_then(|b| b.find(uid))
            .map(|e| Match::new(book, e.clone()))
    }

    /// Stable reorder by the first occurrence of any primary key in `text`.
    /// Matches that do not occur go last.
    pub fn order_by_occurrence(&self, text: &str, mut matches: Vec<Match>) -> Vec<Match> {
        matches.sort_by_key(|m| {
            self.index
                .get(&(m.book.clone(), m.entry.uid))
                .and_then(|&i| self.compiled[i].first_occurrence(text))
                .unwrap_or(usize::MAX)
        });
        matches
    }
}

fn compile_entry(
    policy: &MatchPolicy,
    entry: &Entry,
) -> Result<(Vec<KeyPattern>, Vec<KeyPattern>), (String, String)> {
    let options = policy.key_options(entry);
    let compile = |key: &str| {
        KeyPattern::compile(key, options).map_err(|e| (key.to_string(), e.to_string()))
    };
    let primary = policy
        .trigger_keys(entry)
        .into_iter()
        .map(compile)
        .collect::<Result<Vec<_>, _>>()?;
    let secondary = entry
        .secondary_key_list
        .iter()
        .map(|k| keys::split_prefix(k).1)
        .filter(|k| !k.is_empty())
        .map(compile)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((primary, secondary))
}
