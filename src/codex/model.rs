//! # Domain Model: Entries, Books and Matches
//!
//! This module defines the records the rest of codex works on: [`Entry`], [`Book`],
//! [`Match`] and the resolved [`EntryKind`].
//!
//! ## Storage Shape
//!
//! Entries live in an external knowledge store which speaks the host's world-info
//! record format. The serde names on [`Entry`] follow that format exactly:
//!
//! ```text
//! { "uid": 3, "key": ["Elaria"], "keysecondary": [], "selectiveLogic": 0,
//!   "comment": "Elaria", "content": "...", "disable": false,
//!   "caseSensitive": null, "matchWholeWords": null, ...anything else }
//! ```
//!
//! Fields codex does not know about are carried through untouched in
//! [`Entry::extra`], so saving an entry never drops data another tool put there.
//!
//! ## Change Tracking
//!
//! An entry remembers the comment, content, keys and disabled flag it had when it
//! was loaded (or last saved). [`Entry::changes`] diffs against that snapshot and the
//! store only receives the fields that actually changed.
//!
//! ## Entry Kinds
//!
//! The host has no notion of typed entries. Codex infers the kind from reserved keys
//! (`codex-map:`, `codex-chars:`) or from the embedded properties block. The result is
//! resolved once into an [`EntryKind`] instead of being re-sniffed at every use.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec;
use crate::entry_type::EntryType;
use crate::keys;
use crate::properties::CodexEntryProperties;

/// How secondary keys gate a primary key hit.
///
/// The numeric values follow the host's `selectiveLogic` enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum SecondaryKeyLogic {
    /// At least one secondary key must be present.
    #[default]
    AndAny,
    /// Rejected when every secondary key is present.
    NotAll,
    /// Rejected when any secondary key is present.
    NotAny,
    /// Every secondary key must be present.
    AndAll,
}

impl From<u8> for SecondaryKeyLogic {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::NotAll,
            2 => Self::NotAny,
            3 => Self::AndAll,
            _ => Self::AndAny,
        }
    }
}

impl From<SecondaryKeyLogic> for u8 {
    fn from(value: SecondaryKeyLogic) -> Self {
        match value {
            SecondaryKeyLogic::AndAny => 0,
            SecondaryKeyLogic::NotAll => 1,
            SecondaryKeyLogic::NotAny => 2,
            SecondaryKeyLogic::AndAll => 3,
        }
    }
}

/// Entry fields tracked for saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryField {
    Comment,
    Content,
    Key,
    Disable,
}

impl EntryField {
    /// Field name as the store knows it.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryField::Comment => "comment",
            EntryField::Content => "content",
            EntryField::Key => "key",
            EntryField::Disable => "disable",
        }
    }
}

impl std::fmt::Display for EntryField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Snapshot {
    comment: String,
    content: String,
    keys: String,
    is_disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    #[serde(skip)]
    pub book: String,
    pub uid: u64,
    #[serde(rename = "key", default)]
    pub key_list: Vec<String>,
    #[serde(rename = "keysecondary", default)]
    pub secondary_key_list: Vec<String>,
    #[serde(rename = "selectiveLogic", default)]
    pub secondary_key_logic: SecondaryKeyLogic,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "disable", default)]
    pub is_disabled: bool,
    /// `None` defers to the store-wide default.
    #[serde(rename = "caseSensitive", default)]
    pub is_case_sensitive: Option<bool>,
    /// `None` defers to the store-wide default.
    #[serde(rename = "matchWholeWords", default)]
    pub is_matching_whole_words: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    original: Snapshot,
}

impl Entry {
    pub fn new(book: &str, uid: u64, key_list: Vec<String>, content: impl Into<String>) -> Self {
        Self {
            book: book.to_string(),
            uid,
            key_list,
            secondary_key_list: Vec::new(),
            secondary_key_logic: SecondaryKeyLogic::AndAny,
            comment: String::new(),
            content: content.into(),
            is_disabled: false,
            is_case_sensitive: None,
            is_matching_whole_words: None,
            extra: Map::new(),
            original: Snapshot::default(),
        }
        .loaded_from(book)
    }

    /// Attach an entry read from the store to its book and take the change-tracking
    /// snapshot.
    pub fn loaded_from(mut self, book: &str) -> Self {
        self.book = book.to_string();
        self.mark_saved();
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self.mark_saved();
        self
    }

    pub fn with_secondary(mut self, keys: Vec<String>, logic: SecondaryKeyLogic) -> Self {
        self.secondary_key_list = keys;
        self.secondary_key_logic = logic;
        self
    }

    pub fn with_case_sensitive(mut self, flag: bool) -> Self {
        self.is_case_sensitive = Some(flag);
        self
    }

    pub fn with_whole_words(mut self, flag: bool) -> Self {
        self.is_matching_whole_words = Some(flag);
        self
    }

    /// Fields that differ from the last loaded/saved state.
    pub fn changes(&self) -> Vec<EntryField> {
        let mut changes = Vec::new();
        if self.original.comment != self.comment {
            changes.push(EntryField::Comment);
        }
        if self.original.content != self.content {
            changes.push(EntryField::Content);
        }
        if self.original.keys != self.key_list.join(", ") {
            changes.push(EntryField::Key);
        }
        if self.original.is_disabled != self.is_disabled {
            changes.push(EntryField::Disable);
        }
        changes
    }

    pub fn is_dirty(&self) -> bool {
        !self.changes().is_empty()
    }

    /// Accept the current state as persisted.
    pub fn mark_saved(&mut self) {
        self.original = Snapshot {
            comment: self.comment.clone(),
            content: self.content.clone(),
            keys: self.key_list.join(", "),
            is_disabled: self.is_disabled,
        };
    }

    pub fn is_skipped(&self) -> bool {
        self.key_list.iter().any(|k| keys::is_token(k, keys::SKIP))
    }

    pub fn is_map(&self) -> bool {
        self.key_list.iter().any(|k| keys::is_token(k, keys::MAP))
    }

    pub fn is_char_list(&self) -> bool {
        self.key_list.iter().any(|k| keys::has_prefix(k, keys::CHARS))
    }

    /// Display title without any properties override.
    ///
    /// Long comments are treated as notes rather than names, so the keys win.
    pub fn title(&self) -> String {
        if let Some(field) = self
            .key_list
            .iter()
            .find_map(|k| keys::strip_token(k, keys::TITLE))
        {
            if let Some(title) = self.title_from_field(field) {
                return title;
            }
        }
        let joined = self.trigger_keys().join(" / ");
        if self.comment.chars().count() > 50 || self.comment.is_empty() {
            joined
        } else {
            self.comment.clone()
        }
    }

    /// Resolve a title field: `comment`, `content`, `key[n]` or any stored field.
    pub fn title_from_field(&self, field: &str) -> Option<String> {
        if let Some(idx) = keys::parse_key_index(field) {
            return self.key_list.get(idx).cloned();
        }
        self.field(field).filter(|v| !v.is_empty())
    }

    /// Keys that are not reserved directives.
    pub fn trigger_keys(&self) -> Vec<&str> {
        self.key_list
            .iter()
            .map(|k| k.as_str())
            .filter(|k| !keys::is_directive(k))
            .collect()
    }

    /// Text value of a stored field.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "uid" => Some(self.uid.to_string()),
            "key" => Some(self.key_list.join(", ")),
            "keysecondary" => Some(self.secondary_key_list.join(", ")),
            "comment" => Some(self.comment.clone()),
            "content" => Some(self.content.clone()),
            "disable" => Some(self.is_disabled.to_string()),
            "selectiveLogic" => Some(u8::from(self.secondary_key_logic).to_string()),
            other => self.extra.get(other).map(value_text),
        }
    }

    /// Whether two entries hold the same stored record.
    pub fn same_record(&self, other: &Entry) -> bool {
        self.book == other.book
            && serde_json::to_value(self).ok() == serde_json::to_value(other).ok()
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Book-level properties stored in a hidden `codex-book:` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Book {
    pub name: String,
    pub entries: Vec<Entry>,
}

impl Book {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entries(name: impl Into<String>, entries: Vec<Entry>) -> Self {
        let name = name.into();
        let entries = entries
            .into_iter()
            .map(|e| e.loaded_from(&name))
            .collect();
        Self { name, entries }
    }

    pub fn add_entry(&mut self, entry: Entry) {
        self.entries.push(entry.loaded_from(&self.name));
    }

    pub fn find(&self, uid: u64) -> Option<&Entry> {
        self.entries.iter().find(|e| e.uid == uid)
    }

    pub fn find_mut(&mut self, uid: u64) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.uid == uid)
    }

    /// The entry carrying the book properties block, if any.
    pub fn properties_entry(&self) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| codec::find_book_block(&e.content).is_some())
    }

    pub fn properties(&self) -> BookProperties {
        self.properties_entry()
            .and_then(|e| match codec::decode_book(&e.content) {
                Ok(props) => props,
                Err(err) => {
                    tracing::warn!(book = %self.name, %err, "unreadable book properties");
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn cover(&self) -> Option<String> {
        self.properties().cover
    }
}

/// An entry found relevant to some text.
#[derive(Debug, Clone)]
pub struct Match {
    pub book: String,
    pub entry: Entry,
}

impl Match {
    pub fn new(book: impl Into<String>, entry: Entry) -> Self {
        Self {
            book: book.into(),
            entry,
        }
    }

    pub fn refers_to(&self, book: &str, uid: u64) -> bool {
        self.book == book && self.entry.uid == uid
    }

    pub fn same_entry(&self, other: &Match) -> bool {
        self.refers_to(&other.book, other.entry.uid)
    }
}

/// What an entry is, resolved once at load time.
#[derive(Debug, Clone)]
pub enum EntryKind {
    Plain,
    Map,
    CharacterList,
    Typed(EntryType),
}

impl EntryKind {
    pub fn resolve(entry: &Entry, properties: &CodexEntryProperties) -> Self {
        if entry.is_map() {
            EntryKind::Map
        } else if entry.is_char_list() {
            EntryKind::CharacterList
        } else if properties.entry_type.is_typed() {
            EntryKind::Typed(properties.entry_type.clone())
        } else {
            EntryKind::Plain
        }
    }

    /// Maps and character lists have their own content formats.
    pub fn is_textual(&self) -> bool {
        matches!(self, EntryKind::Plain | EntryKind::Typed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(keys: &[&str]) -> Entry {
        Entry::new("World", 1, keys.iter().map(|s| s.to_string()).collect(), "")
    }

    #[test]
    fn tracks_changed_fields_against_snapshot() {
        let mut e = entry(&["Elaria"]).with_comment("City");
        assert!(e.changes().is_empty());

        e.content = "A port city".into();
        e.key_list.push("Port".into());
        assert_eq!(e.changes(), vec![EntryField::Content, EntryField::Key]);

        e.mark_saved();
        assert!(!e.is_dirty());
    }

    #[test]
    fn title_prefers_short_comment() {
        let e = entry(&["Elaria", "The City"]).with_comment("Elaria");
        assert_eq!(e.title(), "Elaria");

        let long = "x".repeat(51);
        let e = entry(&["Elaria", "The City"]).with_comment(long);
        assert_eq!(e.title(), "Elaria / The City");
    }

    #[test]
    fn title_honours_legacy_title_key() {
        let e = entry(&["Elaria", "Port", "codex-title:key[1]"]).with_comment("City");
        assert_eq!(e.title(), "Port");
    }

    #[test]
    fn reads_host_record_and_keeps_unknown_fields() {
        let json = r#"{"uid":7,"key":["Elaria"],"keysecondary":["port"],"selectiveLogic":2,
            "comment":"c","content":"x","disable":true,"caseSensitive":null,
            "matchWholeWords":true,"position":4}"#;
        let e: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(e.secondary_key_logic, SecondaryKeyLogic::NotAny);
        assert_eq!(e.is_case_sensitive, None);
        assert_eq!(e.is_matching_whole_words, Some(true));
        assert_eq!(e.field("position").as_deref(), Some("4"));

        let back = serde_json::to_value(&e).unwrap();
        assert_eq!(back["position"], 4);
        assert_eq!(back["selectiveLogic"], 2);
    }

    #[test]
    fn detects_reserved_kinds() {
        assert!(entry(&["codex-map:", "Elaria"]).is_map());
        assert!(entry(&["codex-chars:Crew"]).is_char_list());
        assert!(entry(&["CODEX-SKIP:"]).is_skipped());
        assert!(!entry(&["Elaria"]).is_skipped());
    }
}
