//! # Knowledge Store
//!
//! Entries belong to an external knowledge store: the chat front end's world-info
//! books. Codex only needs five operations from it, captured by [`KnowledgeStore`].
//!
//! ## Saving
//!
//! Saves are partial. The caller passes the list of fields that changed since the
//! entry was loaded ([`Entry::changes`]) and the store writes only those, so fields
//! edited elsewhere in the meantime survive.
//!
//! ## Implementations
//!
//! - [`fs::FileStore`]: one world-info JSON file per book in a directory.
//! - [`memory::InMemoryStore`]: for testing logic without filesystem I/O.
//!
//! ## Storage Layout
//!
//! ```text
//! <data dir>/
//! ├── codex.json          # Settings
//! └── books/
//!     └── {book}.json     # {"entries": {"<uid>": {...}}}
//! ```

use serde_json::Value;

use crate::error::{CodexError, Result};
use crate::model::{Book, Entry, EntryField};

pub mod fs;
pub mod memory;

pub trait KnowledgeStore {
    /// Names of all books, in load order.
    fn list_books(&self) -> Result<Vec<String>>;

    fn load_book(&self, name: &str) -> Result<Book>;

    /// Persist the given changed fields of an entry.
    fn save_entry(&mut self, entry: &Entry, changes: &[EntryField]) -> Result<()>;

    /// Create an entry and return its uid.
    fn create_entry(&mut self, book: &str, keys: &[String], content: &str) -> Result<u64>;

    /// Set any stored field from its text form.
    fn set_entry_field(&mut self, book: &str, uid: u64, field: &str, value: &str) -> Result<()>;

    fn load_books(&self) -> Result<Vec<Book>> {
        self.list_books()?
            .iter()
            .map(|name| self.load_book(name))
            .collect()
    }
}

/// Copy the changed fields of `source` onto a stored record.
pub(crate) fn apply_changes(record: &mut Entry, source: &Entry, changes: &[EntryField]) {
    for field in changes {
        match field {
            EntryField::Comment => record.comment = source.comment.clone(),
            EntryField::Content => record.content = source.content.clone(),
            EntryField::Key => record.key_list = source.key_list.clone(),
            EntryField::Disable => record.is_disabled = source.is_disabled,
        }
    }
}

/// Set a field on a record from text, converting to the type the field already
/// holds. Unknown fields are stored as strings.
pub(crate) fn set_field(record: &Entry, field: &str, value: &str) -> Result<Entry> {
    if field == "uid" {
        return Err(CodexError::Api("uid cannot be changed".to_string()));
    }
    let mut json = serde_json::to_value(record)?;
    let Value::Object(map) = &mut json else {
        return Err(CodexError::Store("entry is not a record".to_string()));
    };
    let converted = match map.get(field) {
        Some(Value::Bool(_)) => Value::Bool(matches!(value.trim(), "true" | "1")),
        Some(Value::Number(_)) => {
            let number: serde_json::Number = value.trim().parse().map_err(|_| {
                CodexError::Api(format!("{} expects a number, got {:?}", field, value))
            })?;
            Value::Number(number)
        }
        Some(Value::Array(_)) => Value::Array(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        ),
        Some(Value::Null) if field == "caseSensitive" || field == "matchWholeWords" => {
            Value::Bool(matches!(value.trim(), "true" | "1"))
        }
        _ => Value::String(value.to_string()),
    };
    map.insert(field.to_string(), converted);
    let updated: Entry = serde_json::from_value(json)?;
    Ok(updated.loaded_from(&record.book))
}
