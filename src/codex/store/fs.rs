use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::{set_field, KnowledgeStore};
use crate::error::{CodexError, Result};
use crate::model::{Book, Entry, EntryField};

const BOOK_EXT: &str = "json";

/// Books as world-info JSON files in one directory.
///
/// Records are patched in place, so fields codex does not know about and the
/// order of keys in the file are preserved.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn book_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, BOOK_EXT))
    }

    /// Create an empty book file unless it exists.
    pub fn create_book(&self, name: &str) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
        }
        let path = self.book_path(name);
        if !path.exists() {
            let empty = serde_json::json!({ "entries": {} });
            fs::write(path, serde_json::to_string_pretty(&empty)?)?;
        }
        Ok(())
    }

    fn read_book(&self, name: &str) -> Result<Value> {
        let path = self.book_path(name);
        if !path.exists() {
            return Err(CodexError::BookNotFound(name.to_string()));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_book(&self, name: &str, data: &Value) -> Result<()> {
        let content = serde_json::to_string_pretty(data)?;
        fs::write(self.book_path(name), content)?;
        Ok(())
    }

    fn record_mut<'v>(data: &'v mut Value, book: &str, uid: u64) -> Result<&'v mut Map<String, Value>> {
        entries_mut(data, book)?
            .get_mut(&uid.to_string())
            .and_then(Value::as_object_mut)
            .ok_or_else(|| CodexError::EntryNotFound {
                book: book.to_string(),
                uid,
            })
    }
}

fn entries_mut<'v>(data: &'v mut Value, book: &str) -> Result<&'v mut Map<String, Value>> {
    data.get_mut("entries")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| CodexError::Store(format!("{} has no entries table", book)))
}

impl KnowledgeStore for FileStore {
    fn list_books(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == BOOK_EXT))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }

    fn load_book(&self, name: &str) -> Result<Book> {
        let data = self.read_book(name)?;
        let mut entries = Vec::new();
        if let Some(records) = data.get("entries").and_then(Value::as_object) {
            for (key, record) in records {
                match serde_json::from_value::<Entry>(record.clone()) {
                    Ok(entry) => entries.push(entry),
                    Err(err) => {
                        tracing::warn!(book = name, entry = %key, %err, "skipping unreadable entry")
                    }
                }
            }
        }
        tracing::debug!(book = name, entries = entries.len(), "loaded book");
        Ok(Book::with_entries(name, entries))
    }

    fn save_entry(&mut self, entry: &Entry, changes: &[EntryField]) -> Result<()> {
        let mut data = self.read_book(&entry.book)?;
        let record = Self::record_mut(&mut data, &entry.book, entry.uid)?;
        for field in changes {
            let value = match field {
                EntryField::Comment => Value::String(entry.comment.clone()),
                EntryField::Content => Value::String(entry.content.clone()),
                EntryField::Key => serde_json::to_value(&entry.key_list)?,
                EntryField::Disable => Value::Bool(entry.is_disabled),
            };
            record.insert(field.as_str().to_string(), value);
        }
        self.write_book(&entry.book, &data)
    }

    fn create_entry(&mut self, book: &str, keys: &[String], content: &str) -> Result<u64> {
        let mut data = self.read_book(book)?;
        let records = entries_mut(&mut data, book)?;
        let uid = records
            .values()
            .filter_map(|r| r.get("uid").and_then(Value::as_u64))
            .map(|uid| uid + 1)
            .max()
            .unwrap_or(0);
        let entry = Entry::new(book, uid, keys.to_vec(), content);
        records.insert(uid.to_string(), serde_json::to_value(&entry)?);
        self.write_book(book, &data)?;
        Ok(uid)
    }

    fn set_entry_field(&mut self, book: &str, uid: u64, field: &str, value: &str) -> Result<()> {
        let mut data = self.read_book(book)?;
        let record = Self::record_mut(&mut data, book, uid)?;
        let current: Entry = serde_json::from_value(Value::Object(record.clone()))?;
        let updated = serde_json::to_value(set_field(&current.loaded_from(book), field, value)?)?;
        if let Some(new_value) = updated.get(field) {
            record.insert(field.to_string(), new_value.clone());
        }
        self.write_book(book, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_with_book() -> (tempfile::TempDir, FileStore) {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("books"));
        store.create_book("World").unwrap();
        (dir, store)
    }

    #[test]
    fn lists_books_sorted() {
        let (_dir, store) = store_with_book();
        store.create_book("Atlas").unwrap();
        assert_eq!(store.list_books().unwrap(), vec!["Atlas", "World"]);
    }

    #[test]
    fn missing_root_has_no_books() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nothing"));
        assert!(store.list_books().unwrap().is_empty());
        assert!(matches!(store.load_book("x"), Err(CodexError::BookNotFound(_))));
    }

    #[test]
    fn create_save_and_reload() {
        let (_dir, mut store) = store_with_book();
        let uid = store
            .create_entry("World", &["Elaria".to_string()], "A port city")
            .unwrap();
        assert_eq!(uid, 0);
        assert_eq!(store.create_entry("World", &[], "").unwrap(), 1);

        let mut entry = store.load_book("World").unwrap().entries.remove(0);
        entry.content = "A harbour".into();
        entry.is_disabled = true;
        store.save_entry(&entry, &entry.changes()).unwrap();

        let reloaded = store.load_book("World").unwrap();
        assert_eq!(reloaded.entries[0].content, "A harbour");
        assert!(reloaded.entries[0].is_disabled);
    }

    #[test]
    fn preserves_foreign_fields_and_order() {
        let (dir, mut store) = store_with_book();
        let path = dir.path().join("books").join("World.json");
        fs::write(
            &path,
            r#"{"entries":{"3":{"uid":3,"position":4,"key":["Elaria"],"comment":"","content":"x","extensions":{"a":1}}},"name":"World"}"#,
        )
        .unwrap();

        let mut entry = store.load_book("World").unwrap().entries.remove(0);
        entry.content = "y".into();
        store.save_entry(&entry, &[EntryField::Content]).unwrap();
        store.set_entry_field("World", 3, "position", "1").unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let record = &raw["entries"]["3"];
        let keys: Vec<_> = record.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["uid", "position", "key", "comment", "content", "extensions"]);
        assert_eq!(record["content"], "y");
        assert_eq!(record["position"], 1);
        assert_eq!(record["extensions"]["a"], 1);
        assert_eq!(raw["name"], "World");
    }
}
