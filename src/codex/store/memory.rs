use super::{apply_changes, set_field, KnowledgeStore};
use crate::error::{CodexError, Result};
use crate::model::{Book, Entry, EntryField};

/// A store holding books in memory. Records every save for inspection.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    books: Vec<Book>,
    saves: Vec<(String, u64, Vec<EntryField>)>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_book(mut self, book: Book) -> Self {
        self.insert_book(book);
        self
    }

    /// Add or replace a book.
    pub fn insert_book(&mut self, book: Book) {
        match self.books.iter_mut().find(|b| b.name == book.name) {
            Some(existing) => *existing = book,
            None => self.books.push(book),
        }
    }

    /// Saves performed so far: book, uid and the fields written.
    pub fn saves(&self) -> &[(String, u64, Vec<EntryField>)] {
        &self.saves
    }

    pub fn entry(&self, book: &str, uid: u64) -> Option<&Entry> {
        self.books
            .iter()
            .find(|b| b.name == book)
            .and_then(|b| b.find(uid))
    }

    fn entry_mut(&mut self, book: &str, uid: u64) -> Result<&mut Entry> {
        self.books
            .iter_mut()
            .find(|b| b.name == book)
            .ok_or_else(|| CodexError::BookNotFound(book.to_string()))?
            .find_mut(uid)
            .ok_or_else(|| CodexError::EntryNotFound {
                book: book.to_string(),
                uid,
            })
    }
}

impl KnowledgeStore for InMemoryStore {
    fn list_books(&self) -> Result<Vec<String>> {
        Ok(self.books.iter().map(|b| b.name.clone()).collect())
    }

    fn load_book(&self, name: &str) -> Result<Book> {
        self.books
            .iter()
            .find(|b| b.name == name)
            .cloned()
            .map(|b| Book::with_entries(b.name, b.entries))
            .ok_or_else(|| CodexError::BookNotFound(name.to_string()))
    }

    fn save_entry(&mut self, entry: &Entry, changes: &[EntryField]) -> Result<()> {
        let record = self.entry_mut(&entry.book, entry.uid)?;
        apply_changes(record, entry, changes);
        record.mark_saved();
        self.saves
            .push((entry.book.clone(), entry.uid, changes.to_vec()));
        Ok(())
    }

    fn create_entry(&mut self, book: &str, keys: &[String], content: &str) -> Result<u64> {
        let target = self
            .books
            .iter_mut()
            .find(|b| b.name == book)
            .ok_or_else(|| CodexError::BookNotFound(book.to_string()))?;
        let uid = target.entries.iter().map(|e| e.uid + 1).max().unwrap_or(0);
        target.add_entry(Entry::new(book, uid, keys.to_vec(), content));
        Ok(uid)
    }

    fn set_entry_field(&mut self, book: &str, uid: u64, field: &str, value: &str) -> Result<()> {
        let record = self.entry_mut(book, uid)?;
        *record = set_field(record, field, value)?;
        Ok(())
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::codec;
    use crate::entry_type::{EntrySection, EntryType};
    use crate::properties::CodexEntryProperties;

    /// The `NPC` type used across tests: sections `Notes` (s1) and `Stats` (s2).
    pub fn npc_type() -> EntryType {
        EntryType::new("NPC")
            .with_id("npc")
            .with_section(
                EntrySection::new("Notes")
                    .with_id("s1")
                    .with_affixes("", "\n"),
            )
            .with_section(EntrySection::new("Stats").with_id("s2"))
    }

    /// Content of an entry holding `entry_type` with the given section texts.
    pub fn typed_content(entry_type: &EntryType, contents: &[&str]) -> String {
        let mut entry_type = entry_type.clone();
        for (section, content) in entry_type.section_list.iter_mut().zip(contents) {
            section.content = content.to_string();
        }
        CodexEntryProperties::typed(entry_type)
            .render_content()
            .unwrap()
    }

    pub struct StoreFixture {
        pub store: InMemoryStore,
    }

    impl Default for StoreFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl StoreFixture {
        pub fn new() -> Self {
            Self {
                store: InMemoryStore::new(),
            }
        }

        pub fn with_book(mut self, name: &str) -> Self {
            self.store.insert_book(Book::new(name));
            self
        }

        pub fn with_entry(mut self, book: &str, keys: &[&str], content: &str) -> Self {
            if self.store.load_book(book).is_err() {
                self.store.insert_book(Book::new(book));
            }
            let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
            self.store.create_entry(book, &keys, content).unwrap();
            self
        }

        pub fn with_commented_entry(mut self, book: &str, keys: &[&str], comment: &str, content: &str) -> Self {
            self = self.with_entry(book, keys, content);
            let uid = self.last_uid(book);
            self.store
                .set_entry_field(book, uid, "comment", comment)
                .unwrap();
            self
        }

        pub fn with_typed_entry(self, book: &str, keys: &[&str], entry_type: &EntryType, contents: &[&str]) -> Self {
            self.with_entry(book, keys, &typed_content(entry_type, contents))
        }

        pub fn with_book_cover(self, book: &str, cover: &str) -> Self {
            let props = crate::model::BookProperties {
                cover: Some(cover.to_string()),
            };
            let block = codec::encode_book(&props).unwrap();
            self.with_entry(book, &["codex-book:"], &block)
        }

        pub fn last_uid(&self, book: &str) -> u64 {
            self.store
                .load_book(book)
                .ok()
                .and_then(|b| b.entries.last().map(|e| e.uid))
                .unwrap_or(0)
        }
    }
}
