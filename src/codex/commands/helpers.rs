use std::str::FromStr;

use crate::config::CodexConfig;
use crate::error::{CodexError, Result};
use crate::matcher::{MatchPolicy, Matcher};
use crate::model::Entry;
use crate::store::KnowledgeStore;

/// How a command names an entry: `Book#uid`, or text whose first match is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySelector {
    Exact { book: String, uid: u64 },
    Text(String),
}

impl FromStr for EntrySelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some((book, uid)) = s.rsplit_once('#') {
            if let Ok(uid) = uid.trim().parse() {
                if !book.trim().is_empty() {
                    return Ok(Self::Exact {
                        book: book.trim().to_string(),
                        uid,
                    });
                }
            }
        }
        Ok(Self::Text(s.to_string()))
    }
}

pub fn load_matcher<S: KnowledgeStore>(store: &S, config: &CodexConfig) -> Result<Matcher> {
    let books = store.load_books()?;
    Ok(Matcher::new(books, MatchPolicy::from(config)))
}

pub fn select_entry<S: KnowledgeStore>(
    store: &S,
    config: &CodexConfig,
    selector: &EntrySelector,
) -> Result<Entry> {
    match selector {
        EntrySelector::Exact { book, uid } => store
            .load_book(book)?
            .entries
            .into_iter()
            .find(|e| e.uid == *uid)
            .ok_or_else(|| CodexError::EntryNotFound {
                book: book.clone(),
                uid: *uid,
            }),
        EntrySelector::Text(text) => load_matcher(store, config)?
            .find_matches(text)
            .into_iter()
            .next()
            .map(|m| m.entry)
            .ok_or_else(|| CodexError::Api(format!("No entry matches {:?}", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::fixtures::StoreFixture;

    #[test]
    fn parses_selectors() {
        assert_eq!(
            "World#3".parse::<EntrySelector>().unwrap(),
            EntrySelector::Exact {
                book: "World".into(),
                uid: 3
            }
        );
        assert_eq!(
            "Elaria #x".parse::<EntrySelector>().unwrap(),
            EntrySelector::Text("Elaria #x".into())
        );
        assert_eq!(
            "#3".parse::<EntrySelector>().unwrap(),
            EntrySelector::Text("#3".into())
        );
    }

    #[test]
    fn selects_by_uid_or_text() {
        let store = StoreFixture::new()
            .with_entry("World", &["Elaria"], "A city")
            .with_entry("World", &["Rose"], "A captain")
            .store;
        let config = CodexConfig::default();

        let exact = EntrySelector::Exact {
            book: "World".into(),
            uid: 1,
        };
        assert_eq!(select_entry(&store, &config, &exact).unwrap().content, "A captain");

        let text = EntrySelector::Text("meet rose".into());
        assert_eq!(select_entry(&store, &config, &text).unwrap().uid, 1);

        let none = EntrySelector::Text("nobody".into());
        assert!(select_entry(&store, &config, &none).is_err());
    }
}
