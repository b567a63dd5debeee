use crate::commands::{BookSummary, CmdMessage, CmdResult};
use crate::error::Result;
use crate::store::KnowledgeStore;

pub fn run<S: KnowledgeStore>(store: &S) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    let mut books = Vec::new();
    for name in store.list_books()? {
        match store.load_book(&name) {
            Ok(book) => {
                let hidden = book.properties_entry().map(|e| e.uid);
                books.push(BookSummary {
                    entry_count: book
                        .entries
                        .iter()
                        .filter(|e| Some(e.uid) != hidden)
                        .count(),
                    cover: book.cover(),
                    name,
                });
            }
            Err(err) => result.add_message(CmdMessage::error(format!("{}: {}", name, err))),
        }
    }
    if books.is_empty() && !result.has_errors() {
        result.add_message(CmdMessage::info("No books found"));
    }
    Ok(result.with_books(books))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::fixtures::StoreFixture;

    #[test]
    fn lists_books_with_counts_and_covers() {
        let store = StoreFixture::new()
            .with_entry("World", &["Elaria"], "A city")
            .with_entry("World", &["Rose"], "A captain")
            .with_book_cover("World", "cover.png")
            .with_book("Empty")
            .store;

        let res = run(&store).unwrap();
        assert_eq!(
            res.books,
            vec![
                BookSummary {
                    name: "World".into(),
                    entry_count: 2,
                    cover: Some("cover.png".into()),
                },
                BookSummary {
                    name: "Empty".into(),
                    entry_count: 0,
                    cover: None,
                },
            ]
        );
        assert!(res.messages.is_empty());
    }

    #[test]
    fn empty_store_says_so() {
        let store = StoreFixture::new().store;
        let res = run(&store).unwrap();
        assert!(res.books.is_empty());
        assert_eq!(res.messages[0].content, "No books found");
    }
}
