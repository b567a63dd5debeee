use std::path::PathBuf;

use crate::config::CodexConfig;
use crate::entry_type::EntryType;
use crate::model::{Entry, Match};

pub mod books;
pub mod config;
pub mod edit;
pub mod helpers;
pub mod link;
pub mod matches;
pub mod show;
pub mod types;

pub use types::BulkReport;

#[derive(Debug, Clone)]
pub struct CodexPaths {
    pub data: PathBuf,
}

impl CodexPaths {
    pub fn new(data: impl Into<PathBuf>) -> Self {
        Self { data: data.into() }
    }

    pub fn books_dir(&self) -> PathBuf {
        self.data.join("books")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.data.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

/// A book as listed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSummary {
    pub name: String,
    pub entry_count: usize,
    pub cover: Option<String>,
}

#[derive(Debug, Default)]
pub struct CmdResult {
    pub matches: Vec<Match>,
    pub texts: Vec<String>,
    pub books: Vec<BookSummary>,
    pub entry_types: Vec<EntryType>,
    pub affected_entries: Vec<Entry>,
    pub html: Option<String>,
    pub report: Option<BulkReport>,
    pub config: Option<CodexConfig>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_matches(mut self, matches: Vec<Match>) -> Self {
        self.matches = matches;
        self
    }

    pub fn with_texts(mut self, texts: Vec<String>) -> Self {
        self.texts = texts;
        self
    }

    pub fn with_books(mut self, books: Vec<BookSummary>) -> Self {
        self.books = books;
        self
    }

    pub fn with_entry_types(mut self, entry_types: Vec<EntryType>) -> Self {
        self.entry_types = entry_types;
        self
    }

    pub fn with_affected_entries(mut self, entries: Vec<Entry>) -> Self {
        self.affected_entries = entries;
        self
    }

    pub fn with_html(mut self, html: String) -> Self {
        self.html = Some(html);
        self
    }

    pub fn with_report(mut self, report: BulkReport) -> Self {
        self.report = Some(report);
        self
    }

    pub fn with_config(mut self, config: CodexConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.level == MessageLevel::Error)
    }
}
