use codex::api::{BookSummary, BulkReport, CmdMessage, MessageLevel};
use codex::config::CodexConfig;
use codex::entry_type::EntryType;
use codex::model::Match;
use colored::Colorize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const LINE_WIDTH: usize = 100;
const BOOK_WIDTH: usize = 24;
const EXCLUDED_MARKER: &str = "⊘";

pub(super) fn print_messages(messages: &[CmdMessage]) {
    for line in render_messages(messages) {
        println!("{}", line);
    }
}

pub(super) fn print_books(books: &[BookSummary]) {
    for line in render_books(books) {
        println!("{}", line);
    }
}

pub(super) fn print_matches(matches: &[Match]) {
    for line in render_matches(matches) {
        println!("{}", line);
    }
}

pub(super) fn print_entry_types(types: &[EntryType]) {
    for line in render_entry_types(types) {
        println!("{}", line);
    }
}

pub(super) fn print_report(report: &BulkReport) {
    for line in render_report(report) {
        println!("{}", line);
    }
}

pub(super) fn print_config(config: &CodexConfig) {
    for (key, value) in config.entries() {
        println!("{} = {}", key.bold(), value);
    }
}

fn render_messages(messages: &[CmdMessage]) -> Vec<String> {
    messages
        .iter()
        .map(|message| match message.level {
            MessageLevel::Info => message.content.dimmed().to_string(),
            MessageLevel::Success => message.content.green().to_string(),
            MessageLevel::Warning => message.content.yellow().to_string(),
            MessageLevel::Error => message.content.red().to_string(),
        })
        .collect()
}

fn render_books(books: &[BookSummary]) -> Vec<String> {
    books
        .iter()
        .map(|book| {
            let count = format!("{} entries", book.entry_count);
            match &book.cover {
                Some(cover) => format!("{}  {}  {}", book.name.bold(), count.dimmed(), cover),
                None => format!("{}  {}", book.name.bold(), count.dimmed()),
            }
        })
        .collect()
}

fn render_matches(matches: &[Match]) -> Vec<String> {
    matches
        .iter()
        .map(|m| {
            let id = format!("{}#{}", m.book, m.entry.uid);
            let id = truncate_to_width(&id, BOOK_WIDTH);
            let padding = BOOK_WIDTH.saturating_sub(id.width());

            let title = m.entry.title();
            let preview: String = m
                .entry
                .content
                .chars()
                .take(80)
                .map(|c| if c == '\n' { ' ' } else { c })
                .collect();
            let available = LINE_WIDTH.saturating_sub(BOOK_WIDTH + 2 + title.width() + 1);
            let preview = truncate_to_width(preview.trim(), available);

            format!(
                "{}{}  {} {}",
                id.yellow(),
                " ".repeat(padding),
                title.bold(),
                preview.dimmed()
            )
        })
        .collect()
}

fn render_entry_types(types: &[EntryType]) -> Vec<String> {
    if types.is_empty() {
        return vec!["No entry types defined".dimmed().to_string()];
    }
    let mut lines = Vec::new();
    for entry_type in types {
        lines.push(entry_type.name.bold().to_string());
        for section in &entry_type.section_list {
            if section.is_included {
                lines.push(format!("    {}", section.name));
            } else {
                lines.push(format!("  {} {}", EXCLUDED_MARKER.red(), section.name.dimmed()));
            }
        }
    }
    lines
}

fn render_report(report: &BulkReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{}: {} scanned, {} matched, {} saved",
        report.type_name.bold(),
        report.scanned,
        report.matched,
        report.saved.len()
    )];
    for (book, uid, field) in &report.fields_set {
        lines.push(format!("  {}#{} {}", book, uid, field.dimmed()));
    }
    for error in &report.errors {
        lines.push(format!("  {}", error.red()));
    }
    lines
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            result.push('…');
            return result;
        }
        result.push(c);
        current_width += char_width;
    }

    result
}
