use crate::commands::helpers::load_matcher;
use crate::commands::{CmdMessage, CmdResult};
use crate::config::CodexConfig;
use crate::error::Result;
use crate::matcher::Matcher;
use crate::model::{EntryKind, Match};
use crate::properties::CodexEntryProperties;
use crate::store::KnowledgeStore;

/// Entries relevant to `text`, in book and definition order.
pub fn run<S: KnowledgeStore>(store: &S, config: &CodexConfig, text: &str) -> Result<CmdResult> {
    let matcher = load_matcher(store, config)?;
    let matches = matcher.find_matches(text);
    let mut result = CmdResult::default();
    report_rejected(&matcher, &mut result);
    if matches.is_empty() {
        result.add_message(CmdMessage::info("No matching entries"));
    }
    Ok(result.with_matches(matches))
}

/// Model-visible content of every matching entry, maps and character lists excluded.
pub fn contents<S: KnowledgeStore>(
    store: &S,
    config: &CodexConfig,
    text: &str,
) -> Result<CmdResult> {
    let matcher = load_matcher(store, config)?;
    let mut result = CmdResult::default();
    report_rejected(&matcher, &mut result);

    let mut matches = Vec::new();
    let mut texts = Vec::new();
    for found in matcher.find_matches(text) {
        let mut entry = found.entry.clone();
        let props = CodexEntryProperties::from_entry_lossy(&mut entry);
        if !EntryKind::resolve(&entry, &props).is_textual() {
            continue;
        }
        texts.push(props.entry_type.to_string());
        matches.push(Match::new(found.book, entry));
    }
    Ok(result.with_matches(matches).with_texts(texts))
}

fn report_rejected(matcher: &Matcher, result: &mut CmdResult) {
    for rejected in matcher.rejected() {
        result.add_message(CmdMessage::warning(format!(
            "{}#{} skipped, key {:?}: {}",
            rejected.book, rejected.uid, rejected.key, rejected.reason
        )));
    }
}
