use std::rc::Rc;

use crate::commands::helpers::{load_matcher, EntrySelector};
use crate::commands::{CmdMessage, CmdResult};
use crate::config::CodexConfig;
use crate::error::{CodexError, Result};
use crate::linker::Linker;
use crate::model::{Entry, Match};
use crate::properties::CodexEntryProperties;
use crate::render::{EntryRenderer, Renderer};
use crate::store::KnowledgeStore;

/// Render the entry panel for a selector.
///
/// Text selects the first match (leftmost first when cycling is on), or every match
/// with `all`. Opening an entry reconciles its type; a snapshot that changed, or a
/// legacy entry that was migrated, is saved back.
pub fn run<S: KnowledgeStore, R: Renderer>(
    store: &mut S,
    config: &CodexConfig,
    renderer: &R,
    selector: &EntrySelector,
    all: bool,
) -> Result<CmdResult> {
    let matcher = Rc::new(load_matcher(&*store, config)?);
    let mut shown = match selector {
        EntrySelector::Exact { book, uid } => vec![matcher
            .find_entry(book, *uid)
            .ok_or_else(|| CodexError::EntryNotFound {
                book: book.clone(),
                uid: *uid,
            })?],
        EntrySelector::Text(text) => {
            let found = matcher.find_matches(text);
            if config.cycle {
                matcher.order_by_occurrence(text, found)
            } else {
                found
            }
        }
    };
    if !all {
        shown.truncate(1);
    }

    let mut result = CmdResult::default();
    if shown.is_empty() {
        result.add_message(CmdMessage::info("No matching entries"));
        return Ok(result);
    }

    let linker = Linker::new(Rc::clone(&matcher), config.into());
    let panel = EntryRenderer::new(config, renderer).with_linker(&linker);
    let mut panels = Vec::new();
    let mut opened = Vec::new();
    let mut saved = Vec::new();
    for found in shown {
        let mut entry = found.entry;
        let (props, problems) = CodexEntryProperties::open(&mut entry, &config.entry_type_list);
        for problem in problems {
            result.add_message(CmdMessage::warning(format!(
                "{}: {}",
                props.title(&entry),
                problem
            )));
        }
        panels.push(panel.render(&entry, &props));
        match persist(store, &mut entry, &mut result) {
            Ok(true) => saved.push(entry.clone()),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(book = %entry.book, uid = entry.uid, %err, "could not save opened entry");
                result.add_message(CmdMessage::error(format!(
                    "Could not save {}#{}: {}",
                    entry.book, entry.uid, err
                )));
            }
        }
        opened.push(Match::new(found.book, entry));
    }

    Ok(result
        .with_matches(opened)
        .with_affected_entries(saved)
        .with_html(panels.join("\n")))
}

fn persist<S: KnowledgeStore>(
    store: &mut S,
    entry: &mut Entry,
    result: &mut CmdResult,
) -> Result<bool> {
    let changes = entry.changes();
    if changes.is_empty() {
        return Ok(false);
    }
    store.save_entry(entry, &changes)?;
    entry.mark_saved();
    result.add_message(CmdMessage::info(format!(
        "Updated {}#{} ({})",
        entry.book,
        entry.uid,
        changes
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    )));
    Ok(true)
}
