use crate::commands::helpers::{select_entry, EntrySelector};
use crate::commands::{CmdMessage, CmdResult};
use crate::config::CodexConfig;
use crate::error::{CodexError, Result};
use crate::model::Entry;
use crate::properties::CodexEntryProperties;
use crate::reconcile::reconcile_with;
use crate::store::KnowledgeStore;

/// Replace the text of one section of an entry, or the whole text of a plain entry.
///
/// The type snapshot is brought up to date first so section names refer to the
/// live definition.
pub fn set_section<S: KnowledgeStore>(
    store: &mut S,
    config: &CodexConfig,
    selector: &EntrySelector,
    section: Option<&str>,
    content: &str,
) -> Result<CmdResult> {
    let mut entry = select_entry(&*store, config, selector)?;
    let mut props = CodexEntryProperties::from_entry(&mut entry)?;
    let merged = reconcile_with(&props.entry_type, &config.entry_type_list);
    props.entry_type = merged.entry_type;

    props.set_section_content(section, content)?;
    props.update_entry_content(&mut entry)?;
    save(store, entry, &props)
}

/// Switch an entry to the named type, or back to plain text with `None`.
pub fn set_type<S: KnowledgeStore>(
    store: &mut S,
    config: &CodexConfig,
    selector: &EntrySelector,
    type_name: Option<&str>,
) -> Result<CmdResult> {
    let target = type_name
        .map(|name| {
            config
                .entry_type_by_name(name)
                .ok_or_else(|| CodexError::TypeNotFound(name.to_string()))
        })
        .transpose()?;
    let mut entry = select_entry(&*store, config, selector)?;
    let mut props = CodexEntryProperties::from_entry(&mut entry)?;

    if !props.change_type(target) {
        let mut result = CmdResult::default();
        result.add_message(CmdMessage::info(format!(
            "{} already is {}",
            props.title(&entry),
            type_name.unwrap_or("plain text")
        )));
        return Ok(result);
    }
    props.update_entry_content(&mut entry)?;
    save(store, entry, &props)
}

fn save<S: KnowledgeStore>(
    store: &mut S,
    mut entry: Entry,
    props: &CodexEntryProperties,
) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    let changes = entry.changes();
    let title = props.title(&entry);
    if changes.is_empty() {
        result.add_message(CmdMessage::info(format!("{} unchanged", title)));
        return Ok(result);
    }
    store.save_entry(&entry, &changes)?;
    entry.mark_saved();
    result.add_message(CmdMessage::success(format!("Saved {}", title)));
    Ok(result.with_affected_entries(vec![entry]))
}
