//! Entry type commands: listing, the bulk reconciliation pass and section inclusion.
//!
//! The bulk pass brings every entry of one type in line with the type's current
//! definition. It is safe to re-run: entries that are already current are neither
//! rewritten nor saved, and default fields are only written when they differ.

use std::thread;
use std::time::Duration;

use crate::commands::{CmdMessage, CmdResult, CodexPaths};
use crate::config::CodexConfig;
use crate::entry_type::{DefaultFieldValue, EntryType};
use crate::error::{CodexError, Result};
use crate::model::Entry;
use crate::properties::CodexEntryProperties;
use crate::reconcile::reconcile;
use crate::store::{self, KnowledgeStore};

/// Outcome of a bulk pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub type_name: String,
    /// Entries looked at, excluding maps and character lists.
    pub scanned: usize,
    /// Entries holding the type.
    pub matched: usize,
    pub saved: Vec<(String, u64)>,
    pub fields_set: Vec<(String, u64, String)>,
    pub errors: Vec<String>,
}

impl BulkReport {
    pub fn is_clean(&self) -> bool {
        self.saved.is_empty() && self.fields_set.is_empty() && self.errors.is_empty()
    }
}

pub fn list(config: &CodexConfig) -> CmdResult {
    CmdResult::default().with_entry_types(config.entry_type_list.clone())
}

pub fn apply<S: KnowledgeStore>(
    store: &mut S,
    config: &CodexConfig,
    type_name: &str,
) -> Result<CmdResult> {
    let live = config
        .entry_type_by_name(type_name)
        .ok_or_else(|| CodexError::TypeNotFound(type_name.to_string()))?;
    let report = reconcile_all(store, live, Duration::from_millis(config.bulk_pace_ms))?;
    Ok(report_result(report))
}

/// Reconcile every entry of `live`'s type across all books.
///
/// Failures of single books or entries are collected in the report; only a store
/// that cannot list its books fails the pass.
pub fn reconcile_all<S: KnowledgeStore>(
    store: &mut S,
    live: &EntryType,
    pace: Duration,
) -> Result<BulkReport> {
    let mut report = BulkReport {
        type_name: live.name.clone(),
        ..BulkReport::default()
    };
    let directives = ordered_directives(live);
    tracing::info!(entry_type = %live.name, "updating entries of type");

    for name in store.list_books()? {
        let book = match store.load_book(&name) {
            Ok(book) => book,
            Err(err) => {
                tracing::warn!(book = %name, %err, "skipping book");
                report.errors.push(format!("{}: {}", name, err));
                continue;
            }
        };
        for entry in book.entries {
            if entry.is_map() || entry.is_char_list() {
                continue;
            }
            report.scanned += 1;
            let (book, uid) = (entry.book.clone(), entry.uid);
            if let Err(err) = apply_to_entry(store, entry, live, &directives, &mut report) {
                tracing::warn!(%book, uid, %err, "entry update failed");
                report.errors.push(format!("{}#{}: {}", book, uid, err));
            }
            if !pace.is_zero() {
                thread::sleep(pace);
            }
        }
    }

    tracing::info!(
        entry_type = %live.name,
        matched = report.matched,
        saved = report.saved.len(),
        errors = report.errors.len(),
        "entry type update finished"
    );
    Ok(report)
}

fn apply_to_entry<S: KnowledgeStore>(
    store: &mut S,
    mut entry: Entry,
    live: &EntryType,
    directives: &[DefaultFieldValue],
    report: &mut BulkReport,
) -> Result<()> {
    let mut props = CodexEntryProperties::from_entry(&mut entry)?;
    if !props.entry_type.is_typed() || props.entry_type.id != live.id {
        return Ok(());
    }
    report.matched += 1;

    let merged = reconcile(&props.entry_type, Some(live));
    if merged.changed {
        props.entry_type = merged.entry_type;
        props.update_entry_content(&mut entry)?;
    }
    let changes = entry.changes();
    if !changes.is_empty() {
        store.save_entry(&entry, &changes)?;
        entry.mark_saved();
        report.saved.push((entry.book.clone(), entry.uid));
    }

    for directive in directives {
        if holds_value(&entry, directive) {
            continue;
        }
        store.set_entry_field(&entry.book, entry.uid, &directive.field, &directive.value)?;
        report
            .fields_set
            .push((entry.book.clone(), entry.uid, directive.field.clone()));
    }
    Ok(())
}

/// Whether writing the directive would leave the stored record as it is. The
/// value goes through the same conversion the store applies, so `1` on a
/// boolean field counts as `true`.
fn holds_value(entry: &Entry, directive: &DefaultFieldValue) -> bool {
    store::set_field(entry, &directive.field, &directive.value)
        .is_ok_and(|updated| updated.same_record(entry))
}

/// Default field directives, trimmed, `role` first.
fn ordered_directives(live: &EntryType) -> Vec<DefaultFieldValue> {
    let mut directives: Vec<DefaultFieldValue> = live
        .default_field_list()
        .into_iter()
        .map(|d| DefaultFieldValue {
            field: d.field.trim().to_string(),
            value: d.value.trim().to_string(),
        })
        .collect();
    directives.sort_by_key(|d| d.field != "role");
    directives
}

fn report_result(report: BulkReport) -> CmdResult {
    let mut result = CmdResult::default();
    if report.is_clean() {
        result.add_message(CmdMessage::info(format!(
            "{} entries of type {} are up to date",
            report.matched, report.type_name
        )));
    } else {
        result.add_message(CmdMessage::success(format!(
            "Updated {} of {} entries of type {}",
            report.saved.len(),
            report.matched,
            report.type_name
        )));
    }
    for err in &report.errors {
        result.add_message(CmdMessage::error(err.clone()));
    }
    result.with_report(report)
}

/// Include or exclude a type section from model-visible text.
///
/// With `value` unset the inclusion is toggled. The change is saved to the
/// configuration; with `run_apply` the bulk pass follows so existing entries
/// pick it up.
pub fn section_wi<S: KnowledgeStore>(
    store: &mut S,
    paths: &CodexPaths,
    type_name: &str,
    section_name: &str,
    value: Option<bool>,
    run_apply: bool,
) -> Result<CmdResult> {
    let dir = paths.config_dir();
    let mut config = CodexConfig::load(&dir)?;
    let live = config
        .entry_type_by_name_mut(type_name)
        .ok_or_else(|| CodexError::TypeNotFound(type_name.to_string()))?;
    let Some(section) = live.section_mut(section_name) else {
        let mut result = CmdResult::default();
        result.add_message(CmdMessage::error(format!(
            "Type {} has no section named {}",
            live.name, section_name
        )));
        return Ok(result);
    };
    section.is_included = value.unwrap_or(!section.is_included);
    let included = section.is_included;
    let live = live.clone();
    config.save(&dir)?;
    tracing::info!(entry_type = %live.name, section = section_name, included, "section inclusion changed");

    let mut result = if run_apply {
        let report = reconcile_all(store, &live, Duration::from_millis(config.bulk_pace_ms))?;
        report_result(report)
    } else {
        CmdResult::default()
    };
    result.messages.insert(
        0,
        CmdMessage::success(format!(
            "Section {} of {} is {}",
            section_name,
            live.name,
            if included { "included" } else { "excluded" }
        )),
    );
    Ok(result.with_entry_types(vec![live]))
}
