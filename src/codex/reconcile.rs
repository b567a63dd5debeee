//! # Type Reconciliation
//!
//! Every typed entry embeds a snapshot of its [`EntryType`]. The live definition in
//! configuration keeps evolving: sections get renamed, reordered, added and deleted.
//! [`reconcile`] brings a snapshot up to date with the live definition.
//!
//! Section identity is the section `id`, never its name. The merge never loses
//! section text:
//!
//! - live sections missing from the snapshot are appended empty
//! - shared sections take layout (name, affixes, inclusion) from the live side and
//!   keep their own content
//! - snapshot sections the live type no longer has hand their content to a newly
//!   added section of the same name, or stay behind flagged `is_removed`; empty
//!   ones are dropped
//!
//! Reconciling an already reconciled snapshot against the same definition reports
//! no change, so callers can persist exactly when `changed` is set.

use crate::entry_type::{EntrySection, EntryType};
use crate::error::CodexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStatus {
    Merged,
    /// The live type no longer exists. The snapshot is returned untouched.
    Orphaned,
    /// The live type handed in does not carry the snapshot's id.
    IdMismatch,
    /// Plain text entries have nothing to reconcile.
    Untyped,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub entry_type: EntryType,
    pub changed: bool,
    pub status: ReconcileStatus,
}

impl Reconciliation {
    fn unchanged(snapshot: &EntryType, status: ReconcileStatus) -> Self {
        Self {
            entry_type: snapshot.clone(),
            changed: false,
            status,
        }
    }

    /// The problem to surface to the user, if any.
    pub fn warning(&self) -> Option<CodexError> {
        match self.status {
            ReconcileStatus::Orphaned => Some(CodexError::OrphanedType {
                id: self.entry_type.id_str().to_string(),
                name: self.entry_type.name.clone(),
            }),
            _ => None,
        }
    }
}

/// Reconcile a snapshot against the live definition list, looked up by id.
pub fn reconcile_with(snapshot: &EntryType, live_types: &[EntryType]) -> Reconciliation {
    let Some(id) = snapshot.id.as_deref() else {
        return Reconciliation::unchanged(snapshot, ReconcileStatus::Untyped);
    };
    let live = live_types.iter().find(|t| t.id.as_deref() == Some(id));
    reconcile(snapshot, live)
}

pub fn reconcile(snapshot: &EntryType, live: Option<&EntryType>) -> Reconciliation {
    if !snapshot.is_typed() {
        return Reconciliation::unchanged(snapshot, ReconcileStatus::Untyped);
    }
    let Some(live) = live else {
        tracing::warn!(id = snapshot.id_str(), name = %snapshot.name, "entry type no longer exists");
        return Reconciliation::unchanged(snapshot, ReconcileStatus::Orphaned);
    };
    if live.id != snapshot.id {
        tracing::debug!(snapshot = snapshot.id_str(), live = live.id_str(), "entry type id mismatch");
        return Reconciliation::unchanged(snapshot, ReconcileStatus::IdMismatch);
    }

    let mut merged = snapshot.clone();
    let mut changed = false;

    changed |= copy_field(&mut merged.name, &live.name);
    changed |= copy_field(&mut merged.default_field_values, &live.default_field_values);
    changed |= copy_field(&mut merged.prefix, &live.prefix);
    changed |= copy_field(&mut merged.suffix, &live.suffix);

    let mut leftover: Vec<EntrySection> = snapshot.section_list.clone();
    let mut sections = Vec::with_capacity(live.section_list.len());
    let mut added = Vec::new();

    for live_section in &live.section_list {
        match leftover.iter().position(|s| s.id == live_section.id) {
            None => {
                added.push(sections.len());
                sections.push(EntrySection::instantiate(live_section));
                changed = true;
            }
            Some(pos) => {
                let mut section = leftover.remove(pos);
                if section.is_removed {
                    section.is_removed = false;
                    changed = true;
                }
                changed |= copy_field(&mut section.name, &live_section.name);
                changed |= copy_field(&mut section.prefix, &live_section.prefix);
                changed |= copy_field(&mut section.suffix, &live_section.suffix);
                if section.is_included != live_section.is_included {
                    section.is_included = live_section.is_included;
                    changed = true;
                }
                sections.push(section);
            }
        }
    }

    for mut section in leftover {
        if section.content.is_empty() {
            changed = true;
            continue;
        }
        let heir = added.iter().copied().find(|&i| {
            sections[i].name.to_lowercase() == section.name.to_lowercase()
                && sections[i].content.is_empty()
        });
        match heir {
            Some(i) => {
                sections[i].content = std::mem::take(&mut section.content);
                changed = true;
            }
            None => {
                if !section.is_removed {
                    section.is_removed = true;
                    changed = true;
                }
                sections.push(section);
            }
        }
    }

    if section_ids(&snapshot.section_list) != section_ids(&sections) {
        changed = true;
    }
    merged.section_list = sections;

    if changed {
        tracing::debug!(id = merged.id_str(), name = %merged.name, "entry type reconciled");
    }
    Reconciliation {
        entry_type: merged,
        changed,
        status: ReconcileStatus::Merged,
    }
}

fn copy_field(target: &mut String, source: &str) -> bool {
    if target == source {
        return false;
    }
    *target = source.to_string();
    true
}

fn section_ids(sections: &[EntrySection]) -> Vec<Option<&str>> {
    sections.iter().map(|s| s.id.as_deref()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, name: &str, content: &str) -> EntrySection {
        EntrySection::new(name).with_id(id).with_content(content)
    }

    fn live(sections: Vec<EntrySection>) -> EntryType {
        let mut t = EntryType::new("T").with_id("T");
        t.section_list = sections;
        t
    }

    fn snapshot() -> EntryType {
        live(vec![section("1", "Notes", "hp 10"), section("2", "Stats", "")])
    }

    #[test]
    fn renamed_section_keeps_content() {
        let l = live(vec![section("1", "Notes", ""), section("2", "Attributes", "")]);
        let r = reconcile(&snapshot(), Some(&l));
        assert!(r.changed);
        assert_eq!(r.status, ReconcileStatus::Merged);
        assert_eq!(r.entry_type.section_list[1].id.as_deref(), Some("2"));
        assert_eq!(r.entry_type.section_list[1].name, "Attributes");
        assert_eq!(r.entry_type.section_list[0].content, "hp 10");
    }

    #[test]
    fn deleted_section_with_content_is_flagged_removed() {
        let s = live(vec![section("1", "Notes", "hp 10"), section("2", "Stats", "str 5")]);
        let l = live(vec![section("1", "Notes", "")]);
        let r = reconcile(&s, Some(&l));
        assert!(r.changed);
        let stats = r.entry_type.section_by_id("2").unwrap();
        assert!(stats.is_removed);
        assert_eq!(stats.content, "str 5");
    }

    #[test]
    fn deleted_empty_section_is_dropped() {
        let l = live(vec![section("1", "Notes", "")]);
        let r = reconcile(&snapshot(), Some(&l));
        assert!(r.changed);
        assert_eq!(r.entry_type.section_list.len(), 1);
    }

    #[test]
    fn orphaned_content_moves_to_new_section_of_same_name() {
        let s = live(vec![section("1", "Notes", "hp 10"), section("2", "Stats", "str 5")]);
        let l = live(vec![section("1", "Notes", ""), section("3", "STATS", "")]);
        let r = reconcile(&s, Some(&l));
        assert!(r.changed);
        let ids: Vec<_> = r.entry_type.section_list.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![Some("1".into()), Some("3".into())]);
        assert_eq!(r.entry_type.section_list[1].content, "str 5");
        assert!(!r.entry_type.section_list[1].is_removed);
    }

    #[test]
    fn two_orphans_never_share_one_heir() {
        let s = live(vec![section("1", "Stats", "a"), section("2", "stats", "b")]);
        let l = live(vec![section("3", "Stats", "")]);
        let r = reconcile(&s, Some(&l));
        let contents: Vec<_> = r.entry_type.section_list.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
        assert!(r.entry_type.section_by_id("2").unwrap().is_removed);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let s = live(vec![
            section("1", "Notes", "hp 10"),
            section("2", "Stats", "str 5"),
            section("4", "Gone", ""),
        ]);
        let l = live(vec![section("5", "New", ""), section("1", "Renamed", "")])
            .with_affixes("[", "]");
        let first = reconcile(&s, Some(&l));
        assert!(first.changed);
        let second = reconcile(&first.entry_type, Some(&l));
        assert!(!second.changed);
        assert_eq!(second.entry_type, first.entry_type);
    }

    #[test]
    fn unchanged_snapshot_reports_no_change() {
        let s = snapshot();
        let r = reconcile(&s, Some(&s.clone()));
        assert!(!r.changed);
    }

    #[test]
    fn reordering_is_a_change() {
        let l = live(vec![section("2", "Stats", ""), section("1", "Notes", "")]);
        let r = reconcile(&snapshot(), Some(&l));
        assert!(r.changed);
        assert_eq!(r.entry_type.section_list[1].content, "hp 10");
    }

    #[test]
    fn scalar_fields_follow_live_type() {
        let mut l = snapshot().with_default_fields("role=1");
        l.name = "Renamed".into();
        let r = reconcile(&snapshot(), Some(&l));
        assert!(r.changed);
        assert_eq!(r.entry_type.name, "Renamed");
        assert_eq!(r.entry_type.default_field_values, "role=1");
    }

    #[test]
    fn orphaned_and_mismatched_types_are_left_alone() {
        let r = reconcile_with(&snapshot(), &[]);
        assert_eq!(r.status, ReconcileStatus::Orphaned);
        assert!(!r.changed);
        assert!(matches!(r.warning(), Some(CodexError::OrphanedType { .. })));

        let other = EntryType::new("Other").with_id("X");
        let r = reconcile(&snapshot(), Some(&other));
        assert_eq!(r.status, ReconcileStatus::IdMismatch);
        assert!(!r.changed);
    }

    #[test]
    fn untyped_snapshot_never_reconciles() {
        let r = reconcile_with(&EntryType::basic("text"), &[snapshot()]);
        assert_eq!(r.status, ReconcileStatus::Untyped);
        assert!(!r.changed);
    }
}
