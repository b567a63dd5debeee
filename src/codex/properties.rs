//! Per-entry properties carried in the trailing `codex:` block.
//!
//! The visible part of a typed entry's content is always regenerated from its type
//! snapshot, so the content of an entry is exactly
//! `entry_type.to_string() + to_block()`.
//!
//! Entries written by older versions keep their overrides in reserved keys
//! (`codex-title:`, `codex-tpl:`) and their type in a `codex-type:` block. Loading
//! such an entry migrates it in place; the entry then reports the migrated fields
//! as changes and the next save persists the new form.

use serde::{Deserialize, Serialize};

use crate::codec::{self, BlockKind};
use crate::entry_type::{EntrySection, EntryType};
use crate::error::{CodexError, Result};
use crate::keys;
use crate::model::Entry;
use crate::reconcile::{reconcile, reconcile_with};

/// Section name given to the text of a plain entry switched to a structured type.
pub const UNSECTIONED: &str = "NO SECTION";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodexEntryProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(rename = "type", default = "untyped")]
    pub entry_type: EntryType,
}

fn untyped() -> EntryType {
    EntryType::basic("")
}

impl Default for CodexEntryProperties {
    fn default() -> Self {
        Self::plain("")
    }
}

impl CodexEntryProperties {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            title_field: None,
            template_name: None,
            entry_type: EntryType::basic(text),
        }
    }

    pub fn typed(entry_type: EntryType) -> Self {
        Self {
            title_field: None,
            template_name: None,
            entry_type,
        }
    }

    /// Read the properties of an entry, migrating legacy directives.
    ///
    /// A block that is not ours is ignored. A block with a broken JSON payload is a
    /// [`CodexError::Decode`]; callers treat the entry as plain text.
    pub fn from_entry(entry: &mut Entry) -> Result<Self> {
        if let Some(block) =
            codec::find_block(&entry.content).filter(|b| b.kind == BlockKind::Properties)
        {
            if let Some(mut props) = codec::decode_payload::<Self>(block.payload)? {
                if !props.entry_type.is_typed() {
                    let visible = codec::strip_block(&entry.content, &block);
                    props.set_plain_text(visible);
                }
                return Ok(props);
            }
        }
        Self::migrate(entry)
    }

    /// [`Self::from_entry`] with decode problems logged and the entry read as plain text.
    pub fn from_entry_lossy(entry: &mut Entry) -> Self {
        match Self::from_entry(entry) {
            Ok(props) => props,
            Err(err) => {
                tracing::warn!(book = %entry.book, uid = entry.uid, %err, "reading entry as plain text");
                Self::plain(entry.content.clone())
            }
        }
    }

    /// Read an entry for display, bringing its type snapshot up to date with the
    /// live definitions. A changed snapshot is written back into `entry.content`,
    /// leaving the entry dirty. Problems are returned alongside for the caller to
    /// show; an unreadable block falls back to plain text.
    pub fn open(entry: &mut Entry, live_types: &[EntryType]) -> (Self, Vec<CodexError>) {
        let mut problems = Vec::new();
        let mut props = match Self::from_entry(entry) {
            Ok(props) => props,
            Err(err) => {
                problems.push(err);
                return (Self::plain(entry.content.clone()), problems);
            }
        };
        let merged = reconcile_with(&props.entry_type, live_types);
        problems.extend(merged.warning());
        if merged.changed {
            tracing::debug!(book = %entry.book, uid = entry.uid, "entry type snapshot updated");
            props.entry_type = merged.entry_type;
            if let Err(err) = props.update_entry_content(entry) {
                problems.push(err);
            }
        }
        (props, problems)
    }

    fn migrate(entry: &mut Entry) -> Result<Self> {
        let mut props = Self::plain("");
        let mut migrated = false;

        if let Some(block) = codec::find_type_block(&entry.content) {
            if let Some(entry_type) = codec::decode_payload::<EntryType>(block.payload)? {
                props.entry_type = entry_type;
                entry.content = codec::strip_block(&entry.content, &block);
                migrated = true;
            }
        }
        if let Some(field) = take_directive(&mut entry.key_list, keys::TITLE) {
            props.title_field = Some(field);
            migrated = true;
        }
        if let Some(name) = take_directive(&mut entry.key_list, keys::TEMPLATE) {
            props.template_name = Some(name);
            migrated = true;
        }
        if !props.entry_type.is_typed() {
            props.set_plain_text(entry.content.clone());
        }

        if migrated {
            let block = props.to_block()?;
            entry.content.push_str(&block);
            tracing::info!(book = %entry.book, uid = entry.uid, "migrated legacy entry directives");
        }
        Ok(props)
    }

    fn set_plain_text(&mut self, text: String) {
        match self.entry_type.section_list.first_mut() {
            Some(section) => section.content = text,
            None => self.entry_type = EntryType::basic(text),
        }
    }

    pub fn is_plain(&self) -> bool {
        !self.entry_type.is_typed()
    }

    fn has_overrides(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        set(&self.title_field) || set(&self.template_name)
    }

    /// `"\n{{//codex:...}}"`, or nothing for a plain entry without overrides.
    pub fn to_block(&self) -> Result<String> {
        if self.is_plain() && !self.has_overrides() {
            return Ok(String::new());
        }
        Ok(format!("\n{}", codec::encode(self)?))
    }

    /// Full entry content: model-visible text plus the properties block.
    pub fn render_content(&self) -> Result<String> {
        Ok(format!("{}{}", self.entry_type, self.to_block()?))
    }

    pub fn update_entry_content(&self, entry: &mut Entry) -> Result<()> {
        entry.content = self.render_content()?;
        Ok(())
    }

    /// Display title, honouring the `titleField` override.
    pub fn title(&self, entry: &Entry) -> String {
        self.title_field
            .as_deref()
            .filter(|f| !f.is_empty())
            .and_then(|field| entry.title_from_field(field))
            .unwrap_or_else(|| entry.title())
    }

    /// Replace the text of one section, or the whole text of a plain entry.
    ///
    /// Emptying a section already flagged removed drops it.
    pub fn set_section_content(&mut self, name: Option<&str>, content: &str) -> Result<()> {
        if self.is_plain() {
            self.set_plain_text(content.to_string());
            return Ok(());
        }
        let name = name.ok_or_else(|| {
            CodexError::Api(format!("entry type {} needs a section name", self.entry_type.name))
        })?;
        let idx = self
            .entry_type
            .section_list
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CodexError::Api(format!("no section named {:?}", name)))?;
        let section = &mut self.entry_type.section_list[idx];
        section.content = content.to_string();
        if section.is_removed && content.is_empty() {
            self.entry_type.section_list.remove(idx);
        }
        Ok(())
    }

    /// Switch to another type, or back to plain text with `None`.
    ///
    /// Existing section text is carried into the new type through reconciliation;
    /// the text of a plain entry becomes a single section named [`UNSECTIONED`].
    /// Returns whether anything changed.
    pub fn change_type(&mut self, target: Option<&EntryType>) -> bool {
        match target {
            Some(live) => {
                if live.id.is_none() || self.entry_type.id == live.id {
                    return false;
                }
                let sections = if self.is_plain() {
                    vec![EntrySection::new(UNSECTIONED).with_content(self.entry_type.to_string())]
                } else {
                    self.entry_type.section_list.clone()
                };
                let mut candidate = live.clone();
                candidate.section_list = sections;
                self.entry_type = reconcile(&candidate, Some(live)).entry_type;
                true
            }
            None => {
                if self.is_plain() {
                    return false;
                }
                let text = self.entry_type.to_string();
                self.entry_type = EntryType::basic(text);
                true
            }
        }
    }
}

fn take_directive(key_list: &mut Vec<String>, token: &str) -> Option<String> {
    let idx = key_list.iter().position(|k| keys::has_prefix(k, token))?;
    let key = key_list.remove(idx);
    keys::strip_token(&key, token).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryField;

    fn npc() -> EntryType {
        EntryType::new("NPC")
            .with_id("t1")
            .with_section(EntrySection::new("Notes").with_id("s1").with_affixes("", "\n"))
            .with_section(EntrySection::new("Stats").with_id("s2"))
    }

    fn entry(content: &str, keys: &[&str]) -> Entry {
        Entry::new("World", 1, keys.iter().map(|s| s.to_string()).collect(), content)
    }

    #[test]
    fn plain_entry_has_no_block() {
        let mut e = entry("Just text", &["Elaria"]);
        let props = CodexEntryProperties::from_entry(&mut e).unwrap();
        assert!(props.is_plain());
        assert_eq!(props.to_block().unwrap(), "");
        assert_eq!(props.render_content().unwrap(), "Just text");
        assert!(!e.is_dirty());
    }

    #[test]
    fn typed_entry_round_trips_byte_identical() {
        let mut t = npc();
        t.section_list[0].content = "hp 10".into();
        let props = CodexEntryProperties::typed(t);
        let content = props.render_content().unwrap();
        assert!(content.starts_with("hp 10\n\n{{//codex:"));

        let mut e = entry(&content, &["Elaria"]);
        let loaded = CodexEntryProperties::from_entry(&mut e).unwrap();
        assert_eq!(loaded, props);
        loaded.update_entry_content(&mut e).unwrap();
        assert!(!e.is_dirty());
    }

    #[test]
    fn migrates_legacy_directives() {
        let type_block = codec::encode_type(&npc()).unwrap();
        let mut e = entry(
            &format!("Body\n{}", type_block),
            &["Elaria", "codex-title:key[0]", "codex-tpl:Wide", "Port"],
        );
        let props = CodexEntryProperties::from_entry(&mut e).unwrap();

        assert_eq!(props.title_field.as_deref(), Some("key[0]"));
        assert_eq!(props.template_name.as_deref(), Some("Wide"));
        assert_eq!(props.entry_type.id.as_deref(), Some("t1"));
        assert_eq!(e.key_list, vec!["Elaria", "Port"]);
        assert!(e.content.starts_with("Body\n{{//codex:"));
        assert_eq!(e.changes(), vec![EntryField::Content, EntryField::Key]);

        let again = CodexEntryProperties::from_entry(&mut e.clone()).unwrap();
        assert_eq!(again, props);
    }

    #[test]
    fn plain_entry_with_title_override_keeps_block() {
        let mut props = CodexEntryProperties::plain("Text");
        props.title_field = Some("comment".into());
        let content = props.render_content().unwrap();
        let mut e = entry(&content, &["Elaria"]).with_comment("The City");

        let loaded = CodexEntryProperties::from_entry(&mut e).unwrap();
        assert_eq!(loaded.entry_type.to_string(), "Text");
        assert_eq!(loaded.title(&e), "The City");
    }

    #[test]
    fn broken_json_is_a_decode_error() {
        use base64::Engine;
        let payload = base64::engine::general_purpose::STANDARD
            .encode(codec::encode_uri_component("{oops"));
        let mut e = entry(&format!("x\n{{{{//codex:{}}}}}", payload), &["Elaria"]);
        assert!(matches!(
            CodexEntryProperties::from_entry(&mut e),
            Err(CodexError::Decode(_))
        ));
        assert!(CodexEntryProperties::from_entry_lossy(&mut e).is_plain());
    }

    #[test]
    fn open_reconciles_and_reports_orphans() {
        let mut e = entry(&CodexEntryProperties::typed(npc()).render_content().unwrap(), &["Milo"]);
        let mut live = npc();
        live.section_list[1].name = "Abilities".into();

        let (props, problems) = CodexEntryProperties::open(&mut e, &[live.clone()]);
        assert!(problems.is_empty());
        assert_eq!(props.entry_type.section_list[1].name, "Abilities");
        assert_eq!(e.changes(), vec![EntryField::Content]);

        let (_, problems) = CodexEntryProperties::open(&mut e.clone(), &[]);
        assert!(matches!(problems.as_slice(), [CodexError::OrphanedType { .. }]));

        e.mark_saved();
        let (_, problems) = CodexEntryProperties::open(&mut e, &[live]);
        assert!(problems.is_empty());
        assert!(!e.is_dirty());
    }

    #[test]
    fn plain_text_becomes_unsectioned_section() {
        let mut props = CodexEntryProperties::plain("old notes");
        assert!(props.change_type(Some(&npc())));
        let sections: Vec<_> = props
            .entry_type
            .section_list
            .iter()
            .map(|s| (s.name.as_str(), s.content.as_str(), s.is_removed))
            .collect();
        assert_eq!(
            sections,
            vec![("Notes", "", false), ("Stats", "", false), (UNSECTIONED, "old notes", true)]
        );
    }

    #[test]
    fn reverting_to_plain_renders_sections() {
        let mut t = npc();
        t.section_list[0].content = "hp 10".into();
        t.section_list[1].content = "str 5".into();
        let mut props = CodexEntryProperties::typed(t);
        assert!(props.change_type(None));
        assert!(props.is_plain());
        assert_eq!(props.render_content().unwrap(), "hp 10\nstr 5");
        assert!(!props.change_type(None));
    }

    #[test]
    fn emptying_removed_section_drops_it() {
        let mut t = npc();
        t.section_list[1].content = "str 5".into();
        t.section_list[1].is_removed = true;
        let mut props = CodexEntryProperties::typed(t);
        props.set_section_content(Some("stats"), "").unwrap();
        assert_eq!(props.entry_type.section_list.len(), 1);
        assert!(props.set_section_content(Some("Missing"), "x").is_err());
    }
}
