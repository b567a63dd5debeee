//! Entry types: user-defined schemas of named sections.
//!
//! A live [`EntryType`] is defined in configuration. Every entry using it carries a
//! snapshot of it (with the entry's own section content) in its properties block.
//! The snapshot keeps the serde field order of the original records so that an
//! unchanged snapshot re-encodes to the same bytes.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// `(!){{getvar::name}}` marks a variable the panel renders as editable; the
/// model-visible text keeps only the macro.
pub(crate) static VAR_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(!\)(\{\{get(global)?var::((?:[^}]|\}[^}])+)\}\})")
        .expect("valid variable marker pattern")
});

static DEFAULT_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^=]+)=(.*)$").expect("valid default field pattern"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySection {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_true")]
    pub is_included: bool,
    /// Set by reconciliation: the section exists in the entry but not in the live type.
    #[serde(default)]
    pub is_removed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl Default for EntrySection {
    fn default() -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            name: String::new(),
            prefix: String::new(),
            suffix: String::new(),
            content: String::new(),
            is_included: true,
            is_removed: false,
            extra: Map::new(),
        }
    }
}

impl EntrySection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_affixes(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self.suffix = suffix.into();
        self
    }

    pub fn excluded(mut self) -> Self {
        self.is_included = false;
        self
    }

    /// A fresh copy of a live section for an entry: same identity and layout, no content.
    pub fn instantiate(live: &EntrySection) -> Self {
        Self {
            content: String::new(),
            is_removed: false,
            ..live.clone()
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

impl fmt::Display for EntrySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = VAR_MARKER.replace_all(&self.content, "$1");
        write!(f, "{}{}{}", self.prefix, text, self.suffix)
    }
}

/// One `field=value` line of a type's default field directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultFieldValue {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryType {
    /// `None` marks plain text, which never takes part in reconciliation.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub default_field_values: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub section_list: Vec<EntrySection>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntryType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            name: name.into(),
            default_field_values: String::new(),
            prefix: String::new(),
            suffix: String::new(),
            section_list: Vec::new(),
            extra: Map::new(),
        }
    }

    /// The implicit type of a plain entry: one untitled section holding the text.
    pub fn basic(content: impl Into<String>) -> Self {
        let section = EntrySection {
            id: None,
            name: "Content".to_string(),
            ..EntrySection::default()
        }
        .with_content(content);
        Self {
            id: None,
            section_list: vec![section],
            ..Self::new("")
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_section(mut self, section: EntrySection) -> Self {
        self.section_list.push(section);
        self
    }

    pub fn with_affixes(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self.suffix = suffix.into();
        self
    }

    pub fn with_default_fields(mut self, directives: impl Into<String>) -> Self {
        self.default_field_values = directives.into();
        self
    }

    pub fn is_typed(&self) -> bool {
        self.id.is_some()
    }

    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    pub fn section(&self, name: &str) -> Option<&EntrySection> {
        self.section_list
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut EntrySection> {
        self.section_list
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn section_by_id(&self, id: &str) -> Option<&EntrySection> {
        self.section_list
            .iter()
            .find(|s| s.id.as_deref() == Some(id))
    }

    /// Sections flagged as no longer part of the live type.
    pub fn removed_sections(&self) -> impl Iterator<Item = &EntrySection> {
        self.section_list.iter().filter(|s| s.is_removed)
    }

    /// Parsed `field=value` directives; malformed lines are skipped.
    pub fn default_field_list(&self) -> Vec<DefaultFieldValue> {
        self.default_field_values
            .split('\n')
            .filter_map(|line| DEFAULT_FIELD.captures(line))
            .map(|c| DefaultFieldValue {
                field: c[1].to_string(),
                value: c[2].to_string(),
            })
            .collect()
    }
}

impl fmt::Display for EntryType {
    /// Model-visible text: type prefix, included non-empty sections, type suffix.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_typed() {
            let text = self
                .section_list
                .first()
                .map(|s| s.content.as_str())
                .unwrap_or("");
            return f.write_str(text);
        }
        f.write_str(&self.prefix)?;
        for section in self
            .section_list
            .iter()
            .filter(|s| s.is_included && s.has_content())
        {
            write!(f, "{}", section)?;
        }
        f.write_str(&self.suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npc() -> EntryType {
        EntryType::new("NPC")
            .with_id("t1")
            .with_affixes("[NPC: ", "]")
            .with_section(
                EntrySection::new("Notes")
                    .with_id("s1")
                    .with_affixes("Notes: ", "\n")
                    .with_content("hp 10"),
            )
            .with_section(EntrySection::new("Secret").with_id("s2").with_content("spy").excluded())
            .with_section(EntrySection::new("Stats").with_id("s3"))
    }

    #[test]
    fn renders_included_sections_only() {
        assert_eq!(npc().to_string(), "[NPC: Notes: hp 10\n]");
    }

    #[test]
    fn basic_type_renders_raw_content() {
        let t = EntryType::basic("plain (!){{getvar::x}}");
        assert!(!t.is_typed());
        assert_eq!(t.to_string(), "plain (!){{getvar::x}}");
    }

    #[test]
    fn unwraps_variable_markers() {
        let s = EntrySection::new("Stats").with_content("HP (!){{getvar::hp}} / (!){{getglobalvar::max}}");
        assert_eq!(s.to_string(), "HP {{getvar::hp}} / {{getglobalvar::max}}");
    }

    #[test]
    fn parses_default_field_directives() {
        let t = npc().with_default_fields("position=4\nbroken line\nrole=1\n");
        let list = t.default_field_list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].field, "position");
        assert_eq!(list[1].value, "1");
    }

    #[test]
    fn serializes_in_record_order() {
        let t = EntryType::new("A").with_id("t").with_section(EntrySection::new("S").with_id("s"));
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(
            json,
            r#"{"id":"t","name":"A","defaultFieldValues":"","prefix":"","suffix":"","sectionList":[{"id":"s","name":"S","prefix":"","suffix":"","content":"","isIncluded":true,"isRemoved":false}]}"#
        );
    }

    #[test]
    fn section_lookup_is_case_insensitive() {
        let t = npc();
        assert_eq!(t.section("notes").map(|s| s.id.as_deref()), Some(Some("s1")));
        assert!(t.section_by_id("s3").is_some());
    }
}
