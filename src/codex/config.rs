use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry_type::EntryType;
use crate::error::{CodexError, Result};

const CONFIG_FILENAME: &str = "codex.json";
const HOME_ENV: &str = "CODEX_HOME";
const DEFAULT_TEMPLATE: &str = "## {{title}}\n\n{{content}}";

/// A named panel template, selectable per entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub content: String,
}

/// Codex settings, stored as `codex.json` in the data directory.
///
/// Keys are camelCase so the file can be shared with the chat front end's settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodexConfig {
    pub is_enabled: bool,
    pub is_verbose: bool,
    pub color: String,
    pub icon: String,
    /// Link only the first occurrence of each key per message.
    pub only_first: bool,
    pub skip_code_blocks: bool,
    pub require_prefix: bool,
    pub disable_links: bool,
    pub template: String,
    pub template_list: Vec<Template>,
    pub cycle: bool,
    /// Milliseconds between matches when cycling.
    pub cycle_delay: u64,
    pub history_length: usize,
    pub entry_type_list: Vec<EntryType>,
    /// Default for entries without their own `caseSensitive`.
    pub case_sensitive: bool,
    /// Default for entries without their own `matchWholeWords`.
    pub match_whole_words: bool,
    /// Pause between entries during a bulk pass.
    pub bulk_pace_ms: u64,
}

impl Default for CodexConfig {
    fn default() -> Self {
        Self {
            is_enabled: true,
            is_verbose: true,
            color: "rgba(0, 255, 255, 1)".to_string(),
            icon: "🧾".to_string(),
            only_first: false,
            skip_code_blocks: true,
            require_prefix: false,
            disable_links: false,
            template: DEFAULT_TEMPLATE.to_string(),
            template_list: Vec::new(),
            cycle: true,
            cycle_delay: 1000,
            history_length: 10,
            entry_type_list: Vec::new(),
            case_sensitive: false,
            match_whole_words: false,
            bulk_pace_ms: 0,
        }
    }
}

/// The codex data directory: `$CODEX_HOME`, else the platform data dir.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(home) = env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    ProjectDirs::from("com", "codex", "codex")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| CodexError::Store("Could not determine data dir".to_string()))
}

impl CodexConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: CodexConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_dir.join(CONFIG_FILENAME), content)?;
        Ok(())
    }

    /// Named template, falling back to the default template.
    pub fn template_for(&self, name: Option<&str>) -> &str {
        name.and_then(|n| self.template_list.iter().find(|t| t.name == n))
            .map(|t| t.content.as_str())
            .unwrap_or(&self.template)
    }

    pub fn entry_type(&self, id: &str) -> Option<&EntryType> {
        self.entry_type_list
            .iter()
            .find(|t| t.id.as_deref() == Some(id))
    }

    pub fn entry_type_by_name(&self, name: &str) -> Option<&EntryType> {
        self.entry_type_list
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn entry_type_by_name_mut(&mut self, name: &str) -> Option<&mut EntryType> {
        self.entry_type_list
            .iter_mut()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Scalar settings as `(key, value)` pairs, in file order.
    pub fn entries(&self) -> Vec<(String, String)> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .filter(|(_, v)| !v.is_array())
                .map(|(k, v)| (k, display_value(&v)))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let value = serde_json::to_value(self).ok()?;
        value.get(key).map(display_value)
    }

    /// Set a setting from its text form. Values that parse as JSON are taken as
    /// JSON, anything else as a string.
    pub fn set(&mut self, key: &str, raw: &str) -> std::result::Result<(), String> {
        let mut value = serde_json::to_value(&*self).map_err(|e| e.to_string())?;
        let Some(slot) = value.get_mut(key) else {
            return Err(format!("Unknown config key: {}", key));
        };
        let parsed = match slot {
            Value::String(_) => Value::String(raw.to_string()),
            _ => serde_json::from_str(raw).map_err(|_| format!("Invalid value for {}: {}", key, raw))?,
        };
        *slot = parsed;
        *self = serde_json::from_value(value).map_err(|e| format!("Invalid value for {}: {}", key, e))?;
        Ok(())
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
