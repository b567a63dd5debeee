//! Reserved key tokens and compiled key patterns.
//!
//! Keys are free text in the store. A few of them are directives rather than
//! triggers, recognised regardless of case:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `codex:` | prefix marker, required for matching when `requirePrefix` is on |
//! | `codex-skip:` | exclude the entry from matching and menus |
//! | `codex-title:<field>` | legacy title override |
//! | `codex-tpl:<name>` | legacy template override |
//! | `codex-map:` / `codex-chars:` | map and character-list entries |
//! | `codex-book:` | hidden book properties entry |
//!
//! Trigger keys are compiled once into a [`KeyPattern`]. A key written as
//! `/pattern/flags` is a regular expression; any other key is matched literally.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::error::{CodexError, Result};

pub const PREFIX: &str = "codex:";
pub const SKIP: &str = "codex-skip:";
pub const TITLE: &str = "codex-title:";
pub const TEMPLATE: &str = "codex-tpl:";
pub const MAP: &str = "codex-map:";
pub const CHARS: &str = "codex-chars:";
pub const BOOK: &str = "codex-book:";

static REGEX_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(.+)/([a-zA-Z]*)$").expect("valid regex-key pattern")
});

static DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*codex-[a-z][a-z0-9_]*:").expect("valid directive pattern")
});

static KEY_INDEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^key\[(\d+)\]$").expect("valid key-index pattern")
});

/// Case-insensitive `starts_with` for an ASCII token.
pub fn has_prefix(key: &str, token: &str) -> bool {
    key.trim_start()
        .get(..token.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(token))
}

/// Whether the key is exactly the token.
pub fn is_token(key: &str, token: &str) -> bool {
    key.trim().eq_ignore_ascii_case(token)
}

/// Value following a token, e.g. `comment` for `codex-title:comment`.
pub fn strip_token<'a>(key: &'a str, token: &str) -> Option<&'a str> {
    if has_prefix(key, token) {
        Some(key.trim_start()[token.len()..].trim())
    } else {
        None
    }
}

/// Reserved `codex-<name>:` keys never trigger a match.
pub fn is_directive(key: &str) -> bool {
    DIRECTIVE.is_match(key)
}

/// Split off the `codex:` marker. Returns whether it was present and the bare key.
pub fn split_prefix(key: &str) -> (bool, &str) {
    match strip_token(key, PREFIX) {
        Some(rest) => (true, rest),
        None => (false, key.trim()),
    }
}

/// `key[3]` → `Some(3)`.
pub fn parse_key_index(field: &str) -> Option<usize> {
    KEY_INDEX
        .captures(field.trim())
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyOptions {
    pub case_sensitive: bool,
    pub whole_words: bool,
}

/// A trigger key ready for searching.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    source: String,
    regex: Regex,
}

impl KeyPattern {
    /// Compile a bare key (marker already stripped).
    pub fn compile(key: &str, options: KeyOptions) -> Result<Self> {
        let invalid = |reason: String| CodexError::InvalidPattern {
            key: key.to_string(),
            reason,
        };
        if key.is_empty() {
            return Err(invalid("empty key".into()));
        }

        let regex = if let Some(caps) = REGEX_KEY.captures(key) {
            let body = caps.get(1).map_or("", |m| m.as_str());
            let flags = caps.get(2).map_or("", |m| m.as_str());
            RegexBuilder::new(body)
                .case_insensitive(flags.contains('i'))
                .multi_line(flags.contains('m'))
                .dot_matches_new_line(flags.contains('s'))
                .build()
        } else {
            let mut pattern = regex::escape(key);
            if options.whole_words {
                if key.chars().next().is_some_and(is_word_char) {
                    pattern.insert_str(0, r"\b");
                }
                if key.chars().last().is_some_and(is_word_char) {
                    pattern.push_str(r"\b");
                }
            }
            RegexBuilder::new(&pattern)
                .case_insensitive(!options.case_sensitive)
                .build()
        }
        .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            source: key.to_string(),
            regex,
        })
    }

    /// The key as written (without marker).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Byte offset of the first occurrence.
    pub fn first_at(&self, text: &str) -> Option<usize> {
        self.regex.find(text).map(|m| m.start())
    }

    /// Non-empty occurrences as byte ranges.
    pub fn occurrences<'t>(&'t self, text: &'t str) -> impl Iterator<Item = (usize, usize)> + 't {
        self.regex
            .find_iter(text)
            .filter(|m| !m.is_empty())
            .map(|m| (m.start(), m.end()))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOOSE: KeyOptions = KeyOptions {
        case_sensitive: false,
        whole_words: false,
    };
    const WORDS: KeyOptions = KeyOptions {
        case_sensitive: false,
        whole_words: true,
    };

    #[test]
    fn recognises_tokens_regardless_of_case() {
        assert!(has_prefix("CODEX:Elaria", PREFIX));
        assert_eq!(split_prefix("Codex:Elaria"), (true, "Elaria"));
        assert_eq!(split_prefix(" Elaria "), (false, "Elaria"));
        assert_eq!(strip_token("codex-title:comment", TITLE), Some("comment"));
        assert!(is_directive("codex-skip:"));
        assert!(!is_directive("codex:Elaria"));
        assert!(!is_directive("codex-like words"));
        assert!(is_directive("  CODEX-Title:comment"));
        assert!(!is_directive("codex-era notes: 1"));
        assert!(!is_directive("codex-: x"));
    }

    #[test]
    fn parses_key_index_fields() {
        assert_eq!(parse_key_index("key[2]"), Some(2));
        assert_eq!(parse_key_index("KEY[10]"), Some(10));
        assert_eq!(parse_key_index("comment"), None);
    }

    #[test]
    fn substring_matching_ignores_case_by_default() {
        let p = KeyPattern::compile("elaria", LOOSE).unwrap();
        assert!(p.is_match("The Elarian fleet"));
    }

    #[test]
    fn whole_word_matching_respects_boundaries() {
        let p = KeyPattern::compile("Elaria", WORDS).unwrap();
        assert!(!p.is_match("The Elarian fleet"));
        assert!(p.is_match("Back to Elaria."));
        assert!(p.is_match("Elaria's harbour"));
        let hits: Vec<_> = p.occurrences("Elaria Elaria").collect();
        assert_eq!(hits, vec![(0, 6), (7, 13)]);
    }

    #[test]
    fn case_sensitive_keys() {
        let p = KeyPattern::compile(
            "Rose",
            KeyOptions {
                case_sensitive: true,
                whole_words: true,
            },
        )
        .unwrap();
        assert!(!p.is_match("a rose garden"));
        assert!(p.is_match("Rose smiled"));
    }

    #[test]
    fn regex_keys_and_malformed_patterns() {
        let p = KeyPattern::compile("/ela(ria|rian)/i", LOOSE).unwrap();
        assert!(p.is_match("ELARIAN"));

        let err = KeyPattern::compile("/ela(ria/", LOOSE).unwrap_err();
        assert!(matches!(err, CodexError::InvalidPattern { .. }));
    }
}
