//! Entry panel rendering.
//!
//! Rendering is a pure function of the entry, its properties and the settings. The
//! panel template is plain text with placeholders:
//!
//! | Placeholder | Value |
//! |-------------|-------|
//! | `{{title}}` | resolved title |
//! | `{{comment}}` | entry comment |
//! | `{{content}}` | rendered content, one `<section>` per filled section |
//! | `{{key[n]}}` | n-th key |
//!
//! Each has a `::url` form (`{{title::url}}`) giving the URL-encoded value.
//! Markdown goes through a [`Renderer`]; the result is linked for the entry's own
//! keys when a linker is supplied.

use once_cell::sync::Lazy;
use pulldown_cmark::{html, Options, Parser};
use regex::{Captures, Regex};

use crate::codec::encode_uri_component;
use crate::config::CodexConfig;
use crate::entry_type::{EntrySection, VAR_MARKER};
use crate::linker::Linker;
use crate::model::{Entry, Match};
use crate::properties::CodexEntryProperties;

static KEY_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{key\[(\d+)\](::url)?\}\}").expect("valid key placeholder pattern")
});

/// Markdown to HTML.
pub trait Renderer {
    fn render_markdown(&self, text: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self {
            options: Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS,
        }
    }
}

impl Renderer for MarkdownRenderer {
    fn render_markdown(&self, text: &str) -> String {
        let parser = Parser::new_ext(text, self.options);
        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

/// Renders entries into panel HTML.
pub struct EntryRenderer<'a, R: Renderer> {
    config: &'a CodexConfig,
    renderer: &'a R,
    linker: Option<&'a Linker>,
}

impl<'a, R: Renderer> EntryRenderer<'a, R> {
    pub fn new(config: &'a CodexConfig, renderer: &'a R) -> Self {
        Self {
            config,
            renderer,
            linker: None,
        }
    }

    pub fn with_linker(mut self, linker: &'a Linker) -> Self {
        self.linker = Some(linker);
        self
    }

    pub fn render(&self, entry: &Entry, props: &CodexEntryProperties) -> String {
        let template = self.config.template_for(props.template_name.as_deref());
        let content = self.render_content(props);
        let filled = fill_template(template, entry, &props.title(entry), &content);
        let html = self.renderer.render_markdown(&filled);
        match self.linker {
            Some(linker) => {
                let own = [Match::new(entry.book.clone(), entry.clone())];
                linker.link_html(&html, Some(&own))
            }
            None => html,
        }
    }

    /// The `{{content}}` value: type prefix, each filled section, type suffix.
    pub fn render_content(&self, props: &CodexEntryProperties) -> String {
        let entry_type = &props.entry_type;
        if props.is_plain() {
            return entry_type.to_string();
        }
        let mut parts = vec![entry_type.prefix.clone()];
        parts.extend(
            entry_type
                .section_list
                .iter()
                .filter(|s| s.has_content())
                .map(|s| self.render_section(s)),
        );
        parts.push(entry_type.suffix.clone());
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn render_section(&self, section: &EntrySection) -> String {
        let text = [&section.prefix, &section.content, &section.suffix]
            .into_iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let text = VAR_MARKER.replace_all(&text, |c: &Captures<'_>| {
            let scope = c.get(2).map_or("", |m| m.as_str());
            format!(
                r#"<span class="stcdx--var" data-scope="{0}" data-var="{1}" title="{0} variable: {1}">{2}</span>"#,
                scope, &c[3], &c[1]
            )
        });
        let inner = self.renderer.render_markdown(&text);
        format!(
            r#"<section id="{}" data-name="{}">{}</section>"#,
            section.id.as_deref().unwrap_or(""),
            section.name.replace('"', "&quot;"),
            inner.trim_end()
        )
    }
}

/// Substitute template placeholders.
pub fn fill_template(template: &str, entry: &Entry, title: &str, content: &str) -> String {
    let filled = template
        .replace("{{comment}}", &entry.comment)
        .replace("{{comment::url}}", &encode_uri_component(&entry.comment))
        .replace("{{content}}", content)
        .replace("{{content::url}}", &encode_uri_component(&entry.content));
    let filled = KEY_PLACEHOLDER.replace_all(&filled, |c: &Captures<'_>| {
        let key = c[1]
            .parse::<usize>()
            .ok()
            .and_then(|i| entry.key_list.get(i))
            .map(String::as_str)
            .unwrap_or("");
        if c.get(2).is_some() {
            encode_uri_component(key)
        } else {
            key.to_string()
        }
    });
    filled
        .replace("{{title}}", title)
        .replace("{{title::url}}", &encode_uri_component(title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Template;
    use crate::entry_type::EntryType;
    use crate::matcher::{MatchPolicy, Matcher};
    use crate::model::Book;
    use crate::store::memory::fixtures::npc_type;
    use std::rc::Rc;

    fn entry(content: &str) -> Entry {
        Entry::new(
            "World",
            1,
            vec!["Elaria".into(), "The City".into()],
            content,
        )
        .with_comment("Elaria")
    }

    #[test]
    fn fills_placeholders() {
        let e = entry("x");
        let out = fill_template(
            "{{title}}|{{title::url}}|{{key[1]}}|{{key[1]::url}}|{{key[9]}}|{{comment}}|{{content}}",
            &e,
            "A & B",
            "BODY",
        );
        assert_eq!(out, "A & B|A%20%26%20B|The City|The%20City||Elaria|BODY");
    }

    #[test]
    fn renders_default_template_as_markdown() {
        let config = CodexConfig::default();
        let renderer = MarkdownRenderer::default();
        let e = entry("A *port* city.");
        let props = CodexEntryProperties::plain("A *port* city.");
        let html = EntryRenderer::new(&config, &renderer).render(&e, &props);
        assert_eq!(html, "<h2>Elaria</h2>\n<p>A <em>port</em> city.</p>\n");
    }

    #[test]
    fn renders_sections_with_variables() {
        let config = CodexConfig::default();
        let renderer = MarkdownRenderer::default();
        let mut t: EntryType = npc_type();
        t.section_list[0].content = "HP (!){{getvar::hp}}".into();
        let props = CodexEntryProperties::typed(t);

        let content = EntryRenderer::new(&config, &renderer).render_content(&props);
        assert_eq!(
            content,
            r#"<section id="s1" data-name="Notes"><p>HP <span class="stcdx--var" data-scope="" data-var="hp" title=" variable: hp">{{getvar::hp}}</span></p></section>"#
        );
    }

    #[test]
    fn uses_named_template_and_links_own_keys() {
        let mut config = CodexConfig::default();
        config.template_list.push(Template {
            name: "Bare".into(),
            content: "{{content}}".into(),
        });
        let renderer = MarkdownRenderer::default();
        let e = entry("Elaria is old.");
        let mut props = CodexEntryProperties::plain("Elaria is old.");
        props.template_name = Some("Bare".into());

        let matcher = Matcher::new(vec![Book::with_entries("World", vec![e.clone()])], MatchPolicy::default());
        let linker = Linker::new(Rc::new(matcher), (&config).into());
        let html = EntryRenderer::new(&config, &renderer)
            .with_linker(&linker)
            .render(&e, &props);
        assert_eq!(
            html,
            "<p><span class=\"stcdx--link\" data-stcdx--book=\"World\" data-stcdx--uid=\"1\">Elaria</span> is old.</p>\n"
        );
    }
}
