//! # Linker
//!
//! Turns key occurrences inside a rendered message into entry references:
//!
//! ```text
//! <p>Off to Elaria.</p>
//! <p>Off to <span class="stcdx--link" data-stcdx--book="World" data-stcdx--uid="3">Elaria</span>.</p>
//! ```
//!
//! Keys are searched in the decoded text of each text node, so `&#39;` in the
//! markup matches a `'` in a key. Tags are never split. Existing references,
//! anchors and raw-text elements are left alone, as are `code` and `pre` subtrees
//! when code blocks are skipped.
//!
//! Within one text run, overlapping occurrences resolve to the leftmost one, then
//! the longest, then the entry and key defined first. [`Linker::restore_chat_message`]
//! unwraps every reference and merges the text back, so restore followed by a new
//! linking pass reproduces the same markup.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use ego_tree::NodeId;

use crate::config::CodexConfig;
use crate::dom::{self, Element, Fragment, Piece};
use crate::error::{CodexError, Result};
use crate::keys::KeyPattern;
use crate::matcher::{MatchPolicy, Matcher};
use crate::model::Match;

const UNLINKED_ELEMENTS: &[&str] = &["a", "script", "style", "textarea", "title"];
const CODE_ELEMENTS: &[&str] = &["code", "pre"];

pub type ClickHandler = Box<dyn FnMut(&Match)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkPolicy {
    pub only_first: bool,
    pub skip_code_blocks: bool,
}

impl From<&CodexConfig> for LinkPolicy {
    fn from(config: &CodexConfig) -> Self {
        Self {
            only_first: config.only_first,
            skip_code_blocks: config.skip_code_blocks,
        }
    }
}

struct LinkKey {
    id: usize,
    target: usize,
    pattern: KeyPattern,
}

struct Occurrence {
    start: usize,
    end: usize,
    key: usize,
    target: usize,
}

pub struct Linker {
    matcher: Rc<Matcher>,
    policy: LinkPolicy,
    on_click: Option<ClickHandler>,
}

impl fmt::Debug for Linker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Linker")
            .field("policy", &self.policy)
            .field("has_click_handler", &self.on_click.is_some())
            .finish()
    }
}

impl Linker {
    pub fn new(matcher: Rc<Matcher>, policy: LinkPolicy) -> Self {
        Self {
            matcher,
            policy,
            on_click: None,
        }
    }

    pub fn with_click_handler(mut self, handler: impl FnMut(&Match) + 'static) -> Self {
        self.on_click = Some(Box::new(handler));
        self
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn policy(&self) -> &LinkPolicy {
        &self.policy
    }

    /// Wrap key occurrences in `root`. Without `entries`, the fragment's own
    /// matches are linked. Returns the number of references added.
    pub fn add_codex_links(&self, root: &mut Fragment, entries: Option<&[Match]>) -> usize {
        let found;
        let targets = match entries {
            Some(entries) => entries,
            None => {
                found = self.matcher.find_matches(&root.text_content());
                &found[..]
            }
        };
        if targets.is_empty() {
            return 0;
        }
        let link_keys = self.link_keys(targets);
        let mut walk = Walk {
            targets,
            keys: &link_keys,
            policy: self.policy,
            seen: HashSet::new(),
            added: 0,
        };
        for (id, text) in root.text_nodes(|el| walk.skips(el)) {
            walk.text(root, id, &text);
        }
        tracing::debug!(links = walk.added, "linked message");
        walk.added
    }

    fn link_keys(&self, targets: &[Match]) -> Vec<LinkKey> {
        let policy = self.matcher.policy();
        let mut link_keys = Vec::new();
        for (target, m) in targets.iter().enumerate() {
            let mut keys = policy.trigger_keys(&m.entry);
            if keys.is_empty() {
                let unmarked = MatchPolicy {
                    require_prefix: false,
                    ..*policy
                };
                keys = unmarked.trigger_keys(&m.entry);
            }
            let options = policy.key_options(&m.entry);
            for key in keys {
                match KeyPattern::compile(key, options) {
                    Ok(pattern) => link_keys.push(LinkKey {
                        id: link_keys.len(),
                        target,
                        pattern,
                    }),
                    Err(err) => tracing::debug!(%err, "key not linkable"),
                }
            }
        }
        link_keys
    }

    /// Unwrap every reference span. Returns the number removed.
    pub fn restore_chat_message(root: &mut Fragment) -> usize {
        root.unwrap_links()
    }

    /// Report a click on a reference to the handler.
    pub fn click(&mut self, book: &str, uid: u64) -> Result<Match> {
        let found = self
            .matcher
            .find_entry(book, uid)
            .ok_or_else(|| CodexError::EntryNotFound {
                book: book.to_string(),
                uid,
            })?;
        if let Some(handler) = self.on_click.as_mut() {
            handler(&found);
        }
        Ok(found)
    }

    pub fn link_html(&self, html: &str, entries: Option<&[Match]>) -> String {
        let mut fragment = Fragment::parse(html);
        self.add_codex_links(&mut fragment, entries);
        fragment.to_html()
    }

    pub fn restore_html(html: &str) -> String {
        let mut fragment = Fragment::parse(html);
        Self::restore_chat_message(&mut fragment);
        fragment.to_html()
    }
}

struct Walk<'a> {
    targets: &'a [Match],
    keys: &'a [LinkKey],
    policy: LinkPolicy,
    seen: HashSet<usize>,
    added: usize,
}

impl Walk<'_> {
    fn skips(&self, el: &Element) -> bool {
        dom::is_link(el)
            || UNLINKED_ELEMENTS.contains(&el.name())
            || (self.policy.skip_code_blocks && CODE_ELEMENTS.contains(&el.name()))
    }

    fn text(&mut self, root: &mut Fragment, id: NodeId, text: &str) {
        let chosen = self.choose(text);
        if chosen.is_empty() {
            return;
        }
        let mut pieces = Vec::with_capacity(chosen.len() * 2 + 1);
        let mut cursor = 0;
        for occ in &chosen {
            if occ.start > cursor {
                pieces.push(Piece::Text(&text[cursor..occ.start]));
            }
            let target = &self.targets[occ.target];
            pieces.push(Piece::Link {
                book: &target.book,
                uid: target.entry.uid,
                text: &text[occ.start..occ.end],
            });
            cursor = occ.end;
        }
        if cursor < text.len() {
            pieces.push(Piece::Text(&text[cursor..]));
        }
        root.splice_text(id, &pieces);
        self.added += chosen.len();
    }

    fn choose(&mut self, text: &str) -> Vec<Occurrence> {
        let mut all: Vec<Occurrence> = self
            .keys
            .iter()
            .flat_map(|k| {
                k.pattern.occurrences(text).map(move |(start, end)| Occurrence {
                    start,
                    end,
                    key: k.id,
                    target: k.target,
                })
            })
            .collect();
        all.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then((b.end - b.start).cmp(&(a.end - a.start)))
                .then(a.key.cmp(&b.key))
        });

        let mut chosen: Vec<Occurrence> = Vec::new();
        for occ in all {
            if chosen.last().is_some_and(|last| occ.start < last.end) {
                continue;
            }
            if self.policy.only_first && !self.seen.insert(occ.key) {
                continue;
            }
            chosen.push(occ);
        }
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Book, Entry};
    use std::cell::RefCell;

    fn entry(uid: u64, keys: &[&str]) -> Entry {
        Entry::new("World", uid, keys.iter().map(|s| s.to_string()).collect(), "")
    }

    fn linker(entries: Vec<Entry>, policy: LinkPolicy) -> Linker {
        let matcher = Matcher::new(
            vec![Book::with_entries("World", entries)],
            MatchPolicy::default(),
        );
        Linker::new(Rc::new(matcher), policy)
    }

    fn skip_code() -> LinkPolicy {
        LinkPolicy {
            only_first: false,
            skip_code_blocks: true,
        }
    }

    const ELARIA_LINK: &str =
        r#"<span class="stcdx--link" data-stcdx--book="World" data-stcdx--uid="1">Elaria</span>"#;

    #[test]
    fn wraps_occurrences_in_text_nodes() {
        let l = linker(vec![entry(1, &["Elaria"])], skip_code());
        let html = l.link_html("<p>Off to <b>Elaria</b>, then Elaria.</p>", None);
        assert_eq!(
            html,
            format!("<p>Off to <b>{0}</b>, then {0}.</p>", ELARIA_LINK)
        );
    }

    #[test]
    fn restore_gives_back_original_markup() {
        let l = linker(vec![entry(1, &["Elaria"]), entry(2, &["port"])], skip_code());
        let original = "<p>Elaria is a <i>port</i> &amp; Elaria's port.</p>";
        let mut f = Fragment::parse(original);
        let added = l.add_codex_links(&mut f, None);
        assert_eq!(added, 4);
        let linked = f.to_html();

        assert_eq!(Linker::restore_chat_message(&mut f), 4);
        assert_eq!(f.to_html(), original);
        assert_eq!(Linker::restore_chat_message(&mut f), 0);

        l.add_codex_links(&mut f, None);
        assert_eq!(f.to_html(), linked);
    }

    #[test]
    fn loose_markup_restores_to_the_same_structure_and_text() {
        let l = linker(vec![entry(1, &["Elaria"])], skip_code());
        let loose = "<P class=x>Elaria<br/>Elaria's &#39;port'";
        let linked = l.link_html(loose, None);
        let restored = Linker::restore_html(&linked);

        assert_eq!(restored, Fragment::parse(loose).to_html());
        assert_eq!(
            Fragment::parse(&restored).text_content(),
            Fragment::parse(loose).text_content()
        );
        assert_eq!(l.link_html(&restored, None), linked);
    }

    #[test]
    fn relinking_does_not_nest_references() {
        let l = linker(vec![entry(1, &["Elaria"])], skip_code());
        let once = l.link_html("<p>Elaria</p>", None);
        let twice = l.link_html(&once, None);
        assert_eq!(once, twice);
    }

    #[test]
    fn skips_code_when_enabled() {
        let l = linker(vec![entry(1, &["Elaria"])], skip_code());
        let html = "<p>Elaria</p><pre><code>Elaria</code></pre><p><code>Elaria</code></p>";
        let f = Fragment::parse(&l.link_html(html, None));
        assert_eq!(f.links().len(), 1);

        let l = linker(vec![entry(1, &["Elaria"])], LinkPolicy::default());
        let f = Fragment::parse(&l.link_html(html, None));
        assert_eq!(f.links().len(), 3);
    }

    #[test]
    fn never_links_inside_anchors_or_attributes() {
        let l = linker(vec![entry(1, &["Elaria"])], skip_code());
        let html = r#"<a href="/Elaria">Elaria</a><img alt="Elaria">"#;
        assert_eq!(l.link_html(html, None), html);
    }

    #[test]
    fn only_first_occurrence_per_key() {
        let l = linker(
            vec![entry(1, &["Elaria"])],
            LinkPolicy {
                only_first: true,
                skip_code_blocks: true,
            },
        );
        let f = Fragment::parse(&l.link_html("<p>Elaria</p><p>Elaria and Elaria</p>", None));
        assert_eq!(f.links().len(), 1);
    }

    #[test]
    fn overlaps_prefer_leftmost_then_longest() {
        let l = linker(
            vec![entry(1, &["Elaria"]), entry(2, &["Elaria Harbour"]), entry(3, &["Harbour"])],
            skip_code(),
        );
        let f = Fragment::parse(&l.link_html("<p>Elaria Harbour</p>", None));
        let links = f.links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].uid, 2);
        assert_eq!(links[0].text, "Elaria Harbour");
    }

    #[test]
    fn keys_with_markup_characters_and_entities() {
        let l = linker(vec![entry(1, &["Tom & Jerry"]), entry(2, &["amp"])], skip_code());
        let html = l.link_html("<p>Tom &amp; Jerry</p>", None);
        let links = Fragment::parse(&html).links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text, "Tom & Jerry");
    }

    #[test]
    fn keys_with_quotes_link_through_character_references() {
        let l = linker(
            vec![entry(1, &["Elaria's Port"]), entry(2, &["\"Sea Wolf\""])],
            skip_code(),
        );
        let mut f = Fragment::parse("<p>We reached Elaria&#39;s Port on the &quot;Sea Wolf&quot;.</p>");
        assert_eq!(l.matcher().find_matches(&f.text_content()).len(), 2);
        assert_eq!(l.add_codex_links(&mut f, None), 2);

        let links = f.links();
        assert_eq!(links[0].text, "Elaria's Port");
        assert_eq!(links[1].text, "\"Sea Wolf\"");

        let linked = f.to_html();
        Linker::restore_chat_message(&mut f);
        assert_eq!(f.text_content(), "We reached Elaria's Port on the \"Sea Wolf\".");
        l.add_codex_links(&mut f, None);
        assert_eq!(f.to_html(), linked);
    }

    #[test]
    fn explicit_entries_are_linked_without_matching() {
        let l = linker(vec![entry(1, &["Elaria"]), entry(2, &["port"])], skip_code());
        let own = vec![l.matcher().find_entry("World", 2).unwrap()];
        let html = l.link_html("<p>Elaria port</p>", Some(&own));
        let links = Fragment::parse(&html).links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].uid, 2);
    }

    #[test]
    fn click_invokes_handler() {
        let clicked = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&clicked);
        let mut l = linker(vec![entry(1, &["Elaria"])], skip_code())
            .with_click_handler(move |m| sink.borrow_mut().push(m.entry.uid));

        let m = l.click("World", 1).unwrap();
        assert_eq!(m.entry.uid, 1);
        assert_eq!(*clicked.borrow(), vec![1]);
        assert!(l.click("World", 9).is_err());
    }
}
