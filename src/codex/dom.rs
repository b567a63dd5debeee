//! # HTML Fragments
//!
//! A rendered chat message parsed with `scraper` (html5ever) as a body fragment.
//! The linker reads entity-decoded text nodes from the tree and splices reference
//! spans in through `ego_tree`, so tags are never split and markup in keys needs no
//! escaping.
//!
//! Serialisation is html5ever's canonical form. Any fragment that has been through
//! [`Fragment::parse`] once serialises to the same bytes again, which is what makes
//! relinking a restored message byte-identical to the first linking pass.

use std::fmt;

use ego_tree::{NodeId, NodeRef};
use once_cell::sync::Lazy;
use scraper::node::Text;
use scraper::{Html, Node, Selector};

pub use scraper::node::Element;

/// Class of the reference spans the linker injects.
pub const LINK_CLASS: &str = "stcdx--link";
pub const BOOK_ATTR: &str = "data-stcdx--book";
pub const UID_ATTR: &str = "data-stcdx--uid";

static LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.stcdx--link").expect("valid link selector"));

/// A reference found in a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub book: String,
    pub uid: u64,
    pub text: String,
}

/// One piece of a text node being split up by the linker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'a> {
    Text(&'a str),
    Link { book: &'a str, uid: u64, text: &'a str },
}

pub struct Fragment {
    html: Html,
}

impl Fragment {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_fragment(html),
        }
    }

    pub fn to_html(&self) -> String {
        self.html.root_element().inner_html()
    }

    /// All text, entities decoded, comments left out.
    pub fn text_content(&self) -> String {
        self.html.root_element().text().collect()
    }

    pub fn links(&self) -> Vec<LinkRef> {
        self.html
            .select(&LINKS)
            .filter_map(|el| {
                let book = el.value().attr(BOOK_ATTR)?;
                let uid = el.value().attr(UID_ATTR)?.parse().ok()?;
                Some(LinkRef {
                    book: book.to_string(),
                    uid,
                    text: el.text().collect(),
                })
            })
            .collect()
    }

    /// Text nodes in document order with their decoded text. Subtrees of elements
    /// `skip` accepts are not entered.
    pub fn text_nodes(&self, skip: impl Fn(&Element) -> bool) -> Vec<(NodeId, String)> {
        let mut out = Vec::new();
        collect_text(*self.html.root_element(), &skip, &mut out);
        out
    }

    /// Replace a text node with `pieces`, wrapping link pieces in reference spans.
    pub fn splice_text(&mut self, id: NodeId, pieces: &[Piece<'_>]) {
        let Some(mut node) = self.html.tree.get_mut(id) else {
            return;
        };
        if !node.value().is_text() {
            return;
        }
        for piece in pieces {
            match *piece {
                Piece::Text(text) => {
                    node.insert_before(text_node(text));
                }
                Piece::Link { book, uid, text } => match link_span(book, uid) {
                    Some(span) => {
                        node.insert_before(span).append(text_node(text));
                    }
                    None => {
                        node.insert_before(text_node(text));
                    }
                },
            }
        }
        node.detach();
    }

    /// Unwrap every reference span, keeping its children in place, and merge the
    /// text runs this leaves behind. Returns the number of spans removed.
    pub fn unwrap_links(&mut self) -> usize {
        let links: Vec<NodeId> = self.html.select(&LINKS).map(|el| el.id()).collect();
        // Innermost first, so nested spans unwrap into their parent's place.
        for &id in links.iter().rev() {
            let children: Vec<NodeId> = match self.html.tree.get(id) {
                Some(link) => link.children().map(|child| child.id()).collect(),
                None => continue,
            };
            if let Some(mut link) = self.html.tree.get_mut(id) {
                for child in children {
                    link.insert_id_before(child);
                }
                link.detach();
            }
        }
        if !links.is_empty() {
            self.merge_text_runs();
        }
        links.len()
    }

    fn merge_text_runs(&mut self) {
        let ids: Vec<NodeId> = self.html.tree.root().descendants().map(|n| n.id()).collect();
        for id in ids {
            while let Some((next, extra)) = self.following_text(id) {
                if let Some(mut node) = self.html.tree.get_mut(id) {
                    if let Node::Text(text) = node.value() {
                        text.text.push_slice(&extra);
                    }
                }
                if let Some(mut next) = self.html.tree.get_mut(next) {
                    next.detach();
                }
            }
        }
    }

    /// The text sibling right after an attached text node.
    fn following_text(&self, id: NodeId) -> Option<(NodeId, String)> {
        let node = self.html.tree.get(id)?;
        node.parent()?;
        if !node.value().is_text() {
            return None;
        }
        let next = node.next_sibling()?;
        match next.value() {
            Node::Text(text) => Some((next.id(), String::from(&*text.text))),
            _ => None,
        }
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Fragment").field(&self.to_html()).finish()
    }
}

pub fn is_link(el: &Element) -> bool {
    el.name() == "span" && el.classes().any(|class| class == LINK_CLASS)
}

fn collect_text(
    node: NodeRef<'_, Node>,
    skip: &dyn Fn(&Element) -> bool,
    out: &mut Vec<(NodeId, String)>,
) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push((child.id(), String::from(&*text.text))),
            Node::Element(el) if !skip(el) => collect_text(child, skip, out),
            _ => {}
        }
    }
}

fn text_node(text: &str) -> Node {
    Node::Text(Text { text: text.into() })
}

/// A fresh, empty reference span. Built by parsing so the element carries
/// html5ever's own names and attribute storage.
fn link_span(book: &str, uid: u64) -> Option<Node> {
    let markup = format!(
        r#"<span class="{}" {}="{}" {}="{}"></span>"#,
        LINK_CLASS,
        BOOK_ATTR,
        escape_attr(book),
        UID_ATTR,
        uid
    );
    let template = Html::parse_fragment(&markup);
    let span = template.root_element().first_child()?;
    let node = span.value().clone();
    node.is_element().then_some(node)
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
