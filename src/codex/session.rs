//! # Session
//!
//! A [`Session`] is the long-lived engine behind an interactive client: it owns the
//! loaded books, the matcher and linker built from them, the chat messages being
//! linked, the viewer history and the pending saves.
//!
//! ## Lifecycle
//!
//! ```text
//! start ──► running ──► stop
//!              │
//!              └── request_restart ─► fire_restart ─► stop + start
//!                                        │
//!                                        └── parked while an edit is open,
//!                                            run by end_edit
//! ```
//!
//! Start, stop and restart are guarded: a request arriving while another one is in
//! progress is ignored. Restart and save requests are debounced through
//! [`crate::pending`]: only the newest request of each slot is ever performed.
//!
//! ## Messages
//!
//! Messages are queued for linking. Processing the queue handles each queued
//! message once, restoring it before linking again, so re-processing a message
//! never nests references. Stopping restores every message.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::config::CodexConfig;
use crate::dom::Fragment;
use crate::error::{CodexError, Result};
use crate::history::History;
use crate::linker::Linker;
use crate::matcher::{MatchPolicy, Matcher};
use crate::model::{Entry, Match};
use crate::pending::{Debounced, DebouncedMap, Token};
use crate::properties::CodexEntryProperties;
use crate::render::{EntryRenderer, MarkdownRenderer, Renderer};
use crate::store::KnowledgeStore;

pub type MessageId = usize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Guards {
    is_starting: bool,
    is_stopping: bool,
    is_restarting: bool,
    is_editing: bool,
}

impl Guards {
    fn is_busy(&self) -> bool {
        self.is_starting || self.is_stopping || self.is_restarting
    }
}

pub struct Session<'s, S: KnowledgeStore, R: Renderer = MarkdownRenderer> {
    store: &'s mut S,
    config: CodexConfig,
    renderer: R,
    matcher: Option<Rc<Matcher>>,
    linker: Option<Linker>,
    guards: Guards,
    restart: Debounced<()>,
    restart_parked: bool,
    saves: DebouncedMap<(String, u64), Entry>,
    messages: Vec<Fragment>,
    queue: BTreeSet<MessageId>,
    history: History,
    clicked: Rc<RefCell<Vec<Match>>>,
}

impl<'s, S: KnowledgeStore> Session<'s, S> {
    pub fn new(store: &'s mut S, config: CodexConfig) -> Self {
        Self::with_renderer(store, config, MarkdownRenderer::default())
    }
}

impl<'s, S: KnowledgeStore, R: Renderer> Session<'s, S, R> {
    pub fn with_renderer(store: &'s mut S, config: CodexConfig, renderer: R) -> Self {
        let history = History::new(config.history_length);
        Self {
            store,
            config,
            renderer,
            matcher: None,
            linker: None,
            guards: Guards::default(),
            restart: Debounced::new(),
            restart_parked: false,
            saves: DebouncedMap::new(),
            messages: Vec::new(),
            queue: BTreeSet::new(),
            history,
            clicked: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &CodexConfig {
        &self.config
    }

    pub fn matcher(&self) -> Option<&Matcher> {
        self.matcher.as_deref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_running(&self) -> bool {
        self.matcher.is_some()
    }

    pub fn is_editing(&self) -> bool {
        self.guards.is_editing
    }

    pub fn pending_saves(&self) -> usize {
        self.saves.len()
    }

    // --- Lifecycle ---

    /// Load the books and link every message. Returns `false` when the request was
    /// ignored: already busy, already running, or disabled in the settings.
    pub fn start(&mut self) -> Result<bool> {
        if self.guards.is_busy() || self.is_running() {
            tracing::debug!("start ignored");
            return Ok(false);
        }
        if !self.config.is_enabled {
            tracing::info!("codex is disabled");
            return Ok(false);
        }
        self.guards.is_starting = true;
        let started = self.load();
        self.guards.is_starting = false;
        started.map(|_| true)
    }

    pub fn stop(&mut self) -> bool {
        if self.guards.is_busy() || !self.is_running() {
            tracing::debug!("stop ignored");
            return false;
        }
        self.guards.is_stopping = true;
        self.unload();
        self.guards.is_stopping = false;
        true
    }

    pub fn restart(&mut self) -> Result<bool> {
        if self.guards.is_busy() {
            tracing::debug!("restart ignored");
            return Ok(false);
        }
        tracing::info!("restarting");
        self.guards.is_restarting = true;
        if self.is_running() {
            self.unload();
        }
        let started = if self.config.is_enabled {
            self.load().map(|_| true)
        } else {
            Ok(false)
        };
        self.guards.is_restarting = false;
        started
    }

    pub fn request_restart(&mut self) -> Token {
        self.restart.request(())
    }

    /// Perform a requested restart if `token` is still the newest request.
    /// While an edit is open the restart is parked until [`Self::end_edit`].
    pub fn fire_restart(&mut self, token: Token) -> Result<bool> {
        if self.restart.fire(token).is_none() {
            return Ok(false);
        }
        if self.guards.is_editing {
            tracing::debug!("restart parked until the edit ends");
            self.restart_parked = true;
            return Ok(false);
        }
        self.restart()
    }

    pub fn begin_edit(&mut self) {
        self.guards.is_editing = true;
    }

    /// Close the edit: write pending saves, then run a parked restart.
    /// Returns whether a restart ran.
    pub fn end_edit(&mut self) -> Result<bool> {
        self.guards.is_editing = false;
        self.flush_saves()?;
        if std::mem::take(&mut self.restart_parked) {
            return self.restart();
        }
        Ok(false)
    }

    fn load(&mut self) -> Result<()> {
        let books = self.store.load_books()?;
        tracing::info!(books = books.len(), "loaded books");
        let matcher = Rc::new(Matcher::new(books, MatchPolicy::from(&self.config)));
        let clicked = Rc::clone(&self.clicked);
        let linker = Linker::new(Rc::clone(&matcher), (&self.config).into())
            .with_click_handler(move |m| clicked.borrow_mut().push(m.clone()));
        self.history.rebind(&matcher);
        self.matcher = Some(matcher);
        self.linker = Some(linker);
        self.queue.extend(0..self.messages.len());
        self.process_queue();
        Ok(())
    }

    fn unload(&mut self) {
        let restored: usize = self
            .messages
            .iter_mut()
            .map(Linker::restore_chat_message)
            .sum();
        tracing::info!(restored, "stopped");
        self.queue.clear();
        self.linker = None;
        self.matcher = None;
    }

    /// Request a restart if `entries` differ from what is loaded for `book`.
    pub fn handle_book_update(&mut self, book: &str, entries: &[Entry]) -> Option<Token> {
        let matcher = self.matcher.as_ref()?;
        let loaded = matcher
            .books()
            .iter()
            .find(|b| b.name == book)
            .map(|b| b.entries.as_slice())
            .unwrap_or_default();
        let unchanged = loaded.len() == entries.len()
            && loaded.iter().zip(entries).all(|(a, b)| a.same_record(b));
        if unchanged {
            tracing::debug!(%book, "book update without changes");
            return None;
        }
        tracing::debug!(%book, "book changed");
        Some(self.request_restart())
    }

    // --- Messages ---

    pub fn add_message(&mut self, html: &str) -> MessageId {
        self.messages.push(Fragment::parse(html));
        let id = self.messages.len() - 1;
        self.queue.insert(id);
        id
    }

    pub fn update_message(&mut self, id: MessageId, html: &str) -> Result<()> {
        let message = self
            .messages
            .get_mut(id)
            .ok_or_else(|| CodexError::Api(format!("no message {}", id)))?;
        *message = Fragment::parse(html);
        self.queue.insert(id);
        Ok(())
    }

    pub fn queue_message(&mut self, id: MessageId) {
        if id < self.messages.len() {
            self.queue.insert(id);
        }
    }

    pub fn message_html(&self, id: MessageId) -> Option<String> {
        self.messages.get(id).map(Fragment::to_html)
    }

    /// Link every queued message once. Returns the number of references added.
    pub fn process_queue(&mut self) -> usize {
        let queued = std::mem::take(&mut self.queue);
        let Some(linker) = self.linker.as_ref() else {
            return 0;
        };
        if self.config.disable_links {
            return 0;
        }
        let mut added = 0;
        for id in queued {
            if let Some(message) = self.messages.get_mut(id) {
                Linker::restore_chat_message(message);
                added += linker.add_codex_links(message, None);
            }
        }
        tracing::debug!(added, "processed message queue");
        added
    }

    // --- Entries ---

    /// Entries relevant to `text`, leftmost first when cycling is on.
    pub fn find_matches(&self, text: &str) -> Vec<Match> {
        let Some(matcher) = self.matcher.as_ref() else {
            return Vec::new();
        };
        let found = matcher.find_matches(text);
        if self.config.cycle {
            matcher.order_by_occurrence(text, found)
        } else {
            found
        }
    }

    /// Follow a clicked reference: notify the click handler, then show the entry.
    pub fn click(&mut self, book: &str, uid: u64) -> Result<String> {
        let linker = self
            .linker
            .as_mut()
            .ok_or_else(|| CodexError::Api("codex is not running".to_string()))?;
        linker.click(book, uid)?;
        let clicked = self.clicked.borrow_mut().pop();
        match clicked {
            Some(found) => self.show(found),
            None => Err(CodexError::EntryNotFound {
                book: book.to_string(),
                uid,
            }),
        }
    }

    /// Render an entry panel and record it in the history.
    ///
    /// Opening reconciles the entry's type; a changed entry is queued for saving.
    pub fn show(&mut self, found: Match) -> Result<String> {
        let mut entry = found.entry;
        let (props, problems) = CodexEntryProperties::open(&mut entry, &self.config.entry_type_list);
        for problem in &problems {
            tracing::warn!(book = %entry.book, uid = entry.uid, %problem, "opening entry");
        }
        if entry.is_dirty() {
            self.request_save(entry.clone());
        }
        let html = self.render(&entry, &props);
        self.history.add(Match::new(found.book, entry));
        Ok(html)
    }

    pub fn back(&mut self) -> Option<String> {
        let current = self.history.back()?.clone();
        Some(self.render_match(current))
    }

    pub fn forward(&mut self) -> Option<String> {
        let current = self.history.forward()?.clone();
        Some(self.render_match(current))
    }

    fn render_match(&self, found: Match) -> String {
        let mut entry = found.entry;
        let props = CodexEntryProperties::from_entry_lossy(&mut entry);
        self.render(&entry, &props)
    }

    fn render(&self, entry: &Entry, props: &CodexEntryProperties) -> String {
        let panel = EntryRenderer::new(&self.config, &self.renderer);
        match self.linker.as_ref() {
            Some(linker) => panel.with_linker(linker).render(entry, props),
            None => panel.render(entry, props),
        }
    }

    // --- Saves ---

    pub fn request_save(&mut self, entry: Entry) -> Token {
        self.saves.request((entry.book.clone(), entry.uid), entry)
    }

    pub fn fire_save(&mut self, book: &str, uid: u64, token: Token) -> Result<bool> {
        match self.saves.fire(&(book.to_string(), uid), token) {
            Some(entry) => self.write(entry),
            None => Ok(false),
        }
    }

    /// Write every pending save now. Returns how many entries were written.
    ///
    /// A failed save stays pending for the next flush; the first error is
    /// returned once every entry has been tried.
    pub fn flush_saves(&mut self) -> Result<usize> {
        let mut written = 0;
        let mut first_err = None;
        for (key, entry) in self.saves.drain() {
            match self.write(entry.clone()) {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(book = %entry.book, uid = entry.uid, %err, "save failed, kept pending");
                    self.saves.request(key, entry);
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(written),
        }
    }

    fn write(&mut self, entry: Entry) -> Result<bool> {
        let changes = entry.changes();
        if changes.is_empty() {
            return Ok(false);
        }
        self.store.save_entry(&entry, &changes)?;
        tracing::debug!(book = %entry.book, uid = entry.uid, "entry saved");
        Ok(true)
    }
}
