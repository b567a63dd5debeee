//! # API Facade
//!
//! The API layer is a **thin facade** over the command layer. It is the single
//! entry point for codex operations, whatever the client.
//!
//! ## Role and Responsibilities
//!
//! The API facade:
//! - **Dispatches** to the appropriate command function
//! - **Normalizes inputs** (entry selectors, settings from the data directory)
//! - **Returns structured types** (`Result<CmdResult>`)
//!
//! ## What the API Does NOT Do
//!
//! - **Business logic**: That belongs in `commands/*.rs`
//! - **I/O on the terminal**: No stdout or stderr
//! - **Presentation concerns**: Returns data structures, not formatted text
//!
//! ## Generic Over KnowledgeStore
//!
//! `CodexApi<S: KnowledgeStore>` is generic over the storage backend:
//! - Production: `CodexApi<FileStore>`
//! - Testing: `CodexApi<InMemoryStore>`
//!
//! Settings are read from the data directory on every call, so a `config` change
//! is seen by the next command.

use crate::commands;
use crate::config::CodexConfig;
use crate::error::Result;
use crate::render::MarkdownRenderer;
use crate::session::Session;
use crate::store::KnowledgeStore;

pub struct CodexApi<S: KnowledgeStore> {
    store: S,
    paths: commands::CodexPaths,
    renderer: MarkdownRenderer,
}

impl<S: KnowledgeStore> CodexApi<S> {
    pub fn new(store: S, paths: commands::CodexPaths) -> Self {
        Self {
            store,
            paths,
            renderer: MarkdownRenderer::default(),
        }
    }

    fn settings(&self) -> Result<CodexConfig> {
        CodexConfig::load(self.paths.config_dir())
    }

    pub fn books(&self) -> Result<commands::CmdResult> {
        commands::books::run(&self.store)
    }

    pub fn find_matches(&self, text: &str) -> Result<commands::CmdResult> {
        commands::matches::run(&self.store, &self.settings()?, text)
    }

    pub fn match_contents(&self, text: &str) -> Result<commands::CmdResult> {
        commands::matches::contents(&self.store, &self.settings()?, text)
    }

    pub fn show(&mut self, query: &str, all: bool) -> Result<commands::CmdResult> {
        let config = self.settings()?;
        commands::show::run(
            &mut self.store,
            &config,
            &self.renderer,
            &parse_selector(query),
            all,
        )
    }

    pub fn link(&mut self, html: &str) -> Result<commands::CmdResult> {
        let config = self.settings()?;
        commands::link::run(&mut self.store, &config, html)
    }

    pub fn restore(&self, html: &str) -> commands::CmdResult {
        commands::link::restore(html)
    }

    pub fn list_types(&self) -> Result<commands::CmdResult> {
        Ok(commands::types::list(&self.settings()?))
    }

    pub fn apply_type(&mut self, type_name: &str) -> Result<commands::CmdResult> {
        let config = self.settings()?;
        commands::types::apply(&mut self.store, &config, type_name)
    }

    pub fn section_wi(
        &mut self,
        type_name: &str,
        section: &str,
        value: Option<bool>,
        apply: bool,
    ) -> Result<commands::CmdResult> {
        commands::types::section_wi(&mut self.store, &self.paths, type_name, section, value, apply)
    }

    pub fn edit_section(
        &mut self,
        query: &str,
        section: Option<&str>,
        content: &str,
    ) -> Result<commands::CmdResult> {
        let config = self.settings()?;
        commands::edit::set_section(&mut self.store, &config, &parse_selector(query), section, content)
    }

    pub fn set_type(&mut self, query: &str, type_name: Option<&str>) -> Result<commands::CmdResult> {
        let config = self.settings()?;
        commands::edit::set_type(&mut self.store, &config, &parse_selector(query), type_name)
    }

    pub fn config(&self, action: ConfigAction) -> Result<commands::CmdResult> {
        commands::config::run(&self.paths, action)
    }

    /// A session over this API's store, for long-running clients.
    pub fn session(&mut self) -> Result<Session<'_, S>> {
        let config = self.settings()?;
        Ok(Session::new(&mut self.store, config))
    }

    pub fn paths(&self) -> &commands::CodexPaths {
        &self.paths
    }
}

fn parse_selector(query: &str) -> EntrySelector {
    match query.parse() {
        Ok(selector) => selector,
        Err(never) => match never {},
    }
}

pub use crate::commands::config::ConfigAction;
pub use crate::commands::helpers::EntrySelector;
pub use commands::{BookSummary, BulkReport, CmdMessage, CmdResult, CodexPaths, MessageLevel};
