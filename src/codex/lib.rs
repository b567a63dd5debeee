//! # Codex Architecture
//!
//! Codex is an **in-context encyclopedia** for chat transcripts: it finds the world info
//! entries a text refers to, links their keys inside rendered messages, and keeps typed
//! entries (entries built from named sections) in line with their type definitions.
//! It is a library that happens to have a CLI client.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (cli/, wired by main.rs)                         │
//! │  - Parses arguments, formats output, handles terminal I/O   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs) and Session (session.rs)                │
//! │  - Thin facade over commands, settings read per call        │
//! │  - Session: long-running lifecycle, message queue, history  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - Business logic over a KnowledgeStore                     │
//! │  - Returns CmdResult, never writes to a terminal            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Engines                                                    │
//! │  - matcher: keys → compiled patterns → matches              │
//! │  - linker + dom: wrap key occurrences in rendered HTML      │
//! │  - codec + properties + reconcile: typed entry metadata     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - KnowledgeStore trait                                     │
//! │  - FileStore (production), InMemoryStore (testing)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## No I/O Assumptions in Core
//!
//! From `api.rs` inward, code takes Rust arguments and returns Rust types. It never
//! writes to stdout or stderr and never exits the process. Diagnostics go through
//! `tracing`; the binary decides where they end up.
//!
//! ## Module Overview
//!
//! - [`api`]: The API facade
//! - [`session`]: Start/stop lifecycle, message linking queue, debounced saves
//! - [`commands`]: Business logic for each command
//! - [`matcher`]: Key patterns and match ordering
//! - [`linker`], [`dom`]: Reference spans in rendered messages
//! - [`codec`]: The hidden metadata block inside entry content
//! - [`entry_type`], [`reconcile`], [`properties`]: Typed entries
//! - [`render`]: Entry panel rendering (templates and markdown)
//! - [`history`], [`pending`]: Navigation history and debouncing
//! - [`keys`]: Reserved key directives
//! - [`model`]: Entries, books and matches
//! - [`store`]: Storage abstraction and implementations
//! - [`config`]: Settings
//! - [`error`]: Error types
//! - `cli`: Argument parsing and printing for the binary (not part of the lib API)

pub mod api;
pub mod codec;
pub mod commands;
pub mod config;
pub mod dom;
pub mod entry_type;
pub mod error;
pub mod history;
pub mod keys;
pub mod linker;
pub mod matcher;
pub mod model;
pub mod pending;
pub mod properties;
pub mod reconcile;
pub mod render;
pub mod session;
pub mod store;
