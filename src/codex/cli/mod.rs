//! # CLI Layer
//!
//! This module is **one possible client** for codex, not the application itself.
//!
//! The CLI layer is the **only** place in the codebase that:
//! - Knows about terminal I/O (stdin, stdout, stderr)
//! - Installs the tracing subscriber
//! - Handles argument parsing
//! - Formats output for human consumption
//!
//! ## Structure
//!
//! - `run()`: Main dispatch logic (called by `main.rs`)
//! - `init_context()`: Builds `AppContext` with the API over the file store
//! - `handle_*()`: Per-command handlers that call the API and print the result
//! - `print`: Output formatting

mod print;

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Parser;
use codex::api::{CodexApi, CodexPaths, ConfigAction};
use codex::config::data_dir;
use codex::error::Result;
use codex::store::fs::FileStore;
use tracing_subscriber::EnvFilter;

use self::print::{
    print_books, print_config, print_entry_types, print_matches, print_messages, print_report,
};
use crate::args::{Cli, Commands, TypeCommands};

const LOG_ENV: &str = "CODEX_LOG";

struct AppContext {
    api: CodexApi<FileStore>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut ctx = init_context(cli.data_dir)?;

    match cli.command {
        Some(Commands::Books) | None => handle_books(&ctx),
        Some(Commands::Match { text, content }) => handle_match(&ctx, &text.join(" "), content),
        Some(Commands::Show { query, all }) => handle_show(&mut ctx, &query.join(" "), all),
        Some(Commands::Link { file }) => handle_link(&mut ctx, file.as_deref()),
        Some(Commands::Restore { file }) => handle_restore(&ctx, file.as_deref()),
        Some(Commands::Types { action }) => match action {
            TypeCommands::List => handle_types(&ctx),
            TypeCommands::Apply { name } => handle_apply(&mut ctx, &name),
            TypeCommands::SectionWi {
                type_name,
                section,
                value,
                apply,
            } => handle_section_wi(&mut ctx, &type_name, &section, value, apply),
        },
        Some(Commands::Edit {
            query,
            section,
            content,
        }) => handle_edit(&mut ctx, &query, section.as_deref(), &content),
        Some(Commands::SetType {
            query,
            type_name,
            plain,
        }) => {
            let target = if plain { None } else { type_name.as_deref() };
            handle_set_type(&mut ctx, &query, target)
        }
        Some(Commands::Config { key, value }) => handle_config(&ctx, key, value),
    }
}

/// Log to stderr. `CODEX_LOG` takes an env-filter directive; `-v` forces debug.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("codex=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("codex=warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn init_context(data: Option<PathBuf>) -> Result<AppContext> {
    let data = match data {
        Some(dir) => dir,
        None => data_dir()?,
    };
    let paths = CodexPaths::new(data);
    let store = FileStore::new(paths.books_dir());
    Ok(AppContext {
        api: CodexApi::new(store, paths),
    })
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn handle_books(ctx: &AppContext) -> Result<()> {
    let result = ctx.api.books()?;
    print_books(&result.books);
    print_messages(&result.messages);
    Ok(())
}

fn handle_match(ctx: &AppContext, text: &str, content: bool) -> Result<()> {
    if content {
        let result = ctx.api.match_contents(text)?;
        println!("{}", serde_json::to_string_pretty(&result.texts)?);
        return Ok(());
    }
    let result = ctx.api.find_matches(text)?;
    print_messages(&result.messages);
    print_matches(&result.matches);
    Ok(())
}

fn handle_show(ctx: &mut AppContext, query: &str, all: bool) -> Result<()> {
    let result = ctx.api.show(query, all)?;
    if let Some(html) = &result.html {
        println!("{}", html.trim_end());
    }
    print_messages(&result.messages);
    Ok(())
}

fn handle_link(ctx: &mut AppContext, file: Option<&Path>) -> Result<()> {
    let input = read_input(file)?;
    let result = ctx.api.link(&input)?;
    if let Some(html) = &result.html {
        print!("{}", html);
    }
    Ok(())
}

fn handle_restore(ctx: &AppContext, file: Option<&Path>) -> Result<()> {
    let input = read_input(file)?;
    let result = ctx.api.restore(&input);
    if let Some(html) = &result.html {
        print!("{}", html);
    }
    Ok(())
}

fn handle_types(ctx: &AppContext) -> Result<()> {
    let result = ctx.api.list_types()?;
    print_entry_types(&result.entry_types);
    Ok(())
}

fn handle_apply(ctx: &mut AppContext, name: &str) -> Result<()> {
    let result = ctx.api.apply_type(name)?;
    print_messages(&result.messages);
    if let Some(report) = &result.report {
        print_report(report);
    }
    Ok(())
}

fn handle_section_wi(
    ctx: &mut AppContext,
    type_name: &str,
    section: &str,
    value: Option<bool>,
    apply: bool,
) -> Result<()> {
    let result = ctx.api.section_wi(type_name, section, value, apply)?;
    print_messages(&result.messages);
    if let Some(report) = &result.report {
        print_report(report);
    }
    Ok(())
}

fn handle_edit(
    ctx: &mut AppContext,
    query: &str,
    section: Option<&str>,
    content: &str,
) -> Result<()> {
    let result = ctx.api.edit_section(query, section, content)?;
    print_messages(&result.messages);
    Ok(())
}

fn handle_set_type(ctx: &mut AppContext, query: &str, type_name: Option<&str>) -> Result<()> {
    let result = ctx.api.set_type(query, type_name)?;
    print_messages(&result.messages);
    Ok(())
}

fn handle_config(ctx: &AppContext, key: Option<String>, value: Option<String>) -> Result<()> {
    let action = match (key, value) {
        (None, _) => ConfigAction::ShowAll,
        (Some(k), None) => ConfigAction::ShowKey(k),
        (Some(k), Some(v)) => ConfigAction::Set(k, v),
    };
    let show_all = matches!(action, ConfigAction::ShowAll);
    let result = ctx.api.config(action)?;
    match &result.config {
        Some(config) if show_all => print_config(config),
        _ => print_messages(&result.messages),
    }
    Ok(())
}
