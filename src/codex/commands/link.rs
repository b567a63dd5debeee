use crate::commands::{CmdMessage, CmdResult};
use crate::config::CodexConfig;
use crate::dom::Fragment;
use crate::error::Result;
use crate::linker::Linker;
use crate::session::Session;
use crate::store::KnowledgeStore;

/// Link a rendered message against every book.
pub fn run<S: KnowledgeStore>(store: &mut S, config: &CodexConfig, html: &str) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    if config.disable_links {
        result.add_message(CmdMessage::info("Linking is disabled"));
        return Ok(result.with_html(html.to_string()));
    }

    let mut session = Session::new(store, config.clone());
    let id = session.add_message(html);
    if !session.start()? {
        result.add_message(CmdMessage::info("Codex is disabled"));
        return Ok(result.with_html(html.to_string()));
    }
    let linked = session.message_html(id).unwrap_or_else(|| html.to_string());
    let links = Fragment::parse(&linked).links().len();
    result.add_message(CmdMessage::success(format!("Linked {} references", links)));
    Ok(result.with_html(linked))
}

/// Remove every reference from a linked message.
pub fn restore(html: &str) -> CmdResult {
    CmdResult::default().with_html(Linker::restore_html(html))
}
