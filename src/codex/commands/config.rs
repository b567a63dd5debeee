use crate::commands::{CmdMessage, CmdResult, CodexPaths};
use crate::config::CodexConfig;
use crate::error::Result;

#[derive(Debug, Clone)]
pub enum ConfigAction {
    ShowAll,
    ShowKey(String),
    Set(String, String),
}

pub fn run(paths: &CodexPaths, action: ConfigAction) -> Result<CmdResult> {
    let dir = paths.config_dir();
    match action {
        ConfigAction::ShowAll => {
            let config = CodexConfig::load(&dir)?;
            Ok(CmdResult::default().with_config(config))
        }
        ConfigAction::ShowKey(key) => {
            let config = CodexConfig::load(&dir)?;
            let mut result = CmdResult::default();
            match config.get(&key) {
                Some(val) => result.add_message(CmdMessage::info(val)),
                None => {
                    result.add_message(CmdMessage::error(format!("Unknown config key: {}", key)))
                }
            }
            Ok(result)
        }
        ConfigAction::Set(key, value) => {
            let mut config = CodexConfig::load(&dir)?;
            if let Err(e) = config.set(&key, &value) {
                let mut res = CmdResult::default();
                res.add_message(CmdMessage::error(e));
                return Ok(res);
            }
            config.save(&dir)?;
            let display_val = config.get(&key).unwrap_or_else(|| value.clone());
            let mut result = CmdResult::default().with_config(config);
            result.add_message(CmdMessage::success(format!("{} set to {}", key, display_val)));
            Ok(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::MessageLevel;
    use tempfile::tempdir;

    #[test]
    fn set_persists_and_show_reads_back() {
        let dir = tempdir().unwrap();
        let paths = CodexPaths::new(dir.path());

        let res = run(&paths, ConfigAction::Set("onlyFirst".into(), "true".into())).unwrap();
        assert_eq!(res.messages[0].level, MessageLevel::Success);
        assert!(res.config.unwrap().only_first);

        let res = run(&paths, ConfigAction::ShowKey("onlyFirst".into())).unwrap();
        assert_eq!(res.messages[0].content, "true");

        let res = run(&paths, ConfigAction::ShowAll).unwrap();
        assert!(res.config.unwrap().only_first);
    }

    #[test]
    fn unknown_keys_and_bad_values_are_reported() {
        let dir = tempdir().unwrap();
        let paths = CodexPaths::new(dir.path());

        let res = run(&paths, ConfigAction::ShowKey("nope".into())).unwrap();
        assert_eq!(res.messages[0].level, MessageLevel::Error);

        let res = run(&paths, ConfigAction::Set("historyLength".into(), "many".into())).unwrap();
        assert_eq!(res.messages[0].level, MessageLevel::Error);
        assert!(res.config.is_none());
    }
}
