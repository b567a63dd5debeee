use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "codex")]
#[command(about = "Lorebook encyclopedia: match, link and maintain world info entries", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Data directory holding codex.json and books/ (defaults to $CODEX_HOME)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List books
    #[command(alias = "ls")]
    Books,

    /// List entries whose keys match the text
    #[command(alias = "m")]
    Match {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Print the matching entries' content as a JSON list
        #[arg(long)]
        content: bool,
    },

    /// Render the entry panel for `Book#uid` or the first entry matching text
    #[command(alias = "s")]
    Show {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Show every matching entry
        #[arg(long)]
        all: bool,
    },

    /// Link key occurrences in an HTML message (stdin when no file is given)
    Link { file: Option<PathBuf> },

    /// Remove links from an HTML message (stdin when no file is given)
    Restore { file: Option<PathBuf> },

    /// Entry types
    #[command(alias = "t")]
    Types {
        #[command(subcommand)]
        action: TypeCommands,
    },

    /// Replace the text of a section, or of a plain entry
    Edit {
        query: String,

        #[arg(long)]
        section: Option<String>,

        #[arg(long)]
        content: String,
    },

    /// Switch an entry to another type, or back to plain text
    SetType {
        query: String,

        #[arg(required_unless_present = "plain")]
        type_name: Option<String>,

        #[arg(long, conflicts_with = "type_name")]
        plain: bool,
    },

    /// Get or set configuration
    Config {
        /// Configuration key (e.g. onlyFirst)
        key: Option<String>,
        /// Value to set
        value: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TypeCommands {
    /// List entry types
    #[command(alias = "ls")]
    List,

    /// Bring every entry of a type up to date with its definition
    Apply { name: String },

    /// Include or exclude a section from model-visible text
    SectionWi {
        #[arg(long = "type")]
        type_name: String,

        #[arg(long)]
        section: String,

        /// true or false; toggles when omitted
        value: Option<bool>,

        /// Update existing entries afterwards
        #[arg(long)]
        apply: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_section_wi() {
        let cli = Cli::parse_from([
            "codex", "types", "section-wi", "--type", "NPC", "--section", "Stats", "false", "--apply",
        ]);
        match cli.command {
            Some(Commands::Types {
                action:
                    TypeCommands::SectionWi {
                        type_name,
                        section,
                        value,
                        apply,
                    },
            }) => {
                assert_eq!(type_name, "NPC");
                assert_eq!(section, "Stats");
                assert_eq!(value, Some(false));
                assert!(apply);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn set_type_needs_a_type_or_plain() {
        assert!(Cli::try_parse_from(["codex", "set-type", "World#1"]).is_err());
        assert!(Cli::try_parse_from(["codex", "set-type", "World#1", "--plain"]).is_ok());
        assert!(Cli::try_parse_from(["codex", "set-type", "World#1", "NPC", "--plain"]).is_err());
    }
}
