use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "kb")]
#[command(about = "Capture, tag and resurface short notes", version)]
pub struct Cli {
    /// Database file. Overrides `KB_DB_PATH`.
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Capture a new entry.
    Add(AddArgs),
    /// List entries, newest first.
    List(ListArgs),
    /// Show one entry and mark it as viewed.
    Show(EntryArg),
    /// Print the tag hierarchy.
    Tags,
    /// Case-insensitive substring search.
    Search(SearchArgs),
    /// Delete one entry.
    Delete(EntryArg),
    /// Entries you have not looked at in a while.
    Suggest(LimitArgs),
    /// Entries related to one entry by meaning and by shared tags.
    Related(RelatedArgs),
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Entry text. Multiple words are joined with spaces.
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
    pub content: Vec<String>,
    /// Skip automatic tagging.
    #[arg(long, default_value_t = false)]
    pub no_classify: bool,
    /// Skip embedding and the similar-entries lookup.
    #[arg(long, default_value_t = false)]
    pub no_embed: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(short = 'n', long)]
    pub limit: Option<u32>,
    #[arg(long, default_value_t = 0)]
    pub offset: u32,
    /// Only entries tagged with NAME or one of its descendants.
    #[arg(long, value_name = "NAME")]
    pub tag: Option<String>,
    /// With `--tag`, ignore descendant tags.
    #[arg(long, default_value_t = false, requires = "tag")]
    pub exact: bool,
}

#[derive(Debug, Args)]
pub struct EntryArg {
    /// Full entry id or a unique prefix of a recent one.
    pub id: String,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
    pub query: Vec<String>,
}

#[derive(Debug, Args)]
pub struct LimitArgs {
    #[arg(short = 'n', long, default_value_t = 5)]
    pub limit: u32,
}

#[derive(Debug, Args)]
pub struct RelatedArgs {
    /// Full entry id or a unique prefix of a recent one.
    pub id: String,
    #[arg(short = 'n', long, default_value_t = 5)]
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_joins_words_and_parses_switches() {
        let cli = Cli::try_parse_from(["kb", "add", "--no-embed", "Go", "channels"]).expect("parse");
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.content, vec!["Go", "channels"]);
                assert!(args.no_embed);
                assert!(!args.no_classify);
            }
            _ => panic!("expected add command"),
        }
    }

    #[test]
    fn add_requires_content() {
        assert!(Cli::try_parse_from(["kb", "add"]).is_err());
    }

    #[test]
    fn global_flags_are_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["kb", "list", "--json", "--db", "/tmp/kb.db", "-n", "3"])
            .expect("parse");
        assert!(cli.json);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/kb.db")));
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.limit, Some(3));
                assert_eq!(args.offset, 0);
                assert!(args.tag.is_none());
            }
            _ => panic!("expected list command"),
        }
    }

    #[test]
    fn exact_requires_tag() {
        assert!(Cli::try_parse_from(["kb", "list", "--exact"]).is_err());
        assert!(Cli::try_parse_from(["kb", "list", "--tag", "rust", "--exact"]).is_ok());
    }

    #[test]
    fn suggest_defaults_to_five() {
        let cli = Cli::try_parse_from(["kb", "suggest"]).expect("parse");
        match cli.command {
            Commands::Suggest(args) => assert_eq!(args.limit, 5),
            _ => panic!("expected suggest command"),
        }
    }
}
