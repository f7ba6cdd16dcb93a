// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use docsearch::config::SearchMode;
use std::path::PathBuf;

/// docsearch - Concurrent keyword search over document folders
///
/// Finds a keyword in every supported document under a folder, tolerating
/// hyphens, spacing and plurals, and shows each hit with its surrounding
/// sentences. Extracted text is kept in a persistent index so repeat searches
/// over an unchanged folder skip extraction.
#[derive(Parser, Debug)]
#[command(name = "docsearch")]
#[command(
    author,
    version,
    about,
    long_about = None,
    after_help = "Quickstart:\n  docsearch index ~/Papers\n  docsearch s \"low resource\" ~/Papers\n  docsearch search -w cat ~/Notes --format json"
)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Compact JSON output (no pretty formatting)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Start from a settings preset (low_resource, balanced, high_performance, maximum)
    #[arg(short = 'P', long, global = true)]
    pub profile: Option<String>,

    /// Directory holding the index and cache (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// More logging on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search documents for a keyword or phrase
    #[command(
        visible_aliases = ["s", "find"],
        after_help = "Examples:\n  docsearch s \"low-resource\" ~/Papers\n  docsearch search -M extract-only budget .\n  docsearch search -w -B 0 -A 0 cat ~/Notes"
    )]
    Search {
        /// Keyword or phrase
        keyword: String,

        /// Folder to search (defaults to current directory)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Search mode (overrides config)
        #[arg(short = 'M', long, value_enum)]
        mode: Option<SearchMode>,

        /// Only match whole words
        #[arg(short = 'w', long)]
        whole_word: bool,

        /// Sentences of context before each match
        #[arg(short = 'B', long, value_name = "N")]
        before: Option<usize>,

        /// Sentences of context after each match
        #[arg(short = 'A', long, value_name = "N")]
        after: Option<usize>,

        /// Worker threads (overrides config)
        #[arg(short = 'j', long, value_name = "N")]
        workers: Option<usize>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Extract and index every supported document under a folder
    #[command(visible_aliases = ["i"])]
    Index {
        /// Folder to index (defaults to current directory)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,

        /// Drop the existing index first
        #[arg(long)]
        force: bool,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Phrase lookup against the index only, best matches first
    Lookup {
        /// Phrase to look up
        phrase: String,

        /// Maximum number of documents
        #[arg(short = 'm', long, default_value_t = 20)]
        limit: usize,
    },

    /// Show index and cache statistics
    Stats,

    /// Remove indexed documents and cached text
    Clear {
        /// Only clear the index
        #[arg(long, conflicts_with = "cache")]
        index: bool,

        /// Only clear the text cache
        #[arg(long)]
        cache: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn search_alias_and_short_flags_parse() {
        let cli = Cli::try_parse_from([
            "docsearch",
            "s",
            "low resource",
            "papers",
            "-M",
            "indexed-only",
            "-w",
            "-B",
            "0",
            "-A",
            "3",
        ])
        .expect("parse search alias");

        match cli.command {
            Commands::Search {
                keyword,
                path,
                mode,
                whole_word,
                before,
                after,
                ..
            } => {
                assert_eq!(keyword, "low resource");
                assert_eq!(path, Some(PathBuf::from("papers")));
                assert_eq!(mode, Some(SearchMode::IndexedOnly));
                assert!(whole_word);
                assert_eq!(before, Some(0));
                assert_eq!(after, Some(3));
            }
            other => panic!("expected search command, got {other:?}"),
        }
    }

    #[test]
    fn fast_extract_alias_parses() {
        let cli = Cli::try_parse_from(["docsearch", "search", "x", "-M", "fast-extract"])
            .expect("parse mode alias");
        match cli.command {
            Commands::Search { mode, .. } => assert_eq!(mode, Some(SearchMode::ExtractOnly)),
            other => panic!("expected search command, got {other:?}"),
        }
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "docsearch",
            "stats",
            "--format",
            "json",
            "--state-dir",
            "/tmp/state",
            "-vv",
        ])
        .expect("parse globals");
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/state")));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Stats));
    }

    #[test]
    fn clear_flags_conflict() {
        assert!(Cli::try_parse_from(["docsearch", "clear", "--index", "--cache"]).is_err());
    }
}
