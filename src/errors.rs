// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types with helpful suggestions
//!
//! Only directory validation and configuration problems reach the caller of a
//! search. Everything below that level (a file that fails to extract, a corrupt
//! cache blob, an index write that fails) is logged and recovered locally.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the docsearch library
#[derive(Debug, Error)]
pub enum DocSearchError {
    #[error(
        "Directory does not exist: '{}'\n\n\
         Suggestion: check the path or pass an existing folder.\n\
         Example: docsearch search \"keyword\" ~/Documents",
        .0.display()
    )]
    DirectoryNotFound(PathBuf),

    #[error(
        "Path is not a directory: '{}'\n\n\
         Suggestion: pass the folder that contains the documents, not a single file.",
        .0.display()
    )]
    NotADirectory(PathBuf),

    #[error(
        "Directory is not readable: '{}': {source}\n\n\
         Suggestion: check the folder permissions.",
        .path.display()
    )]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}\n\nSuggestion: fix the value in .docsearch.toml or pick a preset with --profile.")]
    InvalidConfig(String),

    #[error("Document index error: {0}")]
    Index(#[from] tantivy::TantivyError),

    #[error("Document index query could not be parsed: {0}")]
    QueryParse(#[from] tantivy::query::QueryParserError),

    #[error("Failed to open document index at '{}': {message}", .path.display())]
    IndexOpen { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Library result type
pub type Result<T> = std::result::Result<T, DocSearchError>;

/// Failure for a single file. Never escapes a search; it is logged and the
/// file contributes no results.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("no extractor registered for '{0}'")]
    Unsupported(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("timed out after {0}s")]
    TimedOut(u64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Helper functions for creating helpful messages
pub mod suggestions {
    /// Message printed when a search finds nothing
    pub fn no_results_suggestion(keyword: &str) -> String {
        format!(
            "No matches found for '{}'\n\n\
             Try:\n\
             - A shorter keyword or a single word\n\
             - Running 'docsearch index <dir>' and searching with --mode hybrid\n\
             - Dropping --whole-word to allow partial matches",
            keyword
        )
    }

    /// Message printed when indexed-only mode had nothing to search
    pub fn empty_index_suggestion(dir: &str) -> String {
        format!(
            "No indexed documents under '{}'\n\n\
             Build the index first:\n\
             $ docsearch index {}",
            dir, dir
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_errors_include_suggestion() {
        let err = DocSearchError::DirectoryNotFound(PathBuf::from("/no/such/dir"));
        let text = err.to_string();
        assert!(text.contains("/no/such/dir"));
        assert!(text.contains("Suggestion"));
    }

    #[test]
    fn file_error_timeout_mentions_seconds() {
        assert_eq!(FileError::TimedOut(60).to_string(), "timed out after 60s");
    }
}
