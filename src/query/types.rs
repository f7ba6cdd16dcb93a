// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search result types shared by the engine, the merger and the CLI.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::query::context::char_slice;

/// One keyword occurrence. All offsets count chars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub file_path: PathBuf,
    pub file_name: String,
    /// Estimated page, `absolute_position / chars_per_page + 1`
    pub page_number: usize,
    pub context: String,
    /// Match start inside `context`
    pub match_start: usize,
    /// Match end inside `context`
    pub match_end: usize,
    /// Match start inside the full extracted text
    pub absolute_position: usize,
    pub matched_text: String,
}

/// Same-page matches close enough to be shown as one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedMatch {
    pub file_path: PathBuf,
    pub file_name: String,
    pub page_number: usize,
    pub merged_context: String,
    /// Match spans inside `merged_context`, in chars
    pub match_positions: Vec<(usize, usize)>,
    pub match_count: usize,
    pub matched_texts: Vec<String>,
}

impl MergedMatch {
    /// The highlighted slices of `merged_context`
    pub fn highlights(&self) -> impl Iterator<Item = &str> + '_ {
        self.match_positions
            .iter()
            .map(|(start, end)| char_slice(&self.merged_context, *start, *end))
    }
}

impl From<&SearchResult> for MergedMatch {
    fn from(result: &SearchResult) -> Self {
        Self {
            file_path: result.file_path.clone(),
            file_name: result.file_name.clone(),
            page_number: result.page_number,
            merged_context: result.context.clone(),
            match_positions: vec![(result.match_start, result.match_end)],
            match_count: 1,
            matched_texts: vec![result.matched_text.clone()],
        }
    }
}

/// Raw per-file results of one search
pub type FileResults = HashMap<PathBuf, Vec<SearchResult>>;

/// Outcome of one engine run
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub results: FileResults,
    /// Files whose processing finished (with or without matches)
    pub files_processed: usize,
    pub files_total: usize,
    /// Files that failed extraction, timed out, or panicked
    pub files_failed: usize,
    /// Files skipped because they were not fresh in the index
    pub files_skipped: usize,
    /// Files served from the index without extraction
    pub index_hits: usize,
    /// Files served from the text cache without extraction
    pub cache_hits: usize,
    pub cancelled: bool,
}

impl SearchOutcome {
    pub fn total_matches(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    pub fn files_with_matches(&self) -> usize {
        self.results.len()
    }
}

/// Display name used for results and progress notifications
pub fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
