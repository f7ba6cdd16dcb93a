// SPDX-License-Identifier: MIT OR Apache-2.0

//! Groups nearby same-page matches into display units.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::{ContextConfig, DEFAULT_MAX_MERGE_DISTANCE};
use crate::query::types::{FileResults, MergedMatch, SearchResult};

/// Separator placed between member contexts of a merged group
pub const DEFAULT_MERGE_DELIMITER: &str = " ";

/// Post-pass turning raw matches into merged display units
#[derive(Debug, Clone)]
pub struct ResultProcessor {
    max_merge_distance: usize,
    delimiter: String,
}

impl Default for ResultProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MERGE_DISTANCE)
    }
}

impl ResultProcessor {
    pub fn new(max_merge_distance: usize) -> Self {
        Self {
            max_merge_distance,
            delimiter: DEFAULT_MERGE_DELIMITER.to_string(),
        }
    }

    pub fn from_config(context: &ContextConfig) -> Self {
        Self::new(context.max_merge_distance)
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Merge every file's matches. Files iterate in path order.
    pub fn process(&self, results: &FileResults) -> BTreeMap<PathBuf, Vec<MergedMatch>> {
        results
            .iter()
            .filter(|(_, file_results)| !file_results.is_empty())
            .map(|(path, file_results)| (path.clone(), self.merge_file(file_results)))
            .collect()
    }

    /// Merge one file: pages ascending, groups in position order
    pub fn merge_file(&self, results: &[SearchResult]) -> Vec<MergedMatch> {
        let mut by_page: BTreeMap<usize, Vec<&SearchResult>> = BTreeMap::new();
        for result in results {
            by_page.entry(result.page_number).or_default().push(result);
        }

        let mut merged = Vec::new();
        for (_, mut page) in by_page {
            page.sort_by_key(|result| result.absolute_position);
            for group in self.group_page(&page) {
                merged.push(self.merge_group(group));
            }
        }
        merged
    }

    fn group_page<'r>(&self, page: &[&'r SearchResult]) -> Vec<Vec<&'r SearchResult>> {
        let mut groups: Vec<Vec<&SearchResult>> = Vec::new();
        let mut current: Vec<&SearchResult> = Vec::new();

        for &result in page {
            if let Some(prev) = current.last() {
                if gap_between(prev, result) >= self.max_merge_distance as i64 {
                    groups.push(std::mem::take(&mut current));
                }
            }
            current.push(result);
        }
        if !current.is_empty() {
            groups.push(current);
        }
        groups
    }

    fn merge_group(&self, group: Vec<&SearchResult>) -> MergedMatch {
        let first = group[0];
        if group.len() == 1 {
            return MergedMatch::from(first);
        }

        let delimiter_chars = self.delimiter.chars().count();
        let mut merged_context = String::new();
        let mut match_positions = Vec::with_capacity(group.len());
        let mut offset = 0usize;

        for (idx, result) in group.iter().enumerate() {
            if idx > 0 {
                merged_context.push_str(&self.delimiter);
                offset += delimiter_chars;
            }
            merged_context.push_str(&result.context);
            match_positions.push((offset + result.match_start, offset + result.match_end));
            offset += result.context.chars().count();
        }

        MergedMatch {
            file_path: first.file_path.clone(),
            file_name: first.file_name.clone(),
            page_number: first.page_number,
            merged_context,
            match_positions,
            match_count: group.len(),
            matched_texts: group.iter().map(|r| r.matched_text.clone()).collect(),
        }
    }
}

/// Chars between the end of `prev` and the start of `next`; negative on overlap
fn gap_between(prev: &SearchResult, next: &SearchResult) -> i64 {
    let prev_end = prev.absolute_position + prev.matched_text.chars().count();
    next.absolute_position as i64 - prev_end as i64
}
