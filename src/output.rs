// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal and JSON rendering shared by the CLI commands

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::query::context::char_slice;
use crate::query::types::{MergedMatch, SearchOutcome};

/// Colors are on for terminals unless NO_COLOR is set
pub fn use_colors() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

/// Print any serializable value as JSON on stdout
pub fn print_json<T: Serialize>(value: &T, compact: bool) -> anyhow::Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{rendered}");
    Ok(())
}

/// `merged_context` with every match span emphasized
pub fn highlight_context(merged: &MergedMatch, use_color: bool) -> String {
    let text = &merged.merged_context;
    let total = text.chars().count();
    let mut spans = merged.match_positions.clone();
    spans.sort_unstable();

    let mut out = String::with_capacity(text.len() + spans.len() * 16);
    let mut cursor = 0usize;
    for (start, end) in spans {
        let start = start.max(cursor).min(total);
        let end = end.max(start).min(total);
        out.push_str(char_slice(text, cursor, start));
        let hit = char_slice(text, start, end);
        if use_color {
            out.push_str(&hit.red().bold().to_string());
        } else {
            out.push('[');
            out.push_str(hit);
            out.push(']');
        }
        cursor = end;
    }
    out.push_str(char_slice(text, cursor, total));
    squash_whitespace(&out)
}

/// Collapse newlines and runs of blanks so a snippet prints on one line
fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// JSON payload for one search
#[derive(Debug, Serialize)]
pub struct SearchReport<'a> {
    pub keyword: &'a str,
    pub mode: &'a str,
    pub files_total: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub index_hits: usize,
    pub cache_hits: usize,
    pub cancelled: bool,
    pub total_matches: usize,
    pub elapsed_ms: f64,
    pub files: Vec<FileReport<'a>>,
}

#[derive(Debug, Serialize)]
pub struct FileReport<'a> {
    pub file_path: &'a PathBuf,
    pub match_count: usize,
    pub matches: &'a [MergedMatch],
}

impl<'a> SearchReport<'a> {
    pub fn new(
        keyword: &'a str,
        mode: &'a str,
        outcome: &SearchOutcome,
        merged: &'a BTreeMap<PathBuf, Vec<MergedMatch>>,
        elapsed_ms: f64,
    ) -> Self {
        Self {
            keyword,
            mode,
            files_total: outcome.files_total,
            files_processed: outcome.files_processed,
            files_failed: outcome.files_failed,
            files_skipped: outcome.files_skipped,
            index_hits: outcome.index_hits,
            cache_hits: outcome.cache_hits,
            cancelled: outcome.cancelled,
            total_matches: outcome.total_matches(),
            elapsed_ms,
            files: merged
                .iter()
                .map(|(path, matches)| FileReport {
                    file_path: path,
                    match_count: matches.iter().map(|m| m.match_count).sum(),
                    matches,
                })
                .collect(),
        }
    }
}

/// Line telling the user a stopped search shows partial results
pub fn interrupted_notice(outcome: &SearchOutcome) -> Option<String> {
    outcome.cancelled.then(|| {
        format!(
            "Search stopped: {} of {} files searched, results are partial",
            outcome.files_processed, outcome.files_total
        )
    })
}

/// Human readable listing, one block per file in path order
pub fn print_text(
    keyword: &str,
    outcome: &SearchOutcome,
    merged: &BTreeMap<PathBuf, Vec<MergedMatch>>,
    use_color: bool,
) {
    if merged.is_empty() {
        if use_color {
            println!("{} No results found for: {}", "✗".red(), keyword.yellow());
        } else {
            println!("No results found for: {}", keyword);
        }
        return;
    }

    let total = outcome.total_matches();
    if use_color {
        println!(
            "\n{} Found {} matches in {} files for: {}\n",
            "✓".green(),
            total.to_string().cyan(),
            merged.len().to_string().cyan(),
            keyword.yellow()
        );
    } else {
        println!(
            "\nFound {} matches in {} files for: {}\n",
            total,
            merged.len(),
            keyword
        );
    }

    for (path, groups) in merged {
        let header = path.display().to_string();
        if use_color {
            println!("{}", header.magenta().bold());
        } else {
            println!("{}", header);
        }
        for group in groups {
            let page = format!("p.{}", group.page_number);
            let count = if group.match_count > 1 {
                format!(" ({} matches)", group.match_count)
            } else {
                String::new()
            };
            let prefix = if use_color {
                format!("{}{}", page.yellow(), count.dimmed())
            } else {
                format!("{page}{count}")
            };
            println!("  {} | {}", prefix, highlight_context(group, use_color));
        }
        println!();
    }
}
