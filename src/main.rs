// SPDX-License-Identifier: MIT OR Apache-2.0

//! docsearch - Concurrent keyword search over document folders
//!
//! Thin front end over the docsearch library: fuzzy keyword matching,
//! sentence context, a persistent tantivy index and an LRU text cache.

mod cli;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, OutputFormat};
use colored::Colorize;
use docsearch::cancel::CancellationToken;
use docsearch::config::Config;
use docsearch::errors::suggestions;
use docsearch::output::{interrupted_notice, print_json, print_text, use_colors, SearchReport};
use docsearch::progress::ProgressSink;
use docsearch::query::pattern::PatternOptions;
use docsearch::AppContext;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match cli.profile.as_deref() {
        Some(profile) => Config::preset(profile),
        None => Config::load(),
    };
    if let Some(state_dir) = &cli.state_dir {
        config.index.dir = Some(state_dir.join("index"));
        config.cache.dir = Some(state_dir.join("cache"));
    }

    match cli.command {
        Commands::Search {
            keyword,
            path,
            mode,
            whole_word,
            before,
            after,
            workers,
            no_progress,
        } => {
            if let Some(mode) = mode {
                config.search.mode = mode;
            }
            if let Some(before) = before {
                config.context.sentences_before = before;
            }
            if let Some(after) = after {
                config.context.sentences_after = after;
            }
            if let Some(workers) = workers {
                config.performance.max_workers = workers;
            }
            let show_progress = !no_progress && cli.format == OutputFormat::Text;
            run_search(
                config,
                &keyword,
                &root_or_cwd(path),
                PatternOptions { whole_word },
                show_progress,
                cli.format,
                cli.compact,
            )?;
        }
        Commands::Index {
            path,
            force,
            no_progress,
        } => {
            let show_progress = !no_progress && cli.format == OutputFormat::Text;
            run_index(config, &root_or_cwd(path), force, show_progress, cli.format, cli.compact)?;
        }
        Commands::Lookup { phrase, limit } => {
            run_lookup(config, &phrase, limit, cli.format, cli.compact)?;
        }
        Commands::Stats => {
            run_stats(config, cli.format, cli.compact)?;
        }
        Commands::Clear { index, cache } => {
            let app = AppContext::new(config)?;
            if !cache {
                app.engine().clear_index().context("failed to clear the index")?;
            }
            if !index {
                app.engine().clear_cache();
            }
            let what = match (index, cache) {
                (true, _) => "index",
                (_, true) => "cache",
                _ => "index and cache",
            };
            println!("Cleared {what}");
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "docsearch", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "docsearch=warn",
        1 => "docsearch=info",
        _ => "docsearch=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// What a Ctrl-C does to a run in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Stop scheduling work and report what finished
    Stop,
    /// Already stopping; quit now
    Exit,
}

fn on_interrupt(token: &CancellationToken) -> Interrupt {
    if token.is_cancelled() {
        Interrupt::Exit
    } else {
        token.cancel();
        Interrupt::Stop
    }
}

/// Token cancelled by the first Ctrl-C. A second Ctrl-C exits with 130.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let handler_token = token.clone();
    let installed = ctrlc::set_handler(move || {
        if on_interrupt(&handler_token) == Interrupt::Exit {
            std::process::exit(130);
        }
        eprintln!("Stopping, press Ctrl-C again to quit immediately");
    });
    if let Err(err) = installed {
        tracing::warn!("cannot install Ctrl-C handler: {err}");
    }
    token
}

fn root_or_cwd(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| PathBuf::from("."))
}

/// Progress bar fed by the engine's progress notifications
fn progress_bar(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar
}

fn progress_sink(bar: &ProgressBar) -> impl ProgressSink {
    let bar = bar.clone();
    move |completed: usize, total: usize, file_name: &str| {
        bar.set_length(total as u64);
        bar.set_position(completed as u64);
        bar.set_message(file_name.to_string());
    }
}

fn run_search(
    config: Config,
    keyword: &str,
    root: &Path,
    options: PatternOptions,
    show_progress: bool,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    if keyword.trim().is_empty() {
        anyhow::bail!("Search keyword cannot be empty");
    }
    let mode = config.search.mode;
    let app = AppContext::new(config)?;
    let started = Instant::now();

    let bar = progress_bar(show_progress);
    let token = interrupt_token();
    let outcome = app.search_directory(root, keyword, options, &progress_sink(&bar), &token)?;
    bar.finish_and_clear();

    let merged = app.processor().process(&outcome.results);
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    match format {
        OutputFormat::Json => {
            let report = SearchReport::new(keyword, mode.as_str(), &outcome, &merged, elapsed_ms);
            print_json(&report, compact)?;
        }
        OutputFormat::Text => {
            let use_color = use_colors();
            print_text(keyword, &outcome, &merged, use_color);
            if let Some(notice) = interrupted_notice(&outcome) {
                eprintln!("{}", if use_color { notice.yellow().to_string() } else { notice });
            }
            if merged.is_empty() && !outcome.cancelled {
                if mode == docsearch::SearchMode::IndexedOnly && outcome.files_skipped > 0 {
                    eprintln!("{}", suggestions::empty_index_suggestion(&root.display().to_string()));
                } else {
                    eprintln!("{}", suggestions::no_results_suggestion(keyword));
                }
            }
            let summary = format!(
                "{} files searched ({} from index, {} from cache, {} failed, {} skipped) in {:.0} ms",
                outcome.files_processed,
                outcome.index_hits,
                outcome.cache_hits,
                outcome.files_failed,
                outcome.files_skipped,
                elapsed_ms
            );
            if use_color {
                eprintln!("{}", summary.dimmed());
            } else {
                eprintln!("{}", summary);
            }
        }
    }
    Ok(())
}

fn run_index(
    config: Config,
    root: &Path,
    force: bool,
    show_progress: bool,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let app = AppContext::new(config)?;
    if force {
        app.engine().clear_index().context("failed to reset the index")?;
    }

    let started = Instant::now();
    let bar = progress_bar(show_progress);
    let token = interrupt_token();
    let indexed = app.index_directory(root, &progress_sink(&bar), &token)?;
    bar.finish_and_clear();
    let stats = app.engine().index_stats()?;

    match format {
        OutputFormat::Json => print_json(
            &json!({
                "indexed": indexed,
                "cancelled": token.is_cancelled(),
                "elapsed_ms": started.elapsed().as_secs_f64() * 1000.0,
                "index": stats,
            }),
            compact,
        )?,
        OutputFormat::Text => {
            let total = stats.map(|s| s.file_count).unwrap_or(0);
            println!("Indexed {indexed} documents ({total} in index)");
            if token.is_cancelled() {
                eprintln!("Indexing interrupted; run the same command again to finish");
            }
        }
    }
    Ok(())
}

fn run_lookup(
    config: Config,
    phrase: &str,
    limit: usize,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let app = AppContext::new(config)?;
    let index = app
        .engine()
        .index()
        .context("the document index is disabled or unavailable")?;
    let hits = index.full_text_search(phrase, limit)?;

    match format {
        OutputFormat::Json => {
            let paths: Vec<String> = hits
                .iter()
                .map(|(path, _)| path.display().to_string())
                .collect();
            print_json(&json!({ "phrase": phrase, "files": paths }), compact)?;
        }
        OutputFormat::Text => {
            if hits.is_empty() {
                println!("No indexed documents contain: {phrase}");
            }
            for (path, text) in &hits {
                println!("{} ({} chars)", path.display(), text.chars().count());
            }
        }
    }
    Ok(())
}

fn run_stats(config: Config, format: OutputFormat, compact: bool) -> Result<()> {
    let app = AppContext::new(config)?;
    let index = app.engine().index_stats()?;
    let cache = app.engine().cache_stats();

    match format {
        OutputFormat::Json => print_json(&json!({ "index": index, "cache": cache }), compact)?,
        OutputFormat::Text => {
            match index {
                Some(stats) => {
                    println!("Index:");
                    println!("  documents:     {}", stats.file_count);
                    println!("  text size:     {} bytes", stats.total_content_size);
                    println!("  source size:   {} bytes", stats.total_file_size);
                    println!("  storage size:  {} bytes", stats.index_storage_size);
                }
                None => println!("Index: disabled"),
            }
            match cache {
                Some(stats) => {
                    println!("Cache:");
                    println!("  entries:       {}", stats.entries);
                    println!(
                        "  size:          {} / {} bytes ({:.1}%)",
                        stats.size_bytes, stats.capacity_bytes, stats.usage_percent
                    );
                }
                None => println!("Cache: disabled"),
            }
        }
    }
    Ok(())
}
