// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid search orchestrator.
//!
//! Files fresh in the document index are matched straight from stored text.
//! Everything else goes through the extractor registry (and the text cache)
//! on a bounded rayon pool, and newly extracted text is written back to the
//! index in hybrid mode. Workers report to the orchestrator thread over a
//! channel, which owns the result map and the progress counter.

use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cancel::CancellationToken;
use crate::config::{Config, SearchMode};
use crate::errors::{FileError, Result};
use crate::extract::{cached_metadata, estimate_page_count, ExtractorRegistry};
use crate::indexer::document_index::{DocumentIndex, DocumentMetadata, IndexStats, IndexUpsert};
use crate::indexer::text_cache::{CacheStats, TextCache};
use crate::progress::{ProgressCounter, ProgressSink};
use crate::query::context::{CharCursor, ContextBuilder};
use crate::query::pattern::{FuzzyPattern, PatternOptions};
use crate::query::types::{display_name, SearchOutcome, SearchResult};

/// How often the orchestrator wakes to check cancellation and task deadlines
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Where a file's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextSource {
    Index,
    Cache,
    Extracted,
}

/// Text loaded for one file, before matching
struct LoadedText {
    text: Arc<str>,
    source: TextSource,
    page_count: u64,
    metadata: DocumentMetadata,
}

/// What a worker hands back for one file
struct FileOutput {
    results: Vec<SearchResult>,
    source: TextSource,
    /// Set when the text should be written back to the index
    upsert: Option<IndexUpsert>,
}

enum WorkerMessage<T> {
    Started(usize),
    Finished(usize, std::result::Result<T, FileError>),
}

type Work<T> = Arc<dyn Fn(&Path) -> std::result::Result<T, FileError> + Send + Sync>;

/// Runs keyword searches over document files
pub struct HybridSearchEngine {
    config: Config,
    extractors: Arc<ExtractorRegistry>,
    index: Option<Arc<DocumentIndex>>,
    cache: Option<Arc<TextCache>>,
}

impl HybridSearchEngine {
    pub fn new(config: Config, extractors: Arc<ExtractorRegistry>) -> Self {
        Self {
            config,
            extractors,
            index: None,
            cache: None,
        }
    }

    pub fn with_index(mut self, index: Arc<DocumentIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_cache(mut self, cache: Arc<TextCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn extractors(&self) -> &ExtractorRegistry {
        &self.extractors
    }

    /// The document index, when one is attached and enabled
    pub fn index(&self) -> Option<&Arc<DocumentIndex>> {
        self.index.as_ref().filter(|_| self.config.index.enabled)
    }

    pub fn cache(&self) -> Option<&Arc<TextCache>> {
        self.cache.as_ref().filter(|_| self.config.cache.enabled)
    }

    /// Search `files` for `keyword`.
    ///
    /// Per-file failures are counted in the outcome and never returned as
    /// errors. A cancelled search returns the files completed before the
    /// cancellation was observed.
    pub fn search_files(
        &self,
        files: &[PathBuf],
        keyword: &str,
        options: PatternOptions,
        progress: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> Result<SearchOutcome> {
        self.config.validate()?;
        let started = Instant::now();
        let mode = self.config.search.mode;
        let mut outcome = SearchOutcome {
            files_total: files.len(),
            ..SearchOutcome::default()
        };

        let pattern = Arc::new(FuzzyPattern::build(keyword, options));
        if pattern.is_empty() {
            tracing::debug!("empty keyword, nothing to match");
            return Ok(outcome);
        }

        let (fresh, stale) = self.partition(files, mode, token);
        if mode == SearchMode::IndexedOnly {
            outcome.files_skipped = stale.len();
        }
        let to_extract = if mode == SearchMode::IndexedOnly {
            Vec::new()
        } else {
            stale
        };

        let mut counter = ProgressCounter::new(progress, fresh.len() + to_extract.len());
        let pool = self.build_pool()?;

        if !fresh.is_empty() && !token.is_cancelled() {
            let work = self.indexed_work(Arc::clone(&pattern));
            for batch in self.batches(&fresh) {
                if self.run_batch(&pool, batch, &work, token, |path, result| {
                    record(&mut outcome, &mut counter, path, result, None)
                }) {
                    break;
                }
            }
        }

        let write_back = mode == SearchMode::Hybrid && self.config.index.auto_index;
        if !to_extract.is_empty() && !token.is_cancelled() {
            let work = self.extract_work(Some(Arc::clone(&pattern)), write_back);
            for batch in self.batches(&to_extract) {
                if token.is_cancelled() {
                    break;
                }
                let mut pending = Vec::new();
                let stopped = self.run_batch(&pool, batch, &work, token, |path, result| {
                    record(&mut outcome, &mut counter, path, result, Some(&mut pending))
                });
                self.write_back(pending);
                if stopped {
                    break;
                }
            }
        }

        outcome.cancelled = token.is_cancelled();
        tracing::info!(
            keyword,
            mode = mode.as_str(),
            files = outcome.files_total,
            processed = outcome.files_processed,
            failed = outcome.files_failed,
            skipped = outcome.files_skipped,
            index_hits = outcome.index_hits,
            cache_hits = outcome.cache_hits,
            matches = outcome.total_matches(),
            cancelled = outcome.cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search finished"
        );
        Ok(outcome)
    }

    /// Extract and index every file that is not already fresh.
    /// Returns how many files were written to the index.
    pub fn index_files(
        &self,
        files: &[PathBuf],
        progress: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> Result<usize> {
        self.config.validate()?;
        let Some(index) = self.index() else {
            tracing::warn!("document index is disabled, nothing to index");
            return Ok(0);
        };

        let stale: Vec<PathBuf> = files
            .iter()
            .filter(|path| !index.is_fresh(path))
            .cloned()
            .collect();
        tracing::info!(
            total = files.len(),
            stale = stale.len(),
            "indexing documents"
        );

        let mut counter = ProgressCounter::new(progress, stale.len());
        let pool = self.build_pool()?;
        let work = self.extract_work(None, true);
        let mut indexed = 0usize;
        let mut failed = 0usize;

        for batch in self.batches(&stale) {
            if token.is_cancelled() {
                break;
            }
            let mut pending = Vec::new();
            let stopped = self.run_batch(&pool, batch, &work, token, |path, result| {
                counter.advance(&display_name(path));
                match result {
                    Ok(output) => pending.extend(output.upsert),
                    Err(err) => {
                        failed += 1;
                        tracing::warn!("failed to index {}: {err}", path.display());
                    }
                }
            });
            indexed += self.write_back(pending);
            if stopped {
                break;
            }
        }

        tracing::info!(indexed, failed, "indexing finished");
        Ok(indexed)
    }

    pub fn index_stats(&self) -> Result<Option<IndexStats>> {
        self.index().map(|index| index.stats()).transpose()
    }

    pub fn clear_index(&self) -> Result<()> {
        match self.index() {
            Some(index) => index.clear(),
            None => Ok(()),
        }
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache().map(|cache| cache.stats())
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = self.cache() {
            cache.clear();
        }
    }

    /// Split files into (fresh in index, needs extraction)
    fn partition(
        &self,
        files: &[PathBuf],
        mode: SearchMode,
        token: &CancellationToken,
    ) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let index = match (mode, self.index()) {
            (SearchMode::ExtractOnly, _) | (_, None) => return (Vec::new(), files.to_vec()),
            (_, Some(index)) => index,
        };

        let mut fresh = Vec::new();
        let mut stale = Vec::new();
        for path in files {
            if token.is_cancelled() {
                break;
            }
            if index.is_fresh(path) {
                fresh.push(path.clone());
            } else {
                stale.push(path.clone());
            }
        }
        tracing::debug!(fresh = fresh.len(), stale = stale.len(), "partitioned files");
        (fresh, stale)
    }

    fn batches<'f>(&self, files: &'f [PathBuf]) -> Vec<&'f [PathBuf]> {
        let perf = &self.config.performance;
        if files.len() >= perf.min_files_for_batching {
            files.chunks(perf.batch_size.max(1)).collect()
        } else {
            vec![files]
        }
    }

    fn build_pool(&self) -> Result<ThreadPool> {
        Ok(ThreadPoolBuilder::new()
            .num_threads(self.config.performance.max_workers)
            .thread_name(|idx| format!("docsearch-worker-{idx}"))
            .build()?)
    }

    fn indexed_work(&self, pattern: Arc<FuzzyPattern>) -> Work<FileOutput> {
        let index = self.index.clone();
        let config = self.config.clone();
        Arc::new(move |path: &Path| -> std::result::Result<FileOutput, FileError> {
            let text = index
                .as_ref()
                .and_then(|index| index.get_text(path))
                .ok_or_else(|| FileError::Extraction("indexed text disappeared".into()))?;
            Ok(FileOutput {
                results: search_text(path, &text, &pattern, &config),
                source: TextSource::Index,
                upsert: None,
            })
        })
    }

    /// Work that loads text through the cache and extractors. With a pattern
    /// the text is also searched; with `write_back` an upsert is returned.
    fn extract_work(&self, pattern: Option<Arc<FuzzyPattern>>, write_back: bool) -> Work<FileOutput> {
        let extractors = Arc::clone(&self.extractors);
        let cache = self.cache().cloned();
        let config = self.config.clone();
        Arc::new(move |path: &Path| -> std::result::Result<FileOutput, FileError> {
            let loaded = load_text(path, &extractors, cache.as_deref(), config.search.chars_per_page)?;
            if loaded.text.trim().is_empty() {
                tracing::debug!("{} has no text content", path.display());
                return Ok(FileOutput {
                    results: Vec::new(),
                    source: loaded.source,
                    upsert: None,
                });
            }
            let results = pattern
                .as_ref()
                .map(|pattern| search_text(path, &loaded.text, pattern, &config))
                .unwrap_or_default();
            let upsert = write_back.then(|| IndexUpsert {
                path: path.to_path_buf(),
                text: loaded.text.to_string(),
                page_count: loaded.page_count,
                metadata: loaded.metadata,
            });
            Ok(FileOutput {
                results,
                source: loaded.source,
                upsert,
            })
        })
    }

    fn write_back(&self, pending: Vec<IndexUpsert>) -> usize {
        if pending.is_empty() {
            return 0;
        }
        let Some(index) = self.index() else {
            return 0;
        };
        match index.upsert_batch(pending) {
            Ok(written) => written,
            Err(err) => {
                tracing::warn!("failed to write extracted text to the index: {err}");
                0
            }
        }
    }

    /// Run one batch on the pool and feed each completed file to `on_done`
    /// in completion order. Returns `true` if the search was cancelled.
    fn run_batch<T: Send + 'static>(
        &self,
        pool: &ThreadPool,
        batch: &[PathBuf],
        work: &Work<T>,
        token: &CancellationToken,
        mut on_done: impl FnMut(&Path, std::result::Result<T, FileError>),
    ) -> bool {
        let timeout = Duration::from_secs(self.config.performance.task_timeout_secs);
        let (tx, rx) = mpsc::channel::<WorkerMessage<T>>();

        for (idx, path) in batch.iter().enumerate() {
            let tx = tx.clone();
            let work = Arc::clone(work);
            let token = token.clone();
            let path = path.clone();
            pool.spawn(move || {
                if token.is_cancelled() {
                    return;
                }
                let _ = tx.send(WorkerMessage::Started(idx));
                let result = panic::catch_unwind(AssertUnwindSafe(|| work(&path)))
                    .unwrap_or_else(|payload| Err(FileError::Panicked(panic_message(payload))));
                let _ = tx.send(WorkerMessage::Finished(idx, result));
            });
        }
        drop(tx);

        let mut done = vec![false; batch.len()];
        let mut remaining = batch.len();
        let mut running: HashMap<usize, Instant> = HashMap::new();

        while remaining > 0 {
            if token.is_cancelled() {
                tracing::info!(abandoned = remaining, "search cancelled");
                return true;
            }

            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(WorkerMessage::Started(idx)) => {
                    running.insert(idx, Instant::now());
                }
                Ok(WorkerMessage::Finished(idx, result)) => {
                    running.remove(&idx);
                    if !done[idx] {
                        done[idx] = true;
                        remaining -= 1;
                        on_done(&batch[idx], result);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // Every sender is gone, so no task is left to report.
                    if token.is_cancelled() {
                        return true;
                    }
                    let lost: Vec<usize> = (0..batch.len()).filter(|idx| !done[*idx]).collect();
                    for idx in lost {
                        on_done(
                            &batch[idx],
                            Err(FileError::Extraction("worker exited without a result".into())),
                        );
                    }
                    return false;
                }
            }

            let expired: Vec<usize> = running
                .iter()
                .filter(|(_, started)| started.elapsed() >= timeout)
                .map(|(idx, _)| *idx)
                .collect();
            for idx in expired {
                running.remove(&idx);
                if !done[idx] {
                    done[idx] = true;
                    remaining -= 1;
                    tracing::error!(
                        "abandoning {} after {}s",
                        batch[idx].display(),
                        timeout.as_secs()
                    );
                    on_done(&batch[idx], Err(FileError::TimedOut(timeout.as_secs())));
                }
            }
        }
        false
    }
}

/// Fold one finished file into the outcome
fn record(
    outcome: &mut SearchOutcome,
    counter: &mut ProgressCounter<'_>,
    path: &Path,
    result: std::result::Result<FileOutput, FileError>,
    pending: Option<&mut Vec<IndexUpsert>>,
) {
    outcome.files_processed += 1;
    counter.advance(&display_name(path));
    match result {
        Ok(output) => {
            match output.source {
                TextSource::Index => outcome.index_hits += 1,
                TextSource::Cache => outcome.cache_hits += 1,
                TextSource::Extracted => {}
            }
            if let (Some(pending), Some(upsert)) = (pending, output.upsert) {
                pending.push(upsert);
            }
            if !output.results.is_empty() {
                outcome.results.insert(path.to_path_buf(), output.results);
            }
        }
        Err(err) => {
            outcome.files_failed += 1;
            tracing::warn!("skipping {}: {err}", path.display());
        }
    }
}

fn load_text(
    path: &Path,
    extractors: &ExtractorRegistry,
    cache: Option<&TextCache>,
    chars_per_page: usize,
) -> std::result::Result<LoadedText, FileError> {
    if let Some(text) = cache.and_then(|cache| cache.get(path)) {
        return Ok(LoadedText {
            page_count: estimate_page_count(&text, chars_per_page),
            text,
            source: TextSource::Cache,
            metadata: cached_metadata(),
        });
    }

    let extracted = extractors.extract(path)?;
    let text: Arc<str> = extracted.text.into();
    if let Some(cache) = cache {
        if !text.trim().is_empty() {
            cache.put(path, Arc::clone(&text));
        }
    }
    Ok(LoadedText {
        text,
        source: TextSource::Extracted,
        page_count: extracted.page_count,
        metadata: extracted.metadata,
    })
}

/// Every match of `pattern` in `text`, capped at `max_results_per_file`
pub fn search_text(
    path: &Path,
    text: &str,
    pattern: &FuzzyPattern,
    config: &Config,
) -> Vec<SearchResult> {
    let file_name = display_name(path);
    let chars_per_page = config.search.chars_per_page.max(1);
    let builder = ContextBuilder::new(
        text,
        config.context.sentences_before,
        config.context.sentences_after,
    );
    let mut cursor = CharCursor::new(text);

    pattern
        .find_spans(text)
        .take(config.search.max_results_per_file)
        .map(|(start, end)| {
            let absolute_position = cursor.advance_to(start);
            let snippet = builder.snippet(start, end);
            SearchResult {
                file_path: path.to_path_buf(),
                file_name: file_name.clone(),
                page_number: absolute_position / chars_per_page + 1,
                context: snippet.text,
                match_start: snippet.match_start,
                match_end: snippet.match_end,
                absolute_position,
                matched_text: text[start..end].to_string(),
            }
        })
        .collect()
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Extracted, Extractor};
    use crate::progress::NoProgress;
    use crate::query::merge::ResultProcessor;
    use parking_lot::Mutex;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Reads the file like the plain text extractor and counts calls
    #[derive(Default)]
    struct CountingExtractor {
        calls: AtomicUsize,
    }

    impl Extractor for CountingExtractor {
        fn name(&self) -> &str {
            "counting"
        }

        fn extract(&self, path: &Path) -> std::result::Result<Extracted, FileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = fs::read_to_string(path)?;
            Ok(Extracted::new(text, 1))
        }
    }

    struct Failing;

    impl Extractor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn extract(&self, path: &Path) -> std::result::Result<Extracted, FileError> {
            if path.to_string_lossy().contains("panic") {
                panic!("parser blew up");
            }
            Err(FileError::Extraction("corrupt document".into()))
        }
    }

    struct Slow;

    impl Extractor for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn extract(&self, _path: &Path) -> std::result::Result<Extracted, FileError> {
            std::thread::sleep(Duration::from_secs(3));
            Ok(Extracted::new("slow needle", 1))
        }
    }

    fn test_config(mode: SearchMode, workers: usize) -> Config {
        let mut config = Config::default();
        config.search.mode = mode;
        config.performance.max_workers = workers;
        config
    }

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).expect("write");
        path
    }

    fn counting_engine(
        config: Config,
        index: Option<Arc<DocumentIndex>>,
    ) -> (HybridSearchEngine, Arc<CountingExtractor>) {
        let extractor = Arc::new(CountingExtractor::default());
        let mut registry = ExtractorRegistry::new();
        registry.register(&["txt"], extractor.clone());
        let mut engine = HybridSearchEngine::new(config, Arc::new(registry));
        if let Some(index) = index {
            engine = engine.with_index(index);
        }
        (engine, extractor)
    }

    #[test]
    fn search_text_estimates_pages_in_chars() {
        let text = format!("{}needle {}Needles", "ä".repeat(2995), "b".repeat(3000));
        let mut config = Config::default();
        config.search.chars_per_page = 3000;
        let pattern = FuzzyPattern::build("needle", PatternOptions::default());
        let results = search_text(Path::new("/d/x.txt"), &text, &pattern, &config);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].absolute_position, 2995);
        assert_eq!(results[0].page_number, 1);
        assert_eq!(results[1].absolute_position, 2995 + 7 + 3000);
        assert_eq!(results[1].page_number, 3);
        assert_eq!(results[1].matched_text, "Needles");
        assert_eq!(results[1].file_name, "x.txt");
    }

    #[test]
    fn search_text_caps_results_per_file() {
        let text = "hit. ".repeat(50);
        let mut config = Config::default();
        config.search.max_results_per_file = 10;
        let pattern = FuzzyPattern::build("hit", PatternOptions::default());
        assert_eq!(search_text(Path::new("/d/x.txt"), &text, &pattern, &config).len(), 10);
    }

    #[test]
    fn low_resource_scenario_merges_per_page() {
        let docs = TempDir::new().expect("tempdir");
        let filler = "Filler text goes here. ".repeat(21);
        let a = write(
            docs.path(),
            "a.txt",
            &format!("Work on low-resource data. {filler}More low-resource results."),
        );
        let b = write(docs.path(), "b.txt", "Survey of Low Resources in practice.");
        let c = write(docs.path(), "c.txt", "Nothing relevant here.");

        let (engine, _) = counting_engine(test_config(SearchMode::ExtractOnly, 4), None);
        let outcome = engine
            .search_files(
                &[a.clone(), b.clone(), c],
                "low resource",
                PatternOptions { whole_word: false },
                &NoProgress,
                &CancellationToken::new(),
            )
            .expect("search");

        assert_eq!(outcome.files_processed, 3);
        assert_eq!(outcome.files_with_matches(), 2);

        let merged = ResultProcessor::default().process(&outcome.results);
        let a_groups = &merged[&a];
        assert_eq!(a_groups.len(), 1);
        assert_eq!(a_groups[0].match_count, 2);
        assert_eq!(a_groups[0].page_number, 1);

        let b_groups = &merged[&b];
        assert_eq!(b_groups.len(), 1);
        assert_eq!(b_groups[0].match_count, 1);
        assert_eq!(b_groups[0].matched_texts, vec!["Low Resources"]);
    }

    #[test]
    fn hybrid_indexes_then_reads_from_index() {
        let docs = TempDir::new().expect("tempdir");
        let store = TempDir::new().expect("tempdir");
        let files = vec![
            write(docs.path(), "a.txt", "the needle is here"),
            write(docs.path(), "b.txt", "no match"),
        ];
        let index = Arc::new(DocumentIndex::open(store.path()).expect("index"));
        let (engine, extractor) =
            counting_engine(test_config(SearchMode::Hybrid, 2), Some(index.clone()));
        let token = CancellationToken::new();

        let first = engine
            .search_files(&files, "needle", PatternOptions::default(), &NoProgress, &token)
            .expect("first search");
        assert_eq!(first.index_hits, 0);
        assert_eq!(first.total_matches(), 1);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
        assert!(files.iter().all(|f| index.is_fresh(f)));

        let second = engine
            .search_files(&files, "needle", PatternOptions::default(), &NoProgress, &token)
            .expect("second search");
        assert_eq!(second.index_hits, 2);
        assert_eq!(second.total_matches(), 1);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);

        fs::write(&files[1], "now there is a needle too, and it is longer").expect("modify");
        let third = engine
            .search_files(&files, "needle", PatternOptions::default(), &NoProgress, &token)
            .expect("third search");
        assert_eq!(third.index_hits, 1);
        assert_eq!(third.total_matches(), 2);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn indexed_only_never_extracts() {
        let docs = TempDir::new().expect("tempdir");
        let store = TempDir::new().expect("tempdir");
        let indexed = write(docs.path(), "indexed.txt", "an indexed needle");
        let unindexed = write(docs.path(), "new.txt", "an unindexed needle");

        let index = Arc::new(DocumentIndex::open(store.path()).expect("index"));
        index
            .upsert(&indexed, "an indexed needle", 1, &DocumentMetadata::new())
            .expect("upsert");

        let (engine, extractor) =
            counting_engine(test_config(SearchMode::IndexedOnly, 2), Some(index));
        let outcome = engine
            .search_files(
                &[indexed.clone(), unindexed],
                "needle",
                PatternOptions::default(),
                &NoProgress,
                &CancellationToken::new(),
            )
            .expect("search");

        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.files_skipped, 1);
        assert_eq!(outcome.files_failed, 0);
        assert_eq!(outcome.results.keys().collect::<Vec<_>>(), vec![&indexed]);
    }

    #[test]
    fn extract_only_bypasses_index() {
        let docs = TempDir::new().expect("tempdir");
        let store = TempDir::new().expect("tempdir");
        let path = write(docs.path(), "a.txt", "needle");
        let index = Arc::new(DocumentIndex::open(store.path()).expect("index"));
        index
            .upsert(&path, "stale indexed text", 1, &DocumentMetadata::new())
            .expect("upsert");

        let (engine, extractor) =
            counting_engine(test_config(SearchMode::ExtractOnly, 1), Some(index.clone()));
        let outcome = engine
            .search_files(
                std::slice::from_ref(&path),
                "needle",
                PatternOptions::default(),
                &NoProgress,
                &CancellationToken::new(),
            )
            .expect("search");
        assert_eq!(outcome.total_matches(), 1);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(index.get_text(&path).as_deref(), Some("stale indexed text"));
    }

    #[test]
    fn cache_serves_repeat_extract_only_searches() {
        let docs = TempDir::new().expect("tempdir");
        let path = write(docs.path(), "a.txt", "cached needle");
        let (engine, extractor) = counting_engine(test_config(SearchMode::ExtractOnly, 1), None);
        let engine = engine.with_cache(Arc::new(TextCache::new(1024 * 1024)));

        for _ in 0..2 {
            engine
                .search_files(
                    std::slice::from_ref(&path),
                    "needle",
                    PatternOptions::default(),
                    &NoProgress,
                    &CancellationToken::new(),
                )
                .expect("search");
        }
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.cache_stats().map(|s| s.entries), Some(1));
    }

    #[test]
    fn failing_and_panicking_files_still_count() {
        let docs = TempDir::new().expect("tempdir");
        let mut registry = ExtractorRegistry::with_defaults(3000);
        registry.register(&["pdf"], Arc::new(Failing));
        let engine = HybridSearchEngine::new(
            test_config(SearchMode::ExtractOnly, 2),
            Arc::new(registry),
        );
        let files = vec![
            write(docs.path(), "good.txt", "a needle"),
            write(docs.path(), "bad.pdf", "%PDF"),
            write(docs.path(), "panic.pdf", "%PDF"),
            write(docs.path(), "empty.txt", "   "),
        ];

        let seen = Mutex::new(Vec::new());
        let sink = |done: usize, total: usize, _name: &str| seen.lock().push((done, total));
        let outcome = engine
            .search_files(
                &files,
                "needle",
                PatternOptions::default(),
                &sink,
                &CancellationToken::new(),
            )
            .expect("search");

        assert_eq!(outcome.files_processed, 4);
        assert_eq!(outcome.files_failed, 2);
        assert_eq!(outcome.total_matches(), 1);
        let seen = seen.into_inner();
        assert_eq!(seen.len(), 4);
        assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(seen.last(), Some(&(4, 4)));
    }

    #[test]
    fn stuck_file_is_abandoned_after_timeout() {
        let docs = TempDir::new().expect("tempdir");
        let mut registry = ExtractorRegistry::with_defaults(3000);
        registry.register(&["pdf"], Arc::new(Slow));
        let mut config = test_config(SearchMode::ExtractOnly, 2);
        config.performance.task_timeout_secs = 1;
        let engine = HybridSearchEngine::new(config, Arc::new(registry));
        let files = vec![
            write(docs.path(), "slow.pdf", "%PDF"),
            write(docs.path(), "fast.txt", "fast needle"),
        ];

        let started = Instant::now();
        let outcome = engine
            .search_files(
                &files,
                "needle",
                PatternOptions::default(),
                &NoProgress,
                &CancellationToken::new(),
            )
            .expect("search");
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(outcome.files_processed, 2);
        assert_eq!(outcome.files_failed, 1);
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results.contains_key(&files[1]));
    }

    #[test]
    fn cancellation_keeps_exactly_the_completed_files() {
        let docs = TempDir::new().expect("tempdir");
        let files: Vec<PathBuf> = (0..6)
            .map(|idx| write(docs.path(), &format!("f{idx}.txt"), "needle"))
            .collect();
        let (engine, _) = counting_engine(test_config(SearchMode::ExtractOnly, 1), None);

        let token = CancellationToken::new();
        let stop_after = 2;
        let sink = {
            let token = token.clone();
            move |done: usize, _total: usize, _name: &str| {
                if done == stop_after {
                    token.cancel();
                }
            }
        };

        let started = Instant::now();
        let outcome = engine
            .search_files(&files, "needle", PatternOptions::default(), &sink, &token)
            .expect("search");

        assert!(outcome.cancelled);
        assert_eq!(outcome.files_processed, stop_after);
        assert_eq!(outcome.results.len(), stop_after);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn batched_extraction_covers_every_file() {
        let docs = TempDir::new().expect("tempdir");
        let files: Vec<PathBuf> = (0..25)
            .map(|idx| write(docs.path(), &format!("f{idx:02}.txt"), "one needle here"))
            .collect();
        let mut config = test_config(SearchMode::ExtractOnly, 3);
        config.performance.min_files_for_batching = 10;
        config.performance.batch_size = 4;
        let (engine, extractor) = counting_engine(config, None);

        let outcome = engine
            .search_files(
                &files,
                "needle",
                PatternOptions::default(),
                &NoProgress,
                &CancellationToken::new(),
            )
            .expect("search");
        assert_eq!(outcome.files_processed, 25);
        assert_eq!(outcome.total_matches(), 25);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 25);
    }

    #[test]
    fn index_files_only_touches_stale_files() {
        let docs = TempDir::new().expect("tempdir");
        let store = TempDir::new().expect("tempdir");
        let files = vec![
            write(docs.path(), "a.txt", "alpha"),
            write(docs.path(), "b.txt", "bravo"),
        ];
        let index = Arc::new(DocumentIndex::open(store.path()).expect("index"));
        let (engine, extractor) =
            counting_engine(test_config(SearchMode::Hybrid, 2), Some(index.clone()));
        let token = CancellationToken::new();

        assert_eq!(engine.index_files(&files, &NoProgress, &token).expect("index"), 2);
        assert_eq!(engine.index_files(&files, &NoProgress, &token).expect("index"), 0);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.index_stats().expect("stats").map(|s| s.file_count), Some(2));

        engine.clear_index().expect("clear");
        assert_eq!(engine.index_stats().expect("stats").map(|s| s.file_count), Some(0));
    }

    #[test]
    fn empty_keyword_matches_nothing() {
        let docs = TempDir::new().expect("tempdir");
        let path = write(docs.path(), "a.txt", "anything at all");
        let (engine, extractor) = counting_engine(test_config(SearchMode::ExtractOnly, 1), None);
        let outcome = engine
            .search_files(&[path], "  - ", PatternOptions::default(), &NoProgress, &CancellationToken::new())
            .expect("search");
        assert_eq!(outcome.total_matches(), 0);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (engine, _) = counting_engine(test_config(SearchMode::Hybrid, 0), None);
        let err = engine
            .search_files(&[], "x", PatternOptions::default(), &NoProgress, &CancellationToken::new())
            .expect_err("zero workers");
        assert!(matches!(err, crate::errors::DocSearchError::InvalidConfig(_)));
    }
}
