// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application context: the long-lived index, cache and extractors, built
//! once from a [`Config`] and passed to every search.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::errors::Result;
use crate::extract::ExtractorRegistry;
use crate::indexer::document_index::DocumentIndex;
use crate::indexer::scanner::{validate_directory, FileScanner};
use crate::indexer::text_cache::TextCache;
use crate::progress::ProgressSink;
use crate::query::engine::HybridSearchEngine;
use crate::query::merge::ResultProcessor;
use crate::query::pattern::PatternOptions;
use crate::query::types::SearchOutcome;

/// Everything a search needs, constructed explicitly
pub struct AppContext {
    engine: HybridSearchEngine,
    processor: ResultProcessor,
}

impl AppContext {
    /// Build from configuration with the built-in extractors. An index that
    /// cannot be opened is logged and searches run without it.
    pub fn new(config: Config) -> Result<Self> {
        let extractors = ExtractorRegistry::with_defaults(config.search.chars_per_page);
        Self::with_extractors(config, extractors)
    }

    /// Build with a caller-supplied extractor registry
    pub fn with_extractors(config: Config, extractors: ExtractorRegistry) -> Result<Self> {
        config.validate()?;

        let index = if config.index.enabled {
            let dir = config.index_dir();
            match DocumentIndex::open(&dir) {
                Ok(index) => Some(Arc::new(index)),
                Err(err) => {
                    tracing::warn!(
                        "document index at {} unavailable, continuing without it: {err}",
                        dir.display()
                    );
                    None
                }
            }
        } else {
            None
        };

        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(TextCache::from_config(&config.cache, config.cache_dir())));

        Ok(Self::from_parts(config, extractors, index, cache))
    }

    /// Assemble from already constructed parts
    pub fn from_parts(
        config: Config,
        extractors: ExtractorRegistry,
        index: Option<Arc<DocumentIndex>>,
        cache: Option<Arc<TextCache>>,
    ) -> Self {
        let processor = ResultProcessor::from_config(&config.context);
        let mut engine = HybridSearchEngine::new(config, Arc::new(extractors));
        if let Some(index) = index {
            engine = engine.with_index(index);
        }
        if let Some(cache) = cache {
            engine = engine.with_cache(cache);
        }
        Self { engine, processor }
    }

    pub fn config(&self) -> &Config {
        self.engine.config()
    }

    pub fn engine(&self) -> &HybridSearchEngine {
        &self.engine
    }

    pub fn processor(&self) -> &ResultProcessor {
        &self.processor
    }

    /// Validate `dir` and list the supported files under it
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        validate_directory(dir)?;
        Ok(FileScanner::new(dir).list_files(self.engine.extractors()))
    }

    /// Search every supported file under `dir`. Directory problems are the
    /// only errors; everything per-file is reported in the outcome.
    pub fn search_directory(
        &self,
        dir: &Path,
        keyword: &str,
        options: PatternOptions,
        progress: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> Result<SearchOutcome> {
        let files = self.discover(dir)?;
        tracing::info!(dir = %dir.display(), files = files.len(), "discovered documents");
        self.engine
            .search_files(&files, keyword, options, progress, token)
    }

    /// Bring the index up to date for every supported file under `dir`
    pub fn index_directory(
        &self,
        dir: &Path,
        progress: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> Result<usize> {
        let files = self.discover(dir)?;
        self.engine.index_files(&files, progress, token)
    }
}
