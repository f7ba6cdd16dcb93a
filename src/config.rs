// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for docsearch
//!
//! Loads configuration from .docsearch.toml in current directory or
//! ~/.config/docsearch/config.toml. The core reads it and never writes it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{DocSearchError, Result};

/// Average number of characters on a printed page, used for page estimates
pub const DEFAULT_CHARS_PER_PAGE: usize = 3000;
/// Matches kept per file before the rest are dropped
pub const DEFAULT_MAX_RESULTS_PER_FILE: usize = 1000;
/// Character gap below which two matches on the same page are merged
pub const DEFAULT_MAX_MERGE_DISTANCE: usize = 500;

/// Per-file search strategy
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Read fresh files from the index, extract the rest
    #[default]
    Hybrid,
    /// Always extract, never touch the index
    #[serde(alias = "fast_extract")]
    #[value(alias = "fast-extract")]
    ExtractOnly,
    /// Only search files already fresh in the index
    IndexedOnly,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Hybrid => "hybrid",
            SearchMode::ExtractOnly => "extract_only",
            SearchMode::IndexedOnly => "indexed_only",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub max_workers: usize,
    pub batch_size: usize,
    pub min_files_for_batching: usize,
    /// Seconds a single file may spend in a worker before it is abandoned
    pub task_timeout_secs: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            max_workers: (cpus * 4).min(32),
            batch_size: 100,
            min_files_for_batching: 50,
            task_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub mode: SearchMode,
    pub chars_per_page: usize,
    pub max_results_per_file: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::Hybrid,
            chars_per_page: DEFAULT_CHARS_PER_PAGE,
            max_results_per_file: DEFAULT_MAX_RESULTS_PER_FILE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub sentences_before: usize,
    pub sentences_after: usize,
    /// Characters between two matches below which they share one display unit
    pub max_merge_distance: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            sentences_before: 2,
            sentences_after: 2,
            max_merge_distance: DEFAULT_MAX_MERGE_DISTANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_size_mb: u64,
    pub persistent: bool,
    /// Directory for persisted cache blobs (defaults under the state dir)
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size_mb: 500,
            persistent: false,
            dir: None,
        }
    }
}

impl CacheConfig {
    pub fn capacity_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub enabled: bool,
    /// Write freshly extracted text back into the index during hybrid searches
    pub auto_index: bool,
    /// Index directory (defaults under the state dir)
    pub dir: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_index: true,
            dir: None,
        }
    }
}

/// Configuration loaded from .docsearch.toml or ~/.config/docsearch/config.toml
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the preset this configuration started from
    pub profile: Option<String>,
    pub performance: PerformanceConfig,
    pub search: SearchConfig,
    pub context: ContextConfig,
    pub cache: CacheConfig,
    pub index: IndexConfig,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .docsearch.toml in current directory
    /// 2. ~/.config/docsearch/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_from_path(Path::new(".docsearch.toml")) {
            return config;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("docsearch").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    pub fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str::<Config>(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded configuration");
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Named preset. Unknown names fall back to `balanced`.
    pub fn preset(name: &str) -> Self {
        let mut config = Self::default();
        match name {
            "low_resource" => {
                config.performance.max_workers = 2;
                config.performance.batch_size = 50;
                config.cache.enabled = false;
                config.cache.max_size_mb = 100;
            }
            "high_performance" => {
                config.performance.max_workers = 32;
                config.performance.batch_size = 200;
            }
            "maximum" => {
                config.performance.max_workers = 64;
                config.performance.batch_size = 500;
                config.performance.min_files_for_batching = 30;
                config.context.sentences_before = 3;
                config.context.sentences_after = 3;
                config.cache.max_size_mb = 1000;
                config.cache.persistent = true;
            }
            _ => {
                config.performance.max_workers = 16;
                config.profile = Some("balanced".to_string());
                return config;
            }
        }
        config.profile = Some(name.to_string());
        config
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.performance.max_workers == 0 {
            return Err(DocSearchError::InvalidConfig(
                "performance.max_workers must be at least 1".into(),
            ));
        }
        if self.performance.batch_size == 0 {
            return Err(DocSearchError::InvalidConfig(
                "performance.batch_size must be at least 1".into(),
            ));
        }
        if self.performance.task_timeout_secs == 0 {
            return Err(DocSearchError::InvalidConfig(
                "performance.task_timeout_secs must be at least 1".into(),
            ));
        }
        if self.search.chars_per_page == 0 {
            return Err(DocSearchError::InvalidConfig(
                "search.chars_per_page must be at least 1".into(),
            ));
        }
        if self.context.max_merge_distance == 0 {
            return Err(DocSearchError::InvalidConfig(
                "context.max_merge_distance must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Root for the index and cache when no explicit directories are set
    pub fn state_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|dir| dir.join("docsearch"))
            .unwrap_or_else(|| PathBuf::from(".docsearch"))
    }

    pub fn index_dir(&self) -> PathBuf {
        self.index
            .dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("index"))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("cache"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_toml_keeps_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[search]\nmode = \"indexed_only\"\n\n[context]\nsentences_before = 4\n",
        )
        .expect("write");

        let config = Config::load_from_path(&path).expect("config");
        assert_eq!(config.search.mode, SearchMode::IndexedOnly);
        assert_eq!(config.search.chars_per_page, DEFAULT_CHARS_PER_PAGE);
        assert_eq!(config.context.sentences_before, 4);
        assert_eq!(config.context.sentences_after, 2);
        assert!(config.index.enabled);
    }

    #[test]
    fn legacy_fast_extract_mode_name_is_accepted() {
        let config: Config = toml::from_str("[search]\nmode = \"fast_extract\"\n").expect("toml");
        assert_eq!(config.search.mode, SearchMode::ExtractOnly);
    }

    #[test]
    fn malformed_toml_is_ignored() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[search\nmode = ").expect("write");
        assert!(Config::load_from_path(&path).is_none());
    }

    #[test]
    fn presets_match_profiles() {
        let low = Config::preset("low_resource");
        assert_eq!(low.performance.max_workers, 2);
        assert!(!low.cache.enabled);

        let max = Config::preset("maximum");
        assert!(max.cache.persistent);
        assert_eq!(max.context.sentences_before, 3);

        let fallback = Config::preset("nonsense");
        assert_eq!(fallback.profile.as_deref(), Some("balanced"));
        assert_eq!(fallback.performance.max_workers, 16);
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.performance.max_workers = 0;
        assert!(matches!(
            config.validate(),
            Err(DocSearchError::InvalidConfig(_))
        ));
        assert!(Config::default().validate().is_ok());
    }
}
