// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text extraction capability and the per-extension registry.
//!
//! The search core only ever sees `(text, page_count)`. Format parsers plug in
//! through [`Extractor`] and are selected by file extension.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::DEFAULT_CHARS_PER_PAGE;
use crate::errors::FileError;
use crate::indexer::document_index::DocumentMetadata;

/// Output of one extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub page_count: u64,
    /// Stored alongside the text when the file is indexed
    pub metadata: DocumentMetadata,
}

impl Extracted {
    pub fn new(text: impl Into<String>, page_count: u64) -> Self {
        Self {
            text: text.into(),
            page_count,
            metadata: DocumentMetadata::new(),
        }
    }
}

/// Produces plain text for one document format
pub trait Extractor: Send + Sync {
    /// Short format name recorded in index metadata
    fn name(&self) -> &str;

    fn extract(&self, path: &Path) -> Result<Extracted, FileError>;
}

/// Page estimate used by formats without real pagination
pub fn estimate_page_count(text: &str, chars_per_page: usize) -> u64 {
    let chars = text.chars().count();
    (chars / chars_per_page.max(1)).max(1) as u64
}

/// Reads UTF-8 (lossily) text and markdown files
#[derive(Debug, Clone, Copy)]
pub struct PlainTextExtractor {
    chars_per_page: usize,
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_PAGE)
    }
}

impl PlainTextExtractor {
    pub fn new(chars_per_page: usize) -> Self {
        Self { chars_per_page }
    }
}

impl Extractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "plain_text"
    }

    fn extract(&self, path: &Path) -> Result<Extracted, FileError> {
        let bytes = fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let page_count = estimate_page_count(&text, self.chars_per_page);
        Ok(Extracted::new(text, page_count))
    }
}

/// Maps lowercase file extensions to extractors
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn Extractor>>,
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

impl ExtractorRegistry {
    /// Registry with no formats
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in plain text extractor for `txt` and `md`
    pub fn with_defaults(chars_per_page: usize) -> Self {
        let mut registry = Self::new();
        registry.register(&["txt", "md"], Arc::new(PlainTextExtractor::new(chars_per_page)));
        registry
    }

    /// Route `extensions` (case-insensitive, no leading dot) to `extractor`,
    /// replacing any previous registration
    pub fn register(&mut self, extensions: &[&str], extractor: Arc<dyn Extractor>) {
        for ext in extensions {
            let key = ext.trim_start_matches('.').to_ascii_lowercase();
            self.by_extension.insert(key, Arc::clone(&extractor));
        }
    }

    pub fn for_path(&self, path: &Path) -> Option<&Arc<dyn Extractor>> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.by_extension.get(&ext)
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.for_path(path).is_some()
    }

    /// Registered extensions, sorted
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.by_extension.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }

    /// Extract with the extractor registered for the path's extension.
    /// The extractor name is added to the metadata as `extractor`.
    pub fn extract(&self, path: &Path) -> Result<Extracted, FileError> {
        let extractor = self.for_path(path).ok_or_else(|| {
            FileError::Unsupported(
                path.extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )
        })?;
        let mut extracted = extractor.extract(path)?;
        extracted
            .metadata
            .entry("extractor".to_string())
            .or_insert_with(|| extractor.name().to_string());
        Ok(extracted)
    }
}

/// Metadata recorded for text that came out of the cache
pub(crate) fn cached_metadata() -> DocumentMetadata {
    BTreeMap::from([("extractor".to_string(), "text_cache".to_string())])
}
