// SPDX-License-Identifier: MIT OR Apache-2.0

//! Indexer module - document discovery, the persistent index and the text cache

pub mod document_index;
pub mod fingerprint;
pub mod scanner;
pub mod text_cache;

pub use document_index::{DocumentIndex, IndexRecord, IndexStats};
pub use scanner::{validate_directory, FileScanner};
pub use text_cache::{CacheStats, TextCache};
