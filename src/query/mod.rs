// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query module - matching, context snippets, the search engine and merging

pub mod context;
pub mod engine;
pub mod merge;
pub mod pattern;
pub mod types;

pub use engine::HybridSearchEngine;
pub use merge::ResultProcessor;
pub use pattern::{FuzzyPattern, PatternOptions};
pub use types::{FileResults, MergedMatch, SearchOutcome, SearchResult};
