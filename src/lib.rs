// SPDX-License-Identifier: MIT OR Apache-2.0

//! docsearch - Concurrent keyword search over document folders
//!
//! Shared modules for the docsearch CLI tool.

pub mod app;
pub mod cancel;
pub mod config;
pub mod errors;
pub mod extract;
pub mod indexer;
pub mod output;
pub mod progress;
pub mod query;

pub use app::AppContext;
pub use cancel::CancellationToken;
pub use config::{Config, SearchMode};
pub use errors::{DocSearchError, Result};
