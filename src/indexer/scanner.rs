// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document discovery using the ignore crate (same walker as ripgrep)

use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::errors::{DocSearchError, Result};
use crate::extract::ExtractorRegistry;

/// Upper bound on files returned by one scan
pub const MAX_DISCOVERED_FILES: usize = 10_000;

/// Directory names never descended into
const SKIPPED_DIRS: &[&str] = &[".git", ".hg", ".svn", ".docsearch"];

/// Check that `dir` exists, is a directory and can be listed
pub fn validate_directory(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Err(DocSearchError::DirectoryNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(DocSearchError::NotADirectory(dir.to_path_buf()));
    }
    fs::read_dir(dir).map_err(|source| DocSearchError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Recursive scanner yielding files some registered extractor can read
pub struct FileScanner {
    root: PathBuf,
    max_files: usize,
    respect_ignore_files: bool,
}

impl FileScanner {
    /// Scan under `root`. The root is canonicalized so every listed path is
    /// absolute and identifies one file regardless of the working directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            root: root.canonicalize().unwrap_or(root),
            max_files: MAX_DISCOVERED_FILES,
            respect_ignore_files: true,
        }
    }

    pub fn with_limit(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    /// Enable or disable .gitignore / .ignore handling
    pub fn with_ignore_files(mut self, enabled: bool) -> Self {
        self.respect_ignore_files = enabled;
        self
    }

    fn make_builder(&self) -> WalkBuilder {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(false)
            .ignore(self.respect_ignore_files)
            .git_ignore(self.respect_ignore_files)
            .git_exclude(self.respect_ignore_files)
            .git_global(false)
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| !SKIPPED_DIRS.contains(&name))
                    .unwrap_or(true)
            });
        builder
    }

    /// Supported files under the root, sorted by path and capped at the limit
    pub fn list_files(&self, registry: &ExtractorRegistry) -> Vec<PathBuf> {
        let (tx, rx) = mpsc::channel();

        self.make_builder().build_parallel().run(|| {
            let tx = tx.clone();
            Box::new(move |entry| {
                match entry {
                    Ok(entry) => {
                        let is_file = entry.file_type().map(|ft| ft.is_file()).unwrap_or(false);
                        if is_file && registry.supports(entry.path()) {
                            let _ = tx.send(entry.into_path());
                        }
                    }
                    Err(err) => tracing::debug!("skipping unreadable entry: {err}"),
                }
                ignore::WalkState::Continue
            })
        });
        drop(tx);

        let mut files: Vec<PathBuf> = rx.into_iter().collect();
        files.sort();
        if files.len() > self.max_files {
            tracing::warn!(
                "{} has {} supported files, searching the first {}",
                self.root.display(),
                files.len(),
                self.max_files
            );
            files.truncate(self.max_files);
        }
        files
    }
}
