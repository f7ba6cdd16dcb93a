// SPDX-License-Identifier: MIT OR Apache-2.0

//! File identity fingerprints for change detection.
//!
//! A fingerprint covers path, size and modification time only, never file
//! content, so checking freshness costs one `stat` call.

use std::fs::{File, Metadata};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Metadata snapshot a fingerprint is computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub size: u64,
    pub mtime: u64,
}

impl FileStamp {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            size: metadata.len(),
            mtime: file_mtime_nanos(metadata),
        }
    }

    /// Stat `path`. Returns `None` for missing paths and non-files.
    pub fn read(path: &Path) -> Option<Self> {
        match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => Some(Self::from_metadata(&metadata)),
            _ => None,
        }
    }
}

/// Absolute, symlink-free form of `path`, used wherever a path identifies a
/// document. A missing file resolves through its parent directory.
pub fn canonical_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map(|parent| parent.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

/// Stable hash of (canonical path, size, mtime) as lowercase hex
pub fn fingerprint(path: &Path, stamp: FileStamp) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(canonical_path(path).to_string_lossy().as_bytes());
    hasher.update(&[0]);
    hasher.update(stamp.size.to_string().as_bytes());
    hasher.update(&[0]);
    hasher.update(stamp.mtime.to_string().as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Fingerprint of the file as it is on disk right now
pub fn current_fingerprint(path: &Path) -> Option<String> {
    FileStamp::read(path).map(|stamp| fingerprint(path, stamp))
}

pub(crate) fn file_mtime_nanos(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_nanos().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}

pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Write through a temp file and rename so readers never see a torn file
pub(crate) fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let Some(parent) = path.parent() else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("cannot atomically write {} without parent", path.display()),
        ));
    };
    std::fs::create_dir_all(parent)?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or(0);
    let tmp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("docsearch"),
        std::process::id(),
        nonce
    );
    let tmp_path = parent.join(tmp_name);

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    if let Err(err) = std::fs::rename(&tmp_path, path) {
        if path.exists() {
            let _ = std::fs::remove_file(path);
            std::fs::rename(&tmp_path, path)?;
        } else {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(err);
        }
    }

    Ok(())
}
