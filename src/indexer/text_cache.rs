// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded LRU cache of extracted document text.
//!
//! Entries are keyed by file fingerprint, so a modified file misses even while
//! the entry for its previous version is still resident. With persistence on,
//! every entry also lives as one blob file that is deleted when the entry is
//! evicted and reloaded (up to capacity) on startup.

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::CacheConfig;
use crate::indexer::fingerprint::{atomic_write_bytes, current_fingerprint};

const BLOB_MAGIC: &[u8; 4] = b"DSTC";
const BLOB_VERSION: u32 = 1;
const BLOB_EXTENSION: &str = "blob";
const BLOB_HEADER_LEN: usize = 4 + 4 + 8 + 32;

/// One cached document text
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub text: Arc<str>,
    pub size_bytes: u64,
    pub last_access: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub size_bytes: u64,
    pub capacity_bytes: u64,
    pub usage_percent: f64,
}

struct CacheState {
    entries: LruCache<String, CacheEntry>,
    current_size: u64,
}

/// Size-bounded LRU text cache, optionally persisted to disk
pub struct TextCache {
    state: Mutex<CacheState>,
    capacity: u64,
    persist_dir: Option<PathBuf>,
}

impl TextCache {
    /// Memory-only cache
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                current_size: 0,
            }),
            capacity: capacity_bytes,
            persist_dir: None,
        }
    }

    /// Cache backed by blob files in `dir`, preloaded up to capacity.
    /// Falls back to memory-only if the directory cannot be created.
    pub fn persistent(capacity_bytes: u64, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let mut cache = Self::new(capacity_bytes);
        if let Err(err) = fs::create_dir_all(&dir) {
            tracing::warn!(
                "cache directory {} unavailable, caching in memory only: {err}",
                dir.display()
            );
            return cache;
        }
        cache.persist_dir = Some(dir);
        cache.load_persisted();
        cache
    }

    pub fn from_config(config: &CacheConfig, dir: impl AsRef<Path>) -> Self {
        if config.persistent {
            Self::persistent(config.capacity_bytes(), dir)
        } else {
            Self::new(config.capacity_bytes())
        }
    }

    /// Cached text for the file as it is now. Marks the entry most recently used.
    pub fn get(&self, path: &Path) -> Option<Arc<str>> {
        let fingerprint = current_fingerprint(path)?;
        let mut state = self.state.lock();

        if let Some(entry) = state.entries.get_mut(&fingerprint) {
            entry.last_access = SystemTime::now();
            return Some(Arc::clone(&entry.text));
        }

        let dir = self.persist_dir.as_ref()?;
        let blob_path = blob_path(dir, &fingerprint);
        if !blob_path.is_file() {
            return None;
        }
        let text: Arc<str> = read_blob(&blob_path)?.into();
        self.insert_locked(&mut state, fingerprint, Arc::clone(&text), false);
        Some(text)
    }

    /// Store text for the file as it is now, evicting LRU entries to fit
    pub fn put(&self, path: &Path, text: impl Into<Arc<str>>) {
        let Some(fingerprint) = current_fingerprint(path) else {
            tracing::debug!("not caching {}: file metadata unavailable", path.display());
            return;
        };
        let text = text.into();
        let mut state = self.state.lock();
        self.insert_locked(&mut state, fingerprint, text, true);
    }

    fn insert_locked(
        &self,
        state: &mut CacheState,
        fingerprint: String,
        text: Arc<str>,
        write_blob: bool,
    ) {
        let size = text.len() as u64;
        if size > self.capacity {
            tracing::debug!(size, capacity = self.capacity, "text larger than cache, not cached");
            return;
        }

        if let Some(previous) = state.entries.pop(&fingerprint) {
            state.current_size -= previous.size_bytes;
        }

        while state.current_size + size > self.capacity {
            let Some((evicted_key, evicted)) = state.entries.pop_lru() else {
                break;
            };
            state.current_size -= evicted.size_bytes;
            tracing::debug!(fingerprint = %evicted_key, size = evicted.size_bytes, "evicted cache entry");
            if let Some(dir) = &self.persist_dir {
                let _ = fs::remove_file(blob_path(dir, &evicted_key));
            }
        }

        if write_blob {
            if let Some(dir) = &self.persist_dir {
                if let Err(err) = atomic_write_bytes(&blob_path(dir, &fingerprint), &encode_blob(&text)) {
                    tracing::warn!("failed to persist cache entry {fingerprint}: {err}");
                }
            }
        }

        state.current_size += size;
        state.entries.put(
            fingerprint.clone(),
            CacheEntry {
                fingerprint,
                text,
                size_bytes: size,
                last_access: SystemTime::now(),
            },
        );
    }

    fn load_persisted(&mut self) {
        let Some(dir) = self.persist_dir.clone() else {
            return;
        };
        let read_dir = match fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(err) => {
                tracing::warn!("cannot read cache directory {}: {err}", dir.display());
                return;
            }
        };

        let mut blobs: Vec<(PathBuf, SystemTime)> = read_dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(BLOB_EXTENSION))
            .map(|path| {
                let modified = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (path, modified)
            })
            .collect();
        // Newest first so the most recently written blobs win the budget.
        blobs.sort_by(|a, b| b.1.cmp(&a.1));

        let mut selected: Vec<(String, Arc<str>)> = Vec::new();
        let mut budget_used = 0u64;
        for (path, _) in blobs {
            let Some(fingerprint) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };
            let Some(text) = read_blob(&path) else {
                continue;
            };
            let size = text.len() as u64;
            if budget_used + size > self.capacity {
                break;
            }
            budget_used += size;
            selected.push((fingerprint, text.into()));
        }

        let state = self.state.get_mut();
        for (fingerprint, text) in selected.into_iter().rev() {
            let size = text.len() as u64;
            state.current_size += size;
            state.entries.put(
                fingerprint.clone(),
                CacheEntry {
                    fingerprint,
                    text,
                    size_bytes: size,
                    last_access: SystemTime::now(),
                },
            );
        }
        tracing::debug!(
            entries = state.entries.len(),
            bytes = state.current_size,
            "loaded persisted cache"
        );
    }

    /// Drop every entry, including persisted blobs
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.current_size = 0;

        if let Some(dir) = &self.persist_dir {
            if let Ok(read_dir) = fs::read_dir(dir) {
                for entry in read_dir.filter_map(|entry| entry.ok()) {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) == Some(BLOB_EXTENSION) {
                        let _ = fs::remove_file(path);
                    }
                }
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let usage_percent = if self.capacity > 0 {
            state.current_size as f64 / self.capacity as f64 * 100.0
        } else {
            0.0
        };
        CacheStats {
            entries: state.entries.len(),
            size_bytes: state.current_size,
            capacity_bytes: self.capacity,
            usage_percent,
        }
    }

    /// Resident fingerprints, most recently used first
    pub fn fingerprints(&self) -> Vec<String> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn is_persistent(&self) -> bool {
        self.persist_dir.is_some()
    }
}

fn blob_path(dir: &Path, fingerprint: &str) -> PathBuf {
    dir.join(format!("{fingerprint}.{BLOB_EXTENSION}"))
}

fn encode_blob(text: &str) -> Vec<u8> {
    let payload = text.as_bytes();
    let mut bytes = Vec::with_capacity(BLOB_HEADER_LEN + payload.len());
    bytes.extend_from_slice(BLOB_MAGIC);
    bytes.extend_from_slice(&BLOB_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(blake3::hash(payload).as_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// `None` for any blob that is not exactly what `encode_blob` wrote
fn decode_blob(bytes: &[u8]) -> Option<String> {
    if bytes.len() < BLOB_HEADER_LEN || &bytes[..4] != BLOB_MAGIC {
        return None;
    }
    let version = u32::from_le_bytes(bytes[4..8].try_into().ok()?);
    if version != BLOB_VERSION {
        return None;
    }
    let length = u64::from_le_bytes(bytes[8..16].try_into().ok()?);
    let checksum: [u8; 32] = bytes[16..48].try_into().ok()?;
    let payload = &bytes[BLOB_HEADER_LEN..];
    if payload.len() as u64 != length || blake3::hash(payload) != blake3::Hash::from(checksum) {
        return None;
    }
    String::from_utf8(payload.to_vec()).ok()
}

/// Read a blob, deleting it if it does not decode
fn read_blob(path: &Path) -> Option<String> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!("cannot read cache blob {}: {err}", path.display());
            return None;
        }
    };
    let text = decode_blob(&bytes);
    if text.is_none() {
        tracing::warn!("discarding unreadable cache blob {}", path.display());
        let _ = fs::remove_file(path);
    }
    text
}
