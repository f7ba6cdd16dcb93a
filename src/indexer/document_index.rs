// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent document index backed by tantivy.
//!
//! Each indexed file is one tantivy document. The stored fields form the
//! record (hash, text, metadata, timestamps) and the `text` field is also
//! tokenized with positions for phrase queries. Because record and full-text
//! entry are the same document, an upsert is one delete + add + commit and a
//! crash can never leave the two disagreeing.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tantivy::{
    collector::{DocSetCollector, TopDocs},
    directory::MmapDirectory,
    doc,
    query::{AllQuery, QueryParser, TermQuery},
    schema::{
        Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED, STRING,
    },
    Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term,
};

use crate::errors::{DocSearchError, Result};
use crate::indexer::fingerprint::{canonical_path, fingerprint, unix_now_secs, FileStamp};

/// Memory budget for the single index writer thread
pub const DEFAULT_WRITER_BUDGET_BYTES: usize = 50_000_000;
const TEXT_TOKENIZER: &str = "en_stem";

/// Free-form key/value metadata stored with a record
pub type DocumentMetadata = BTreeMap<String, String>;

/// Stored state for one indexed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexRecord {
    pub file_path: PathBuf,
    pub content_hash: String,
    pub text: String,
    pub mtime: u64,
    pub size: u64,
    pub page_count: u64,
    /// Unix seconds
    pub indexed_at: u64,
    pub metadata: DocumentMetadata,
}

/// Input for [`DocumentIndex::upsert_batch`]
#[derive(Debug, Clone)]
pub struct IndexUpsert {
    pub path: PathBuf,
    pub text: String,
    pub page_count: u64,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IndexStats {
    pub file_count: u64,
    /// Bytes of stored extracted text
    pub total_content_size: u64,
    /// Bytes of the source files at index time
    pub total_file_size: u64,
    /// Bytes used by the index directory
    pub index_storage_size: u64,
}

#[derive(Clone, Copy)]
struct IndexFields {
    path: Field,
    content_hash: Field,
    text: Field,
    text_bytes: Field,
    mtime: Field,
    size: Field,
    page_count: Field,
    indexed_at: Field,
    metadata: Field,
}

fn build_schema() -> (Schema, IndexFields) {
    let mut builder = Schema::builder();
    let text_options = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(TEXT_TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();

    let fields = IndexFields {
        path: builder.add_text_field("path", STRING | STORED),
        content_hash: builder.add_text_field("content_hash", STRING | STORED),
        text: builder.add_text_field("text", text_options),
        text_bytes: builder.add_u64_field("text_bytes", STORED),
        mtime: builder.add_u64_field("mtime", STORED),
        size: builder.add_u64_field("size", STORED),
        page_count: builder.add_u64_field("page_count", STORED),
        indexed_at: builder.add_u64_field("indexed_at", STORED),
        metadata: builder.add_text_field("metadata", STORED),
    };
    (builder.build(), fields)
}

/// Hash-keyed persistent store of extracted text plus a full-text index
pub struct DocumentIndex {
    dir: PathBuf,
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: IndexFields,
}

impl DocumentIndex {
    /// Open the index in `dir`, creating it if needed. An index written with
    /// a different schema is discarded and rebuilt empty.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let (schema, fields) = build_schema();

        let index = match open_or_create(&dir, &schema) {
            Ok(index) => index,
            Err(err) => {
                tracing::warn!(
                    "document index at {} is unreadable ({err}), rebuilding it empty",
                    dir.display()
                );
                if dir.exists() {
                    fs::remove_dir_all(&dir)?;
                }
                open_or_create(&dir, &schema)?
            }
        };

        let writer: IndexWriter = index.writer_with_num_threads(1, DEFAULT_WRITER_BUDGET_BYTES)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            dir,
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True iff a record exists whose hash matches the file's current metadata
    pub fn is_fresh(&self, path: &Path) -> bool {
        let Some(stamp) = FileStamp::read(path) else {
            return false;
        };
        let current = fingerprint(path, stamp);
        let searcher = self.reader.searcher();
        match self.find_document(&searcher, path) {
            Ok(Some(doc)) => self.str_field(&doc, self.fields.content_hash) == current,
            Ok(None) => false,
            Err(err) => {
                tracing::warn!("index lookup failed for {}, treating as stale: {err}", path.display());
                false
            }
        }
    }

    /// Stored text for `path`, fresh or not
    pub fn get_text(&self, path: &Path) -> Option<String> {
        self.get_record(path).map(|record| record.text)
    }

    pub fn get_record(&self, path: &Path) -> Option<IndexRecord> {
        let searcher = self.reader.searcher();
        match self.find_document(&searcher, path) {
            Ok(doc) => doc.map(|doc| self.to_record(&doc)),
            Err(err) => {
                tracing::warn!("index read failed for {}: {err}", path.display());
                None
            }
        }
    }

    /// Insert or replace the record for `path`. Returns `false` when the file
    /// no longer exists and nothing was written.
    pub fn upsert(
        &self,
        path: &Path,
        text: &str,
        page_count: u64,
        metadata: &DocumentMetadata,
    ) -> Result<bool> {
        let Some(doc) = self.make_document(path, text, page_count, metadata) else {
            return Ok(false);
        };
        self.commit_staged(|writer| {
            writer.delete_term(self.path_term(path));
            writer.add_document(doc)?;
            Ok(true)
        })?;
        Ok(true)
    }

    /// Upsert many records in one commit. Returns how many were written.
    pub fn upsert_batch(&self, items: impl IntoIterator<Item = IndexUpsert>) -> Result<usize> {
        let mut written = 0usize;
        self.commit_staged(|writer| {
            for item in items {
                let Some(doc) =
                    self.make_document(&item.path, &item.text, item.page_count, &item.metadata)
                else {
                    continue;
                };
                writer.delete_term(self.path_term(&item.path));
                writer.add_document(doc)?;
                written += 1;
            }
            Ok(written > 0)
        })?;
        Ok(written)
    }

    /// At most `limit` `(path, text)` pairs whose text contains `query` as a
    /// phrase, best BM25 score first
    pub fn full_text_search(&self, query: &str, limit: usize) -> Result<Vec<(PathBuf, String)>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let parser = QueryParser::for_index(&self.index, vec![self.fields.text]);
        let parsed = parser.parse_query(&escape_as_query_phrase(query))?;

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&parsed, &TopDocs::with_limit(limit))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            hits.push((
                PathBuf::from(self.str_field(&doc, self.fields.path)),
                self.str_field(&doc, self.fields.text).to_string(),
            ));
        }
        Ok(hits)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let searcher = self.reader.searcher();
        let mut stats = IndexStats {
            file_count: searcher.num_docs(),
            ..IndexStats::default()
        };
        for address in searcher.search(&AllQuery, &DocSetCollector)? {
            let doc: TantivyDocument = searcher.doc(address)?;
            stats.total_content_size += self.u64_field(&doc, self.fields.text_bytes);
            stats.total_file_size += self.u64_field(&doc, self.fields.size);
        }
        stats.index_storage_size = dir_size(&self.dir);
        Ok(stats)
    }

    /// Remove every record
    pub fn clear(&self) -> Result<()> {
        self.commit_staged(|writer| {
            writer.delete_all_documents()?;
            Ok(true)
        })
    }

    /// Remove the record for `path`, if any
    pub fn remove(&self, path: &Path) -> Result<()> {
        self.commit_staged(|writer| {
            writer.delete_term(self.path_term(path));
            Ok(true)
        })
    }

    /// Stage operations under the writer lock, then commit when `stage`
    /// reports changes. A failure anywhere rolls the writer back to the last
    /// commit, so nothing staged here reaches a later commit.
    fn commit_staged<F>(&self, stage: F) -> Result<()>
    where
        F: FnOnce(&mut IndexWriter) -> Result<bool>,
    {
        let mut writer = self.writer.lock();
        let result = stage(&mut *writer).and_then(|changed| {
            if changed {
                self.commit_locked(&mut *writer)
            } else {
                Ok(())
            }
        });
        if let Err(err) = &result {
            tracing::warn!(dir = %self.dir.display(), "index update failed, rolling back: {err}");
            if let Err(rollback_err) = writer.rollback() {
                tracing::error!("index rollback failed: {rollback_err}");
            }
        }
        result
    }

    fn commit_locked(&self, writer: &mut IndexWriter) -> Result<()> {
        let opstamp = writer.commit()?;
        self.reader.reload()?;
        tracing::debug!(opstamp, dir = %self.dir.display(), "committed document index");
        Ok(())
    }

    fn make_document(
        &self,
        path: &Path,
        text: &str,
        page_count: u64,
        metadata: &DocumentMetadata,
    ) -> Option<TantivyDocument> {
        let Some(stamp) = FileStamp::read(path) else {
            tracing::debug!("not indexing {}: file metadata unavailable", path.display());
            return None;
        };
        let metadata_json = serde_json::to_string(metadata).unwrap_or_else(|_| "{}".to_string());
        let f = self.fields;
        Some(doc!(
            f.path => path_key(path),
            f.content_hash => fingerprint(path, stamp),
            f.text => text,
            f.text_bytes => text.len() as u64,
            f.mtime => stamp.mtime,
            f.size => stamp.size,
            f.page_count => page_count,
            f.indexed_at => unix_now_secs(),
            f.metadata => metadata_json,
        ))
    }

    fn find_document(&self, searcher: &Searcher, path: &Path) -> Result<Option<TantivyDocument>> {
        let query = TermQuery::new(self.path_term(path), IndexRecordOption::Basic);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top_docs.first() {
            Some((_, address)) => Ok(Some(searcher.doc(*address)?)),
            None => Ok(None),
        }
    }

    fn to_record(&self, doc: &TantivyDocument) -> IndexRecord {
        let f = self.fields;
        let metadata = serde_json::from_str(self.str_field(doc, f.metadata)).unwrap_or_default();
        IndexRecord {
            file_path: PathBuf::from(self.str_field(doc, f.path)),
            content_hash: self.str_field(doc, f.content_hash).to_string(),
            text: self.str_field(doc, f.text).to_string(),
            mtime: self.u64_field(doc, f.mtime),
            size: self.u64_field(doc, f.size),
            page_count: self.u64_field(doc, f.page_count),
            indexed_at: self.u64_field(doc, f.indexed_at),
            metadata,
        }
    }

    fn path_term(&self, path: &Path) -> Term {
        Term::from_field_text(self.fields.path, &path_key(path))
    }

    fn str_field<'d>(&self, doc: &'d TantivyDocument, field: Field) -> &'d str {
        doc.get_first(field).and_then(|v| v.as_str()).unwrap_or("")
    }

    fn u64_field(&self, doc: &TantivyDocument, field: Field) -> u64 {
        doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0)
    }
}

fn open_or_create(dir: &Path, schema: &Schema) -> Result<Index> {
    fs::create_dir_all(dir)?;
    let directory = MmapDirectory::open(dir).map_err(|e| DocSearchError::IndexOpen {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(Index::open_or_create(directory, schema.clone())?)
}

fn path_key(path: &Path) -> String {
    canonical_path(path).to_string_lossy().into_owned()
}

fn escape_as_query_phrase(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 2);
    out.push('"');
    for ch in query.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn dir_size(dir: &Path) -> u64 {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.metadata().ok())
                .filter(|metadata| metadata.is_file())
                .map(|metadata| metadata.len())
                .sum()
        })
        .unwrap_or(0)
}
