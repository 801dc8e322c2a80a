//! Memory-bounded index construction.
//!
//! Documents are scanned in order and folded into an in-memory
//! `term -> {doc_id: frequency}` accumulator. Every `offload_threshold`
//! documents the accumulator is moved out, written as the next numbered
//! partial index, and replaced by an empty one, so peak memory depends on the
//! threshold rather than on corpus size.

use crate::corpus::RawDocument;
use crate::extract::extract_text;
use crate::persist::{remove_dir, remove_file, reset_dir, save_doc_map, save_meta, save_partial, IndexPaths, MetaFile, PartialPostings, FORMAT_VERSION};
use crate::tokenizer::tokenize;
use crate::{DocId, DocumentMap};
use anyhow::{ensure, Result};
use std::collections::HashSet;

pub const OFFLOAD_THRESHOLD: usize = 15_000;

#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Documents per partial index.
    pub offload_threshold: usize,
    pub progress_every: usize,
    pub vocab_every: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { offload_threshold: OFFLOAD_THRESHOLD, progress_every: 1_000, vocab_every: 10_000 }
    }
}

#[derive(Default)]
struct Accumulator {
    postings: PartialPostings,
    docs: usize,
}

impl Accumulator {
    fn add(&mut self, doc_id: DocId, terms: Vec<String>) {
        for term in terms {
            *self.postings.entry(term).or_default().entry(doc_id).or_insert(0) += 1;
        }
        self.docs += 1;
    }

    fn is_empty(&self) -> bool { self.postings.is_empty() }
}

pub struct IndexBuilder {
    paths: IndexPaths,
    config: BuildConfig,
    acc: Accumulator,
    doc_map: DocumentMap,
    next_doc_id: DocId,
    partials_written: u32,
    vocabulary: HashSet<String>,
    bytes_written: u64,
}

impl IndexBuilder {
    /// Clears every artifact of a previous run. Shards and metadata go first
    /// so an interrupted build can never be opened against old shards.
    pub fn create(paths: IndexPaths, config: BuildConfig) -> Result<Self> {
        ensure!(config.offload_threshold > 0, "offload threshold must be at least 1");
        remove_file(&paths.meta())?;
        remove_dir(&paths.shards_dir())?;
        remove_dir(&paths.staging_dir())?;
        reset_dir(&paths.partials_dir())?;
        Ok(Self {
            paths,
            config,
            acc: Accumulator::default(),
            doc_map: DocumentMap::new(),
            next_doc_id: 0,
            partials_written: 0,
            vocabulary: HashSet::new(),
            bytes_written: 0,
        })
    }

    /// Index one document under the next doc_id. Errors are write failures
    /// during an offload and are fatal to the build.
    pub fn add_document(&mut self, url: String, content: &str) -> Result<DocId> {
        let doc_id = self.next_doc_id;
        let terms = tokenize(&extract_text(content));
        for term in &terms {
            if !self.vocabulary.contains(term) {
                self.vocabulary.insert(term.clone());
            }
        }
        self.acc.add(doc_id, terms);
        self.doc_map.insert(doc_id, url);
        self.next_doc_id += 1;

        let processed = self.next_doc_id as usize;
        if self.config.progress_every > 0 && processed % self.config.progress_every == 0 {
            tracing::info!(processed, "processed documents");
        }
        if self.config.vocab_every > 0 && processed % self.config.vocab_every == 0 {
            tracing::info!(unique_terms = self.vocabulary.len(), "tracked unique terms");
        }
        if self.acc.docs >= self.config.offload_threshold {
            self.offload()?;
        }
        Ok(doc_id)
    }

    fn offload(&mut self) -> Result<()> {
        let batch = std::mem::take(&mut self.acc);
        let n = self.partials_written + 1;
        let bytes = save_partial(&self.paths, n, &batch.postings)?;
        self.partials_written = n;
        self.bytes_written += bytes;
        tracing::info!(
            file = %self.paths.partial(n).display(),
            docs = batch.docs,
            terms = batch.postings.len(),
            bytes,
            total_bytes = self.bytes_written,
            "offloaded partial index"
        );
        Ok(())
    }

    pub fn docs_indexed(&self) -> u32 { self.next_doc_id }

    /// Flush the remaining batch, then persist the document map and metadata.
    pub fn finish(mut self) -> Result<MetaFile> {
        if !self.acc.is_empty() {
            self.offload()?;
        }
        self.bytes_written += save_doc_map(&self.paths, &self.doc_map)?;
        let meta = MetaFile {
            num_docs: self.next_doc_id,
            partial_indexes: self.partials_written,
            unique_terms: self.vocabulary.len(),
            bytes_written: self.bytes_written,
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            version: FORMAT_VERSION,
            merged: false,
        };
        save_meta(&self.paths, &meta)?;
        tracing::info!(
            num_docs = meta.num_docs,
            partial_indexes = meta.partial_indexes,
            unique_terms = meta.unique_terms,
            bytes_written = meta.bytes_written,
            "indexing complete"
        );
        Ok(meta)
    }
}

/// Build partial indexes and the document map from a corpus.
///
/// Unreadable documents are logged and skipped without consuming a doc_id.
pub fn build_index<I>(paths: IndexPaths, docs: I, config: BuildConfig) -> Result<MetaFile>
where
    I: IntoIterator<Item = Result<RawDocument>>,
{
    let mut builder = IndexBuilder::create(paths, config)?;
    let mut skipped = 0usize;
    for doc in docs {
        match doc {
            Ok(doc) => {
                builder.add_document(doc.url, &doc.content)?;
            }
            Err(e) => {
                skipped += 1;
                tracing::warn!(error = %format!("{e:#}"), "skipping document");
            }
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, indexed = builder.docs_indexed(), "some documents were skipped");
    }
    builder.finish()
}
