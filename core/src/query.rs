//! Boolean AND retrieval over the sharded index, ranked by tf-idf.

use crate::persist::{load_doc_map, load_meta, load_shard, IndexPaths};
use crate::shard::{Shard, ShardKey};
use crate::tokenizer::tokenize;
use crate::{DocId, DocumentMap, PostingsList};
use anyhow::{ensure, Context, Result};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub doc_id: DocId,
    pub url: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The query produced no terms.
    EmptyQuery,
    /// No shard exists for the term's first character.
    ShardMissing { term: String, shard: ShardKey },
    /// The shard exists but does not contain the term.
    TermNotFound { term: String },
    /// Every term is indexed but no document contains all of them.
    NoMatches,
    /// Every matching document, best first.
    Hits(Vec<Hit>),
}

impl QueryOutcome {
    pub fn hits(&self) -> &[Hit] {
        match self {
            QueryOutcome::Hits(hits) => hits,
            _ => &[],
        }
    }
}

/// Read-only view over a merged index. Shards are loaded per query and never
/// cached.
pub struct QueryEngine {
    paths: IndexPaths,
    doc_map: DocumentMap,
    num_docs: u32,
}

impl QueryEngine {
    pub fn new(paths: IndexPaths, doc_map: DocumentMap, num_docs: u32) -> Self {
        Self { paths, doc_map, num_docs }
    }

    /// Load the document map and corpus size written by the build. Refuses an
    /// index whose latest build has not been merged, since its shards are
    /// either absent or incomplete.
    pub fn open(paths: IndexPaths) -> Result<Self> {
        let meta = load_meta(&paths).context("loading build metadata")?;
        ensure!(meta.merged, "index at {} has not been merged; run the merge first", paths.root.display());
        let doc_map = load_doc_map(&paths).context("loading document map")?;
        tracing::info!(num_docs = meta.num_docs, urls = doc_map.len(), "index opened");
        Ok(Self::new(paths, doc_map, meta.num_docs))
    }

    pub fn num_docs(&self) -> u32 { self.num_docs }

    pub fn search(&self, text: &str) -> Result<QueryOutcome> {
        let terms = distinct_terms(tokenize(text));
        if terms.is_empty() {
            return Ok(QueryOutcome::EmptyQuery);
        }

        let mut keys: Vec<ShardKey> = Vec::new();
        for term in &terms {
            let key = ShardKey::for_term(term);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        let shards = self.load_shards(&keys)?;

        let mut lists: Vec<&PostingsList> = Vec::with_capacity(terms.len());
        for term in &terms {
            let key = ShardKey::for_term(term);
            let Some(shard) = shards.get(&key).and_then(Option::as_ref) else {
                return Ok(QueryOutcome::ShardMissing { term: term.clone(), shard: key });
            };
            match shard.get(term) {
                Some(list) => lists.push(list),
                None => return Ok(QueryOutcome::TermNotFound { term: term.clone() }),
            }
        }

        let ranked = rank(&lists, self.num_docs);
        if ranked.is_empty() {
            return Ok(QueryOutcome::NoMatches);
        }
        let hits = ranked
            .into_iter()
            .map(|(doc_id, score)| Hit { doc_id, url: self.doc_map.get(&doc_id).cloned(), score })
            .collect();
        Ok(QueryOutcome::Hits(hits))
    }

    /// Shards for independent terms are loaded in parallel and joined before
    /// intersection.
    fn load_shards(&self, keys: &[ShardKey]) -> Result<HashMap<ShardKey, Option<Shard>>> {
        keys.par_iter()
            .map(|&key| load_shard(&self.paths, key).map(|shard| (key, shard)))
            .collect()
    }
}

fn distinct_terms(tokens: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

/// `ln(N / df)` with df the full postings length.
pub fn idf(num_docs: u32, df: usize) -> f64 {
    if num_docs == 0 || df == 0 {
        return 0.0;
    }
    (num_docs as f64 / df as f64).ln()
}

/// Intersect the lists and score survivors by `sum(tf * idf)`.
///
/// Lists are processed smallest first so the running candidate set shrinks as
/// early as possible. idf is fixed per list before intersecting. Output is
/// ordered by score descending, then doc_id ascending.
pub fn rank(lists: &[&PostingsList], num_docs: u32) -> Vec<(DocId, f64)> {
    if lists.is_empty() {
        return Vec::new();
    }
    let mut ordered: Vec<(&PostingsList, f64)> = lists.iter().map(|l| (*l, idf(num_docs, l.len()))).collect();
    ordered.sort_by_key(|(l, _)| l.len());

    let (first, first_idf) = ordered[0];
    let mut running: Vec<(DocId, f64)> = first.iter().map(|p| (p.doc_id, p.frequency as f64 * first_idf)).collect();
    for &(list, term_idf) in &ordered[1..] {
        if running.is_empty() {
            break;
        }
        running = intersect_scored(&running, list, term_idf);
    }

    running.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    running
}

/// Linear merge of two doc_id-ascending sequences, accumulating score.
fn intersect_scored(running: &[(DocId, f64)], list: &PostingsList, term_idf: f64) -> Vec<(DocId, f64)> {
    let postings = list.as_slice();
    let mut out = Vec::with_capacity(running.len().min(postings.len()));
    let (mut i, mut j) = (0, 0);
    while i < running.len() && j < postings.len() {
        let (doc_id, score) = running[i];
        let p = postings[j];
        match doc_id.cmp(&p.doc_id) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push((doc_id, score + p.frequency as f64 * term_idf));
                i += 1;
                j += 1;
            }
        }
    }
    out
}
