//! Merge of partial indexes into the sharded final index.
//!
//! combine: stream partials one at a time, unioning each term's postings.
//! order: sort every list by numeric doc_id (linear intersection needs it).
//! partition: split terms into shards by first character and write each
//! non-empty shard into a staging directory.
//! publish: rename the staging directory into place, then mark the build as
//! merged. Readers refuse an index without that mark.

use crate::persist::{load_meta, load_partial, publish_shards, reset_dir, save_meta, save_shard, IndexPaths};
use crate::shard::{Shard, ShardKey};
use crate::{Posting, PostingsList};
use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct MergeSummary {
    pub partials_read: u32,
    pub terms: usize,
    pub postings: usize,
    pub shards_written: usize,
    pub bytes_written: u64,
}

/// Union of all partial indexes, postings not yet ordered.
pub type Combined = HashMap<String, Vec<Posting>>;

/// Merge the partial indexes recorded in `meta.json`. Any missing or corrupt
/// partial, or any failed shard write, aborts before the shards are published.
pub fn merge_index(paths: &IndexPaths) -> Result<MergeSummary> {
    let mut meta = load_meta(paths).context("loading build metadata; run the build first")?;
    let combined = combine_partials(paths, meta.partial_indexes)?;
    let ordered = order_postings(combined)?;
    let terms = ordered.len();
    let postings = ordered.values().map(PostingsList::len).sum();
    let shards = partition(ordered);
    let bytes_written = write_shards(paths, &shards)?;
    publish_shards(paths)?;
    meta.merged = true;
    save_meta(paths, &meta)?;
    let summary = MergeSummary {
        partials_read: meta.partial_indexes,
        terms,
        postings,
        shards_written: shards.len(),
        bytes_written,
    };
    tracing::info!(
        partials = summary.partials_read,
        terms,
        postings,
        shards = summary.shards_written,
        empty_shards = ShardKey::all().filter(|k| !shards.contains_key(k)).count(),
        bytes = bytes_written,
        "merge complete"
    );
    Ok(summary)
}

/// Load partials `1..=count` one at a time into one combined map.
///
/// Doc ids are unique across partials, so the union needs no conflict handling.
pub fn combine_partials(paths: &IndexPaths, count: u32) -> Result<Combined> {
    let mut combined: Combined = HashMap::new();
    for n in 1..=count {
        let partial = load_partial(paths, n).with_context(|| format!("partial index {n} of {count}"))?;
        let terms = partial.len();
        for (term, list) in partial {
            combined.entry(term).or_default().extend(list.into_inner());
        }
        tracing::info!(partial = n, terms, combined_terms = combined.len(), "combined partial index");
    }
    Ok(combined)
}

/// Sort every term's postings ascending by doc_id.
pub fn order_postings(combined: Combined) -> Result<BTreeMap<String, PostingsList>> {
    combined
        .into_iter()
        .map(|(term, postings)| {
            let list = PostingsList::from_postings(postings)
                .map_err(|doc_id| anyhow!("doc {doc_id} appears twice in postings for {term:?}"))?;
            Ok((term, list))
        })
        .collect()
}

/// Assign each term to the shard of its first character. Only non-empty
/// shards appear in the result.
pub fn partition<I>(index: I) -> BTreeMap<ShardKey, Shard>
where
    I: IntoIterator<Item = (String, PostingsList)>,
{
    let mut shards: BTreeMap<ShardKey, Shard> = BTreeMap::new();
    for (term, list) in index {
        shards.entry(ShardKey::for_term(&term)).or_default().terms.insert(term, list);
    }
    shards
}

/// Write every shard into a fresh staging directory, in parallel.
pub fn write_shards(paths: &IndexPaths, shards: &BTreeMap<ShardKey, Shard>) -> Result<u64> {
    reset_dir(&paths.staging_dir())?;
    let written = shards
        .par_iter()
        .map(|(&key, shard)| {
            let bytes = save_shard(paths, key, shard).with_context(|| format!("writing shard {key}"))?;
            tracing::debug!(shard = %key, bytes, "wrote shard");
            Ok(bytes)
        })
        .collect::<Result<Vec<u64>>>()?;
    Ok(written.into_iter().sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_index, BuildConfig};
    use crate::corpus::RawDocument;
    use crate::persist::{load_shard, save_partial, save_meta, MetaFile, PartialPostings};
    use std::fs;
    use tempfile::tempdir;

    fn partial(entries: &[(&str, &[(u32, u32)])]) -> PartialPostings {
        entries
            .iter()
            .map(|(term, postings)| (term.to_string(), postings.iter().copied().collect()))
            .collect()
    }

    fn meta(partials: u32, num_docs: u32) -> MetaFile {
        MetaFile { num_docs, partial_indexes: partials, unique_terms: 0, bytes_written: 0, created_at: String::new(), version: 1, merged: false }
    }

    #[test]
    fn combine_unions_postings_across_partials() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_partial(&paths, 1, &partial(&[("cat", &[(0, 1), (1, 3)]), ("dog", &[(1, 1)])])).unwrap();
        save_partial(&paths, 2, &partial(&[("cat", &[(2, 2)]), ("eel", &[(3, 1)])])).unwrap();
        let combined = combine_partials(&paths, 2).unwrap();
        assert_eq!(combined.len(), 3);
        assert_eq!(combined["cat"].len(), 3);
    }

    #[test]
    fn order_is_numeric_across_digit_lengths() {
        let mut combined = Combined::new();
        combined.insert(
            "x".into(),
            vec![Posting { doc_id: 10, frequency: 1 }, Posting { doc_id: 9, frequency: 1 }, Posting { doc_id: 100, frequency: 2 }],
        );
        let ordered = order_postings(combined).unwrap();
        assert_eq!(ordered["x"].doc_ids().collect::<Vec<_>>(), vec![9, 10, 100]);
    }

    #[test]
    fn order_rejects_conflicting_partials() {
        let mut combined = Combined::new();
        combined.insert("x".into(), vec![Posting { doc_id: 4, frequency: 1 }, Posting { doc_id: 4, frequency: 2 }]);
        assert!(order_postings(combined).is_err());
    }

    #[test]
    fn partition_is_by_first_character() {
        let list = PostingsList::from_postings(vec![Posting { doc_id: 0, frequency: 1 }]).unwrap();
        let shards = partition(vec![
            ("apple".to_string(), list.clone()),
            ("avocado".to_string(), list.clone()),
            ("7up".to_string(), list.clone()),
            ("~odd".to_string(), list.clone()),
        ]);
        assert_eq!(shards.len(), 3);
        assert_eq!(shards[&ShardKey::Char('a')].len(), 2);
        assert_eq!(shards[&ShardKey::Char('7')].len(), 1);
        assert!(shards[&ShardKey::Other].get("~odd").is_some());
    }

    #[test]
    fn missing_partial_aborts_merge() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_meta(&paths, &meta(2, 2)).unwrap();
        save_partial(&paths, 1, &partial(&[("cat", &[(0, 1)])])).unwrap();
        assert!(merge_index(&paths).is_err());
        assert!(!paths.shards_dir().exists());
    }

    #[test]
    fn corrupt_partial_aborts_merge() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_meta(&paths, &meta(1, 1)).unwrap();
        fs::create_dir_all(paths.partials_dir()).unwrap();
        fs::write(paths.partial(1), "{\"cat\": {\"0\": ").unwrap();
        assert!(merge_index(&paths).is_err());
    }

    #[test]
    fn merge_preserves_every_triple() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let docs: Vec<Result<RawDocument>> = (0..12)
            .map(|i| {
                let content = if i % 3 == 0 { "alpha beta alpha" } else { "alpha 9lives" };
                Ok(RawDocument { url: format!("u{i}"), content: content.into() })
            })
            .collect();
        let config = BuildConfig { offload_threshold: 5, ..BuildConfig::default() };
        let built = build_index(paths.clone(), docs, config).unwrap();
        assert_eq!(built.partial_indexes, 3);

        let mut expected: Vec<(String, u32, u32)> = Vec::new();
        for n in 1..=built.partial_indexes {
            for (term, list) in load_partial(&paths, n).unwrap() {
                expected.extend(list.iter().map(|p| (term.clone(), p.doc_id, p.frequency)));
            }
        }
        expected.sort();

        let summary = merge_index(&paths).unwrap();
        assert_eq!(summary.postings, expected.len());

        let mut actual: Vec<(String, u32, u32)> = Vec::new();
        for key in ShardKey::all() {
            if let Some(shard) = load_shard(&paths, key).unwrap() {
                for (term, list) in &shard.terms {
                    assert_eq!(ShardKey::for_term(term), key);
                    let ids: Vec<_> = list.doc_ids().collect();
                    assert!(ids.windows(2).all(|w| w[0] < w[1]), "{term} not strictly ascending");
                    actual.extend(list.iter().map(|p| (term.clone(), p.doc_id, p.frequency)));
                }
            }
        }
        actual.sort();
        assert_eq!(actual, expected);

        let alpha = load_shard(&paths, ShardKey::Char('a')).unwrap().unwrap();
        assert_eq!(alpha.get("alpha").unwrap().doc_ids().collect::<Vec<_>>(), (0..12).collect::<Vec<_>>());
        assert_eq!(alpha.get("alpha").unwrap().frequency(9), Some(2));
        let raw = fs::read_to_string(paths.shard(ShardKey::Char('a'))).unwrap();
        assert!(raw.find("\"9\":").unwrap() < raw.find("\"10\":").unwrap());
        assert!(load_shard(&paths, ShardKey::Char('z')).unwrap().is_none());
    }

    #[test]
    fn remerge_drops_stale_shards() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        fs::create_dir_all(paths.shards_dir()).unwrap();
        fs::write(paths.shard(ShardKey::Char('z')), r#"{"zebra":{"0":1}}"#).unwrap();
        save_meta(&paths, &meta(1, 1)).unwrap();
        save_partial(&paths, 1, &partial(&[("cat", &[(0, 1)])])).unwrap();
        let summary = merge_index(&paths).unwrap();
        assert_eq!(summary.shards_written, 1);
        assert!(load_shard(&paths, ShardKey::Char('z')).unwrap().is_none());
    }

    #[test]
    fn publish_marks_build_merged() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_meta(&paths, &meta(1, 1)).unwrap();
        save_partial(&paths, 1, &partial(&[("cat", &[(0, 1)])])).unwrap();
        merge_index(&paths).unwrap();
        assert!(load_meta(&paths).unwrap().merged);
        assert!(!paths.staging_dir().exists());
        assert!(paths.shard(ShardKey::Char('c')).exists());
    }

    #[test]
    fn failed_shard_write_publishes_nothing() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_meta(&paths, &meta(1, 1)).unwrap();
        save_partial(&paths, 1, &partial(&[("cat", &[(0, 1)])])).unwrap();
        // a plain file where the staging directory should go
        fs::write(paths.staging_dir(), "not a directory").unwrap();
        assert!(merge_index(&paths).is_err());
        assert!(!paths.shards_dir().exists());
        assert!(!load_meta(&paths).unwrap().merged);
        assert!(crate::query::QueryEngine::open(paths).is_err());
    }
}
