use crate::shard::{Shard, ShardKey};
use crate::{DocId, DocumentMap, PostingsList};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, create_dir_all, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

/// Build result carried from the build phase to merge and query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub partial_indexes: u32,
    pub unique_terms: usize,
    pub bytes_written: u64,
    pub created_at: String,
    pub version: u32,
    /// Set only once a merge of this build's partials has been published.
    #[serde(default)]
    pub merged: bool,
}

/// In-memory accumulator shape as written to a partial index file.
pub type PartialPostings = HashMap<String, HashMap<DocId, u32>>;

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn partials_dir(&self) -> PathBuf { self.root.join("partial_indexes") }
    pub fn partial(&self, n: u32) -> PathBuf { self.partials_dir().join(format!("index_{n}.json")) }
    pub fn shards_dir(&self) -> PathBuf { self.root.join("split_indexes") }
    pub fn shard(&self, key: ShardKey) -> PathBuf { self.shards_dir().join(format!("{}.json", key.file_stem())) }
    /// Merge output is written here, then renamed over `shards_dir`.
    pub fn staging_dir(&self) -> PathBuf { self.root.join("split_indexes.tmp") }
    pub fn staged_shard(&self, key: ShardKey) -> PathBuf { self.staging_dir().join(format!("{}.json", key.file_stem())) }
    pub fn doc_map(&self) -> PathBuf { self.root.join("doc_map.json") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

/// Remove `dir` and its contents if present.
pub fn remove_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("clearing {}", dir.display())),
    }
}

pub fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

/// Remove `dir` if present and create it empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    remove_dir(dir)?;
    create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<u64> {
    let bytes = serde_json::to_vec(value).with_context(|| format!("encoding {}", path.display()))?;
    let mut f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    f.write_all(&bytes).with_context(|| format!("writing {}", path.display()))?;
    f.flush()?;
    Ok(bytes.len() as u64)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf).with_context(|| format!("reading {}", path.display()))?;
    let value = serde_json::from_str(&buf).with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

pub fn save_partial(paths: &IndexPaths, n: u32, postings: &PartialPostings) -> Result<u64> {
    create_dir_all(paths.partials_dir())?;
    write_json(&paths.partial(n), postings)
}

/// Partial postings lists come back sorted by doc_id. A missing file is an error.
pub fn load_partial(paths: &IndexPaths, n: u32) -> Result<HashMap<String, PostingsList>> {
    read_json(&paths.partial(n))
}

/// Writes into the staging directory; nothing is served until `publish_shards`.
pub fn save_shard(paths: &IndexPaths, key: ShardKey, shard: &Shard) -> Result<u64> {
    write_json(&paths.staged_shard(key), shard)
}

/// Swap the fully written staging directory in as the live shard set.
pub fn publish_shards(paths: &IndexPaths) -> Result<()> {
    remove_dir(&paths.shards_dir())?;
    fs::rename(paths.staging_dir(), paths.shards_dir())
        .with_context(|| format!("publishing {}", paths.shards_dir().display()))?;
    Ok(())
}

/// `Ok(None)` when no shard was written for `key`; corrupt files are errors.
pub fn load_shard(paths: &IndexPaths, key: ShardKey) -> Result<Option<Shard>> {
    let path = paths.shard(key);
    match fs::metadata(&path) {
        Ok(_) => read_json(&path).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("inspecting {}", path.display())),
    }
}

pub fn save_doc_map(paths: &IndexPaths, docs: &DocumentMap) -> Result<u64> {
    create_dir_all(&paths.root)?;
    write_json(&paths.doc_map(), docs)
}

pub fn load_doc_map(paths: &IndexPaths) -> Result<DocumentMap> {
    read_json(&paths.doc_map())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let json = serde_json::to_string_pretty(meta)?;
    fs::write(paths.meta(), json).with_context(|| format!("writing {}", paths.meta().display()))?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    read_json(&paths.meta())
}
