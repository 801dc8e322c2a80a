use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// One crawled page as stored in the corpus. Extra fields (e.g. `encoding`)
/// are ignored; `url` and `content` are required.
#[derive(Debug, Deserialize)]
pub struct RawDocument {
    pub url: String,
    pub content: String,
}

/// Lazily enumerates `.json` documents under `root` in file-name order.
///
/// Each item is a per-document result: an unreadable file, malformed JSON or a
/// missing field yields `Err` for that file only and iteration continues.
pub fn read_corpus(root: &Path) -> impl Iterator<Item = Result<RawDocument>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) if e.file_type().is_file() && is_json(e.path()) => Some(Ok(e.into_path())),
            Ok(_) => None,
            Err(err) => Some(Err(anyhow::Error::new(err).context("walking corpus directory"))),
        })
        .map(|path| path.and_then(|p| read_document(&p)))
}

pub fn read_document(path: &Path) -> Result<RawDocument> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let doc: RawDocument = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(doc)
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_in_name_order_and_reports_bad_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"url":"u/b","content":"B","encoding":"utf-8"}"#).unwrap();
        fs::write(dir.path().join("a.json"), r#"{"url":"u/a","content":"A"}"#).unwrap();
        fs::write(dir.path().join("c.json"), r#"{"url":"u/c"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join("sub/d.json"), "{not json").unwrap();

        let items: Vec<_> = read_corpus(dir.path()).collect();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].as_ref().unwrap().url, "u/a");
        assert_eq!(items[1].as_ref().unwrap().url, "u/b");
        assert!(items[2].is_err());
        assert!(items[3].is_err());
    }
}
