pub mod builder;
pub mod corpus;
pub mod extract;
pub mod merge;
pub mod persist;
pub mod postings;
pub mod query;
pub mod shard;
pub mod tokenizer;

use std::collections::BTreeMap;

pub use postings::{Posting, PostingsList};

pub type DocId = u32;

/// Document id -> URL, built once per full indexing run.
pub type DocumentMap = BTreeMap<DocId, String>;
