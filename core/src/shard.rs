use crate::PostingsList;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Final-index partition a term lives in, chosen by its first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ShardKey {
    /// `a`..=`z` or `0`..=`9`
    Char(char),
    /// Any other leading character. Unreachable through the tokenizer.
    Other,
}

impl ShardKey {
    pub fn for_term(term: &str) -> Self {
        match term.chars().next() {
            Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => ShardKey::Char(c),
            _ => ShardKey::Other,
        }
    }

    /// Every possible key: 26 letters, 10 digits, the catch-all.
    pub fn all() -> impl Iterator<Item = ShardKey> {
        ('a'..='z').chain('0'..='9').map(ShardKey::Char).chain(std::iter::once(ShardKey::Other))
    }

    pub fn file_stem(&self) -> String {
        match self {
            ShardKey::Char(c) => c.to_string(),
            ShardKey::Other => "_".to_string(),
        }
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_stem())
    }
}

/// One immutable partition of the final index: term -> sorted postings.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shard {
    pub terms: BTreeMap<String, PostingsList>,
}

impl Shard {
    pub fn get(&self, term: &str) -> Option<&PostingsList> { self.terms.get(term) }

    pub fn len(&self) -> usize { self.terms.len() }

    pub fn is_empty(&self) -> bool { self.terms.is_empty() }
}
