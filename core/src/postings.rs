use crate::DocId;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub frequency: u32, // occurrences of the term in the document, >= 1
}

/// All postings for one term, ascending by doc_id.
///
/// On disk this is a JSON object `{"<doc_id>": frequency, ...}`. Serialization
/// writes entries in list order, so "9" is emitted before "10"; deserialization
/// accepts any key order and restores the ascending invariant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingsList(Vec<Posting>);

impl PostingsList {
    pub fn new() -> Self { Self::default() }

    /// Sorts by doc_id. Duplicate doc_ids are rejected.
    pub fn from_postings(mut postings: Vec<Posting>) -> Result<Self, DocId> {
        postings.sort_unstable_by_key(|p| p.doc_id);
        if let Some(w) = postings.windows(2).find(|w| w[0].doc_id == w[1].doc_id) {
            return Err(w[0].doc_id);
        }
        Ok(Self(postings))
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> std::slice::Iter<'_, Posting> { self.0.iter() }

    pub fn as_slice(&self) -> &[Posting] { &self.0 }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ { self.0.iter().map(|p| p.doc_id) }

    pub fn frequency(&self, doc_id: DocId) -> Option<u32> {
        self.0
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|i| self.0[i].frequency)
    }

    pub fn into_inner(self) -> Vec<Posting> { self.0 }
}

impl<'a> IntoIterator for &'a PostingsList {
    type Item = &'a Posting;
    type IntoIter = std::slice::Iter<'a, Posting>;
    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

impl Serialize for PostingsList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for p in &self.0 {
            map.serialize_entry(&p.doc_id, &p.frequency)?;
        }
        map.end()
    }
}

struct PostingsVisitor;

impl<'de> Visitor<'de> for PostingsVisitor {
    type Value = PostingsList;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of document id to term frequency")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut postings = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((doc_id, frequency)) = access.next_entry::<DocId, u32>()? {
            if frequency == 0 {
                return Err(de::Error::custom(format!("zero frequency for doc {doc_id}")));
            }
            postings.push(Posting { doc_id, frequency });
        }
        PostingsList::from_postings(postings)
            .map_err(|doc_id| de::Error::custom(format!("duplicate doc id {doc_id}")))
    }
}

impl<'de> Deserialize<'de> for PostingsList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PostingsVisitor)
    }
}
