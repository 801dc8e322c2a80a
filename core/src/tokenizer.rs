use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[a-z0-9]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Tokenize text into stemmed terms in document order.
///
/// NFKD normalization with combining marks dropped, lowercase, ASCII
/// alphanumeric runs, English stemming. Used unchanged for documents and
/// queries; any divergence breaks term matching.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    RE.find_iter(&normalized)
        .map(|m| STEMMER.stem(m.as_str()).into_owned())
        .filter(|t| !t.is_empty())
        .collect()
}
