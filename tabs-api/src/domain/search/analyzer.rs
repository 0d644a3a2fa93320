use std::sync::LazyLock;

use regex::Regex;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z][a-z0-9+.\-]*://\S+").unwrap());

/// Queries shorter than this (in characters, after trimming) skip the vector channel.
const MIN_VECTOR_QUERY_CHARS: usize = 3;

/// Which search channels a query can benefit from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryAnalysis {
    pub is_short: bool,
    pub is_url_like: bool,
    pub has_alpha: bool,
    pub use_vector: bool,
    pub use_text: bool,
}

impl QueryAnalysis {
    pub fn any_channel(&self) -> bool {
        self.use_vector || self.use_text
    }
}

/// Classify a query.
///
/// Embedding a bare URL or a one or two letter token costs a provider call
/// without improving recall, so those only go to the lexical channel.
pub fn analyze(query: &str) -> QueryAnalysis {
    let trimmed = query.trim();
    let is_short = trimmed.chars().count() < MIN_VECTOR_QUERY_CHARS;
    let is_url_like = URL_PATTERN.is_match(trimmed);
    let has_alpha = trimmed.chars().any(char::is_alphabetic);

    QueryAnalysis {
        is_short,
        is_url_like,
        has_alpha,
        use_vector: !trimmed.is_empty() && !is_short && !is_url_like,
        use_text: has_alpha,
    }
}
