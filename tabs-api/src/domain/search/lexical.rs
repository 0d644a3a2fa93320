//! Lexical scoring for the in-memory index.
//!
//! Okapi BM25 over several weighted fields. Tokens are diacritic-folded,
//! lowercased, stop-word filtered and Snowball-stemmed so that "Café" and
//! "cafes" land on the same term.

use std::{collections::HashMap, sync::LazyLock};

use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

const K1: f64 = 1.2;
const B: f64 = 0.75;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "in", "on", "at", "to", "for",
    "of", "with", "by", "from", "as", "and", "or", "but", "not", "it", "its", "this", "that",
];

static STEMMER: LazyLock<Stemmer> = LazyLock::new(|| Stemmer::create(Algorithm::English));

/// Strip diacritics: NFKD, then drop combining marks.
pub fn fold_diacritics(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Split into stemmed, lowercased terms.
pub fn tokenize(text: &str) -> Vec<String> {
    fold_diacritics(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .filter(|s| !STOP_WORDS.contains(&s.as_str()))
        .map(|s| STEMMER.stem(&s).into_owned())
        .collect()
}

/// One searchable field of a document.
#[derive(Debug, Clone, Copy)]
pub struct WeightedField<'a> {
    pub text: &'a str,
    pub boost: f64,
}

impl<'a> WeightedField<'a> {
    pub fn new(text: &'a str, boost: f64) -> Self {
        Self { text, boost }
    }
}

/// Rank `documents` against `query`.
///
/// Term frequencies are summed across fields scaled by each field's boost
/// (a BM25F-style simplification). Returns `(document index, score)` for
/// every document matching at least one term, best first. Ties keep input
/// order.
pub fn bm25_rank(query: &str, documents: &[Vec<WeightedField<'_>>]) -> Vec<(usize, f64)> {
    let mut query_terms = tokenize(query);
    query_terms.sort();
    query_terms.dedup();
    if query_terms.is_empty() || documents.is_empty() {
        return vec![];
    }

    let analyzed: Vec<(HashMap<String, f64>, f64)> = documents
        .iter()
        .map(|fields| {
            let mut tf: HashMap<String, f64> = HashMap::new();
            let mut length = 0.0;
            for field in fields {
                for term in tokenize(field.text) {
                    *tf.entry(term).or_default() += field.boost;
                    length += field.boost;
                }
            }
            (tf, length)
        })
        .collect();

    let n = analyzed.len() as f64;
    let avg_len = (analyzed.iter().map(|(_, len)| len).sum::<f64>() / n).max(f64::EPSILON);

    let idf: HashMap<&str, f64> = query_terms
        .iter()
        .map(|term| {
            let df = analyzed.iter().filter(|(tf, _)| tf.contains_key(term)).count() as f64;
            (term.as_str(), ((n - df + 0.5) / (df + 0.5) + 1.0).ln())
        })
        .collect();

    let mut scored: Vec<(usize, f64)> = analyzed
        .iter()
        .enumerate()
        .filter_map(|(idx, (tf, len))| {
            let mut score = 0.0;
            let mut matched = false;
            for term in &query_terms {
                let Some(freq) = tf.get(term) else { continue };
                matched = true;
                let norm = K1 * (1.0 - B + B * len / avg_len);
                score += idf[term.as_str()] * (freq * (K1 + 1.0)) / (freq + norm);
            }
            matched.then_some((idx, score))
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &'static str, summary: &'static str) -> Vec<WeightedField<'static>> {
        vec![WeightedField::new(title, 2.0), WeightedField::new(summary, 1.0)]
    }

    #[test]
    fn folds_diacritics() {
        assert_eq!(fold_diacritics("Café Zürich naïve"), "Cafe Zurich naive");
    }

    #[test]
    fn tokenize_stems_and_drops_stop_words() {
        assert_eq!(tokenize("The Running of the Bulls"), vec!["run", "bull"]);
        assert_eq!(tokenize("payments"), tokenize("payment"));
        assert_eq!(tokenize("cafés"), tokenize("Cafe"));
    }

    #[test]
    fn ranks_matching_documents_only() {
        let docs = vec![
            doc("Stripe payments docs", "Accept payments online"),
            doc("Cooking pasta", "Italian recipes"),
            doc("Payment processing", "Card networks explained"),
        ];
        let ranked = bm25_rank("payment", &docs);
        let ids: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&1));
        assert!(ranked.iter().all(|(_, s)| *s > 0.0));
    }

    #[test]
    fn title_matches_outrank_summary_matches() {
        let docs = vec![
            doc("Recipes", "a guide to finance for cooks"),
            doc("Personal finance", "budgeting"),
        ];
        let ranked = bm25_rank("finance", &docs);
        assert_eq!(ranked[0].0, 1);
    }

    #[test]
    fn empty_or_stop_word_queries_match_nothing() {
        let docs = vec![doc("The title", "the summary")];
        assert!(bm25_rank("", &docs).is_empty());
        assert!(bm25_rank("the of and", &docs).is_empty());
    }
}
