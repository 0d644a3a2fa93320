//! Position-based fusion of the vector and lexical result lists.

use std::collections::HashMap;

use super::types::{HybridResult, ScoredTab, SearchWeights};
use crate::domain::models::TabId;

/// Contribution of the item at 0-based `position` in a list of `len` items.
///
/// Channel scores (cosine similarity and BM25) are not comparable, so only
/// the position counts: the top item earns the full weight.
pub fn position_score(weight: f64, position: usize, len: usize) -> f64 {
    if len == 0 {
        return 0.0;
    }
    weight * (1.0 - position as f64 / len as f64)
}

/// Merge both channels into one list ordered by combined score, then by
/// newest `date_added`, then by id.
pub fn fuse(
    vector: &[ScoredTab],
    text: &[ScoredTab],
    weights: SearchWeights,
    limit: usize,
) -> Vec<HybridResult> {
    let mut merged: HashMap<TabId, HybridResult> = HashMap::new();

    for (position, hit) in vector.iter().enumerate() {
        let entry = merged.entry(hit.tab.id.clone()).or_insert_with(|| HybridResult {
            tab: hit.tab.clone(),
            score: 0.0,
            vector_rank: None,
            text_rank: None,
        });
        if entry.vector_rank.is_none() {
            entry.score += position_score(weights.vector, position, vector.len());
            entry.vector_rank = Some(position + 1);
        }
    }

    for (position, hit) in text.iter().enumerate() {
        let entry = merged.entry(hit.tab.id.clone()).or_insert_with(|| HybridResult {
            tab: hit.tab.clone(),
            score: 0.0,
            vector_rank: None,
            text_rank: None,
        });
        if entry.text_rank.is_none() {
            entry.score += position_score(weights.text, position, text.len());
            entry.text_rank = Some(position + 1);
        }
    }

    let mut results: Vec<HybridResult> = merged.into_values().collect();
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.tab.date_added.cmp(&a.tab.date_added))
            .then_with(|| a.tab.id.cmp(&b.tab.id))
    });
    results.truncate(limit);
    results
}
