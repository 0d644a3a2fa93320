//! Core types for the search domain.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::models::{Tab, TabId};

/// Which embedding the provider should produce.
///
/// Queries and documents are embedded asymmetrically, so the task is part of
/// the embedding cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmbeddingTask {
    RetrievalQuery,
    RetrievalDocument,
}

impl EmbeddingTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingTask::RetrievalQuery => "RETRIEVAL_QUERY",
            EmbeddingTask::RetrievalDocument => "RETRIEVAL_DOCUMENT",
        }
    }
}

impl std::fmt::Display for EmbeddingTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fields of a tab that search results expose.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSummary {
    pub id: TabId,
    pub url: String,
    pub title: Option<String>,
    pub domain: Option<String>,
    pub summary: Option<String>,
    pub category: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub date_added: OffsetDateTime,
}

impl From<&Tab> for TabSummary {
    fn from(tab: &Tab) -> Self {
        Self {
            id: tab.id.clone(),
            url: tab.url.clone(),
            title: tab.title.clone(),
            domain: tab.domain.clone(),
            summary: tab.summary.clone(),
            category: tab.category.clone(),
            thumbnail_url: tab.thumbnail_url.clone(),
            date_added: tab.date_added,
        }
    }
}

/// One candidate from a single search channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTab {
    pub tab: TabSummary,
    /// Channel-specific relevance, higher is better
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Vector and/or lexical index results fused together
    Hybrid,
    /// Substring match over local records because the lexical index is down
    Keyword,
}

/// Relative weight of each channel in the fused score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchWeights {
    pub vector: f64,
    pub text: f64,
}

impl Default for SearchWeights {
    fn default() -> Self {
        Self {
            vector: 1.0,
            text: 1.0,
        }
    }
}

impl SearchWeights {
    /// Map a single slider value in `[0, 2]` onto both weights.
    ///
    /// `0` is pure keyword, `1` balanced and `2` pure semantic.
    pub fn from_blend(value: f64) -> Self {
        let vector = if value.is_finite() {
            value.clamp(0.0, 2.0)
        } else {
            1.0
        };
        Self {
            vector,
            text: 2.0 - vector,
        }
    }
}

/// A fused search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridResult {
    #[serde(flatten)]
    pub tab: TabSummary,
    pub score: f64,
    /// 1-based position in the vector channel, if it appeared there
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_rank: Option<usize>,
    /// 1-based position in the lexical channel, if it appeared there
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_rank: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<HybridResult>,
    pub search_mode: SearchMode,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self {
            results: vec![],
            search_mode: SearchMode::Hybrid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_maps_to_complementary_weights() {
        assert_eq!(SearchWeights::from_blend(0.0), SearchWeights { vector: 0.0, text: 2.0 });
        assert_eq!(SearchWeights::from_blend(1.0), SearchWeights::default());
        assert_eq!(SearchWeights::from_blend(2.0), SearchWeights { vector: 2.0, text: 0.0 });
    }

    #[test]
    fn blend_is_clamped() {
        assert_eq!(SearchWeights::from_blend(5.0).vector, 2.0);
        assert_eq!(SearchWeights::from_blend(-1.0).text, 2.0);
        assert_eq!(SearchWeights::from_blend(f64::NAN), SearchWeights::default());
    }

    #[test]
    fn hybrid_result_serializes_flat() {
        let tab = Tab::new("t1", "u1", "https://stripe.com");
        let result = HybridResult {
            tab: TabSummary::from(&tab),
            score: 1.0,
            vector_rank: Some(1),
            text_rank: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["id"], "t1");
        assert_eq!(json["domain"], "stripe.com");
        assert_eq!(json["vectorRank"], 1);
        assert!(json.get("textRank").is_none());
        assert!(json.get("dateAdded").is_some());
    }

    #[test]
    fn search_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_value(SearchMode::Keyword).unwrap(), "keyword");
    }
}
