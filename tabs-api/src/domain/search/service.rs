//! Search service combining the embedding cache, both channels and fusion.

use std::{future::Future, sync::Arc, time::Duration};

use super::analyzer::analyze;
use super::cache::{CacheStats, EmbeddingCache};
use super::fusion::fuse;
use super::traits::{Embedder, Result, SearchError, SearchRepository};
use super::types::{
    EmbeddingTask, ScoredTab, SearchMode, SearchResponse, SearchWeights,
    TabSummary,
};
use crate::domain::models::OwnerId;

/// Configuration for the search service.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Default number of results to return
    pub default_limit: usize,
    /// Maximum number of results allowed
    pub max_limit: usize,
    /// Upper bound for each channel, embedding included
    pub channel_timeout: Duration,
    /// Candidates fetched per channel relative to the limit
    pub over_fetch: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
            channel_timeout: Duration::from_secs(5),
            over_fetch: 1.5,
        }
    }
}

/// Hybrid search over a user's tabs.
///
/// # Type Parameters
///
/// * `E` - Embedder implementation for generating query embeddings
/// * `R` - SearchRepository implementation for both indexes
///
/// # Examples
///
/// ```ignore
/// let cache = Arc::new(EmbeddingCache::new(500, None));
/// let service = SearchService::new(embedder, repository, cache, SearchConfig::default());
/// let response = service.search("finance", &owner, Some(10), SearchWeights::default()).await?;
/// ```
pub struct SearchService<E, R>
where
    E: Embedder,
    R: SearchRepository,
{
    embedder: E,
    repository: R,
    cache: Arc<EmbeddingCache>,
    config: SearchConfig,
}

/// What a single channel produced.
enum ChannelOutcome {
    Hits(Vec<ScoredTab>),
    Failed,
    IndexUnavailable,
}

impl ChannelOutcome {
    fn hits(&self) -> &[ScoredTab] {
        match self {
            ChannelOutcome::Hits(hits) => hits,
            _ => &[],
        }
    }
}

impl<E, R> SearchService<E, R>
where
    E: Embedder,
    R: SearchRepository,
{
    /// Create a new search service.
    pub fn new(embedder: E, repository: R, cache: Arc<EmbeddingCache>, config: SearchConfig) -> Self {
        Self {
            embedder,
            repository,
            cache,
            config,
        }
    }

    /// Run a hybrid search.
    ///
    /// Channels that fail or time out are treated as empty. When the lexical
    /// index is unavailable, substring matching stands in for it and the
    /// response is flagged as [`SearchMode::Keyword`].
    pub async fn search(
        &self,
        query: &str,
        owner: &OwnerId,
        limit: Option<usize>,
        weights: SearchWeights,
    ) -> Result<SearchResponse> {
        if owner.is_blank() {
            return Err(SearchError::InvalidQuery("owner id is required".into()));
        }

        let query = query.trim();
        let analysis = analyze(query);
        if !analysis.any_channel() {
            tracing::debug!(query, "query enables no search channel");
            return Ok(SearchResponse::empty());
        }

        let limit = limit
            .unwrap_or(self.config.default_limit)
            .min(self.config.max_limit)
            .max(1);
        let candidates = (limit as f64 * self.config.over_fetch).ceil() as usize;

        let vector_channel = async {
            if !analysis.use_vector {
                return ChannelOutcome::Hits(vec![]);
            }
            self.run_channel("vector", self.vector_search(query, owner, candidates))
                .await
        };
        let text_channel = async {
            if !analysis.use_text {
                return ChannelOutcome::Hits(vec![]);
            }
            self.run_channel(
                "text",
                self.repository.search_by_text(query, owner, candidates),
            )
            .await
        };

        let (vector, text) = tokio::join!(vector_channel, text_channel);

        if matches!(text, ChannelOutcome::IndexUnavailable) {
            let keyword_hits = self.keyword_fallback(query, owner, candidates).await;
            let results = fuse(vector.hits(), &keyword_hits, weights, limit);
            tracing::info!(
                query,
                vector_hits = vector.hits().len(),
                keyword_hits = keyword_hits.len(),
                results = results.len(),
                "served keyword fallback"
            );
            return Ok(SearchResponse {
                results,
                search_mode: SearchMode::Keyword,
            });
        }

        let results = fuse(vector.hits(), text.hits(), weights, limit);
        tracing::debug!(
            query,
            vector_hits = vector.hits().len(),
            text_hits = text.hits().len(),
            results = results.len(),
            "hybrid search completed"
        );

        Ok(SearchResponse {
            results,
            search_mode: SearchMode::Hybrid,
        })
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    async fn vector_search(
        &self,
        query: &str,
        owner: &OwnerId,
        candidates: usize,
    ) -> Result<Vec<ScoredTab>> {
        let embedding = self
            .cache
            .get_or_compute(query, EmbeddingTask::RetrievalQuery, |text, task| async move {
                self.embedder.embed(&text, task).await
            })
            .await?;

        if embedding.is_empty() {
            return Ok(vec![]);
        }

        self.repository
            .search_by_vector(&embedding, owner, candidates)
            .await
    }

    async fn run_channel(
        &self,
        channel: &'static str,
        search: impl Future<Output = Result<Vec<ScoredTab>>>,
    ) -> ChannelOutcome {
        match tokio::time::timeout(self.config.channel_timeout, search).await {
            Ok(Ok(hits)) => ChannelOutcome::Hits(hits),
            Ok(Err(SearchError::IndexUnavailable(reason))) => {
                tracing::warn!(channel, %reason, "search index unavailable");
                ChannelOutcome::IndexUnavailable
            }
            Ok(Err(e)) => {
                tracing::warn!(channel, error = %e, "search channel failed, treating as empty");
                ChannelOutcome::Failed
            }
            Err(_) => {
                tracing::warn!(
                    channel,
                    timeout = ?self.config.channel_timeout,
                    "search channel timed out, treating as empty"
                );
                ChannelOutcome::Failed
            }
        }
    }

    /// Case-insensitive substring match of the query terms over title,
    /// summary and url. Tabs matching more terms rank first, newest first
    /// among equals. A failing listing yields no hits.
    async fn keyword_fallback(
        &self,
        query: &str,
        owner: &OwnerId,
        limit: usize,
    ) -> Vec<ScoredTab> {
        let tabs = match self.repository.list_tab_summaries(owner).await {
            Ok(tabs) => tabs,
            Err(e) => {
                tracing::warn!(error = %e, "keyword fallback failed, treating as empty");
                return vec![];
            }
        };

        let lowered = query.to_lowercase();
        let terms: Vec<&str> = lowered.split_whitespace().collect();

        let mut hits: Vec<ScoredTab> = tabs
            .into_iter()
            .filter_map(|tab| {
                let matched = keyword_match(&tab, &terms);
                (matched > 0).then(|| ScoredTab {
                    tab,
                    score: matched as f64 / terms.len() as f64,
                })
            })
            .collect();
        // stable: keeps the newest-first listing order among equal scores
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        hits
    }
}

/// Number of `terms` found in any of the tab's text fields.
fn keyword_match(tab: &TabSummary, terms: &[&str]) -> usize {
    let fields: Vec<String> = [tab.title.as_deref(), tab.summary.as_deref(), Some(tab.url.as_str())]
        .into_iter()
        .flatten()
        .map(str::to_lowercase)
        .collect();

    terms
        .iter()
        .filter(|term| fields.iter().any(|field| field.contains(*term)))
        .count()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;

    use super::*;
    use crate::domain::models::{Tab, TabStatus};
    use crate::domain::search::embedder::MockEmbedder;
    use crate::repositories::MemoryTabStore;

    fn owner() -> OwnerId {
        OwnerId::new("user-1")
    }

    fn tab(id: &str, title: &str, summary: &str, embedding: Option<Vec<f32>>) -> Tab {
        let mut tab = Tab::new(id, "user-1", format!("https://{id}.example.com"));
        tab.title = Some(title.to_string());
        tab.summary = Some(summary.to_string());
        tab.embedding = embedding;
        tab
    }

    async fn store() -> MemoryTabStore {
        let store = MemoryTabStore::new();
        store
            .insert(tab(
                "stripe",
                "Stripe payments",
                "Online payment processing",
                Some(vec![1.0, 0.0, 0.0]),
            ))
            .await;
        store
            .insert(tab(
                "pasta",
                "Pasta recipes",
                "Italian cooking",
                Some(vec![0.0, 1.0, 0.0]),
            ))
            .await;
        store
            .insert(tab("ledger", "Ledger", "Personal finance and payment tracking", None))
            .await;
        store
    }

    fn service(
        embedder: MockEmbedder,
        repository: MemoryTabStore,
    ) -> SearchService<MockEmbedder, MemoryTabStore> {
        SearchService::new(
            embedder,
            repository,
            Arc::new(EmbeddingCache::new(100, None)),
            SearchConfig::default(),
        )
    }

    #[tokio::test]
    async fn hybrid_search_fuses_both_channels() {
        let service = service(MockEmbedder::returning(vec![1.0, 0.0, 0.0]), store().await);

        let response = service
            .search("payment", &owner(), Some(5), SearchWeights::default())
            .await
            .unwrap();

        assert_eq!(response.search_mode, SearchMode::Hybrid);
        assert_eq!(response.results[0].tab.id.as_str(), "stripe");
        assert_eq!(response.results[0].vector_rank, Some(1));
        assert!(response.results[0].text_rank.is_some());
        assert!(response
            .results
            .iter()
            .any(|r| r.tab.id.as_str() == "ledger" && r.vector_rank.is_none()));
    }

    #[tokio::test]
    async fn short_query_skips_embedding() {
        let embedder = MockEmbedder::returning(vec![1.0, 0.0, 0.0]);
        let service = service(embedder.clone(), store().await);

        service
            .search("ai", &owner(), None, SearchWeights::default())
            .await
            .unwrap();

        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn repeated_queries_hit_the_cache() {
        let embedder = MockEmbedder::returning(vec![1.0, 0.0, 0.0]);
        let service = service(embedder.clone(), store().await);

        let first = service
            .search("payments", &owner(), Some(5), SearchWeights::default())
            .await
            .unwrap();
        let second = service
            .search("  Payments ", &owner(), Some(5), SearchWeights::default())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(embedder.call_count(), 1);
        assert_eq!(service.cache_stats().await.hits, 1);
    }

    #[tokio::test]
    async fn failing_embedder_degrades_to_text_only() {
        let service = service(MockEmbedder::failing(), store().await);

        let response = service
            .search("payment", &owner(), Some(5), SearchWeights::default())
            .await
            .unwrap();

        assert_eq!(response.search_mode, SearchMode::Hybrid);
        assert!(!response.results.is_empty());
        assert!(response.results.iter().all(|r| r.vector_rank.is_none()));
    }

    #[tokio::test]
    async fn punctuation_only_query_returns_nothing() {
        let service = service(MockEmbedder::default(), store().await);
        let response = service
            .search("??", &owner(), None, SearchWeights::default())
            .await
            .unwrap();
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn blank_owner_is_rejected() {
        let service = service(MockEmbedder::default(), store().await);
        let err = service
            .search("payment", &OwnerId::new(" "), None, SearchWeights::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn discarded_tabs_are_not_vector_results() {
        let store = store().await;
        let mut discarded = tab("old", "Old payments page", "", Some(vec![1.0, 0.0, 0.0]));
        discarded.status = TabStatus::Discarded;
        store.insert(discarded).await;
        let service = service(MockEmbedder::returning(vec![1.0, 0.0, 0.0]), store);

        let response = service
            .search("payments", &owner(), Some(10), SearchWeights::from_blend(2.0))
            .await
            .unwrap();

        let old = response.results.iter().find(|r| r.tab.id.as_str() == "old");
        assert!(old.map_or(true, |r| r.vector_rank.is_none()));
    }

    /// Lexical index that is down, wrapping a working store for the rest.
    struct BrokenTextIndex {
        inner: MemoryTabStore,
        text_calls: AtomicUsize,
        listing_fails: bool,
    }

    impl BrokenTextIndex {
        async fn new(listing_fails: bool) -> Self {
            Self {
                inner: store().await,
                text_calls: AtomicUsize::new(0),
                listing_fails,
            }
        }
    }

    #[async_trait]
    impl SearchRepository for BrokenTextIndex {
        async fn search_by_vector(
            &self,
            embedding: &[f32],
            owner: &OwnerId,
            limit: usize,
        ) -> Result<Vec<ScoredTab>> {
            self.inner.search_by_vector(embedding, owner, limit).await
        }

        async fn search_by_text(
            &self,
            _query: &str,
            _owner: &OwnerId,
            _limit: usize,
        ) -> Result<Vec<ScoredTab>> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            Err(SearchError::IndexUnavailable("relation \"tabs\" does not exist".into()))
        }

        async fn list_tab_summaries(&self, owner: &OwnerId) -> Result<Vec<TabSummary>> {
            if self.listing_fails {
                return Err(SearchError::DatabaseError("connection reset".into()));
            }
            self.inner.list_tab_summaries(owner).await
        }
    }

    #[tokio::test]
    async fn unavailable_text_index_falls_back_to_keyword_mode() {
        let service = SearchService::new(
            MockEmbedder::failing(),
            BrokenTextIndex::new(false).await,
            Arc::new(EmbeddingCache::new(10, None)),
            SearchConfig::default(),
        );

        let response = service
            .search("FINANCE", &owner(), None, SearchWeights::default())
            .await
            .unwrap();

        assert_eq!(response.search_mode, SearchMode::Keyword);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].tab.id.as_str(), "ledger");
    }

    #[tokio::test]
    async fn keyword_fallback_is_fused_with_vector_hits() {
        let service = SearchService::new(
            MockEmbedder::returning(vec![1.0, 0.0, 0.0]),
            BrokenTextIndex::new(false).await,
            Arc::new(EmbeddingCache::new(10, None)),
            SearchConfig::default(),
        );

        let response = service
            .search("finance tracking", &owner(), None, SearchWeights::default())
            .await
            .unwrap();

        assert_eq!(response.search_mode, SearchMode::Keyword);
        let ledger = response
            .results
            .iter()
            .find(|r| r.tab.id.as_str() == "ledger")
            .expect("text-only match is kept");
        assert!(ledger.text_rank.is_some());
        assert!(ledger.vector_rank.is_none());
        assert!(response
            .results
            .iter()
            .any(|r| r.tab.id.as_str() == "stripe" && r.vector_rank == Some(1)));
    }

    #[tokio::test]
    async fn failing_keyword_fallback_degrades_instead_of_erroring() {
        let service = SearchService::new(
            MockEmbedder::failing(),
            BrokenTextIndex::new(true).await,
            Arc::new(EmbeddingCache::new(10, None)),
            SearchConfig::default(),
        );

        let response = service
            .search("finance", &owner(), None, SearchWeights::default())
            .await
            .unwrap();

        assert_eq!(response.search_mode, SearchMode::Keyword);
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn zero_max_limit_still_returns_one_result() {
        let service = SearchService::new(
            MockEmbedder::returning(vec![1.0, 0.0, 0.0]),
            store().await,
            Arc::new(EmbeddingCache::new(10, None)),
            SearchConfig {
                max_limit: 0,
                ..SearchConfig::default()
            },
        );

        let response = service
            .search("payment", &owner(), Some(5), SearchWeights::default())
            .await
            .unwrap();

        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn search_is_deterministic() {
        let service = service(MockEmbedder::returning(vec![0.5, 0.5, 0.0]), store().await);
        let first = service
            .search("payment recipes", &owner(), Some(10), SearchWeights::default())
            .await
            .unwrap();
        for _ in 0..3 {
            let again = service
                .search("payment recipes", &owner(), Some(10), SearchWeights::default())
                .await
                .unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn keyword_match_checks_url() {
        let summary = TabSummary {
            id: "t".into(),
            url: "https://docs.rs/tokio".into(),
            title: None,
            domain: None,
            summary: None,
            category: None,
            thumbnail_url: None,
            date_added: OffsetDateTime::now_utc(),
        };
        assert_eq!(keyword_match(&summary, &["docs.rs"]), 1);
        assert_eq!(keyword_match(&summary, &["serde"]), 0);
        assert_eq!(keyword_match(&summary, &["tokio", "serde"]), 1);
    }
}
