use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::models::{OwnerId, Tab, TabId, TabUpdate};
use crate::domain::search::{
    lexical::{bm25_rank, WeightedField},
    ScoredTab, SearchError, SearchRepository, TabSummary,
};

use super::{repo_error::RepositoryError, tab_repo::TabRepository};

const TITLE_BOOST: f64 = 2.0;
const CATEGORY_BOOST: f64 = 1.5;
const DOMAIN_BOOST: f64 = 1.5;
const SUMMARY_BOOST: f64 = 1.0;
const URL_BOOST: f64 = 1.0;

/// Process-local tab store implementing both the persistence and the index
/// interfaces. Used when no database is configured, and in tests.
#[derive(Clone, Default)]
pub struct MemoryTabStore {
    tabs: Arc<RwLock<HashMap<TabId, Tab>>>,
}

impl MemoryTabStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tab.
    pub async fn insert(&self, tab: Tab) {
        self.tabs.write().await.insert(tab.id.clone(), tab);
    }

    pub async fn get(&self, id: &TabId) -> Option<Tab> {
        self.tabs.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &TabId) -> Option<Tab> {
        self.tabs.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.tabs.read().await.len()
    }

    async fn owned_by(&self, owner: &OwnerId) -> Vec<Tab> {
        let mut tabs: Vec<Tab> = self
            .tabs
            .read()
            .await
            .values()
            .filter(|tab| &tab.owner_id == owner)
            .cloned()
            .collect();
        tabs.sort_by(newest_first);
        tabs
    }
}

fn newest_first(a: &Tab, b: &Tab) -> Ordering {
    b.date_added.cmp(&a.date_added).then_with(|| a.id.cmp(&b.id))
}

/// Cosine similarity; `None` when the dimensions differ or a vector is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[async_trait]
impl TabRepository for MemoryTabStore {
    async fn get_tabs_by_ids(
        &self,
        ids: &[TabId],
        owner: &OwnerId,
    ) -> Result<Vec<Tab>, RepositoryError> {
        let tabs = self.tabs.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tabs.get(id))
            .filter(|tab| &tab.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn update_tab(&self, id: &TabId, update: &TabUpdate) -> Result<u64, RepositoryError> {
        if update.is_empty() {
            return Ok(0);
        }
        let mut tabs = self.tabs.write().await;
        match tabs.get_mut(id) {
            Some(tab) => {
                update.apply_to(tab);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn list_tabs(&self, owner: &OwnerId) -> Result<Vec<Tab>, RepositoryError> {
        Ok(self.owned_by(owner).await)
    }
}

#[async_trait]
impl SearchRepository for MemoryTabStore {
    async fn search_by_vector(
        &self,
        embedding: &[f32],
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ScoredTab>, SearchError> {
        let tabs = self.owned_by(owner).await;
        let mut hits: Vec<ScoredTab> = tabs
            .iter()
            .filter(|tab| tab.is_vector_searchable())
            .filter_map(|tab| {
                let score = cosine_similarity(embedding, tab.embedding.as_deref()?)?;
                Some(ScoredTab {
                    tab: TabSummary::from(tab),
                    score,
                })
            })
            .collect();

        // Stable sort keeps newest-first among equal scores.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn search_by_text(
        &self,
        query: &str,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ScoredTab>, SearchError> {
        let tabs = self.owned_by(owner).await;
        let documents: Vec<Vec<WeightedField<'_>>> = tabs
            .iter()
            .map(|tab| {
                vec![
                    WeightedField::new(tab.title.as_deref().unwrap_or_default(), TITLE_BOOST),
                    WeightedField::new(tab.category.as_deref().unwrap_or_default(), CATEGORY_BOOST),
                    WeightedField::new(tab.domain.as_deref().unwrap_or_default(), DOMAIN_BOOST),
                    WeightedField::new(tab.summary.as_deref().unwrap_or_default(), SUMMARY_BOOST),
                    WeightedField::new(&tab.url, URL_BOOST),
                ]
            })
            .collect();

        Ok(bm25_rank(query, &documents)
            .into_iter()
            .take(limit)
            .map(|(idx, score)| ScoredTab {
                tab: TabSummary::from(&tabs[idx]),
                score,
            })
            .collect())
    }

    async fn list_tab_summaries(&self, owner: &OwnerId) -> Result<Vec<TabSummary>, SearchError> {
        Ok(self.owned_by(owner).await.iter().map(TabSummary::from).collect())
    }
}
