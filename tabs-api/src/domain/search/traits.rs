//! Trait definitions for search domain abstractions.
//!
//! These traits enable dependency injection and easy testing through mocking.

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{EmbeddingTask, ScoredTab, TabSummary};
use crate::domain::{models::OwnerId, ProviderError};

/// Error type for search operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Embedding generation failed: {0}")]
    EmbeddingError(#[from] ProviderError),

    #[error("Database error: {0}")]
    DatabaseError(String),

    /// The backing index cannot be queried at all (missing table, no connection).
    #[error("Search index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("{0}")]
    Other(String),
}

impl From<sqlx::Error> for SearchError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                SearchError::IndexUnavailable(e.to_string())
            }
            // undefined_table, undefined_function (e.g. missing extension)
            sqlx::Error::Database(db)
                if matches!(db.code().as_deref(), Some("42P01") | Some("42883")) =>
            {
                SearchError::IndexUnavailable(e.to_string())
            }
            _ => SearchError::DatabaseError(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

/// Trait for text embedding generation.
///
/// Abstracts the embedding provider (Gemini, mocks) for easy testing.
///
/// # Example
///
/// ```ignore
/// let embedder = GeminiEmbedder::with_model(GEMINI_MODEL);
/// let embedding = embedder.embed("payment processing", EmbeddingTask::RetrievalQuery).await?;
/// assert_eq!(embedding.len(), embedder.dimensions());
/// ```
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(
        &self,
        text: &str,
        task: EmbeddingTask,
    ) -> std::result::Result<Vec<f32>, ProviderError>;

    /// Returns the embedding dimensions for this embedder.
    fn dimensions(&self) -> usize;
}

/// Read side of the tab index.
///
/// Every method is scoped to one owner.
#[async_trait]
pub trait SearchRepository: Send + Sync {
    /// Nearest tabs by cosine similarity, most similar first.
    ///
    /// Discarded tabs and tabs without an embedding are never returned.
    async fn search_by_vector(
        &self,
        embedding: &[f32],
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ScoredTab>>;

    /// BM25-style full-text ranking over title, url, domain, summary and category.
    async fn search_by_text(
        &self,
        query: &str,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ScoredTab>>;

    /// All of the owner's tabs, newest first. Used for the keyword fallback.
    async fn list_tab_summaries(&self, owner: &OwnerId) -> Result<Vec<TabSummary>>;
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    async fn embed(
        &self,
        text: &str,
        task: EmbeddingTask,
    ) -> std::result::Result<Vec<f32>, ProviderError> {
        (**self).embed(text, task).await
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }
}

#[async_trait]
impl<T: SearchRepository + ?Sized> SearchRepository for Arc<T> {
    async fn search_by_vector(
        &self,
        embedding: &[f32],
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ScoredTab>> {
        (**self).search_by_vector(embedding, owner, limit).await
    }

    async fn search_by_text(
        &self,
        query: &str,
        owner: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ScoredTab>> {
        (**self).search_by_text(query, owner, limit).await
    }

    async fn list_tab_summaries(&self, owner: &OwnerId) -> Result<Vec<TabSummary>> {
        (**self).list_tab_summaries(owner).await
    }
}
