//! Hybrid semantic + full-text search over a user's saved tabs.
//!
//! This module provides a search system that combines:
//! - **Vector search** via pgvector (or the in-memory store) + Gemini embeddings
//! - **Lexical search** via PostgreSQL tsvector or in-memory BM25
//! - **Position-based fusion** of both ranked lists with adjustable weights
//!
//! # Architecture
//!
//! The search system is built around trait abstractions for testability:
//!
//! - [`Embedder`] - Text embedding generation (Gemini, mocks)
//! - [`SearchRepository`] - Index queries (PostgreSQL, in-memory)
//!
//! Query embeddings go through a shared [`EmbeddingCache`] so repeated
//! queries do not reach the provider. [`analyze`] decides per query which
//! channels are worth running.
//!
//! # Example
//!
//! ```ignore
//! let cache = Arc::new(EmbeddingCache::new(500, Some(Duration::from_secs(3600))));
//! let service = SearchService::new(embedder, repository, cache, SearchConfig::default());
//!
//! let response = service
//!     .search("finance", &owner, Some(20), SearchWeights::from_blend(1.4))
//!     .await?;
//! ```

mod analyzer;
mod cache;
mod fusion;
mod service;
mod traits;
mod types;

pub mod embedder;
pub mod lexical;
pub mod repository;

pub use analyzer::{analyze, QueryAnalysis};
pub use cache::{CacheStats, EmbeddingCache};
pub use fusion::{fuse, position_score};
pub use service::{SearchConfig, SearchService};
pub use traits::{Embedder, SearchError, SearchRepository};
pub use types::{
    EmbeddingTask, HybridResult, ScoredTab, SearchMode, SearchResponse, SearchWeights,
    TabSummary,
};
