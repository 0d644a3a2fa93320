//! Gemini embedder implementation using the genai crate.

use async_trait::async_trait;
use genai::embed::EmbedOptions;

use crate::domain::search::traits::Embedder;
use crate::domain::search::types::EmbeddingTask;
use crate::domain::ProviderError;

/// Gemini embedding model configuration.
pub const GEMINI_MODEL: &str = "gemini-embedding-001";
pub const GEMINI_DIMENSIONS: usize = 1536;

/// Embedder implementation using Google's Gemini API via the `genai` crate.
///
/// The genai client automatically reads `GEMINI_API_KEY` from the environment.
///
/// # Example
///
/// ```ignore
/// let embedder = GeminiEmbedder::with_model(GEMINI_MODEL);
/// let embedding = embedder.embed("payment processing", EmbeddingTask::RetrievalQuery).await?;
/// assert_eq!(embedding.len(), 1536);
/// ```
#[derive(Clone)]
pub struct GeminiEmbedder {
    client: genai::Client,
    model: String,
}

impl GeminiEmbedder {
    /// Create a new Gemini embedder with a specific model.
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            client: genai::Client::default(),
            model: model.into(),
        }
    }

    /// Returns `None` if `GEMINI_API_KEY` is not set.
    pub fn try_from_env(model: &str) -> Option<Self> {
        std::env::var("GEMINI_API_KEY").ok()?;
        Some(Self::with_model(model))
    }

    fn options(task: EmbeddingTask) -> EmbedOptions {
        EmbedOptions::new()
            .with_embedding_type(task.as_str())
            .with_dimensions(GEMINI_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::Validation("cannot embed empty text".into()));
        }

        let response = self
            .client
            .embed(&self.model, text, Some(&Self::options(task)))
            .await
            .map_err(|e| ProviderError::from_message(e.to_string()))?;

        let embedding = response
            .first_embedding()
            .ok_or_else(|| ProviderError::InvalidResponse("No embedding in response".into()))?;

        Ok(embedding.vector().to_vec())
    }

    fn dimensions(&self) -> usize {
        GEMINI_DIMENSIONS
    }
}
