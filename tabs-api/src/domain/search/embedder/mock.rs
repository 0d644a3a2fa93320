//! Mock embedder implementation for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::search::traits::Embedder;
use crate::domain::search::types::EmbeddingTask;
use crate::domain::ProviderError;

/// Mock embedder that returns configurable vectors.
///
/// # Examples
///
/// ```ignore
/// // Return a fixed vector
/// let embedder = MockEmbedder::returning(vec![0.1; 768]);
///
/// // Fail every call like an unreachable provider
/// let embedder = MockEmbedder::failing();
/// ```
#[derive(Clone)]
pub struct MockEmbedder {
    responses: Arc<Vec<Vec<f32>>>,
    error: Option<ProviderError>,
    call_count: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<(String, EmbeddingTask)>>>,
    dimensions: usize,
}

impl MockEmbedder {
    /// Create a mock that always returns the same vector.
    pub fn returning(vector: Vec<f32>) -> Self {
        Self::with_sequence(vec![vector])
    }

    /// Create a mock that returns vectors in sequence.
    ///
    /// Wraps around if more calls are made than vectors provided.
    pub fn with_sequence(vectors: Vec<Vec<f32>>) -> Self {
        let dims = vectors.first().map(|v| v.len()).unwrap_or(3);
        Self {
            responses: Arc::new(vectors),
            error: None,
            call_count: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(vec![])),
            dimensions: dims,
        }
    }

    /// Create a mock whose every call fails with a network error.
    pub fn failing() -> Self {
        Self::failing_with(ProviderError::Network("connection refused".into()))
    }

    pub fn failing_with(error: ProviderError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Get the number of times `embed` was called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Texts and tasks received, in call order.
    pub fn calls(&self) -> Vec<(String, EmbeddingTask)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::returning(vec![0.0, 0.0, 1.0])
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>, ProviderError> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push((text.to_string(), task));

        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        let response_idx = idx % self.responses.len();
        Ok(self.responses[response_idx].clone())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUERY: EmbeddingTask = EmbeddingTask::RetrievalQuery;

    #[tokio::test]
    async fn mock_returns_fixed_vector() {
        let embedder = MockEmbedder::returning(vec![1.0, 2.0, 3.0]);

        let result = embedder.embed("test", QUERY).await.unwrap();
        assert_eq!(result, vec![1.0, 2.0, 3.0]);

        let result = embedder.embed("another", QUERY).await.unwrap();
        assert_eq!(result, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn mock_returns_sequence() {
        let embedder = MockEmbedder::with_sequence(vec![vec![1.0], vec![2.0]]);

        assert_eq!(embedder.embed("a", QUERY).await.unwrap(), vec![1.0]);
        assert_eq!(embedder.embed("b", QUERY).await.unwrap(), vec![2.0]);
        // Wraps around
        assert_eq!(embedder.embed("c", QUERY).await.unwrap(), vec![1.0]);
    }

    #[tokio::test]
    async fn mock_records_calls() {
        let embedder = MockEmbedder::failing();

        assert!(embedder
            .embed("doc", EmbeddingTask::RetrievalDocument)
            .await
            .is_err());
        assert_eq!(embedder.call_count(), 1);
        assert_eq!(
            embedder.calls(),
            vec![("doc".to_string(), EmbeddingTask::RetrievalDocument)]
        );
    }
}
