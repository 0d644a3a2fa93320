use std::{
    future::Future,
    num::NonZeroUsize,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use lru::LruCache;
use serde::Serialize;
use tokio::{sync::Mutex, time::Instant};

use super::types::EmbeddingTask;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(500) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

type CacheKey = (String, EmbeddingTask);

struct CacheEntry {
    vector: Vec<f32>,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

/// Bounded LRU cache of embeddings keyed by normalized text and task.
///
/// Repeated queries skip the provider round trip. Failed computations are
/// never stored.
pub struct EmbeddingCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached embedding for `(text, task)` or compute and store it.
    ///
    /// `compute` receives the caller's text as given; only the cache key is
    /// normalized.
    ///
    /// The lock is released while `compute` runs, so two concurrent misses
    /// on the same key may both reach the provider. The second write wins.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        text: &str,
        task: EmbeddingTask,
        compute: F,
    ) -> Result<Vec<f32>, E>
    where
        F: FnOnce(String, EmbeddingTask) -> Fut,
        Fut: Future<Output = Result<Vec<f32>, E>>,
    {
        let key = (normalize(text), task);

        {
            let mut entries = self.entries.lock().await;
            let expired = match entries.get(&key) {
                Some(entry) if !self.is_expired(entry) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.vector.clone());
                }
                Some(_) => true,
                None => false,
            };
            if expired {
                entries.pop(&key);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let vector = compute(text.to_string(), task).await?;

        let mut entries = self.entries.lock().await;
        if let Some((evicted, _)) = entries.push(
            key.clone(),
            CacheEntry {
                vector: vector.clone(),
                inserted_at: Instant::now(),
            },
        ) {
            if evicted != key {
                tracing::trace!(text = %evicted.0, "evicted embedding from cache");
            }
        }

        Ok(vector)
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: entries.len(),
            capacity: entries.cap().get(),
        }
    }

    /// Drop all entries. Counters are kept.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.inserted_at.elapsed() >= ttl)
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    async fn cached(
        cache: &EmbeddingCache,
        text: &str,
        calls: &AtomicUsize,
    ) -> Result<Vec<f32>, String> {
        cache
            .get_or_compute(text, EmbeddingTask::RetrievalQuery, |t, _| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![t.len() as f32])
            })
            .await
    }

    #[tokio::test]
    async fn computes_once_per_normalized_key() {
        let cache = EmbeddingCache::new(10, None);
        let calls = AtomicUsize::new(0);

        let first = cached(&cache, "Payment APIs", &calls).await.unwrap();
        let second = cached(&cache, "  payment apis ", &calls).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats().await;
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
    }

    #[tokio::test]
    async fn compute_sees_the_original_text() {
        let cache = EmbeddingCache::new(10, None);

        let mut received = None;
        let slot = &mut received;
        cache
            .get_or_compute("Rust Async Book", EmbeddingTask::RetrievalQuery, |t, _| async move {
                *slot = Some(t);
                Ok::<_, String>(vec![1.0])
            })
            .await
            .unwrap();
        assert_eq!(received.as_deref(), Some("Rust Async Book"));
    }

    #[tokio::test]
    async fn task_is_part_of_the_key() {
        let cache = EmbeddingCache::new(10, None);
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for task in [EmbeddingTask::RetrievalQuery, EmbeddingTask::RetrievalDocument] {
            cache
                .get_or_compute("stripe", task, |_, _| async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(vec![1.0])
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn never_exceeds_capacity_and_evicts_lru() {
        let cache = EmbeddingCache::new(2, None);
        let calls = AtomicUsize::new(0);

        cached(&cache, "a", &calls).await.unwrap();
        cached(&cache, "b", &calls).await.unwrap();
        // Touch "a" so "b" becomes least recently used.
        cached(&cache, "a", &calls).await.unwrap();
        cached(&cache, "c", &calls).await.unwrap();

        assert_eq!(cache.stats().await.size, 2);

        cached(&cache, "a", &calls).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        cached(&cache, "b", &calls).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(cache.stats().await.size <= 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = EmbeddingCache::new(10, None);

        let err = cache
            .get_or_compute("query", EmbeddingTask::RetrievalQuery, |_, _| async {
                Err::<Vec<f32>, _>("provider down")
            })
            .await;
        assert_eq!(err, Err("provider down"));
        assert_eq!(cache.stats().await.size, 0);

        let calls = AtomicUsize::new(0);
        cached(&cache, "query", &calls).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_recomputed() {
        let cache = EmbeddingCache::new(10, Some(Duration::from_secs(60)));
        let calls = AtomicUsize::new(0);

        cached(&cache, "stale", &calls).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        cached(&cache, "stale", &calls).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().await.misses, 2);
    }

    #[tokio::test]
    async fn clear_keeps_counters() {
        let cache = EmbeddingCache::new(10, None);
        let calls = AtomicUsize::new(0);
        cached(&cache, "x", &calls).await.unwrap();
        cache.clear().await;

        let stats = cache.stats().await;
        assert_eq!(stats.size, 0);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.capacity, 10);
    }
}
