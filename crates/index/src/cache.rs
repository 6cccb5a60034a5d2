use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::embeddings::Embedder;

struct CachedVector {
    vector: Vec<f32>,
    stored_at: Instant,
}

/// Wraps an embedder with a TTL cache keyed by the text's sha256
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    embeddings: DashMap<String, CachedVector>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner,
            embeddings: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// 24h TTL, 10k entries
    pub fn with_defaults(inner: Arc<dyn Embedder>) -> Self {
        Self::new(inner, Duration::from_secs(24 * 60 * 60), 10_000)
    }

    fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn get(&self, key: &str) -> Option<Vec<f32>> {
        let fresh = {
            let entry = self.embeddings.get(key)?;
            if entry.stored_at.elapsed() <= self.ttl {
                Some(entry.vector.clone())
            } else {
                None
            }
        };
        if fresh.is_none() {
            self.embeddings.remove(key);
        }
        fresh
    }

    fn set(&self, key: String, vector: Vec<f32>) {
        if self.embeddings.len() >= self.max_entries {
            // Expired entries go first, then 25% of whatever is left
            self.embeddings.retain(|_, v| v.stored_at.elapsed() <= self.ttl);
            if self.embeddings.len() >= self.max_entries {
                let to_remove: Vec<_> = self.embeddings.iter()
                    .take((self.max_entries / 4).max(1))
                    .map(|r| r.key().clone())
                    .collect();
                for key in to_remove {
                    self.embeddings.remove(&key);
                }
            }
        }
        self.embeddings.insert(key, CachedVector {
            vector,
            stored_at: Instant::now(),
        });
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            embeddings_cached: self.embeddings.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.embeddings.clear();
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::hash_text(text);
        if let Some(vector) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(vector);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let vector = self.inner.encode(text).await?;
        self.set(key, vector.clone());
        Ok(vector)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub embeddings_cached: usize,
    pub hits: usize,
    pub misses: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting(AtomicUsize);

    #[async_trait]
    impl Embedder for Counting {
        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32])
        }
    }

    #[tokio::test]
    async fn test_cache_hits_skip_inner() {
        let inner = Arc::new(Counting(AtomicUsize::new(0)));
        let cache = CachedEmbedder::with_defaults(inner.clone());

        assert_eq!(cache.encode("abc").await.unwrap(), vec![3.0]);
        assert_eq!(cache.encode("abc").await.unwrap(), vec![3.0]);
        assert_eq!(inner.0.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[tokio::test]
    async fn test_expired_entries_are_recomputed() {
        let inner = Arc::new(Counting(AtomicUsize::new(0)));
        let cache = CachedEmbedder::new(inner.clone(), Duration::ZERO, 10);

        cache.encode("abc").await.unwrap();
        std::thread::sleep(Duration::from_millis(2));
        cache.encode("abc").await.unwrap();
        assert_eq!(inner.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_eviction_bounds_size() {
        let inner = Arc::new(Counting(AtomicUsize::new(0)));
        let cache = CachedEmbedder::new(inner, Duration::from_secs(60), 4);

        for i in 0..10 {
            cache.encode(&format!("text {}", i)).await.unwrap();
        }
        assert!(cache.stats().embeddings_cached <= 4);
    }
}
