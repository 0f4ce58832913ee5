//! Query Embedding Cache
//!
//! One orchestration embeds the same query for the probe and again for
//! each retrieval pass. Wrapping the embedding provider in a small LRU
//! keeps that to a single provider call per distinct text.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lru::LruCache;

use crate::providers::{EmbeddingProvider, ProviderError, Result};

/// Default number of cached query embeddings.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// LRU-caching wrapper around any [`EmbeddingProvider`].
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(hit) = self
            .cache
            .lock()
            .map_err(|e| ProviderError::Embedding(format!("cache lock poisoned: {e}")))?
            .get(text)
            .cloned()
        {
            return Ok(hit);
        }

        let embedding = self.inner.embed(text).await?;

        self.cache
            .lock()
            .map_err(|e| ProviderError::Embedding(format!("cache lock poisoned: {e}")))?
            .put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    /// Batches come from ingestion pipelines, not repeated queries; they
    /// bypass the cache.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.inner.embed_batch(texts).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
