//! Collaborator Contracts
//!
//! The routing core talks to three external services through these traits:
//! - [`EmbeddingProvider`]: text -> fixed-length vector
//! - [`SegmentStore`]: ranked vector / full-text retrieval over segments
//! - [`LanguageModel`]: single-turn completion
//!
//! Implementations are injected into each component's constructor; the core
//! holds no ambient global state. Reference implementations live in
//! [`crate::store`] (SQLite), and behind the `embeddings` / `openai`
//! feature flags.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Infrastructure failure in one of the collaborator services.
///
/// These are retryable at the caller's discretion. The core itself never
/// retries within a single path execution to keep latency bounded; path
/// executors catch these at their boundary and degrade to a failed result.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Embedding provider call failed
    #[error("embedding provider error: {0}")]
    Embedding(String),
    /// Segment store call failed
    #[error("segment store error: {0}")]
    Store(String),
    /// Language model completion failed
    #[error("language model error: {0}")]
    Completion(String),
}

/// Provider result type
pub type Result<T> = std::result::Result<T, ProviderError>;

// ============================================================================
// RETRIEVAL RECORDS
// ============================================================================

/// One segment returned by a single retrieval method.
///
/// `score` carries that method's native scale: vector search reports a
/// distance (lower = closer), text search reports a lexical relevance rank
/// (higher = better). The scales never mix - fusion is rank-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub segment_id: i64,
    pub document_id: i64,
    /// 1-based position of the segment within its document
    pub ordinal: i64,
    pub text: String,
    pub title: String,
    pub score: f32,
}

/// One document returned by the probe's document-level prefilter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentHit {
    pub document_id: i64,
    pub title: String,
    /// Embedding distance to the query (lower = closer)
    pub distance: f32,
}

// ============================================================================
// TRAITS
// ============================================================================

/// Produces dense embeddings for queries and segments.
///
/// Must be deterministic enough for caching; the core does not require
/// caching but [`crate::cache::CachedEmbedder`] provides it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Ranked retrieval over the immutable segment corpus.
///
/// The store is assumed to support ordering natively (a distance operator
/// and a lexical ranking function); the core does not reimplement indexing.
/// An empty result set is a valid non-error outcome, distinct from a
/// failed call.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Segments ordered by ascending embedding distance to `embedding`,
    /// optionally restricted to a set of documents.
    async fn vector_nearest(
        &self,
        embedding: &[f32],
        limit: usize,
        scope: Option<&[i64]>,
    ) -> Result<Vec<SearchHit>>;

    /// Segments ordered by descending lexical relevance to `query`,
    /// optionally restricted to a set of documents.
    async fn text_match(
        &self,
        query: &str,
        limit: usize,
        scope: Option<&[i64]>,
    ) -> Result<Vec<SearchHit>>;

    /// Documents ordered by ascending embedding distance to `embedding`.
    /// Used by the probe's prefilter to bound cost on large corpora.
    async fn document_nearest(&self, embedding: &[f32], limit: usize)
        -> Result<Vec<DocumentHit>>;

    /// All segments of one document in ordinal order. Used by the
    /// map-reduce full-document analysis pass.
    async fn segments_of_document(&self, document_id: i64) -> Result<Vec<SearchHit>>;
}

/// Single-turn completion against a language model.
///
/// Synchronous from the caller's perspective; token-level streaming is a
/// UI concern layered elsewhere.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String>;
}
