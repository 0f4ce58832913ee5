//! Hybrid Search (Vector + Full-Text + RRF)
//!
//! Combines vector similarity and full-text retrieval using Reciprocal
//! Rank Fusion, then groups fused hits by owning document. RRF is
//! rank-based, not score-based: it rewards segments ranked well by either
//! method (and especially by both) while staying robust to the two
//! methods' absolute score scales differing.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::{format_snippet, ContextBlock, ContextBundle};
use crate::providers::{EmbeddingProvider, Result, SearchHit, SegmentStore};

/// RRF smoothing constant. Dampens the influence of top ranks so a single
/// method cannot dominate the fused ordering.
pub const RRF_K: f32 = 60.0;

// ============================================================================
// TUNING
// ============================================================================

/// Retrieval tuning for one hybrid search call.
///
/// The engine's behavior never branches on mode; the two operating modes
/// differ only in these constants.
#[derive(Debug, Clone)]
pub struct SearchTuning {
    pub vector_limit: usize,
    pub text_limit: usize,
    pub max_docs: usize,
    pub max_snippets_per_doc: usize,
    pub vector_weight: f32,
    pub text_weight: f32,
    /// Restrict retrieval to one document
    pub scope: Option<i64>,
}

impl SearchTuning {
    /// Broad multi-document retrieval for general queries.
    pub fn multi_document() -> Self {
        Self {
            vector_limit: 30,
            text_limit: 30,
            max_docs: 5,
            max_snippets_per_doc: 3,
            vector_weight: 0.7,
            text_weight: 0.3,
            scope: None,
        }
    }

    /// Retrieval scoped to one pinned document, with a larger per-document
    /// snippet allowance.
    pub fn single_document(document_id: i64) -> Self {
        Self {
            vector_limit: 20,
            text_limit: 20,
            max_docs: 3,
            max_snippets_per_doc: 5,
            vector_weight: 0.7,
            text_weight: 0.3,
            scope: Some(document_id),
        }
    }

    /// SHORT-path tuning from configuration; `short_alpha` is the vector
    /// weight.
    pub fn short_path(config: &crate::config::RoutingConfig, scope: Option<i64>) -> Self {
        Self {
            vector_limit: config.short_vector_limit,
            text_limit: config.short_text_limit,
            max_docs: config.short_top_docs,
            max_snippets_per_doc: config.short_per_doc,
            vector_weight: config.short_alpha,
            text_weight: 1.0 - config.short_alpha,
            scope,
        }
    }
}

// ============================================================================
// FUSION
// ============================================================================

/// A search hit enriched with its fused score and per-method ranks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedResult {
    pub segment_id: i64,
    pub document_id: i64,
    pub ordinal: i64,
    pub text: String,
    pub title: String,
    pub rrf_score: f32,
    /// 1-based rank in the vector list, or `len + 1` if absent
    pub vector_rank: usize,
    /// 1-based rank in the text list, or `len + 1` if absent
    pub text_rank: usize,
}

/// Fuse two ranked hit lists with weighted Reciprocal Rank Fusion.
///
/// For each segment in either list:
/// `score = vector_weight / (K + rank_v) + text_weight / (K + rank_t)`
/// where an absent segment takes rank `len + 1` in that list. Every
/// segment appearing in either input appears exactly once in the output,
/// sorted descending by score.
pub fn fuse(
    vector_hits: &[SearchHit],
    text_hits: &[SearchHit],
    vector_weight: f32,
    text_weight: f32,
) -> Vec<FusedResult> {
    let vector_map: HashMap<i64, (usize, &SearchHit)> = vector_hits
        .iter()
        .enumerate()
        .map(|(i, hit)| (hit.segment_id, (i + 1, hit)))
        .collect();
    let text_map: HashMap<i64, (usize, &SearchHit)> = text_hits
        .iter()
        .enumerate()
        .map(|(i, hit)| (hit.segment_id, (i + 1, hit)))
        .collect();

    let default_vector_rank = vector_hits.len() + 1;
    let default_text_rank = text_hits.len() + 1;

    let mut combined: Vec<FusedResult> = Vec::with_capacity(vector_map.len() + text_map.len());
    let mut seen: Vec<i64> = Vec::new();
    for hit in vector_hits.iter().chain(text_hits.iter()) {
        if seen.contains(&hit.segment_id) {
            continue;
        }
        seen.push(hit.segment_id);

        let vector_rank = vector_map
            .get(&hit.segment_id)
            .map(|(rank, _)| *rank)
            .unwrap_or(default_vector_rank);
        let text_rank = text_map
            .get(&hit.segment_id)
            .map(|(rank, _)| *rank)
            .unwrap_or(default_text_rank);

        let rrf_score = vector_weight / (RRF_K + vector_rank as f32)
            + text_weight / (RRF_K + text_rank as f32);

        combined.push(FusedResult {
            segment_id: hit.segment_id,
            document_id: hit.document_id,
            ordinal: hit.ordinal,
            text: hit.text.clone(),
            title: hit.title.clone(),
            rrf_score,
            vector_rank,
            text_rank,
        });
    }

    combined.sort_by(|a, b| {
        b.rrf_score
            .partial_cmp(&a.rrf_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    combined
}

// ============================================================================
// GROUPING
// ============================================================================

/// Group fused results into per-document context blocks.
///
/// Iterates in fused score order; block order follows each document's
/// first appearance. A document contributes at most `max_snippets_per_doc`
/// snippets, and no new document is started once `max_docs` blocks exist.
pub fn group_by_document(
    results: &[FusedResult],
    max_docs: usize,
    max_snippets_per_doc: usize,
) -> Vec<ContextBlock> {
    let mut blocks: Vec<ContextBlock> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for result in results {
        let slot = match index.get(&result.document_id) {
            Some(&slot) => slot,
            None => {
                if blocks.len() >= max_docs {
                    continue;
                }
                blocks.push(ContextBlock {
                    document_id: result.document_id,
                    title: result.title.clone(),
                    snippets: Vec::new(),
                });
                index.insert(result.document_id, blocks.len() - 1);
                blocks.len() - 1
            }
        };

        if blocks[slot].snippets.len() < max_snippets_per_doc {
            blocks[slot]
                .snippets
                .push(format_snippet(result.ordinal, &result.text));
        }
    }

    // Defensive: iteration order means a started block always has at least
    // one snippet, but empty blocks must never reach the serializer.
    blocks.retain(|b| !b.snippets.is_empty());
    blocks
}

// ============================================================================
// ENGINE
// ============================================================================

/// Hybrid retrieval engine over an injected store and embedder.
///
/// Used by every other routing component: the probe samples through the
/// same store contract, and both path executors build their context here.
#[derive(Clone)]
pub struct HybridSearchEngine {
    store: Arc<dyn SegmentStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl HybridSearchEngine {
    pub fn new(store: Arc<dyn SegmentStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Segments ordered by ascending embedding distance.
    pub async fn vector_search(
        &self,
        embedding: &[f32],
        limit: usize,
        scope: Option<&[i64]>,
    ) -> Result<Vec<SearchHit>> {
        self.store.vector_nearest(embedding, limit, scope).await
    }

    /// Segments ordered by descending lexical relevance.
    pub async fn text_search(
        &self,
        query: &str,
        limit: usize,
        scope: Option<&[i64]>,
    ) -> Result<Vec<SearchHit>> {
        self.store.text_match(query, limit, scope).await
    }

    /// Full hybrid pass: embed once, run both retrieval legs concurrently,
    /// fuse, and group into a context bundle.
    ///
    /// The two legs read disjoint indexes over the same store; either leg
    /// failing fails the call. Zero hits from both is a valid empty bundle.
    pub async fn build_context(&self, query: &str, tuning: &SearchTuning) -> Result<ContextBundle> {
        let embedding = self.embedder.embed(query).await?;

        let scope_docs: Option<[i64; 1]> = tuning.scope.map(|id| [id]);
        let scope = scope_docs.as_ref().map(|s| s.as_slice());
        let (vector_hits, text_hits) = tokio::join!(
            self.store
                .vector_nearest(&embedding, tuning.vector_limit, scope),
            self.store.text_match(query, tuning.text_limit, scope),
        );
        let vector_hits = vector_hits?;
        let text_hits = text_hits?;

        tracing::debug!(
            vector = vector_hits.len(),
            text = text_hits.len(),
            scope = ?tuning.scope,
            "hybrid retrieval legs complete"
        );

        let fused = fuse(
            &vector_hits,
            &text_hits,
            tuning.vector_weight,
            tuning.text_weight,
        );
        let blocks = group_by_document(&fused, tuning.max_docs, tuning.max_snippets_per_doc);

        Ok(ContextBundle::new(query, blocks))
    }
}

// ============================================================================
// TESTS
// ============================================================================
