//! Routing Probe
//!
//! Cheap, sampled preview of retrieval quality for a query, computed
//! before committing to a full pipeline. This is an estimator, not an
//! exact computation: it trades a little retrieval recall for a large
//! latency saving by prefiltering to a handful of candidate documents and
//! sampling a few hits per retrieval method inside that scope.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::config::RoutingConfig;
use crate::providers::{EmbeddingProvider, Result, SegmentStore};

// ============================================================================
// SIGNALS
// ============================================================================

/// Scalar summary of retrieval quality for one query.
///
/// Computed fresh per query and never persisted. The debug counters feed
/// routing diagnostics only; the router consumes the six named signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSignals {
    /// Mean `1 - distance` over sampled vector hits, clamped to [0, 1]
    pub avg_vec_sim: f32,
    /// Sampled text hits over the theoretical maximum lexical coverage
    pub fts_hit_rate: f32,
    /// Share of sampled hits concentrated in the single best document
    pub top_doc_share: f32,
    /// Distinct documents across the sampled union
    pub unique_docs: usize,
    /// Query contains quoted strings or precise ID/section references
    pub has_quotes_or_ids: bool,
    /// Query contains temporal or comparison language
    pub has_compare_temporal_conditions: bool,

    // Debug info
    pub doc_counts: HashMap<i64, usize>,
    pub total_candidates: usize,
    pub vector_candidates: usize,
    pub fts_candidates: usize,
}

impl ProbeSignals {
    /// Signals for a query whose document prefilter found nothing.
    ///
    /// Numeric signals take degenerate defaults (which score low and route
    /// toward LONG); pattern flags are still computed from the raw text.
    fn degenerate(has_quotes_or_ids: bool, has_compare_temporal_conditions: bool) -> Self {
        Self {
            avg_vec_sim: 0.0,
            fts_hit_rate: 0.0,
            top_doc_share: 1.0,
            unique_docs: 0,
            has_quotes_or_ids,
            has_compare_temporal_conditions,
            doc_counts: HashMap::new(),
            total_candidates: 0,
            vector_candidates: 0,
            fts_candidates: 0,
        }
    }
}

// ============================================================================
// QUERY PATTERN DETECTION
// ============================================================================

fn quote_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r#""[^"]*""#,                                  // quoted strings
            r"'[^']*'",                                    // single quoted strings
            r"(?i)\b(?:id|identifier)\s*[:\-]?\s*\w+",     // ID references
            r"(?i)\b(?:section|page|paragraph)\s+\d+",     // section references
            r"(?i)\b(?:article|clause|item)\s+\d+",        // article references
        ])
        .expect("quote patterns are valid")
    })
}

fn temporal_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r"(?i)\b(?:before|after|since|until|during)\b",
            r"(?i)\b(?:compare|comparison|versus|vs|difference)\b",
            r"(?i)\b(?:earlier|later|previous|next|recent)\b",
            r"(?i)\b(?:first|last|initial|final)\b",
            r"(?i)\b(?:older|newer|latest|earliest)\b",
            r"\b\d{4}\b", // years
            r"(?i)\b(?:january|february|march|april|may|june|july|august|september|october|november|december)\b",
        ])
        .expect("temporal patterns are valid")
    })
}

/// Detect precise-reference and temporal/comparison query patterns.
///
/// Returns `(has_quotes_or_ids, has_compare_temporal_conditions)`.
pub fn detect_query_patterns(query: &str) -> (bool, bool) {
    (
        quote_patterns().is_match(query),
        temporal_patterns().is_match(query),
    )
}

// ============================================================================
// PROBE
// ============================================================================

/// Computes [`ProbeSignals`] against an injected store and embedder.
#[derive(Clone)]
pub struct SignalProbe {
    store: Arc<dyn SegmentStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SignalProbe {
    pub fn new(store: Arc<dyn SegmentStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Run the probe: embed once, prefilter documents, sample a few hits
    /// per retrieval method within that scope, derive signals.
    pub async fn compute(&self, query: &str, config: &RoutingConfig) -> Result<ProbeSignals> {
        let (has_quotes_or_ids, has_compare_temporal) = detect_query_patterns(query);

        // Step 1: embed the query once
        let embedding = self.embedder.embed(query).await?;

        // Step 2: document prefilter bounds cost for large corpora
        let top_docs = self
            .store
            .document_nearest(&embedding, config.probe_doc_limit)
            .await?;
        tracing::debug!(docs = top_docs.len(), "probe prefilter complete");

        if top_docs.is_empty() {
            return Ok(ProbeSignals::degenerate(
                has_quotes_or_ids,
                has_compare_temporal,
            ));
        }

        // Step 3: sample top candidates of each type inside the scope
        let doc_ids: Vec<i64> = top_docs.iter().map(|d| d.document_id).collect();
        let per_type = config.probe_candidates_per_type;
        let (vector_candidates, fts_candidates) = tokio::join!(
            self.store
                .vector_nearest(&embedding, per_type, Some(doc_ids.as_slice())),
            self.store.text_match(query, per_type, Some(doc_ids.as_slice())),
        );
        let vector_candidates = vector_candidates?;
        let fts_candidates = fts_candidates?;
        tracing::debug!(
            vector = vector_candidates.len(),
            fts = fts_candidates.len(),
            "probe samples collected"
        );

        // Step 4: derive signals
        let avg_vec_sim = if vector_candidates.is_empty() {
            0.0
        } else {
            let sum: f32 = vector_candidates.iter().map(|c| 1.0 - c.score).sum();
            (sum / vector_candidates.len() as f32).clamp(0.0, 1.0)
        };

        let total_possible_fts = (top_docs.len() * per_type).max(1);
        let fts_hit_rate = fts_candidates.len() as f32 / total_possible_fts as f32;

        let mut doc_counts: HashMap<i64, usize> = HashMap::new();
        for candidate in vector_candidates.iter().chain(fts_candidates.iter()) {
            *doc_counts.entry(candidate.document_id).or_default() += 1;
        }
        let unique_docs = doc_counts.len();
        let top_doc_share = if doc_counts.is_empty() {
            1.0
        } else {
            let max = *doc_counts.values().max().unwrap_or(&0) as f32;
            let sum: usize = doc_counts.values().sum();
            max / sum as f32
        };

        tracing::info!(
            avg_vec_sim,
            fts_hit_rate,
            top_doc_share,
            unique_docs,
            "probe signals computed"
        );

        Ok(ProbeSignals {
            avg_vec_sim,
            fts_hit_rate,
            top_doc_share,
            unique_docs,
            has_quotes_or_ids,
            has_compare_temporal_conditions: has_compare_temporal,
            total_candidates: vector_candidates.len() + fts_candidates.len(),
            vector_candidates: vector_candidates.len(),
            fts_candidates: fts_candidates.len(),
            doc_counts,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
