//! Route Scoring
//!
//! Linear weighted sum over the probe signals, compared against a
//! threshold: at or above routes SHORT (single retrieval pass), below
//! routes LONG (iterative multi-subquery retrieval). Pure function of
//! signals and configuration - no side effects, fully deterministic.

use serde::{Deserialize, Serialize};

use crate::config::RouterConfig;
use crate::probe::ProbeSignals;

/// Which execution path a query takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoutePath {
    /// Single retrieval pass + single synthesis call, optimized for latency
    Short,
    /// Multi-subquery iterative retrieval, optimized for completeness
    Long,
}

impl std::fmt::Display for RoutePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutePath::Short => write!(f, "SHORT"),
            RoutePath::Long => write!(f, "LONG"),
        }
    }
}

/// The routing outcome for one query. Derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub path: RoutePath,
    pub score: f32,
    pub threshold: f32,
}

/// Compute the linear routing score (higher = more suitable for SHORT).
///
/// `unique_docs` is normalized by 10 so it lives on roughly the same
/// scale as the other signals; boolean flags contribute 0 or 1.
pub fn routing_score(signals: &ProbeSignals, config: &RouterConfig) -> f32 {
    let w = &config.weights;
    w.avg_vec_sim * signals.avg_vec_sim
        + w.fts_hit_rate * signals.fts_hit_rate
        + w.top_doc_share * signals.top_doc_share
        + w.unique_docs * (signals.unique_docs as f32 / 10.0)
        + w.has_quotes_or_ids * (signals.has_quotes_or_ids as u8 as f32)
        + w.has_compare_temporal_conditions
            * (signals.has_compare_temporal_conditions as u8 as f32)
}

/// Score the signals and pick a path.
pub fn decide_route(signals: &ProbeSignals, config: &RouterConfig) -> RoutingDecision {
    let score = routing_score(signals, config);
    let path = if score >= config.threshold {
        RoutePath::Short
    } else {
        RoutePath::Long
    };
    tracing::info!(%path, score, threshold = config.threshold, "route decision");
    RoutingDecision {
        path,
        score,
        threshold: config.threshold,
    }
}

// ============================================================================
// TESTS
// ============================================================================
