//! Routing Configuration
//!
//! Every knob the routing core consumes, as named numeric fields rather
//! than untyped maps. Defaults match the tuning the system ships with;
//! [`RoutingConfig::validate`] rejects out-of-range values at load time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation failure.
#[derive(Debug, Error)]
#[error("invalid routing config: {0}")]
pub struct ConfigError(pub String);

// ============================================================================
// ROUTER
// ============================================================================

/// Per-signal weights for the linear routing score.
///
/// Positive weights pull toward the SHORT path (high similarity, hit rate
/// and concentration suggest one retrieval pass will do); negative weights
/// pull toward LONG (many distinct documents, precise references, and
/// comparative/temporal language usually need cross-document synthesis).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterWeights {
    pub avg_vec_sim: f32,
    pub fts_hit_rate: f32,
    pub top_doc_share: f32,
    pub unique_docs: f32,
    pub has_quotes_or_ids: f32,
    pub has_compare_temporal_conditions: f32,
}

impl Default for RouterWeights {
    fn default() -> Self {
        Self {
            avg_vec_sim: 0.9,
            fts_hit_rate: 0.5,
            top_doc_share: 0.8,
            unique_docs: -0.7,
            has_quotes_or_ids: -0.1,
            has_compare_temporal_conditions: -0.6,
        }
    }
}

/// Routing between SHORT and LONG paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub weights: RouterWeights,
    /// Score at or above this routes SHORT
    pub threshold: f32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            weights: RouterWeights::default(),
            threshold: 0.5,
        }
    }
}

// ============================================================================
// ESCALATION
// ============================================================================

/// Thresholds for promoting a SHORT result to a LONG run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Fewer retrieved segments than this is too little evidence
    pub min_strong_segments: usize,
    /// More distinct documents than this is too scattered for one pass
    pub max_distinct_docs: usize,
    /// Probe similarity below this means the probe was already weak
    pub min_avg_vec_sim: f32,
    /// Probe full-text hit rate below this means the probe was already weak
    pub min_fts_hit_rate: f32,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            min_strong_segments: 2,
            max_distinct_docs: 4,
            min_avg_vec_sim: 0.60,
            min_fts_hit_rate: 0.10,
        }
    }
}

// ============================================================================
// FULL CONFIG
// ============================================================================

/// Complete configuration for the adaptive routing system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub router: RouterConfig,
    pub escalation: EscalationConfig,

    // Probe sampling
    /// Documents kept by the probe's prefilter
    pub probe_doc_limit: usize,
    /// Vector hits and text hits sampled within the prefiltered scope
    pub probe_candidates_per_type: usize,

    // SHORT path retrieval
    pub short_top_docs: usize,
    pub short_per_doc: usize,
    pub short_vector_limit: usize,
    pub short_text_limit: usize,
    /// Vector weight in SHORT-path RRF; text weight is `1 - short_alpha`
    pub short_alpha: f32,

    // LONG path budgets
    pub long_max_subqueries: usize,
    pub long_max_steps: usize,
    pub long_budget_tokens: usize,
    /// Soft wall-clock budget, checked at iteration boundaries
    pub long_budget_time_sec: u64,

    // Response and context limits
    pub max_response_tokens: usize,
    pub max_context_tokens: usize,
    /// Rough char limit for context (4 chars per token)
    pub max_context_chars: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            escalation: EscalationConfig::default(),
            probe_doc_limit: 10,
            probe_candidates_per_type: 3,
            short_top_docs: 15,
            short_per_doc: 3,
            short_vector_limit: 20,
            short_text_limit: 20,
            short_alpha: 0.6,
            long_max_subqueries: 3,
            long_max_steps: 5,
            long_budget_tokens: 8000,
            long_budget_time_sec: 30,
            max_response_tokens: 4000,
            max_context_tokens: 12000,
            max_context_chars: 48000,
        }
    }
}

impl RoutingConfig {
    /// Reject configurations the routing math cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.router.weights;
        for (name, value) in [
            ("avg_vec_sim", w.avg_vec_sim),
            ("fts_hit_rate", w.fts_hit_rate),
            ("top_doc_share", w.top_doc_share),
            ("unique_docs", w.unique_docs),
            ("has_quotes_or_ids", w.has_quotes_or_ids),
            ("has_compare_temporal_conditions", w.has_compare_temporal_conditions),
        ] {
            if !value.is_finite() {
                return Err(ConfigError(format!("weight {name} must be finite")));
            }
        }
        if !self.router.threshold.is_finite() {
            return Err(ConfigError("router threshold must be finite".into()));
        }
        if !(0.0..=1.0).contains(&self.short_alpha) {
            return Err(ConfigError(format!(
                "short_alpha must be in [0, 1], got {}",
                self.short_alpha
            )));
        }
        for (name, value) in [
            ("min_avg_vec_sim", self.escalation.min_avg_vec_sim),
            ("min_fts_hit_rate", self.escalation.min_fts_hit_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError(format!("{name} must be in [0, 1], got {value}")));
            }
        }
        for (name, value) in [
            ("probe_doc_limit", self.probe_doc_limit),
            ("probe_candidates_per_type", self.probe_candidates_per_type),
            ("short_top_docs", self.short_top_docs),
            ("short_per_doc", self.short_per_doc),
            ("short_vector_limit", self.short_vector_limit),
            ("short_text_limit", self.short_text_limit),
            ("long_max_subqueries", self.long_max_subqueries),
            ("long_max_steps", self.long_max_steps),
            ("max_response_tokens", self.max_response_tokens),
            ("max_context_chars", self.max_context_chars),
        ] {
            if value == 0 {
                return Err(ConfigError(format!("{name} must be nonzero")));
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
