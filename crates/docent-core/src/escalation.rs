//! Escalation Policy
//!
//! Post-hoc quality check on a SHORT path result. A logical OR across
//! independent red flags - no single condition is authoritative, and all
//! triggered reasons are reported together so operators can see why a
//! query escalated.

use crate::config::EscalationConfig;
use crate::paths::ShortPathResult;
use crate::probe::ProbeSignals;

/// Words whose repeated presence in retrieved context suggests the
/// documents disagree. A cheap proxy for "needs careful LONG-path
/// reasoning" - best-effort, not correctness-critical.
const CONFLICT_INDICATORS: [&str; 6] = [
    "however",
    "but",
    "although",
    "contradicts",
    "differs",
    "opposed",
];

/// Distinct indicators at or above this count flag the context as
/// potentially contradictory.
const CONFLICT_INDICATOR_THRESHOLD: usize = 2;

/// Every escalation condition the SHORT result triggers, in evaluation
/// order. Empty means the result stands.
pub fn escalation_reasons(
    short_result: &ShortPathResult,
    signals: &ProbeSignals,
    config: &EscalationConfig,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if !short_result.status.is_success() || short_result.context.is_none() {
        reasons.push("SHORT path failed or produced no context".to_string());
        return reasons;
    }

    let debug = &short_result.debug;

    if debug.total_segments < config.min_strong_segments {
        reasons.push(format!(
            "insufficient segments ({} < {})",
            debug.total_segments, config.min_strong_segments
        ));
    }

    if debug.total_docs > config.max_distinct_docs {
        reasons.push(format!(
            "too many docs ({} > {})",
            debug.total_docs, config.max_distinct_docs
        ));
    }

    if signals.avg_vec_sim < config.min_avg_vec_sim {
        reasons.push(format!(
            "low vector similarity ({:.2} < {})",
            signals.avg_vec_sim, config.min_avg_vec_sim
        ));
    }

    if signals.fts_hit_rate < config.min_fts_hit_rate {
        reasons.push(format!(
            "low FTS hit rate ({:.2} < {})",
            signals.fts_hit_rate, config.min_fts_hit_rate
        ));
    }

    if let Some(context) = &short_result.context {
        if conflict_count(&context.context_text) >= CONFLICT_INDICATOR_THRESHOLD {
            reasons.push("potential conflicts detected".to_string());
        }
    }

    reasons
}

/// Decide whether a SHORT result escalates to a LONG run: any single
/// triggered condition escalates.
pub fn should_escalate_from_short(
    short_result: &ShortPathResult,
    signals: &ProbeSignals,
    config: &EscalationConfig,
) -> bool {
    let reasons = escalation_reasons(short_result, signals, config);
    if reasons.is_empty() {
        tracing::info!("SHORT path result sufficient, no escalation needed");
        false
    } else {
        tracing::info!(reasons = %reasons.join(", "), "escalating SHORT->LONG");
        true
    }
}

/// Count distinct conflict indicators present in the context text.
fn conflict_count(context_text: &str) -> usize {
    let lowered = context_text.to_lowercase();
    CONFLICT_INDICATORS
        .iter()
        .filter(|word| lowered.contains(*word))
        .count()
}

// ============================================================================
// TESTS
// ============================================================================
