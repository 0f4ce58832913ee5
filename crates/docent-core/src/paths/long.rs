//! LONG Path
//!
//! Comprehensive pipeline for queries a single retrieval pass would
//! under-serve: decompose the query into focused subqueries, retrieve
//! per subquery under token and wall-clock budgets with early exit, then
//! synthesize one answer across all accumulated evidence.
//!
//! Subquery iterations are inherently sequential - each iteration's
//! early-exit decision depends on the evidence accumulated so far.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::budget;
use crate::config::RoutingConfig;
use crate::context::ContextBundle;
use crate::paths::{apology, PathStatus};
use crate::probe::ProbeSignals;
use crate::providers::{LanguageModel, Result};
use crate::search::{HybridSearchEngine, SearchTuning};

/// Decomposition temperature: low, for stable structured output.
const DECOMPOSE_TEMPERATURE: f32 = 0.1;

/// Synthesis temperature.
const SYNTHESIS_TEMPERATURE: f32 = 0.3;

const DECOMPOSE_SYSTEM_PROMPT: &str = "You are a query planning assistant. Break a complex document question into a small number of focused subqueries, each targeting a distinct facet of the original question.

Respond with a JSON array only, no prose:
[{\"query\": \"focused search query\", \"purpose\": \"what this subquery establishes\"}]";

const SYNTHESIS_SYSTEM_PROMPT: &str = "You are a thorough document-based Q&A assistant. Combine evidence gathered across multiple searches into one comprehensive answer.

MANDATORY CITATION RULES:
- Use format: {Document Title} [§section] for every fact
- Never provide information not explicitly in the evidence
- If the evidence is insufficient, clearly state limitations
- Explicitly flag contradictions between documents when you see them

Organize the answer clearly and always cite your sources.";

// ============================================================================
// TYPES
// ============================================================================

/// One decomposition unit of a LONG-path query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQuery {
    pub query: String,
    #[serde(default)]
    pub purpose: String,
}

/// Evidence accumulated across subquery iterations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceBundle {
    pub contexts: Vec<ContextBundle>,
    pub total_docs: usize,
    pub total_segments: usize,
    /// Probe signals that triggered the LONG routing
    pub avg_vec_sim: f32,
    pub fts_hit_rate: f32,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl EvidenceBundle {
    /// Rebuild the bundle from the contexts gathered so far, recomputing
    /// the running totals.
    pub fn from_contexts(
        contexts: Vec<ContextBundle>,
        signals: &ProbeSignals,
        started: Instant,
    ) -> Self {
        let mut doc_ids: Vec<i64> = contexts
            .iter()
            .flat_map(|c| c.blocks.iter().map(|b| b.document_id))
            .collect();
        doc_ids.sort_unstable();
        doc_ids.dedup();
        let total_segments = contexts.iter().map(|c| c.segment_count()).sum();

        Self {
            total_docs: doc_ids.len(),
            total_segments,
            avg_vec_sim: signals.avg_vec_sim,
            fts_hit_rate: signals.fts_hit_rate,
            elapsed: started.elapsed(),
            contexts,
        }
    }

    fn empty(signals: &ProbeSignals) -> Self {
        Self {
            contexts: Vec::new(),
            total_docs: 0,
            total_segments: 0,
            avg_vec_sim: signals.avg_vec_sim,
            fts_hit_rate: signals.fts_hit_rate,
            elapsed: Duration::ZERO,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs_f64().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs_f64(f64::deserialize(d)?))
    }
}

/// Result of one LONG path execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongPathResult {
    pub answer: String,
    pub evidence: EvidenceBundle,
    /// Subqueries actually executed (shorter than the plan on early exit)
    pub executed_subqueries: Vec<SubQuery>,
    #[serde(flatten)]
    pub status: PathStatus,
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Decompose → iterate under budgets → synthesize.
#[derive(Clone)]
pub struct LongPath {
    engine: HybridSearchEngine,
    model: Arc<dyn LanguageModel>,
}

impl LongPath {
    pub fn new(engine: HybridSearchEngine, model: Arc<dyn LanguageModel>) -> Self {
        Self { engine, model }
    }

    /// Execute the complete LONG path.
    ///
    /// Same boundary contract as SHORT: always returns an answer string;
    /// failures land in the result status, never propagate.
    pub async fn run(
        &self,
        query: &str,
        signals: &ProbeSignals,
        config: &RoutingConfig,
        document_id: Option<i64>,
    ) -> LongPathResult {
        match self.execute(query, signals, config, document_id).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "LONG path failed");
                LongPathResult {
                    answer: apology(&e.to_string()),
                    evidence: EvidenceBundle::empty(signals),
                    executed_subqueries: Vec::new(),
                    status: PathStatus::Failed(e.to_string()),
                }
            }
        }
    }

    async fn execute(
        &self,
        query: &str,
        signals: &ProbeSignals,
        config: &RoutingConfig,
        document_id: Option<i64>,
    ) -> Result<LongPathResult> {
        let started = Instant::now();

        let subqueries = self.generate_subqueries(query, config).await;
        tracing::info!(count = subqueries.len(), "subqueries planned");

        let mut contexts: Vec<ContextBundle> = Vec::new();
        let mut executed: Vec<SubQuery> = Vec::new();

        for (i, subquery) in subqueries.iter().take(config.long_max_steps).enumerate() {
            if i > 0 {
                let evidence =
                    EvidenceBundle::from_contexts(contexts.clone(), signals, started);
                if let Some(reason) = should_early_exit(&evidence, config, started) {
                    tracing::info!(reason = %reason, step = i, "early exit");
                    break;
                }
            }

            tracing::info!(step = i + 1, subquery = %subquery.query, "executing subquery");
            let context = self.execute_subquery(subquery, document_id).await?;
            tracing::info!(docs = context.blocks.len(), "subquery retrieval complete");
            contexts.push(context);
            executed.push(subquery.clone());
        }

        let evidence = EvidenceBundle::from_contexts(contexts, signals, started);
        tracing::info!(
            docs = evidence.total_docs,
            segments = evidence.total_segments,
            "evidence accumulated"
        );

        let answer = self.synthesize(query, &evidence, config).await?;

        Ok(LongPathResult {
            answer,
            evidence: EvidenceBundle {
                elapsed: started.elapsed(),
                ..evidence
            },
            executed_subqueries: executed,
            status: PathStatus::Completed,
        })
    }

    /// One decomposition call. Malformed or failed output falls back to a
    /// single-subquery plan equal to the original query - decomposition
    /// quality must never fail the request.
    pub async fn generate_subqueries(&self, query: &str, config: &RoutingConfig) -> Vec<SubQuery> {
        let user = format!(
            "Original question: {query}\n\nProduce at most {} subqueries.",
            config.long_max_subqueries
        );
        let raw = match self
            .model
            .complete(DECOMPOSE_SYSTEM_PROMPT, &user, DECOMPOSE_TEMPERATURE, None)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "decomposition call failed, using single-subquery plan");
                return vec![fallback_subquery(query)];
            }
        };

        match parse_subqueries(&raw, config.long_max_subqueries) {
            Some(subqueries) if !subqueries.is_empty() => subqueries,
            _ => {
                tracing::warn!("unparseable decomposition output, using single-subquery plan");
                vec![fallback_subquery(query)]
            }
        }
    }

    /// Run one subquery through hybrid retrieval: multi-document tuning,
    /// or single-document tuning when pinned.
    pub async fn execute_subquery(
        &self,
        subquery: &SubQuery,
        document_id: Option<i64>,
    ) -> Result<ContextBundle> {
        let tuning = match document_id {
            Some(id) => SearchTuning::single_document(id),
            None => SearchTuning::multi_document(),
        };
        self.engine.build_context(&subquery.query, &tuning).await
    }

    /// One synthesis call over all accumulated evidence, truncated to the
    /// context budget collectively and per bundle.
    async fn synthesize(
        &self,
        query: &str,
        evidence: &EvidenceBundle,
        config: &RoutingConfig,
    ) -> Result<String> {
        let truncated = budget::truncate_contexts(&evidence.contexts, config.max_context_chars);

        let mut sections: Vec<String> = Vec::new();
        for (i, context) in truncated.iter().enumerate() {
            if context.is_empty() {
                continue;
            }
            sections.push(format!(
                "--- Evidence from search {} ({}) ---\n{}",
                i + 1,
                context.query,
                context.context_text
            ));
        }
        let evidence_text = if sections.is_empty() {
            "No relevant evidence was found in the document corpus.".to_string()
        } else {
            sections.join("\n\n")
        };

        let system =
            budget::with_response_limit(SYNTHESIS_SYSTEM_PROMPT, config.max_response_tokens);
        let user = format!(
            "Question: {query}\n\nAccumulated Evidence:\n{evidence_text}\n\nProvide a comprehensive, well-organized answer based solely on the accumulated evidence. Cite every fact and flag any contradictions between documents."
        );

        let raw = self
            .model
            .complete(
                &system,
                &user,
                SYNTHESIS_TEMPERATURE,
                Some(config.max_response_tokens as u32),
            )
            .await?;

        Ok(budget::enforce_response_budget(
            &raw,
            config.max_response_tokens,
        ))
    }
}

// ============================================================================
// EARLY EXIT
// ============================================================================

/// Check whether iteration should stop before the next subquery.
///
/// Returns the reason, or `None` to continue. The wall-clock budget is
/// soft: it is only consulted here, at iteration boundaries, and exceeding
/// it means "synthesize with what we have" rather than an error.
pub fn should_early_exit(
    evidence: &EvidenceBundle,
    config: &RoutingConfig,
    started: Instant,
) -> Option<String> {
    if started.elapsed().as_secs() >= config.long_budget_time_sec {
        return Some(format!(
            "time budget exhausted ({}s)",
            config.long_budget_time_sec
        ));
    }

    let spent_tokens: usize = evidence
        .contexts
        .iter()
        .map(|c| budget::estimate_tokens(&c.context_text))
        .sum();
    if spent_tokens >= config.long_budget_tokens {
        return Some(format!(
            "token budget exhausted ({spent_tokens} >= {})",
            config.long_budget_tokens
        ));
    }

    // Inverted escalation thresholds: do we already have enough?
    if evidence.total_segments >= config.escalation.min_strong_segments
        && evidence.avg_vec_sim >= config.escalation.min_avg_vec_sim
    {
        return Some(format!(
            "sufficient evidence ({} segments, {:.2} similarity)",
            evidence.total_segments, evidence.avg_vec_sim
        ));
    }

    None
}

fn fallback_subquery(query: &str) -> SubQuery {
    SubQuery {
        query: query.to_string(),
        purpose: "answer the original question".to_string(),
    }
}

/// Extract a subquery list from LLM output: the first JSON array found,
/// items shaped `{"query": ..., "purpose": ...}`, capped at `max`.
fn parse_subqueries(raw: &str, max: usize) -> Option<Vec<SubQuery>> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }
    let candidate = budget::ensure_json_validity(&raw[start..=end]);
    let parsed: Vec<SubQuery> = serde_json::from_str(&candidate).ok()?;
    let subqueries: Vec<SubQuery> = parsed
        .into_iter()
        .filter(|s| !s.query.trim().is_empty())
        .take(max)
        .collect();
    Some(subqueries)
}

// ============================================================================
// TESTS
// ============================================================================
