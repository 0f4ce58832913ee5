//! Orchestrator
//!
//! Ties the pipeline together: probe → score → route → execute, with the
//! escalation check promoting weak SHORT results to a LONG run. One
//! request is one task; all routing state is request-scoped and the core
//! is read-only against the document store.
//!
//! A streaming variant emits progress events as each phase completes;
//! dropping the receiver cancels the run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::budget;
use crate::cache::CachedEmbedder;
use crate::config::{RoutingConfig, RouterWeights};
use crate::escalation::should_escalate_from_short;
use crate::paths::{
    is_full_document_analysis, DocumentAnalysis, LongPath, ShortPath,
};
use crate::probe::{ProbeSignals, SignalProbe};
use crate::providers::{
    EmbeddingProvider, LanguageModel, Result, SegmentStore,
};
use crate::router::{decide_route, RoutePath, RoutingDecision};
use crate::search::HybridSearchEngine;

/// Buffered progress events before the producer blocks.
const STREAM_BUFFER: usize = 32;

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// The adaptive routing front door.
///
/// All collaborators are injected; cloning is cheap (shared `Arc`s) and
/// each request runs against an immutable snapshot of the configuration.
#[derive(Clone)]
pub struct Orchestrator {
    config: RoutingConfig,
    probe: SignalProbe,
    short: ShortPath,
    long: LongPath,
    analysis: DocumentAnalysis,
}

impl Orchestrator {
    /// Build the pipeline. The embedder is wrapped in an LRU cache so one
    /// query is embedded once regardless of how many components need it.
    pub fn new(
        store: Arc<dyn SegmentStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn LanguageModel>,
        config: RoutingConfig,
    ) -> std::result::Result<Self, crate::config::ConfigError> {
        config.validate()?;

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(CachedEmbedder::new(embedder));
        let engine = HybridSearchEngine::new(store.clone(), embedder.clone());

        Ok(Self {
            config,
            probe: SignalProbe::new(store.clone(), embedder),
            short: ShortPath::new(engine.clone(), model.clone()),
            long: LongPath::new(engine, model.clone()),
            analysis: DocumentAnalysis::new(store, model),
        })
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Answer a query. Always returns an answer string; every failure
    /// below this point degrades to apology text rather than an error.
    pub async fn answer(&self, query: &str, document_id: Option<i64>) -> String {
        // Whole-document analysis bypasses retrieval entirely.
        if let Some(doc_id) = document_id {
            if is_full_document_analysis(query) {
                tracing::info!(doc_id, "full-document analysis requested");
                return self.analysis.run(query, doc_id, &self.config).await.answer;
            }
        }

        let signals = match self.probe.compute(query, &self.config).await {
            Ok(signals) => signals,
            Err(e) => {
                tracing::error!(error = %e, "probe failed");
                return crate::paths::apology(&e.to_string());
            }
        };

        let decision = decide_route(&signals, &self.config.router);
        match decision.path {
            RoutePath::Short => {
                let short_result = self.short.run(query, &self.config, document_id).await;

                if should_escalate_from_short(&short_result, &signals, &self.config.escalation) {
                    let long_result = self
                        .long
                        .run(query, &signals, &self.config, document_id)
                        .await;
                    tracing::info!("final route: SHORT->LONG (escalated)");
                    long_result.answer
                } else {
                    tracing::info!("final route: SHORT (completed)");
                    short_result.answer
                }
            }
            RoutePath::Long => {
                let long_result = self
                    .long
                    .run(query, &signals, &self.config, document_id)
                    .await;
                tracing::info!("final route: LONG (completed)");
                long_result.answer
            }
        }
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Detailed routing report for one query, without executing a path.
    pub async fn routing_stats(&self, query: &str) -> Result<RoutingStats> {
        let signals = self.probe.compute(query, &self.config).await?;
        let decision = decide_route(&signals, &self.config.router);
        Ok(RoutingStats {
            query: query.to_string(),
            signals,
            decision,
            weights: self.config.router.weights.clone(),
        })
    }

    /// Human-readable explanation of the routing decision for one query.
    pub async fn explain_routing(&self, query: &str) -> Result<String> {
        let stats = self.routing_stats(query).await?;
        let s = &stats.signals;
        let d = &stats.decision;

        let reasoning = match d.path {
            RoutePath::Short => {
                "Score above threshold suggests straightforward document retrieval is sufficient."
            }
            RoutePath::Long => {
                "Score below threshold suggests complex analysis requiring multiple subqueries."
            }
        };

        Ok(format!(
            "Routing analysis for: \"{}\"\n\n\
             SIGNALS:\n\
             - Vector similarity: {:.3}\n\
             - FTS hit rate: {:.3}\n\
             - Document concentration: {:.3}\n\
             - Unique documents: {}\n\
             - Has quotes/IDs: {}\n\
             - Has temporal/comparison: {}\n\n\
             SCORING:\n\
             - Final score: {:.3}\n\
             - Threshold: {}\n\
             - Recommended path: {}\n\n\
             REASONING:\n{}",
            preview(&stats.query),
            s.avg_vec_sim,
            s.fts_hit_rate,
            s.top_doc_share,
            s.unique_docs,
            s.has_quotes_or_ids,
            s.has_compare_temporal_conditions,
            d.score,
            d.threshold,
            d.path,
            reasoning,
        ))
    }

    // ------------------------------------------------------------------
    // Streaming
    // ------------------------------------------------------------------

    /// Stream orchestration progress. Events arrive as each phase
    /// completes, ending with `ResponseComplete` (or `Error`). Dropping
    /// the receiver cancels the run; there are no side effects to roll
    /// back since the core never writes.
    pub fn stream(&self, query: String, document_id: Option<i64>) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_streaming(query, document_id, tx).await;
        });
        rx
    }

    async fn run_streaming(
        &self,
        query: String,
        document_id: Option<i64>,
        tx: mpsc::Sender<ProgressEvent>,
    ) {
        let request_id = Uuid::new_v4();
        let emitter = EventEmitter {
            tx,
            request_id,
            max_response_tokens: self.config.max_response_tokens,
        };

        if let Some(doc_id) = document_id {
            if is_full_document_analysis(&query) {
                if !emitter.step(1, "Analyzing the full document...").await {
                    return;
                }
                let result = self.analysis.run(&query, doc_id, &self.config).await;
                let _ = emitter
                    .complete("ANALYSIS", None, None, Some(result.chunks_processed))
                    .await;
                let _ = emitter.response(result.answer).await;
                return;
            }
        }

        if !emitter.step(1, "Analyzing query patterns...").await {
            return;
        }
        let signals = match self.probe.compute(&query, &self.config).await {
            Ok(signals) => signals,
            Err(e) => {
                let _ = emitter.error(&e.to_string()).await;
                return;
            }
        };

        if !emitter.step(2, "Determining search strategy...").await {
            return;
        }
        let decision = decide_route(&signals, &self.config.router);

        match decision.path {
            RoutePath::Short => {
                if !emitter.step(3, "Using focused search approach...").await {
                    return;
                }
                let short_result = self.short.run(&query, &self.config, document_id).await;
                let docs = short_result.debug.total_docs;
                if !emitter
                    .step(4, &format!("Found {docs} relevant documents"))
                    .await
                {
                    return;
                }

                if should_escalate_from_short(&short_result, &signals, &self.config.escalation) {
                    if !emitter.step(5, "Escalating to detailed analysis...").await {
                        return;
                    }
                    self.stream_long(&query, &signals, document_id, &emitter, 6)
                        .await;
                } else {
                    let _ = emitter
                        .complete(
                            "SHORT",
                            None,
                            Some(short_result.debug.total_docs),
                            Some(short_result.debug.total_segments),
                        )
                        .await;
                    let _ = emitter.response(short_result.answer).await;
                }
            }
            RoutePath::Long => {
                if !emitter
                    .step(3, "Using comprehensive search approach...")
                    .await
                {
                    return;
                }
                self.stream_long(&query, &signals, document_id, &emitter, 4)
                    .await;
            }
        }
    }

    async fn stream_long(
        &self,
        query: &str,
        signals: &ProbeSignals,
        document_id: Option<i64>,
        emitter: &EventEmitter,
        first_step: u32,
    ) {
        if !emitter
            .step(first_step, "Planning comprehensive search...")
            .await
        {
            return;
        }
        // Subquery-level progress is produced by the path's own tracing;
        // the stream reports phase boundaries.
        let result = self
            .long
            .run(query, signals, &self.config, document_id)
            .await;

        if !emitter
            .step(
                first_step + 1,
                &format!(
                    "Gathered evidence from {} searches across {} documents",
                    result.executed_subqueries.len(),
                    result.evidence.total_docs
                ),
            )
            .await
        {
            return;
        }
        let _ = emitter
            .complete(
                "LONG",
                Some(result.executed_subqueries.len()),
                Some(result.evidence.total_docs),
                Some(result.evidence.total_segments),
            )
            .await;
        let _ = emitter.response(result.answer).await;
    }
}

fn preview(query: &str) -> String {
    if query.len() <= 100 {
        query.to_string()
    } else {
        format!("{}...", budget::cut_at_char_boundary(query, 100))
    }
}

// ============================================================================
// DIAGNOSTICS TYPES
// ============================================================================

/// Full routing report for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingStats {
    pub query: String,
    pub signals: ProbeSignals,
    pub decision: RoutingDecision,
    pub weights: RouterWeights,
}

// ============================================================================
// PROGRESS EVENTS
// ============================================================================

/// One streamed progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub request_id: Uuid,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ProgressEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEventKind {
    /// A pipeline phase completed
    ThinkingStep { step: u32, content: String },
    /// All phases done; the final answer follows
    ThinkingComplete {
        content: String,
        summary: ExecutionSummary,
    },
    /// The final answer
    ResponseComplete { content: String },
    /// The run failed; no answer follows
    Error { content: String },
}

/// What the finished run actually did.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subqueries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<usize>,
}

/// Sends events, enforcing the response budget on final answers.
/// A failed send means the consumer hung up; producers stop.
struct EventEmitter {
    tx: mpsc::Sender<ProgressEvent>,
    request_id: Uuid,
    max_response_tokens: usize,
}

impl EventEmitter {
    fn event(&self, kind: ProgressEventKind) -> ProgressEvent {
        ProgressEvent {
            request_id: self.request_id,
            at: Utc::now(),
            kind,
        }
    }

    /// Returns false when the consumer cancelled.
    async fn step(&self, step: u32, content: &str) -> bool {
        self.tx
            .send(self.event(ProgressEventKind::ThinkingStep {
                step,
                content: content.to_string(),
            }))
            .await
            .is_ok()
    }

    async fn complete(
        &self,
        path: &str,
        subqueries: Option<usize>,
        docs: Option<usize>,
        segments: Option<usize>,
    ) -> bool {
        self.tx
            .send(self.event(ProgressEventKind::ThinkingComplete {
                content: "Analysis complete".to_string(),
                summary: ExecutionSummary {
                    path: path.to_string(),
                    subqueries,
                    docs,
                    segments,
                },
            }))
            .await
            .is_ok()
    }

    async fn response(&self, answer: String) -> bool {
        let content = budget::enforce_response_budget(&answer, self.max_response_tokens);
        self.tx
            .send(self.event(ProgressEventKind::ResponseComplete { content }))
            .await
            .is_ok()
    }

    async fn error(&self, message: &str) -> bool {
        self.tx
            .send(self.event(ProgressEventKind::Error {
                content: message.to_string(),
            }))
            .await
            .is_ok()
    }
}

// ============================================================================
// TESTS
// ============================================================================
