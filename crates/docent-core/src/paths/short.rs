//! SHORT Path
//!
//! Optimized single-pass retrieval and synthesis for queries the router
//! judges straightforward: one hybrid retrieval with a fixed result
//! budget, one synthesis call with mandatory citations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::budget;
use crate::config::RoutingConfig;
use crate::context::ContextBundle;
use crate::paths::{apology, PathStatus};
use crate::providers::{LanguageModel, Result};
use crate::search::{HybridSearchEngine, SearchTuning};

/// Synthesis temperature: low, for consistent citations.
const SHORT_TEMPERATURE: f32 = 0.3;

const SHORT_SYSTEM_PROMPT: &str = "You are a precise document-based Q&A assistant. Provide direct, well-cited answers using ONLY the retrieved document context.

MANDATORY CITATION RULES:
- Use format: {Document Title} [§section] for every fact
- Never provide information not explicitly in the context
- If context is insufficient, clearly state limitations
- Organize multi-document answers clearly

Be concise, accurate, and always cite your sources.";

// ============================================================================
// RESULT
// ============================================================================

/// Evidence counters the escalation check reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathDebugInfo {
    pub total_docs: usize,
    pub total_segments: usize,
    pub has_context: bool,
    pub context_length: usize,
}

/// Result of one SHORT path execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortPathResult {
    pub answer: String,
    pub context: Option<ContextBundle>,
    pub debug: PathDebugInfo,
    #[serde(flatten)]
    pub status: PathStatus,
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Single retrieval pass with mandatory-citation synthesis.
#[derive(Clone)]
pub struct ShortPath {
    engine: HybridSearchEngine,
    model: Arc<dyn LanguageModel>,
}

impl ShortPath {
    pub fn new(engine: HybridSearchEngine, model: Arc<dyn LanguageModel>) -> Self {
        Self { engine, model }
    }

    /// Execute the complete SHORT path: retrieve, synthesize, report.
    ///
    /// Never fails past this boundary: any sub-step error yields a
    /// `Failed` status with the error message surfaced in the answer.
    pub async fn run(
        &self,
        query: &str,
        config: &RoutingConfig,
        document_id: Option<i64>,
    ) -> ShortPathResult {
        match self.execute(query, config, document_id).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "SHORT path failed");
                ShortPathResult {
                    answer: apology(&e.to_string()),
                    context: None,
                    debug: PathDebugInfo::default(),
                    status: PathStatus::Failed(e.to_string()),
                }
            }
        }
    }

    async fn execute(
        &self,
        query: &str,
        config: &RoutingConfig,
        document_id: Option<i64>,
    ) -> Result<ShortPathResult> {
        let context = self.build_context(query, config, document_id).await?;
        let answer = self.synthesize(query, &context, config).await?;

        let debug_info = PathDebugInfo {
            total_docs: context.blocks.len(),
            total_segments: context.segment_count(),
            has_context: !context.is_empty(),
            context_length: context.context_text.len(),
        };
        tracing::info!(
            docs = debug_info.total_docs,
            segments = debug_info.total_segments,
            "SHORT path completed"
        );

        Ok(ShortPathResult {
            answer,
            context: Some(context),
            debug: debug_info,
            status: PathStatus::Completed,
        })
    }

    /// Retrieve context with SHORT-path tuning, optionally scoped to one
    /// pinned document.
    pub async fn build_context(
        &self,
        query: &str,
        config: &RoutingConfig,
        document_id: Option<i64>,
    ) -> Result<ContextBundle> {
        let tuning = SearchTuning::short_path(config, document_id);
        self.engine.build_context(query, &tuning).await
    }

    /// One synthesis call over truncated context, with the response
    /// budget injected into the system prompt and enforced on the output.
    async fn synthesize(
        &self,
        query: &str,
        context: &ContextBundle,
        config: &RoutingConfig,
    ) -> Result<String> {
        let context = budget::truncate_context(context, config.max_context_chars);
        let system = budget::with_response_limit(SHORT_SYSTEM_PROMPT, config.max_response_tokens);
        let user = format!(
            "Question: {query}\n\nRetrieved Context:\n{}\n\nProvide a comprehensive answer based solely on the retrieved context. Use mandatory citations for all facts.",
            context.context_text
        );

        let raw = self
            .model
            .complete(
                &system,
                &user,
                SHORT_TEMPERATURE,
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
// TESTS
// ============================================================================
