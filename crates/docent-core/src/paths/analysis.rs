//! Full-Document Analysis
//!
//! Map-reduce pass for "analyze this whole document" requests against a
//! pinned document. Retrieval is pointless when the scope is already the
//! entire document, so this bypasses search: every segment is visited in
//! fixed-size chunks, one extraction call per chunk pulls out whatever is
//! relevant to the question, and one reduction call synthesizes the
//! non-empty extracts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::budget;
use crate::config::RoutingConfig;
use crate::paths::{apology, PathStatus};
use crate::providers::{LanguageModel, Result, SearchHit, SegmentStore};

/// Segments per extraction chunk.
pub const ANALYSIS_CHUNK_SEGMENTS: usize = 8;

/// Extraction calls answer mechanically; keep them cold.
const EXTRACTION_TEMPERATURE: f32 = 0.0;

const REDUCTION_TEMPERATURE: f32 = 0.3;

/// Marker an extraction call returns when a chunk holds nothing relevant.
const NOTHING_RELEVANT: &str = "NOTHING RELEVANT";

const EXTRACTION_SYSTEM_PROMPT: &str = "You extract relevant material from a portion of a document. Given a question and a set of document sections, quote or tightly summarize ONLY the material relevant to the question, keeping each section's [§n] marker with the material you take from it. If nothing in these sections is relevant, respond with exactly: NOTHING RELEVANT";

const REDUCTION_SYSTEM_PROMPT: &str = "You are a thorough document analyst. Combine the relevant extracts below into one comprehensive answer to the question.

MANDATORY CITATION RULES:
- Use format: {Document Title} [§section] for every fact
- Never provide information not present in the extracts
- If the extracts are insufficient, clearly state limitations

Organize the answer clearly and always cite your sources.";

/// Phrases signalling whole-document analysis intent.
const ANALYSIS_PHRASES: [&str; 8] = [
    "analyze this document",
    "analyze the document",
    "analyze this file",
    "review this document",
    "summarize this document",
    "summarize the document",
    "evaluate this document",
    "assess this document",
];

/// True when a pinned-document query asks for whole-document analysis
/// rather than a targeted question.
pub fn is_full_document_analysis(query: &str) -> bool {
    let lowered = query.to_lowercase();
    ANALYSIS_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

// ============================================================================
// RESULT
// ============================================================================

/// Result of one map-reduce analysis pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub answer: String,
    pub document_id: i64,
    /// Chunks visited (including those that failed extraction)
    pub chunks_processed: usize,
    /// Chunks that produced a relevant extract
    pub chunks_relevant: usize,
    #[serde(flatten)]
    pub status: PathStatus,
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Map-reduce analysis over all segments of one document.
#[derive(Clone)]
pub struct DocumentAnalysis {
    store: Arc<dyn SegmentStore>,
    model: Arc<dyn LanguageModel>,
}

impl DocumentAnalysis {
    pub fn new(store: Arc<dyn SegmentStore>, model: Arc<dyn LanguageModel>) -> Self {
        Self { store, model }
    }

    /// Run the full pass. Same boundary contract as the path executors:
    /// always an answer string, failures in the status.
    pub async fn run(
        &self,
        query: &str,
        document_id: i64,
        config: &RoutingConfig,
    ) -> AnalysisResult {
        match self.execute(query, document_id, config).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, document_id, "document analysis failed");
                AnalysisResult {
                    answer: apology(&e.to_string()),
                    document_id,
                    chunks_processed: 0,
                    chunks_relevant: 0,
                    status: PathStatus::Failed(e.to_string()),
                }
            }
        }
    }

    async fn execute(
        &self,
        query: &str,
        document_id: i64,
        config: &RoutingConfig,
    ) -> Result<AnalysisResult> {
        let segments = self.store.segments_of_document(document_id).await?;
        if segments.is_empty() {
            return Ok(AnalysisResult {
                answer: "The document has no content to analyze.".to_string(),
                document_id,
                chunks_processed: 0,
                chunks_relevant: 0,
                status: PathStatus::Completed,
            });
        }
        let title = segments[0].title.clone();
        tracing::info!(
            document_id,
            segments = segments.len(),
            "starting full-document analysis"
        );

        // Map: one extraction call per fixed-size chunk. A failed chunk is
        // skipped, not fatal - partial coverage still beats no answer.
        let mut extracts: Vec<String> = Vec::new();
        let mut chunks_processed = 0usize;
        for chunk in segments.chunks(ANALYSIS_CHUNK_SEGMENTS) {
            chunks_processed += 1;
            match self.extract_chunk(query, &title, chunk).await {
                Ok(Some(extract)) => extracts.push(extract),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, chunk = chunks_processed, "chunk extraction failed, skipping");
                }
            }
        }
        let chunks_relevant = extracts.len();
        tracing::info!(chunks_processed, chunks_relevant, "extraction complete");

        // Reduce: one synthesis call over the non-empty extracts.
        let answer = if extracts.is_empty() {
            format!("I could not find material in {{{title}}} relevant to the question.")
        } else {
            self.reduce(query, &title, &extracts, config).await?
        };

        Ok(AnalysisResult {
            answer,
            document_id,
            chunks_processed,
            chunks_relevant,
            status: PathStatus::Completed,
        })
    }

    async fn extract_chunk(
        &self,
        query: &str,
        title: &str,
        chunk: &[SearchHit],
    ) -> Result<Option<String>> {
        let sections: Vec<String> = chunk
            .iter()
            .map(|s| crate::context::format_snippet(s.ordinal, &s.text))
            .collect();
        let user = format!(
            "Question: {query}\n\nDocument: {{{title}}}\nSections:\n{}",
            sections.join("\n")
        );

        let raw = self
            .model
            .complete(EXTRACTION_SYSTEM_PROMPT, &user, EXTRACTION_TEMPERATURE, None)
            .await?;

        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NOTHING_RELEVANT) {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }

    async fn reduce(
        &self,
        query: &str,
        title: &str,
        extracts: &[String],
        config: &RoutingConfig,
    ) -> Result<String> {
        let mut combined = extracts.join("\n\n");
        let max_chars = config.max_context_chars;
        if combined.len() > max_chars {
            tracing::warn!(
                chars = combined.len(),
                max_chars,
                "extracts over context budget, keeping prefix"
            );
            combined = format!(
                "{}...",
                budget::cut_at_char_boundary(&combined, max_chars.saturating_sub(3))
            );
        }

        let system =
            budget::with_response_limit(REDUCTION_SYSTEM_PROMPT, config.max_response_tokens);
        let user = format!(
            "Question: {query}\n\nDocument: {{{title}}}\nRelevant extracts:\n{combined}\n\nProvide a comprehensive answer based solely on these extracts."
        );

        let raw = self
            .model
            .complete(
                &system,
                &user,
                REDUCTION_TEMPERATURE,
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
