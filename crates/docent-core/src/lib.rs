//! # Docent Core
//!
//! Adaptive retrieval routing for document Q&A. Per query, the system
//! decides how much retrieval and reasoning effort to spend before
//! answering:
//!
//! - **Probe**: a cheap, sampled estimate of retrieval quality
//!   (similarity, lexical hit rate, document concentration, query
//!   pattern flags)
//! - **Router**: linear weighted score over the probe signals; at or
//!   above threshold → SHORT path, below → LONG path
//! - **SHORT path**: one hybrid retrieval pass + one mandatory-citation
//!   synthesis call, optimized for latency
//! - **Escalation**: post-hoc red-flag check that promotes weak SHORT
//!   results to a full LONG run
//! - **LONG path**: subquery decomposition and budget-bounded iterative
//!   retrieval with early exit, optimized for completeness
//! - **Hybrid search**: concurrent vector + full-text retrieval merged
//!   with Reciprocal Rank Fusion, grouped per document
//! - **Budgets**: context and response truncation that preserves whole
//!   snippets, sentence boundaries, and JSON validity
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docent_core::{Orchestrator, RoutingConfig, SqliteSegmentStore};
//!
//! let store = Arc::new(SqliteSegmentStore::open("corpus.db".as_ref())?);
//! let orchestrator = Orchestrator::new(store, embedder, model, RoutingConfig::default())?;
//!
//! let answer = orchestrator.answer("What is the remote work policy?", None).await;
//! ```
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): bundle SQLite for the reference store
//! - `embeddings`: local embedding generation with fastembed
//! - `openai`: OpenAI-compatible chat-completions client

// ============================================================================
// MODULES
// ============================================================================

pub mod budget;
pub mod cache;
pub mod config;
pub mod context;
pub mod escalation;
pub mod orchestrator;
pub mod paths;
pub mod probe;
pub mod providers;
pub mod router;
pub mod search;
pub mod store;

#[cfg(feature = "embeddings")]
pub mod embeddings;

#[cfg(feature = "openai")]
pub mod llm;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use config::{ConfigError, EscalationConfig, RouterConfig, RouterWeights, RoutingConfig};

pub use providers::{
    DocumentHit, EmbeddingProvider, LanguageModel, ProviderError, SearchHit, SegmentStore,
};

pub use context::{format_snippet, render_context_text, ContextBlock, ContextBundle};

pub use search::{
    cosine_distance, cosine_similarity, fuse, group_by_document, FusedResult, HybridSearchEngine,
    SearchTuning, RRF_K,
};

pub use probe::{detect_query_patterns, ProbeSignals, SignalProbe};

pub use router::{decide_route, routing_score, RoutePath, RoutingDecision};

pub use escalation::{escalation_reasons, should_escalate_from_short};

pub use paths::{
    is_full_document_analysis, AnalysisResult, DocumentAnalysis, EvidenceBundle, LongPath,
    LongPathResult, PathDebugInfo, PathStatus, ShortPath, ShortPathResult, SubQuery,
};

pub use budget::{
    ensure_json_validity, enforce_response_budget, estimate_tokens, truncate_context,
    truncate_contexts, with_response_limit, TRUNCATION_NOTICE,
};

pub use cache::CachedEmbedder;

pub use orchestrator::{
    ExecutionSummary, Orchestrator, ProgressEvent, ProgressEventKind, RoutingStats,
};

pub use store::{sanitize_fts5_query, SqliteSegmentStore, StoreError, MIGRATIONS};

#[cfg(feature = "embeddings")]
pub use embeddings::{matryoshka_truncate, LocalEmbedder, EMBEDDING_DIMENSIONS};

#[cfg(feature = "openai")]
pub use llm::OpenAiChatModel;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        ContextBlock, ContextBundle, EmbeddingProvider, HybridSearchEngine, LanguageModel,
        Orchestrator, ProbeSignals, ProviderError, RoutePath, RoutingConfig, RoutingDecision,
        SearchHit, SegmentStore, SqliteSegmentStore,
    };

    #[cfg(feature = "embeddings")]
    pub use crate::LocalEmbedder;

    #[cfg(feature = "openai")]
    pub use crate::OpenAiChatModel;
}
