//! Execution Paths
//!
//! The two answer pipelines the router chooses between, plus the
//! map-reduce full-document analysis pass:
//! - SHORT: one retrieval pass, one synthesis call ([`ShortPath`])
//! - LONG: subquery decomposition, budget-bounded iterative retrieval,
//!   comprehensive synthesis ([`LongPath`])
//!
//! Both paths share the same contract: they always return an answer
//! string and never propagate errors past their boundary. Failures are
//! explicit in the result's [`PathStatus`], with user-facing apology text
//! as the answer.

mod analysis;
mod long;
mod short;

pub use analysis::{
    is_full_document_analysis, AnalysisResult, DocumentAnalysis, ANALYSIS_CHUNK_SEGMENTS,
};
pub use long::{EvidenceBundle, LongPath, LongPathResult, SubQuery};
pub use short::{PathDebugInfo, ShortPath, ShortPathResult};

use serde::{Deserialize, Serialize};

/// Explicit success/failure tag on a path result.
///
/// Real panics are reserved for truly unexpected conditions; every
/// anticipated failure (store, embedding, model) lands here instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "reason")]
pub enum PathStatus {
    Completed,
    Failed(String),
}

impl PathStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, PathStatus::Completed)
    }
}

/// User-facing apology for a failed execution step.
pub(crate) fn apology(detail: &str) -> String {
    format!("I encountered an error while processing your request: {detail}")
}
