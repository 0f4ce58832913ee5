//! Retrieved Context Types
//!
//! A [`ContextBundle`] is the full retrieval result for one query: the
//! structured per-document [`ContextBlock`]s plus their canonical text
//! serialization. The serialization format is load-bearing - downstream
//! citation parsing relies on it exactly:
//!
//! ```text
//! {Document Title}
//! [§1] first snippet text
//! [§4] another snippet text
//!
//! {Next Document Title}
//! [§2] ...
//! ```

use serde::{Deserialize, Serialize};

/// One document's contribution to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBlock {
    pub document_id: i64,
    pub title: String,
    /// Snippets in fused-rank order, each prefixed with its section marker
    pub snippets: Vec<String>,
}

/// The full retrieval result for one query.
///
/// `context_text` is always a pure, order-preserving serialization of
/// `blocks`; construct bundles through [`ContextBundle::new`] so the two
/// never drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBundle {
    pub query: String,
    pub context_text: String,
    pub blocks: Vec<ContextBlock>,
}

impl ContextBundle {
    pub fn new(query: impl Into<String>, blocks: Vec<ContextBlock>) -> Self {
        let context_text = render_context_text(&blocks);
        Self {
            query: query.into(),
            context_text,
            blocks,
        }
    }

    /// An empty bundle: retrieval succeeded but found nothing.
    pub fn empty(query: impl Into<String>) -> Self {
        Self::new(query, Vec::new())
    }

    /// True when retrieval produced no usable context.
    pub fn is_empty(&self) -> bool {
        self.context_text.trim().is_empty()
    }

    /// Total snippet count across all blocks.
    pub fn segment_count(&self) -> usize {
        self.blocks.iter().map(|b| b.snippets.len()).sum()
    }
}

/// Format one snippet with its section marker: `[§<ordinal>] <text>`.
pub fn format_snippet(ordinal: i64, text: &str) -> String {
    format!("[§{ordinal}] {text}")
}

/// Serialize blocks into the canonical context text: brace-delimited title
/// line, one snippet per line, blank line between documents.
pub fn render_context_text(blocks: &[ContextBlock]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for block in blocks {
        lines.push(format!("{{{}}}", block.title));
        for snippet in &block.snippets {
            lines.push(snippet.clone());
        }
        lines.push(String::new());
    }
    lines.join("\n").trim().to_string()
}

// ============================================================================
// TESTS
// ============================================================================
