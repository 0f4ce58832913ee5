//! Segment Store
//!
//! SQLite-backed reference implementation of the [`SegmentStore`]
//! contract: FTS5 full-text search with query sanitization, and vector
//! ranking over embeddings stored alongside each segment. The query core
//! never writes; the insert helpers exist for ingestion pipelines and
//! tests.
//!
//! [`SegmentStore`]: crate::providers::SegmentStore

mod migrations;
mod sqlite;

pub use migrations::MIGRATIONS;
pub use sqlite::{SqliteSegmentStore, StoreError};

/// English stop words removed before matching. FTS5 indexes every token,
/// so filler words in a natural-language query would otherwise force a
/// conjunctive match against words no segment needs to contain.
const STOP_WORDS: [&str; 36] = [
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "if",
    "in", "into", "is", "it", "no", "not", "of", "on", "or", "such", "that", "the", "their",
    "then", "there", "these", "they", "this", "to", "what", "when", "which",
];

/// Sanitize free text into a safe FTS5 MATCH expression.
///
/// Every token is stripped to alphanumerics and double-quoted, which
/// neutralizes FTS5 operators (`AND`, `NEAR`, `*`, `:`); stop words are
/// dropped; survivors join with spaces (implicit AND). Returns an empty
/// string when nothing survives; callers treat that as "no lexical hits".
pub fn sanitize_fts5_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|token| {
            token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|token| !token.is_empty())
        .filter(|token| !STOP_WORDS.contains(&token.to_lowercase().as_str()))
        .map(|token| format!("\"{token}\""))
        .collect::<Vec<_>>()
        .join(" ")
}
