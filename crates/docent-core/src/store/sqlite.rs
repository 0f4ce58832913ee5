//! SQLite segment store.
//!
//! Full-text ranking comes from FTS5 bm25; vector ranking is exact cosine
//! over embeddings stored as little-endian f32 blobs. Exact scan keeps the
//! store dependency-free of ANN indexes - corpora this store targets are
//! small enough that the scan is not the bottleneck, and the contract only
//! requires a native ordering.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection};
use thiserror::Error;

use super::migrations::MIGRATIONS;
use super::sanitize_fts5_query;
use crate::providers::{DocumentHit, ProviderError, SearchHit, SegmentStore};
use crate::search::cosine_distance;

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Connection lock poisoned
    #[error("connection lock poisoned")]
    Lock,
}

type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for ProviderError {
    fn from(e: StoreError) -> Self {
        ProviderError::Store(e.to_string())
    }
}

// ============================================================================
// STORE
// ============================================================================

/// SQLite-backed [`SegmentStore`].
pub struct SqliteSegmentStore {
    conn: Mutex<Connection>,
}

impl SqliteSegmentStore {
    /// Open (or create) a store at `path` and apply migrations.
    pub fn open(path: &Path) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Fully in-memory store, for tests and ephemeral corpora.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // journal_mode returns its resulting mode as a row
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        for statement in MIGRATIONS {
            conn.execute_batch(statement)?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Lock)
    }

    // ------------------------------------------------------------------
    // Ingestion helpers (the query core never writes)
    // ------------------------------------------------------------------

    /// Insert a document; the embedding feeds the probe's prefilter.
    pub fn insert_document(&self, title: &str, embedding: Option<&[f32]>) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO documents (title, embedding) VALUES (?1, ?2)",
            params![title, embedding.map(vec_to_blob)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Insert one segment with its 1-based ordinal.
    pub fn insert_segment(
        &self,
        document_id: i64,
        ordinal: i64,
        text: &str,
        embedding: &[f32],
    ) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO segments (document_id, ordinal, text, embedding) VALUES (?1, ?2, ?3, ?4)",
            params![document_id, ordinal, text, vec_to_blob(embedding)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Number of segments stored.
    pub fn segment_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM segments", [], |row| row.get(0))?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn vector_nearest_sync(
        &self,
        embedding: &[f32],
        limit: usize,
        scope: Option<&[i64]>,
    ) -> Result<Vec<SearchHit>> {
        let conn = self.lock()?;
        let (clause, ids) = scope_clause("WHERE", scope);
        let sql = format!(
            "SELECT s.id, s.document_id, s.ordinal, s.text, d.title, s.embedding
             FROM segments s
             JOIN documents d ON d.id = s.document_id
             {clause}"
        );
        let mut statement = conn.prepare(&sql)?;
        let mut scored: Vec<SearchHit> = statement
            .query_map(rusqlite::params_from_iter(ids), |row| {
                let blob: Vec<u8> = row.get(5)?;
                Ok(SearchHit {
                    segment_id: row.get(0)?,
                    document_id: row.get(1)?,
                    ordinal: row.get(2)?,
                    text: row.get(3)?,
                    title: row.get(4)?,
                    score: cosine_distance(embedding, &blob_to_vec(&blob)),
                })
            })?
            .collect::<std::result::Result<_, _>>()?;

        scored.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    fn text_match_sync(
        &self,
        query: &str,
        limit: usize,
        scope: Option<&[i64]>,
    ) -> Result<Vec<SearchHit>> {
        let sanitized = sanitize_fts5_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let (clause, ids) = scope_clause("AND", scope);
        let sql = format!(
            "SELECT s.id, s.document_id, s.ordinal, s.text, d.title, bm25(segments_fts) AS rank
             FROM segments_fts
             JOIN segments s ON s.id = segments_fts.rowid
             JOIN documents d ON d.id = s.document_id
             WHERE segments_fts MATCH ? {clause}
             ORDER BY bm25(segments_fts)
             LIMIT ?"
        );
        let mut statement = conn.prepare(&sql)?;

        // Positional order: MATCH expression, scope ids, limit.
        let mut bindings: Vec<rusqlite::types::Value> =
            vec![rusqlite::types::Value::Text(sanitized)];
        bindings.extend(ids);
        bindings.push(rusqlite::types::Value::Integer(limit as i64));

        let hits = statement
            .query_map(rusqlite::params_from_iter(bindings), |row| {
                let rank: f64 = row.get(5)?;
                Ok(SearchHit {
                    segment_id: row.get(0)?,
                    document_id: row.get(1)?,
                    ordinal: row.get(2)?,
                    text: row.get(3)?,
                    title: row.get(4)?,
                    // bm25() ranks lower-is-better; negate so higher = more
                    // relevant, matching the contract.
                    score: -(rank as f32),
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(hits)
    }

    fn document_nearest_sync(&self, embedding: &[f32], limit: usize) -> Result<Vec<DocumentHit>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(
            "SELECT id, title, embedding FROM documents WHERE embedding IS NOT NULL",
        )?;
        let mut scored: Vec<DocumentHit> = statement
            .query_map([], |row| {
                let blob: Vec<u8> = row.get(2)?;
                Ok(DocumentHit {
                    document_id: row.get(0)?,
                    title: row.get(1)?,
                    distance: cosine_distance(embedding, &blob_to_vec(&blob)),
                })
            })?
            .collect::<std::result::Result<_, _>>()?;

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    fn segments_of_document_sync(&self, document_id: i64) -> Result<Vec<SearchHit>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(
            "SELECT s.id, s.document_id, s.ordinal, s.text, d.title
             FROM segments s
             JOIN documents d ON d.id = s.document_id
             WHERE s.document_id = ?1
             ORDER BY s.ordinal",
        )?;
        let hits = statement
            .query_map(params![document_id], |row| {
                Ok(SearchHit {
                    segment_id: row.get(0)?,
                    document_id: row.get(1)?,
                    ordinal: row.get(2)?,
                    text: row.get(3)?,
                    title: row.get(4)?,
                    score: 0.0,
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        Ok(hits)
    }
}

#[async_trait]
impl SegmentStore for SqliteSegmentStore {
    async fn vector_nearest(
        &self,
        embedding: &[f32],
        limit: usize,
        scope: Option<&[i64]>,
    ) -> crate::providers::Result<Vec<SearchHit>> {
        Ok(self.vector_nearest_sync(embedding, limit, scope)?)
    }

    async fn text_match(
        &self,
        query: &str,
        limit: usize,
        scope: Option<&[i64]>,
    ) -> crate::providers::Result<Vec<SearchHit>> {
        Ok(self.text_match_sync(query, limit, scope)?)
    }

    async fn document_nearest(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> crate::providers::Result<Vec<DocumentHit>> {
        Ok(self.document_nearest_sync(embedding, limit)?)
    }

    async fn segments_of_document(
        &self,
        document_id: i64,
    ) -> crate::providers::Result<Vec<SearchHit>> {
        Ok(self.segments_of_document_sync(document_id)?)
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Build a `<conjunction> s.document_id IN (...)` clause plus its bound
/// values for an optional document scope. `conjunction` is `WHERE` or
/// `AND` depending on the surrounding query.
fn scope_clause(
    conjunction: &str,
    scope: Option<&[i64]>,
) -> (String, Vec<rusqlite::types::Value>) {
    match scope {
        Some(ids) if !ids.is_empty() => {
            let placeholders = vec!["?"; ids.len()].join(", ");
            (
                format!("{conjunction} s.document_id IN ({placeholders})"),
                ids.iter()
                    .map(|id| rusqlite::types::Value::Integer(*id))
                    .collect(),
            )
        }
        _ => (String::new(), Vec::new()),
    }
}

fn vec_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
