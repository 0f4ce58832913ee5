//! Schema migrations for the SQLite segment store.
//!
//! Applied in order on open; every statement is idempotent so reopening
//! an existing database is safe.

/// Ordered schema statements.
pub const MIGRATIONS: &[&str] = &[
    // Documents: title + optional document-level embedding used by the
    // probe's prefilter.
    "CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        embedding BLOB
    );",
    // Segments: the atomic retrievable unit. Immutable once created;
    // ordinal is the 1-based position within the document.
    "CREATE TABLE IF NOT EXISTS segments (
        id INTEGER PRIMARY KEY,
        document_id INTEGER NOT NULL REFERENCES documents(id),
        ordinal INTEGER NOT NULL,
        text TEXT NOT NULL,
        embedding BLOB NOT NULL,
        UNIQUE(document_id, ordinal)
    );",
    "CREATE INDEX IF NOT EXISTS idx_segments_document ON segments(document_id, ordinal);",
    // FTS5 index over segment text, external-content against segments.
    "CREATE VIRTUAL TABLE IF NOT EXISTS segments_fts USING fts5(
        text,
        content='segments',
        content_rowid='id'
    );",
    "CREATE TRIGGER IF NOT EXISTS segments_fts_insert AFTER INSERT ON segments BEGIN
        INSERT INTO segments_fts(rowid, text) VALUES (new.id, new.text);
    END;",
    "CREATE TRIGGER IF NOT EXISTS segments_fts_delete AFTER DELETE ON segments BEGIN
        INSERT INTO segments_fts(segments_fts, rowid, text) VALUES ('delete', old.id, old.text);
    END;",
    "CREATE TRIGGER IF NOT EXISTS segments_fts_update AFTER UPDATE ON segments BEGIN
        INSERT INTO segments_fts(segments_fts, rowid, text) VALUES ('delete', old.id, old.text);
        INSERT INTO segments_fts(rowid, text) VALUES (new.id, new.text);
    END;",
];
