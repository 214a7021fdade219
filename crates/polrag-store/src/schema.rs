use rusqlite::Connection;

use polrag_core::Result;

use crate::to_store_err;

/// Enumerated columns hold the canonical lower-case spelling. Timestamps are
/// RFC 3339 text in UTC.
pub const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS policy_chunks (
    id              TEXT PRIMARY KEY,
    doc_id          TEXT NOT NULL,
    chunk_index     INTEGER NOT NULL,
    chunk_text      TEXT NOT NULL,
    policy_source   TEXT NOT NULL,
    policy_section  TEXT NOT NULL,
    policy_path     TEXT NOT NULL,
    section_level   TEXT NOT NULL,
    region          TEXT NOT NULL,
    content_type    TEXT NOT NULL,
    doc_url         TEXT NOT NULL,
    effective_date  TEXT,
    created_at      TEXT NOT NULL,
    UNIQUE (doc_id, chunk_index)
);
CREATE INDEX IF NOT EXISTS idx_policy_chunks_doc_id ON policy_chunks (doc_id);
CREATE INDEX IF NOT EXISTS idx_policy_chunks_filters ON policy_chunks (region, content_type, policy_source);
";

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_SCHEMA).map_err(to_store_err)
}

pub const SELECT_COLUMNS: &str = "id, doc_id, chunk_index, chunk_text, policy_source, policy_section, policy_path, \
     section_level, region, content_type, doc_url, effective_date, created_at";
