use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};

use polrag_core::config::{expand_path, StoreSettings};
use polrag_core::filters::RetrievalFilters;
use polrag_core::traits::MetadataStore;
use polrag_core::{ChunkId, ContentType, Error, PolicyChunk, PolicySource, Region, Result, SectionLevel};

use crate::pool::{apply_write_pragmas, ReadPool};
use crate::schema::{create_schema, SELECT_COLUMNS};
use crate::to_store_err;

/// SQLite-backed [`MetadataStore`].
pub struct SqliteMetadataStore {
    writer: Mutex<Connection>,
    readers: ReadPool,
}

impl SqliteMetadataStore {
    pub fn open(settings: &StoreSettings) -> Result<Self> {
        Self::open_path(&expand_path(&settings.sqlite_path), settings.pool_size, settings.busy_timeout_ms)
    }

    /// Open (creating if needed) the database file and its schema.
    pub fn open_path(path: &Path, pool_size: usize, busy_timeout_ms: u64) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(to_store_err)?;
        }
        let writer = Connection::open(path).map_err(to_store_err)?;
        apply_write_pragmas(&writer, busy_timeout_ms)?;
        create_schema(&writer)?;
        let readers = ReadPool::open(path, pool_size, busy_timeout_ms)?;
        tracing::debug!(path = %path.display(), readers = readers.size(), "metadata store opened");
        Ok(Self { writer: Mutex::new(writer), readers })
    }

    /// Insert chunk records in one transaction. A duplicate id or
    /// `(doc_id, chunk_index)` pair rejects the whole batch.
    pub fn insert_chunks(&self, chunks: &[PolicyChunk]) -> Result<usize> {
        let mut conn = self.writer.lock().map_err(|e| to_store_err(format!("writer lock poisoned: {e}")))?;
        let tx = conn.transaction().map_err(to_store_err)?;
        {
            let mut stmt = tx
                .prepare(&format!("INSERT INTO policy_chunks ({SELECT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"))
                .map_err(to_store_err)?;
            for c in chunks {
                stmt.execute(params![
                    c.id,
                    c.doc_id,
                    c.chunk_index,
                    c.chunk_text,
                    c.policy_source.as_str(),
                    c.policy_section,
                    c.policy_path,
                    c.section_level.as_str(),
                    c.region.as_str(),
                    c.content_type.as_str(),
                    c.doc_url,
                    c.effective_date.map(|d| d.to_rfc3339()),
                    c.created_at.to_rfc3339(),
                ])
                .map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation => {
                        Error::InvalidRecord { id: c.id.clone(), reason: "duplicate chunk id or position".into() }
                    }
                    other => to_store_err(other),
                })?;
            }
        }
        tx.commit().map_err(to_store_err)?;
        tracing::info!(chunks = chunks.len(), "inserted chunk records");
        Ok(chunks.len())
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn resolve(&self, ids: &[ChunkId], filters: &RetrievalFilters) -> Result<HashMap<ChunkId, PolicyChunk>> {
        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<&str> = ids.iter().map(String::as_str).filter(|id| seen.insert(*id)).collect();
        if unique.is_empty() { return Ok(HashMap::new()); }

        let start = Instant::now();
        let placeholders = vec!["?"; unique.len()].join(", ");
        let mut sql = format!("SELECT {SELECT_COLUMNS} FROM policy_chunks WHERE id IN ({placeholders})");
        let mut args = unique.clone();
        if let Some(r) = filters.region { sql.push_str(" AND region = ?"); args.push(r.as_str()); }
        if let Some(c) = filters.content_type { sql.push_str(" AND content_type = ?"); args.push(c.as_str()); }
        if let Some(s) = filters.policy_source { sql.push_str(" AND policy_source = ?"); args.push(s.as_str()); }

        let rows = self.readers.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(to_store_err)?;
            let rows = stmt.query_map(params_from_iter(args.iter()), RawChunk::from_row).map_err(to_store_err)?;
            let raw = rows.collect::<rusqlite::Result<Vec<_>>>().map_err(to_store_err)?;
            Ok(raw)
        })?;

        let mut resolved = HashMap::with_capacity(rows.len());
        for raw in rows {
            let chunk = raw.into_chunk()?;
            resolved.insert(chunk.id.clone(), chunk);
        }
        tracing::debug!(
            requested = unique.len(),
            resolved = resolved.len(),
            filtered = !filters.is_empty(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "metadata resolved"
        );
        Ok(resolved)
    }

    fn ping(&self) -> Result<()> {
        self.readers.with_conn(|conn| conn.query_row("SELECT 1", [], |_| Ok(())).map_err(to_store_err))
    }
}

/// Row as stored, before enum and timestamp parsing.
struct RawChunk {
    id: String,
    doc_id: String,
    chunk_index: i64,
    chunk_text: String,
    policy_source: String,
    policy_section: String,
    policy_path: String,
    section_level: String,
    region: String,
    content_type: String,
    doc_url: String,
    effective_date: Option<String>,
    created_at: String,
}

impl RawChunk {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            doc_id: row.get(1)?,
            chunk_index: row.get(2)?,
            chunk_text: row.get(3)?,
            policy_source: row.get(4)?,
            policy_section: row.get(5)?,
            policy_path: row.get(6)?,
            section_level: row.get(7)?,
            region: row.get(8)?,
            content_type: row.get(9)?,
            doc_url: row.get(10)?,
            effective_date: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    fn into_chunk(self) -> Result<PolicyChunk> {
        let id = self.id;
        let invalid = |reason: String| Error::InvalidRecord { id: id.clone(), reason };
        let chunk_index = u32::try_from(self.chunk_index).map_err(|_| invalid(format!("chunk_index {} out of range", self.chunk_index)))?;
        let section_level = SectionLevel::parse(&self.section_level)
            .ok_or_else(|| invalid(format!("unknown section level {:?}", self.section_level)))?;
        let policy_source = self.policy_source.parse::<PolicySource>().map_err(|e| invalid(e.to_string()))?;
        let region = self.region.parse::<Region>().map_err(|e| invalid(e.to_string()))?;
        let content_type = self.content_type.parse::<ContentType>().map_err(|e| invalid(e.to_string()))?;
        let effective_date = self.effective_date.as_deref().map(parse_timestamp).transpose().map_err(&invalid)?;
        let created_at = parse_timestamp(&self.created_at).map_err(&invalid)?;
        Ok(PolicyChunk {
            id,
            doc_id: self.doc_id,
            chunk_index,
            chunk_text: self.chunk_text,
            policy_source,
            policy_section: self.policy_section,
            policy_path: self.policy_path,
            section_level,
            region,
            content_type,
            doc_url: self.doc_url,
            effective_date,
            created_at,
        })
    }
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc)).map_err(|e| format!("bad timestamp {s:?}: {e}"))
}
