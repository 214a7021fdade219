use anyhow::{anyhow, Result};
use arrow_array::{ArrayRef, FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::sync::Arc;

use polrag_core::PolicyChunk;

use crate::schema::{build_arrow_schema, VECTOR_DIM};
use crate::table::{open_db, table_exists};

const BATCH_SIZE: usize = 1000;

/// Writes chunk vectors keyed by chunk id, with a metadata snapshot.
///
/// Used to lay down fixtures; bulk ingestion lives outside this workspace.
pub struct VectorIndexWriter { pub(crate) db: Connection, pub(crate) table_name: String }

impl VectorIndexWriter {
    pub async fn new(uri: &str, table_name: &str) -> Result<Self> {
        let db = open_db(uri).await?;
        Ok(Self { db, table_name: table_name.to_string() })
    }

    pub async fn index(&self, chunks: &[PolicyChunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        if chunks.is_empty() { tracing::debug!("no chunks to index"); return Ok(0); }
        if chunks.len() != embeddings.len() {
            return Err(anyhow!("chunks and embeddings length differ: {} vs {}", chunks.len(), embeddings.len()));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != VECTOR_DIM as usize) {
            return Err(anyhow!("embedding has {} dims, expected {}", bad.len(), VECTOR_DIM));
        }
        tracing::info!(chunks = chunks.len(), table = %self.table_name, "indexing vectors");
        let pb = ProgressBar::new(chunks.len() as u64);
        let style = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")?;
        pb.set_style(style.progress_chars("#>-"));
        let mut written = 0usize;
        for (chunk_batch, emb_batch) in chunks.chunks(BATCH_SIZE).zip(embeddings.chunks(BATCH_SIZE)) {
            self.insert_batch(chunk_batch, emb_batch).await?;
            written += chunk_batch.len();
            pb.set_position(written as u64);
        }
        pb.finish_and_clear();
        Ok(written)
    }

    async fn insert_batch(&self, chunks: &[PolicyChunk], embeddings: &[Vec<f32>]) -> Result<()> {
        let record_batch = to_record_batch(chunks, embeddings)?;
        let schema = record_batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
        if table_exists(&self.db, &self.table_name).await? {
            self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
        } else {
            self.db.create_table(&self.table_name, reader).execute().await?;
        }
        Ok(())
    }
}

fn to_record_batch(chunks: &[PolicyChunk], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
    let column = |f: fn(&PolicyChunk) -> String| -> ArrayRef { Arc::new(StringArray::from(chunks.iter().map(f).collect::<Vec<_>>())) };
    let vectors = embeddings.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
    let columns: Vec<ArrayRef> = vec![
        column(|c| c.id.clone()),
        column(|c| c.doc_id.clone()),
        column(|c| c.policy_section.clone()),
        column(|c| c.policy_path.clone()),
        column(|c| c.section_level.as_str().to_string()),
        column(|c| c.policy_source.as_str().to_string()),
        column(|c| c.region.as_str().to_string()),
        column(|c| c.content_type.as_str().to_string()),
        Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, VECTOR_DIM)),
    ];
    let record_batch = RecordBatch::try_new(build_arrow_schema(), columns)?;
    Ok(record_batch)
}
