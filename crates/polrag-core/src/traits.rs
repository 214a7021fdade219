use std::collections::HashMap;

use crate::error::Result;
use crate::filters::RetrievalFilters;
use crate::types::{Candidate, ChunkId, PolicyChunk};

/// Maps text to a fixed-dimension vector. Must be deterministic.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::Error::Embedding("embedder returned no vector".into()))
    }
}

/// Semantic index returning candidates ordered by ascending distance.
///
/// Implementations never filter and never re-sort; the index order is kept
/// verbatim.
pub trait CandidateSource: Send + Sync {
    fn fetch_candidates(&self, query_vec: &[f32], k: usize) -> Result<Vec<Candidate>>;

    /// Cheap reachability probe.
    fn ping(&self) -> Result<()> { Ok(()) }
}

/// Relational store holding the authoritative chunk records.
///
/// `resolve` looks every id up in one batch and keeps only rows passing all
/// supplied filters. Unknown ids are dropped silently.
pub trait MetadataStore: Send + Sync {
    fn resolve(&self, ids: &[ChunkId], filters: &RetrievalFilters) -> Result<HashMap<ChunkId, PolicyChunk>>;

    fn ping(&self) -> Result<()> { Ok(()) }
}

impl<T: Embedder + ?Sized> Embedder for std::sync::Arc<T> {
    fn dim(&self) -> usize { (**self).dim() }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
}

impl<T: CandidateSource + ?Sized> CandidateSource for std::sync::Arc<T> {
    fn fetch_candidates(&self, query_vec: &[f32], k: usize) -> Result<Vec<Candidate>> { (**self).fetch_candidates(query_vec, k) }
    fn ping(&self) -> Result<()> { (**self).ping() }
}

impl<T: MetadataStore + ?Sized> MetadataStore for std::sync::Arc<T> {
    fn resolve(&self, ids: &[ChunkId], filters: &RetrievalFilters) -> Result<HashMap<ChunkId, PolicyChunk>> { (**self).resolve(ids, filters) }
    fn ping(&self) -> Result<()> { (**self).ping() }
}
