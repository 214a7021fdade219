#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use polrag_core::config::RetrievalSettings;
use polrag_core::traits::{CandidateSource, Embedder, MetadataStore};
use polrag_core::{
    Candidate, ChunkId, ContentType, Error, PolicyChunk, PolicySource, Region, Result, RetrievalFilters, SectionLevel,
    EMBEDDING_DIM,
};
use polrag_hybrid::HybridRetriever;

/// Returns the same unit vector for every text.
pub struct ConstEmbedder {
    pub dim: usize,
    pub calls: AtomicUsize,
}

impl ConstEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, calls: AtomicUsize::new(0) } }
}

impl Embedder for ConstEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let v = 1.0 / (self.dim as f32).sqrt();
        Ok(texts.iter().map(|_| vec![v; self.dim]).collect())
    }
}

/// Serves a fixed candidate list, best first, cut to `k`.
pub struct ScriptedSource {
    pub candidates: Vec<Candidate>,
    pub calls: AtomicUsize,
    pub last_k: AtomicUsize,
    pub down: bool,
}

impl ScriptedSource {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates, calls: AtomicUsize::new(0), last_k: AtomicUsize::new(0), down: false }
    }

    pub fn unreachable() -> Self { Self { down: true, ..Self::new(Vec::new()) } }
}

impl CandidateSource for ScriptedSource {
    fn fetch_candidates(&self, _query_vec: &[f32], k: usize) -> Result<Vec<Candidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_k.store(k, Ordering::SeqCst);
        if self.down { return Err(Error::CandidateSourceUnavailable("connection refused".into())); }
        Ok(self.candidates.iter().take(k).cloned().collect())
    }

    fn ping(&self) -> Result<()> {
        if self.down { Err(Error::CandidateSourceUnavailable("connection refused".into())) } else { Ok(()) }
    }
}

/// In-memory authoritative store applying the filters client-side.
pub struct MapStore {
    pub chunks: HashMap<ChunkId, PolicyChunk>,
    pub calls: AtomicUsize,
    pub down: bool,
}

impl MapStore {
    pub fn new(chunks: impl IntoIterator<Item = PolicyChunk>) -> Self {
        Self { chunks: chunks.into_iter().map(|c| (c.id.clone(), c)).collect(), calls: AtomicUsize::new(0), down: false }
    }

    pub fn unreachable() -> Self { Self { down: true, ..Self::new(Vec::new()) } }
}

impl MetadataStore for MapStore {
    fn resolve(&self, ids: &[ChunkId], filters: &RetrievalFilters) -> Result<HashMap<ChunkId, PolicyChunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down { return Err(Error::MetadataStoreUnavailable("database is locked".into())); }
        Ok(ids
            .iter()
            .filter_map(|id| self.chunks.get(id))
            .filter(|c| filters.matches(c.region, c.content_type, c.policy_source))
            .map(|c| (c.id.clone(), c.clone()))
            .collect())
    }

    fn ping(&self) -> Result<()> {
        if self.down { Err(Error::MetadataStoreUnavailable("database is locked".into())) } else { Ok(()) }
    }
}

pub fn chunk(id: &str, level: SectionLevel, region: Region, content_type: ContentType) -> PolicyChunk {
    PolicyChunk {
        id: id.to_string(),
        doc_id: format!("doc-{id}"),
        chunk_index: 0,
        chunk_text: format!("passage {id}"),
        policy_source: PolicySource::Google,
        policy_section: format!("Section {id}"),
        policy_path: format!("Policies > Section {id}"),
        section_level: level,
        region,
        content_type,
        doc_url: format!("https://support.google.com/adspolicy/answer/{id}"),
        effective_date: None,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub fn candidate(id: &str, distance: f32) -> Candidate { Candidate { id: id.to_string(), distance, metadata: None } }

/// Distance whose fused score is `score`.
pub fn distance_for(score: f64) -> f32 { (1.0 / score - 1.0) as f32 }

pub struct Harness {
    pub embedder: Arc<ConstEmbedder>,
    pub source: Arc<ScriptedSource>,
    pub store: Arc<MapStore>,
    pub retriever: HybridRetriever<Arc<ScriptedSource>, Arc<MapStore>>,
}

pub fn harness(source: ScriptedSource, store: MapStore) -> Harness { harness_with(source, store, RetrievalSettings::default()) }

pub fn harness_with(source: ScriptedSource, store: MapStore, settings: RetrievalSettings) -> Harness {
    let embedder = Arc::new(ConstEmbedder::new(EMBEDDING_DIM));
    let source = Arc::new(source);
    let store = Arc::new(store);
    let shared: Arc<dyn Embedder> = embedder.clone();
    let retriever = HybridRetriever::new(shared, Arc::clone(&source), Arc::clone(&store), settings).expect("retriever");
    Harness { embedder, source, store, retriever }
}

impl Harness {
    pub fn io_calls(&self) -> (usize, usize, usize) {
        (
            self.embedder.calls.load(Ordering::SeqCst),
            self.source.calls.load(Ordering::SeqCst),
            self.store.calls.load(Ordering::SeqCst),
        )
    }
}

pub fn ids(results: &[polrag_core::RetrievalResult]) -> Vec<&str> { results.iter().map(|r| r.chunk_id.as_str()).collect() }
