use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use polrag_core::config::RetrievalSettings;
use polrag_core::traits::{CandidateSource, Embedder, MetadataStore};
use polrag_core::{ChunkId, Error, Result, RetrievalFilters, RetrievalRequest, RetrievalResult, EMBEDDING_DIM};

use crate::fusion::fuse;
use crate::rerank::HierarchyReranker;

/// The retrieval orchestrator.
///
/// Holds the shared embedder plus one candidate source and one metadata
/// store. Calls share no mutable state, so one retriever serves any number of
/// threads.
pub struct HybridRetriever<C, M> {
    embedder: Arc<dyn Embedder>,
    candidates: C,
    store: M,
    settings: RetrievalSettings,
    reranker: HierarchyReranker,
}

impl<C, M> HybridRetriever<C, M>
where
    C: CandidateSource,
    M: MetadataStore,
{
    /// Fails with `DimensionMismatch` unless the embedder produces
    /// `EMBEDDING_DIM`-wide vectors.
    pub fn new(embedder: Arc<dyn Embedder>, candidates: C, store: M, settings: RetrievalSettings) -> Result<Self> {
        if embedder.dim() != EMBEDDING_DIM {
            return Err(Error::DimensionMismatch { expected: EMBEDDING_DIM, actual: embedder.dim() });
        }
        let reranker = HierarchyReranker::new(settings.specificity_boost);
        Ok(Self { embedder, candidates, store, settings, reranker })
    }

    /// Number of candidates fetched for `limit` results.
    pub fn overfetch_count(&self, limit: usize) -> usize {
        limit.saturating_mul(self.settings.overfetch_multiplier).min(self.settings.max_candidates)
    }

    /// Rank passages for a query.
    ///
    /// `limit <= 0` returns an empty list without touching any collaborator.
    /// Filters are validated before the first I/O call. An empty index, or a
    /// candidate set the filters remove entirely, is an empty `Ok`.
    pub fn retrieve(&self, request: &RetrievalRequest) -> Result<Vec<RetrievalResult>> {
        if request.limit <= 0 { return Ok(Vec::new()); }
        let filters = RetrievalFilters::from_raw(
            request.region.as_deref(),
            request.content_type.as_deref(),
            request.policy_source.as_deref(),
        )?;
        let limit = self.clamp_limit(request.limit);
        let start = Instant::now();

        let query_vec = self.embedder.embed(&request.query)?;
        let k = self.overfetch_count(limit);
        let candidates = self.candidates.fetch_candidates(&query_vec, k)?;
        tracing::debug!(k, fetched = candidates.len(), "candidates fetched");
        if candidates.is_empty() { return Ok(Vec::new()); }

        let ids: Vec<ChunkId> = candidates.iter().map(|c| c.id.clone()).collect();
        let resolved = self.store.resolve(&ids, &filters)?;
        let fused = fuse(&candidates, &resolved);
        tracing::debug!(resolved = resolved.len(), kept = fused.len(), dropped = candidates.len() - fused.len(), "candidates resolved");

        let mut ranked = self.reranker.rerank(fused, request.prefer_specific);
        ranked.truncate(limit);
        tracing::info!(
            limit,
            returned = ranked.len(),
            prefer_specific = request.prefer_specific,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "retrieval complete"
        );
        Ok(ranked)
    }

    /// Positional form of [`retrieve`](Self::retrieve).
    pub fn search(
        &self,
        query: &str,
        limit: i64,
        region: Option<&str>,
        content_type: Option<&str>,
        policy_source: Option<&str>,
        prefer_specific: bool,
    ) -> Result<Vec<RetrievalResult>> {
        let request = RetrievalRequest {
            query: query.to_string(),
            limit,
            region: region.map(str::to_string),
            content_type: content_type.map(str::to_string),
            policy_source: policy_source.map(str::to_string),
            prefer_specific,
        };
        self.retrieve(&request)
    }

    /// Probe both stores. Never fails; problems are reported per component.
    pub fn health(&self) -> HealthReport {
        let database = component_status(self.store.ping());
        let vector_db = component_status(self.candidates.ping());
        let healthy = database == CONNECTED && vector_db == CONNECTED;
        HealthReport { status: if healthy { "healthy" } else { "degraded" }.to_string(), database, vector_db }
    }

    fn clamp_limit(&self, requested: i64) -> usize {
        let max = self.settings.max_limit;
        match usize::try_from(requested) {
            Ok(n) if n <= max => n,
            _ => {
                tracing::debug!(requested, max, "limit clamped");
                max
            }
        }
    }
}

const CONNECTED: &str = "connected";

fn component_status(probe: Result<()>) -> String {
    match probe {
        Ok(()) => CONNECTED.to_string(),
        Err(e) => format!("error: {e}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub database: String,
    pub vector_db: String,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool { self.status == "healthy" }
}
