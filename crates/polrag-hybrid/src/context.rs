//! Process-wide retrieval context.
//!
//! Built once at startup: loads the embedding model, opens the LanceDB
//! candidate source and the SQLite read pool, and hands out a single
//! [`HybridRetriever`]. Share it behind an `Arc`.
use std::sync::Arc;

use polrag_core::config::{Config, Settings};
use polrag_core::{Result, RetrievalRequest, RetrievalResult};
use polrag_embed::shared_embedder;
use polrag_store::SqliteMetadataStore;
use polrag_vector::LanceCandidateSource;

use crate::retriever::{HealthReport, HybridRetriever};

pub type DefaultRetriever = HybridRetriever<LanceCandidateSource, SqliteMetadataStore>;

pub struct RetrievalContext {
    settings: Settings,
    retriever: DefaultRetriever,
}

impl RetrievalContext {
    /// Load configuration from the working directory and build the context.
    pub fn load() -> Result<Self> {
        let settings = Config::load()?.settings()?;
        Self::from_settings(settings)
    }

    pub fn from_settings(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let embedder = Arc::new(shared_embedder(&settings.embedding));
        embedder.warm_up()?;
        let candidates = LanceCandidateSource::open(&settings.vector)?;
        let store = SqliteMetadataStore::open(&settings.store)?;
        let retriever = HybridRetriever::new(embedder, candidates, store, settings.retrieval.clone())?;
        tracing::info!(table = %settings.vector.table, db = %settings.store.sqlite_path, "retrieval context ready");
        Ok(Self { settings, retriever })
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn retrieve(&self, request: &RetrievalRequest) -> Result<Vec<RetrievalResult>> { self.retriever.retrieve(request) }

    pub fn health(&self) -> HealthReport { self.retriever.health() }
}
