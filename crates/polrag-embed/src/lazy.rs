//! Once-initialized embedder handle.
//!
//! The model is loaded on the first call that needs it. Concurrent first
//! callers block on the same `OnceLock`, so the loader runs exactly once; the
//! loaded model is read-only afterwards. A failed load is remembered and
//! reported on every later call.
use std::sync::OnceLock;

use polrag_core::traits::Embedder;
use polrag_core::{Error, Result};

type Loader = Box<dyn Fn() -> anyhow::Result<Box<dyn Embedder>> + Send + Sync>;

pub struct LazyEmbedder {
    dim: usize,
    loader: Loader,
    cell: OnceLock<std::result::Result<Box<dyn Embedder>, String>>,
}

impl LazyEmbedder {
    pub fn new<F>(dim: usize, loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn Embedder>> + Send + Sync + 'static,
    {
        Self { dim, loader: Box::new(loader), cell: OnceLock::new() }
    }

    /// Force initialization and verify the loaded model's dimensionality.
    pub fn warm_up(&self) -> Result<()> {
        let inner = self.inner()?;
        if inner.dim() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: inner.dim() });
        }
        Ok(())
    }

    fn inner(&self) -> Result<&dyn Embedder> {
        let slot = self.cell.get_or_init(|| (self.loader)().map_err(|e| format!("{e:#}")));
        match slot {
            Ok(embedder) => Ok(embedder.as_ref()),
            Err(msg) => Err(Error::Embedding(format!("model initialization failed: {msg}"))),
        }
    }
}

impl Embedder for LazyEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { self.inner()?.embed_batch(texts) }
}
