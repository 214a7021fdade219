//! polrag-embed
//!
//! Query embedding for retrieval: a candle port of all-MiniLM-L6-v2 (384-d,
//! mean pooled, L2-normalized), a deterministic hashing embedder for tests and
//! offline development, and a lazily initialized shared handle.
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use polrag_core::config::{expand_path, EmbeddingSettings};
use polrag_core::traits::Embedder;
use polrag_core::{Error, EMBEDDING_DIM};

pub mod device;
pub mod lazy;
pub mod pool;
pub mod tokenize;

pub use lazy::LazyEmbedder;
pub use pool::masked_mean_l2;

/// Sequence length MiniLM was trained with.
pub const MAX_TOKENS: usize = 256;

pub struct MiniLmEmbedder { model: BertModel, tokenizer: Tokenizer, device: Device }

impl MiniLmEmbedder {
    /// Load tokenizer, config and weights from a local model directory.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let device = device::select_device();
        tracing::info!(dir = %model_dir.display(), "loading all-MiniLM-L6-v2");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        let tensors = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;
        tracing::info!("embedding model loaded");
        Ok(Self { model, tokenizer, device })
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let start = Instant::now();
        let batch = tokenize::tokenize_batch(&self.tokenizer, texts, MAX_TOKENS, &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        if let Some(v) = vectors.first() {
            if v.len() != EMBEDDING_DIM { return Err(anyhow!("model produced {} dims, expected {}", v.len(), EMBEDDING_DIM)); }
        }
        tracing::debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(vectors)
    }
}

impl Embedder for MiniLmEmbedder {
    fn dim(&self) -> usize { EMBEDDING_DIM }
    fn embed_batch(&self, texts: &[String]) -> polrag_core::Result<Vec<Vec<f32>>> {
        self.embed_texts(texts).map_err(|e| Error::Embedding(e.to_string()))
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<std::collections::HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    let weights = candle_core::pickle::read_all(&pickle).with_context(|| format!("reading {}", pickle.display()))?;
    Ok(weights.into_iter().collect())
}

/// Token-hashing embedder: deterministic, L2-normalized, no model files.
/// Text without tokens maps to the uniform unit vector.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        if v.iter().all(|x| *x == 0.0) {
            return vec![1.0 / (self.dim as f32).sqrt(); self.dim];
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> polrag_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// True when `APP_USE_FAKE_EMBEDDINGS` is `1` or `true`.
pub fn fake_embeddings_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Build the configured embedder eagerly.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if settings.use_fake || fake_embeddings_forced() {
        tracing::info!("using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(EMBEDDING_DIM)));
    }
    let dir = resolve_model_dir(settings)?;
    Ok(Box::new(MiniLmEmbedder::load(&dir)?))
}

/// Handle that defers model loading to first use and then shares it.
pub fn shared_embedder(settings: &EmbeddingSettings) -> LazyEmbedder {
    let settings = settings.clone();
    LazyEmbedder::new(EMBEDDING_DIM, move || get_default_embedder(&settings))
}

fn resolve_model_dir(settings: &EmbeddingSettings) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") {
        let p = expand_path(&dir);
        if p.exists() { return Ok(p); }
    }
    let p = expand_path(&settings.model_dir);
    if p.exists() { return Ok(p); }
    Err(anyhow!("Could not locate embedding model directory {}", p.display()))
}
