//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `polrag.toml`, `polrag.<env>.toml`
//! and `APP_*` env vars (`__` separates nested keys), then extracts a typed
//! [`Settings`] and validates it.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Merge defaults, `polrag.toml`, `polrag.<env>.toml` and `APP_*` variables.
    pub fn load_from(dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("polrag.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("polrag.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("polrag.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("polrag.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    /// Typed, validated view of the whole configuration.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub vector: VectorSettings,
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub default_limit: usize,
    pub max_limit: usize,
    /// Candidates fetched per requested result, absorbing filter losses.
    pub overfetch_multiplier: usize,
    /// Hard ceiling on one candidate fetch.
    pub max_candidates: usize,
    /// Added to the fused score of leaf sections when specificity is preferred.
    pub specificity_boost: f64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { default_limit: 5, max_limit: 20, overfetch_multiplier: 3, max_candidates: 100, specificity_boost: 0.1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorSettings {
    pub uri: String,
    pub table: String,
    /// Budget for opening the connection.
    pub connect_timeout_ms: u64,
    /// Budget for one candidate fetch or ping.
    pub timeout_ms: u64,
    pub distance: String,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            uri: "data/lancedb".into(),
            table: "policy_chunks".into(),
            connect_timeout_ms: 10_000,
            timeout_ms: 5_000,
            distance: "cosine".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub sqlite_path: String,
    pub pool_size: usize,
    pub busy_timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { sqlite_path: "data/policy.db".into(), pool_size: 4, busy_timeout_ms: 5_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: String,
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: "models/all-MiniLM-L6-v2".into(), use_fake: false }
    }
}

/// Largest accepted `retrieval.max_candidates`. One metadata lookup binds every
/// candidate id as a statement parameter, and SQLite caps those at 32766.
pub const MAX_CANDIDATES_CEILING: usize = 32_000;

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.max_limit == 0 { return Err(Error::InvalidConfig("retrieval.max_limit must be > 0".into())); }
        if r.default_limit == 0 || r.default_limit > r.max_limit {
            return Err(Error::InvalidConfig("retrieval.default_limit must be in 1..=max_limit".into()));
        }
        if r.overfetch_multiplier == 0 { return Err(Error::InvalidConfig("retrieval.overfetch_multiplier must be > 0".into())); }
        if r.max_candidates < r.max_limit {
            return Err(Error::InvalidConfig("retrieval.max_candidates must be >= max_limit".into()));
        }
        if r.max_candidates > MAX_CANDIDATES_CEILING {
            return Err(Error::InvalidConfig(format!("retrieval.max_candidates must be <= {MAX_CANDIDATES_CEILING}")));
        }
        if !r.specificity_boost.is_finite() || r.specificity_boost < 0.0 {
            return Err(Error::InvalidConfig("retrieval.specificity_boost must be finite and >= 0".into()));
        }
        if self.vector.timeout_ms == 0 { return Err(Error::InvalidConfig("vector.timeout_ms must be > 0".into())); }
        if self.vector.connect_timeout_ms == 0 {
            return Err(Error::InvalidConfig("vector.connect_timeout_ms must be > 0".into()));
        }
        if self.store.busy_timeout_ms == 0 { return Err(Error::InvalidConfig("store.busy_timeout_ms must be > 0".into())); }
        if self.store.pool_size == 0 { return Err(Error::InvalidConfig("store.pool_size must be > 0".into())); }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
