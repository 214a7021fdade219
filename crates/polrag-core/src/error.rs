use thiserror::Error;

/// Failure taxonomy for retrieval.
///
/// An empty result is never an error: `limit <= 0`, an empty index and a
/// fully filtered candidate set all come back as `Ok(vec![])`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid value {value:?} for filter '{field}'")]
    InvalidFilterValue { field: &'static str, value: String },

    #[error("Candidate source unavailable: {0}")]
    CandidateSourceUnavailable(String),

    #[error("Metadata store unavailable: {0}")]
    MetadataStoreUnavailable(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid record '{id}': {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the variants that mean a backing service could not be used.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::CandidateSourceUnavailable(_) | Self::MetadataStoreUnavailable(_))
    }
}
