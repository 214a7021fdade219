//! polrag-core
//!
//! Domain model, closed filter enumerations, collaborator traits and the
//! error taxonomy shared by every crate in the workspace.
pub mod config;
pub mod error;
pub mod filters;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use filters::{normalize_filter, RetrievalFilters};
pub use types::{Candidate, ChunkId, ContentType, PolicyChunk, PolicySource, Region, RetrievalRequest, RetrievalResult, SectionLevel, EMBEDDING_DIM};
