//! polrag-hybrid
//!
//! The retrieval pipeline: normalize filters, embed the query, overfetch
//! candidates from the vector index, resolve them against the authoritative
//! metadata store, fuse distances into scores, rerank by section specificity
//! and truncate.
pub mod context;
pub mod fusion;
pub mod rerank;
pub mod retriever;

pub use context::{DefaultRetriever, RetrievalContext};
pub use fusion::{distance_to_score, fuse};
pub use rerank::HierarchyReranker;
pub use retriever::{HealthReport, HybridRetriever};
