//! polrag-vector
//!
//! LanceDB-backed nearest-neighbour candidate source for policy chunks, plus
//! the writer used to lay down chunk vectors. Candidates carry the chunk id,
//! the index distance and a metadata snapshot; the relational store remains
//! the authority on filters.
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use schema::{build_arrow_schema, SNAPSHOT_COLUMNS, VECTOR_DIM};
pub use search::{parse_distance, LanceCandidateSource, DEFAULT_CALL_TIMEOUT};
pub use writer::VectorIndexWriter;
