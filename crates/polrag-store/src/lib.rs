//! polrag-store
//!
//! SQLite metadata store: the authoritative record of every policy chunk and
//! the only place structured filters are applied. Reads go through a small
//! round-robin pool of read-only connections; a single writer connection is
//! kept for fixtures and maintenance.
pub mod pool;
pub mod schema;
pub mod store;

pub use pool::ReadPool;
pub use store::SqliteMetadataStore;

use polrag_core::Error;

pub(crate) fn to_store_err(e: impl std::fmt::Display) -> Error {
    Error::MetadataStoreUnavailable(e.to_string())
}
