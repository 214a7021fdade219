use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

use polrag_core::EMBEDDING_DIM;

pub const VECTOR_DIM: i32 = EMBEDDING_DIM as i32;

/// Metadata columns stored next to each vector as a local snapshot. The
/// relational store stays authoritative; these are never used for filtering.
pub const SNAPSHOT_COLUMNS: [&str; 7] = [
    "doc_id",
    "policy_section",
    "policy_path",
    "policy_section_level",
    "policy_source",
    "region",
    "content_type",
];

pub fn build_arrow_schema() -> Arc<Schema> {
    let mut fields = vec![Field::new("id", DataType::Utf8, false)];
    fields.extend(SNAPSHOT_COLUMNS.iter().map(|name| Field::new(*name, DataType::Utf8, false)));
    fields.push(Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), VECTOR_DIM), true));
    Arc::new(Schema::new(fields))
}
