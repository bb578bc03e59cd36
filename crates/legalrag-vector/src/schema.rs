use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

use legalrag_core::{Error, Result};

/// Chunk table layout. `dim` is fixed per collection.
pub fn build_chunk_schema(dim: usize) -> Result<Arc<Schema>> {
    let list_size = i32::try_from(dim).map_err(|_| Error::InvalidConfig(format!("embedding dim {dim} too large")))?;
    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("page", DataType::Int32, true),
        Field::new("chunk_index", DataType::Int32, false),
        Field::new("content_hash", DataType::Utf8, false),
        Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), list_size), true),
    ])))
}

/// Key/value table recording which embedder built each collection.
pub fn build_meta_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("value", DataType::Utf8, false),
        Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
    ]))
}
