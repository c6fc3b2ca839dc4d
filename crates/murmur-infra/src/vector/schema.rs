//! Arrow schema for archive collections in LanceDB.
//!
//! Arrow versions MUST match lancedb's transitive dependency (57.3 for lancedb 0.26).

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

pub const ID_COLUMN: &str = "id";
pub const TEXT_COLUMN: &str = "text";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const VECTOR_COLUMN: &str = "vector";

/// Schema shared by every partition collection.
///
/// `id` holds the profile sentinel or an epoch-millisecond archive id;
/// `created_at` is epoch milliseconds (UTC).
pub fn archive_schema(dimension: i32) -> Schema {
    Schema::new(vec![
        Field::new(ID_COLUMN, DataType::Int64, false),
        Field::new(TEXT_COLUMN, DataType::Utf8, false),
        Field::new(CREATED_AT_COLUMN, DataType::Int64, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension,
            ),
            false,
        ),
    ])
}
