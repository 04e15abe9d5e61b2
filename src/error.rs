//! # Error Kinds
//!
//! Every failure the engine can surface is one of the [`StorageError`]
//! variants below. Operations return `eyre::Result`, so callers that only
//! want context see a normal report chain, while callers that need to branch
//! on the kind downcast:
//!
//! ```ignore
//! match err.downcast_ref::<StorageError>() {
//!     Some(StorageError::RowTooLarge { .. }) => { /* shrink the row */ }
//!     _ => return Err(err),
//! }
//! ```
//!
//! Corruption variants (`CorruptPage`, `CorruptSchema`, `CorruptDirectory`)
//! carry the violated invariant in their message. `Io` wraps the underlying
//! `std::io::Error` from the blob layer.

use thiserror::Error;

use crate::types::DataType;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("schema mismatch: row has {values} values but schema has {columns} columns")]
    SchemaMismatch { values: usize, columns: usize },

    #[error("type mismatch at column {index} ('{column}'): expected {expected:?}, got {actual}")]
    TypeMismatch {
        index: usize,
        column: String,
        expected: DataType,
        actual: &'static str,
    },

    #[error("invalid DATE at column {index}: '{value}' does not match DD/MM/YYYY")]
    InvalidDate { index: usize, value: String },

    #[error("cannot convert '{token}' to {target:?}")]
    ConversionError { token: String, target: DataType },

    #[error("corrupt page: {reason}")]
    CorruptPage { reason: String },

    #[error("corrupt schema file: {reason}")]
    CorruptSchema { reason: String },

    #[error("corrupt page directory: {reason}")]
    CorruptDirectory { reason: String },

    #[error("page full: record of {record} bytes does not fit ({free} bytes free)")]
    PageFull { record: usize, free: usize },

    #[error("row of {size} bytes exceeds the maximum storable payload of {max} bytes")]
    RowTooLarge { size: usize, max: usize },

    #[error(
        "insertion accounting mismatch: inserted {inserted} rows / {required} bytes, \
         expected {expected_rows} rows / {expected_size} bytes"
    )]
    InsertionSizeMismatch {
        inserted: usize,
        expected_rows: usize,
        required: usize,
        expected_size: usize,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("table is not initialized")]
    NotInitialized,
}
