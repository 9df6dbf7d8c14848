//! Error types for heapdb
//!
//! Provides a unified error type for all operations. Every variant belongs to
//! one of three kinds (see [`ErrorKind`]) so callers can tell a full page from
//! a bad request from unavailable storage.

use thiserror::Error;

use crate::relation::Handle;
use crate::storage::{BlockId, RecordId};

/// Result type alias using HeapError
pub type Result<T> = std::result::Result<T, HeapError>;

/// Broad classification of a [`HeapError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A page cannot satisfy a size request
    NoRoom,

    /// Validation or semantic failure at the relation level
    Relation,

    /// The backing block device failed or holds bad data
    Storage,
}

/// Unified error type for heapdb operations
#[derive(Debug, Error)]
pub enum HeapError {
    // -------------------------------------------------------------------------
    // Page Errors
    // -------------------------------------------------------------------------
    #[error("Not enough room in block: need {requested} bytes, {available} available")]
    NoRoom { requested: usize, available: usize },

    // -------------------------------------------------------------------------
    // Relation Errors
    // -------------------------------------------------------------------------
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Unsupported column type for {column}: {data_type}")]
    UnsupportedColumnType { column: String, data_type: String },

    #[error("Type mismatch for column {column}: expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("Value for column {column} is too large: {size} bytes")]
    ValueTooLarge { column: String, size: usize },

    #[error("Unsupported predicate: heap tables only support full scans")]
    UnsupportedPredicate,

    #[error("Relation is not open: {0}")]
    RelationClosed(String),

    #[error("Invalid record id {record_id} in block {block_id}")]
    InvalidRecordId { block_id: BlockId, record_id: RecordId },

    #[error("Record {record_id} in block {block_id} has been deleted")]
    RecordDeleted { block_id: BlockId, record_id: RecordId },

    #[error("Row not found: {0}")]
    RowNotFound(Handle),

    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Relation already exists: {0}")]
    RelationExists(String),

    #[error("Relation does not exist: {0}")]
    RelationNotFound(String),

    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HeapError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            HeapError::NoRoom { .. } => ErrorKind::NoRoom,

            HeapError::MissingColumn(_)
            | HeapError::UnsupportedColumnType { .. }
            | HeapError::TypeMismatch { .. }
            | HeapError::ValueTooLarge { .. }
            | HeapError::UnsupportedPredicate
            | HeapError::RelationClosed(_)
            | HeapError::InvalidRecordId { .. }
            | HeapError::RecordDeleted { .. }
            | HeapError::RowNotFound(_)
            | HeapError::Config(_) => ErrorKind::Relation,

            HeapError::Io(_)
            | HeapError::Storage(_)
            | HeapError::RelationExists(_)
            | HeapError::RelationNotFound(_)
            | HeapError::BlockNotFound(_)
            | HeapError::Corruption(_)
            | HeapError::Serialization(_) => ErrorKind::Storage,
        }
    }

    /// True if this is a page-full condition
    pub fn is_no_room(&self) -> bool {
        self.kind() == ErrorKind::NoRoom
    }
}

impl From<bincode::Error> for HeapError {
    fn from(e: bincode::Error) -> Self {
        HeapError::Serialization(e.to_string())
    }
}
