//! # heapdb
//!
//! A heap-organized storage engine with:
//! - Slotted pages with in-place free-space compaction
//! - Append-only heap files over a pluggable block device
//! - Typed heap tables with row CRUD by handle
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       HeapTable                              │
//! │          (validate / marshal / insert / select ...)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ (block id, record id)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       HeapFile                               │
//! │              (get_new / get / put / block_ids)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ SlottedPage │          │ BlockDevice │
//!   │ (in memory) │          │ (file/mem)  │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod relation;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, HeapError, Result};
pub use config::{Config, SyncStrategy};
pub use relation::{DataType, DbRelation, Handle, HeapTable, Schema, Value, ValueDict};
pub use storage::{DbBlock, DbFile, HeapFile, SlottedPage, BLOCK_SZ};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of heapdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
