//! Relation Module
//!
//! Typed rows on top of the heap file.
//!
//! ## Responsibilities
//! - Describe a relation's columns (`Schema`)
//! - Marshal rows to and from record bytes (`codec`)
//! - Row-level CRUD addressed by `Handle` (`HeapTable`)
//!
//! ## Row Format
//! ```text
//! ┌───────────────┬──────────────────────────┬─────┐
//! │ INT: i32 (4)  │ TEXT: len (2) + bytes    │ ... │
//! └───────────────┴──────────────────────────┴─────┘
//! ```
//! Columns appear in schema order; nothing else is stored.

pub mod codec;
mod heap_table;
mod types;

pub use heap_table::HeapTable;
pub use types::{Column, DataType, Handle, Identifier, Schema, Value, ValueDict};

use crate::error::Result;

/// A physical relation: the operations a SQL layer drives
pub trait DbRelation {
    /// CREATE TABLE
    fn create(&mut self) -> Result<()>;

    /// CREATE TABLE IF NOT EXISTS
    fn create_if_not_exists(&mut self) -> Result<()>;

    /// DROP TABLE
    fn drop(&mut self) -> Result<()>;

    /// Open an existing table, enabling row operations
    fn open(&mut self) -> Result<()>;

    /// Close the table, disabling row operations
    fn close(&mut self) -> Result<()>;

    /// INSERT INTO ... VALUES; returns the new row's handle
    fn insert(&mut self, row: &ValueDict) -> Result<Handle>;

    /// UPDATE ... SET `new_values` WHERE the row is `handle`
    fn update(&mut self, handle: Handle, new_values: &ValueDict) -> Result<()>;

    /// DELETE FROM ... WHERE the row is `handle`
    fn del(&mut self, handle: Handle) -> Result<()>;

    /// Handles of every row
    fn select(&mut self) -> Result<Vec<Handle>>;

    /// Handles of the rows matching `predicate`
    fn select_where(&mut self, predicate: &ValueDict) -> Result<Vec<Handle>>;

    /// All column values of a row
    fn project(&mut self, handle: Handle) -> Result<ValueDict>;

    /// The named column values of a row
    fn project_columns(&mut self, handle: Handle, column_names: &[Identifier]) -> Result<ValueDict>;
}
