//! Storage Module
//!
//! Page and file layers of the heap storage engine.
//!
//! ## Responsibilities
//! - Format fixed-size blocks as slotted pages of variable-length records
//! - Reclaim and relocate record space inside a page (slide)
//! - Sequence pages into an append-only heap file over a block device
//!
//! ## Page Format
//! ```text
//! ┌────────────────────────────────────────┐ 0
//! │ num_records (2) │ end_free (2)         │
//! ├────────────────────────────────────────┤ 4
//! │ slot 1: size (2) │ loc (2)             │
//! │ slot 2: size (2) │ loc (2)             │
//! │ ... (grows toward higher offsets)      │
//! ├────────────────────────────────────────┤
//! │ Free Space                             │
//! ├────────────────────────────────────────┤ end_free + 1
//! │ record N ... record 2 │ record 1       │
//! └────────────────────────────────────────┘ 4096
//! ```

pub mod device;
mod heap_file;
mod slotted_page;

pub use device::{BlockDevice, FileDevice, MemoryDevice, MemoryVolume};
pub use heap_file::HeapFile;
pub use slotted_page::SlottedPage;

use crate::error::Result;

/// Size of every block in bytes
pub const BLOCK_SZ: usize = 4096;

/// Identifies a block within its heap file (sequential, starting at 1)
pub type BlockId = u32;

/// Identifies a record within its block (sequential, starting at 1)
pub type RecordId = u16;

/// A block that holds several records
///
/// Record ids are handed out sequentially starting with 1 and are never
/// reused, even after deletion.
pub trait DbBlock {
    /// Add a new record, returning its id
    ///
    /// Fails with `HeapError::NoRoom` if the block cannot hold it.
    fn add(&mut self, data: &[u8]) -> Result<RecordId>;

    /// Get a record's bytes, or `None` if it has been deleted
    fn get(&self, record_id: RecordId) -> Result<Option<Vec<u8>>>;

    /// Replace a record's bytes
    ///
    /// Fails with `HeapError::NoRoom` if the record grows past the free
    /// space; the old record is retained.
    fn put(&mut self, record_id: RecordId, data: &[u8]) -> Result<()>;

    /// Delete a record, leaving a tombstone
    fn del(&mut self, record_id: RecordId) -> Result<()>;

    /// All live record ids, ascending
    fn ids(&self) -> Vec<RecordId>;

    /// This block's id within its file
    fn block_id(&self) -> BlockId;

    /// The whole block's bytes
    fn block(&self) -> &[u8];
}

/// A disk-based collection of blocks
pub trait DbFile {
    type Block: DbBlock;

    /// Create the file with one empty block
    fn create(&mut self) -> Result<()>;

    /// Close and permanently remove the file
    fn drop(&mut self) -> Result<()>;

    /// Open an existing file
    fn open(&mut self) -> Result<()>;

    /// Close the file
    fn close(&mut self) -> Result<()>;

    /// Append a new, formatted block
    fn get_new(&mut self) -> Result<Self::Block>;

    /// Fetch a block by id
    fn get(&mut self, block_id: BlockId) -> Result<Self::Block>;

    /// Write a block back at its own id
    fn put(&mut self, block: &Self::Block) -> Result<()>;

    /// All block ids, ascending
    fn block_ids(&self) -> Vec<BlockId>;
}
