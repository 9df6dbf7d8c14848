//! Block Device Module
//!
//! Persistent stores of fixed-size blocks addressed by sequential id.
//!
//! ## Responsibilities
//! - Create, open, close and destroy the backing storage of one relation
//! - Allocate zeroed blocks with ids 1, 2, 3, ...
//! - Read and write whole blocks
//!
//! The page and file layers only talk to [`BlockDevice`], so the on-disk
//! [`FileDevice`] and the in-memory [`MemoryDevice`] are interchangeable.

mod file;
mod memory;

pub use file::{FileDevice, FRAME_SIZE, HEADER_SIZE, MAGIC, VERSION};
pub use memory::{MemoryDevice, MemoryVolume};

use crate::error::Result;

use super::BlockId;

/// Storage backend for one relation's blocks
pub trait BlockDevice {
    /// Create the backing storage and open it
    ///
    /// Fails with `HeapError::RelationExists` if it already exists.
    fn create(&mut self) -> Result<()>;

    /// Open existing backing storage
    ///
    /// Fails with `HeapError::RelationNotFound` if it does not exist.
    fn open(&mut self) -> Result<()>;

    /// Close the device (no-op if already closed)
    fn close(&mut self) -> Result<()>;

    /// Permanently remove the backing storage (device must be closed)
    fn destroy(&mut self) -> Result<()>;

    /// Whether the device is currently open
    fn is_open(&self) -> bool;

    /// Allocate the next sequential block, returning its id and zeroed bytes
    fn allocate(&mut self) -> Result<(BlockId, Vec<u8>)>;

    /// Read a whole block
    fn read(&mut self, block_id: BlockId) -> Result<Vec<u8>>;

    /// Overwrite a whole block
    fn write(&mut self, block_id: BlockId, data: &[u8]) -> Result<()>;

    /// Number of allocated blocks
    fn block_count(&self) -> Result<u32>;

    /// All allocated block ids, ascending
    fn block_ids(&self) -> Result<Vec<BlockId>> {
        Ok((1..=self.block_count()?).collect())
    }
}
