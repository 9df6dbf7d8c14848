//! Heap File
//!
//! An append-only sequence of slotted pages on top of a block device.
//!
//! ## Responsibilities
//! - Create the backing storage with one empty page
//! - Hand out new pages with sequential block ids
//! - Fetch and persist whole pages by id
//!
//! Pages are not cached: every `get` reads the block from the device, and
//! every change must be written back with `put`.

use tracing::debug;

use crate::error::{HeapError, Result};

use super::device::BlockDevice;
use super::{BlockId, DbBlock, DbFile, SlottedPage};

/// Heap file organization over a [`BlockDevice`]
///
/// There is one slotted page per device block.
pub struct HeapFile<D> {
    /// Relation name
    name: String,
    /// Backing block device
    device: D,
    /// Id of the last block (0 until created or opened)
    last: BlockId,
    /// Whether the file is closed
    closed: bool,
}

impl<D: BlockDevice> HeapFile<D> {
    /// Create a closed heap file over `device`
    pub fn new(name: impl Into<String>, device: D) -> Self {
        Self {
            name: name.into(),
            device,
            last: 0,
            closed: true,
        }
    }

    /// Id of the last block in the file
    pub fn get_last_block_id(&self) -> BlockId {
        self.last
    }

    /// Relation name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the file is open
    pub fn is_open(&self) -> bool {
        !self.closed
    }

    /// The underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(HeapError::RelationClosed(self.name.clone()));
        }
        Ok(())
    }
}

impl<D: BlockDevice> DbFile for HeapFile<D> {
    type Block = SlottedPage;

    fn create(&mut self) -> Result<()> {
        self.device.create()?;
        self.closed = false;
        self.last = 0;
        let page = self.get_new()?;
        debug!(relation = %self.name, block_id = page.block_id(), "created heap file");
        Ok(())
    }

    fn drop(&mut self) -> Result<()> {
        self.close()?;
        self.device.destroy()?;
        self.last = 0;
        debug!(relation = %self.name, "dropped heap file");
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        if !self.closed {
            return Ok(());
        }
        self.device.open()?;
        self.last = self.device.block_count()?;
        self.closed = false;
        debug!(relation = %self.name, last = self.last, "opened heap file");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.device.close()?;
        self.closed = true;
        debug!(relation = %self.name, "closed heap file");
        Ok(())
    }

    fn get_new(&mut self) -> Result<SlottedPage> {
        self.ensure_open()?;
        let (block_id, block) = self.device.allocate()?;
        if block_id != self.last + 1 {
            return Err(HeapError::Corruption(format!(
                "{}: device allocated block {} after block {}",
                self.name, block_id, self.last
            )));
        }

        let page = SlottedPage::initialize(block, block_id)?;
        self.device.write(block_id, page.block())?;
        self.last = block_id;
        debug!(relation = %self.name, block_id, "allocated page");
        Ok(page)
    }

    fn get(&mut self, block_id: BlockId) -> Result<SlottedPage> {
        self.ensure_open()?;
        let block = self.device.read(block_id)?;
        SlottedPage::from_block(block, block_id)
    }

    fn put(&mut self, block: &SlottedPage) -> Result<()> {
        self.ensure_open()?;
        self.device.write(block.block_id(), block.block())
    }

    fn block_ids(&self) -> Vec<BlockId> {
        (1..=self.last).collect()
    }
}
