//! Slotted page implementation
//!
//! Manages a 4096-byte block that contains several variable-length records,
//! modeled after the slotted page of Database System Concepts (Figure 10-9).
//!
//! ## Layout
//! - Bytes 0x00-0x01: number of records (including tombstones)
//! - Bytes 0x02-0x03: offset of the last byte of free space
//! - Bytes 0x04-0x05: size of record 1
//! - Bytes 0x06-0x07: offset of record 1
//! - ... one 4-byte slot per record id
//!
//! Record bytes are packed from the end of the block toward the slots. A slot
//! of `(0, 0)` is a tombstone. Deleting or resizing a record slides the
//! records below it so that free space stays contiguous.

use tracing::trace;

use crate::error::{HeapError, Result};

use super::{BlockId, DbBlock, RecordId, BLOCK_SZ};

/// Size of the page header and of each slot entry
const SLOT_SIZE: usize = 4;

/// A block formatted as a slotted page
#[derive(Debug, Clone)]
pub struct SlottedPage {
    /// The whole block (always `BLOCK_SZ` bytes)
    block: Vec<u8>,
    /// Id of this block within its heap file
    block_id: BlockId,
    /// Number of slots ever allocated
    num_records: u16,
    /// Offset of the last free byte
    end_free: u16,
}

impl SlottedPage {
    /// Format a fresh block as an empty page
    pub fn initialize(block: Vec<u8>, block_id: BlockId) -> Result<Self> {
        Self::check_len(&block)?;
        let mut page = Self {
            block,
            block_id,
            num_records: 0,
            end_free: 0,
        };
        page.initialize_new();
        Ok(page)
    }

    /// Wrap an existing, already formatted block
    pub fn from_block(block: Vec<u8>, block_id: BlockId) -> Result<Self> {
        Self::check_len(&block)?;
        let mut page = Self {
            block,
            block_id,
            num_records: 0,
            end_free: 0,
        };
        let (num_records, end_free) = page.get_header(0);
        let slots_end = SLOT_SIZE * (num_records as usize + 1);
        if end_free as usize >= BLOCK_SZ || slots_end > end_free as usize {
            return Err(HeapError::Corruption(format!(
                "block {} has invalid header: num_records={}, end_free={}",
                block_id, num_records, end_free
            )));
        }
        page.num_records = num_records;
        page.end_free = end_free;

        // Live records must lie entirely above the free space
        for id in page.ids() {
            let (size, loc) = page.get_header(id);
            if loc <= end_free || loc as usize + size as usize > BLOCK_SZ {
                return Err(HeapError::Corruption(format!(
                    "record {} in block {} lies outside the record area: size={}, loc={}, end_free={}",
                    id, block_id, size, loc, end_free
                )));
            }
        }
        Ok(page)
    }

    /// Reset this page to an empty page
    pub fn initialize_new(&mut self) {
        self.num_records = 0;
        self.end_free = (BLOCK_SZ - 1) as u16;
        self.put_page_header();
    }

    /// Whether a record of `size` bytes (plus its slot) fits
    pub fn has_room(&self, size: usize) -> bool {
        size + SLOT_SIZE <= self.free_space()
    }

    /// Bytes between the slot array and the last free byte
    pub fn free_space(&self) -> usize {
        (self.end_free as usize).saturating_sub(SLOT_SIZE * (self.num_records as usize + 1))
    }

    /// Largest record an empty page can hold
    pub fn max_record_size() -> usize {
        BLOCK_SZ - 1 - 2 * SLOT_SIZE - SLOT_SIZE
    }

    /// Fail with `NoRoom` if a record of `size` bytes would not fit even an
    /// empty page
    pub fn check_fits_empty(size: usize) -> Result<()> {
        if size > Self::max_record_size() {
            return Err(HeapError::NoRoom {
                requested: size + SLOT_SIZE,
                available: Self::max_record_size() + SLOT_SIZE,
            });
        }
        Ok(())
    }

    /// Number of slots ever allocated, tombstones included
    pub fn num_records(&self) -> u16 {
        self.num_records
    }

    /// Offset of the last free byte
    pub fn end_free(&self) -> u16 {
        self.end_free
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn check_len(block: &[u8]) -> Result<()> {
        if block.len() != BLOCK_SZ {
            return Err(HeapError::Corruption(format!(
                "block must be {} bytes, got {}",
                BLOCK_SZ,
                block.len()
            )));
        }
        Ok(())
    }

    /// Read the 2-byte integer at `offset`
    fn get_n(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.block[offset], self.block[offset + 1]])
    }

    /// Write a 2-byte integer at `offset`
    fn put_n(&mut self, offset: usize, n: u16) {
        self.block[offset..offset + 2].copy_from_slice(&n.to_le_bytes());
    }

    /// Read slot `id` as `(size, loc)`; slot 0 is the page header
    fn get_header(&self, id: RecordId) -> (u16, u16) {
        let offset = SLOT_SIZE * id as usize;
        (self.get_n(offset), self.get_n(offset + 2))
    }

    fn put_header(&mut self, id: RecordId, size: u16, loc: u16) {
        let offset = SLOT_SIZE * id as usize;
        self.put_n(offset, size);
        self.put_n(offset + 2, loc);
    }

    fn put_page_header(&mut self) {
        self.put_header(0, self.num_records, self.end_free);
    }

    /// Slot of a record id that has been handed out
    fn slot(&self, record_id: RecordId) -> Result<(u16, u16)> {
        if record_id == 0 || record_id > self.num_records {
            return Err(HeapError::InvalidRecordId {
                block_id: self.block_id,
                record_id,
            });
        }
        let (size, loc) = self.get_header(record_id);
        if loc as usize + size as usize > BLOCK_SZ {
            return Err(HeapError::Corruption(format!(
                "record {} in block {} overruns the block: size={}, loc={}",
                record_id, self.block_id, size, loc
            )));
        }
        Ok((size, loc))
    }

    fn no_room(&self, requested: usize) -> HeapError {
        HeapError::NoRoom {
            requested: requested + SLOT_SIZE,
            available: self.free_space(),
        }
    }

    /// Move the data between `end_free + 1` and `start` by `end - start`.
    ///
    /// A positive shift closes a gap (delete, shrink); a negative shift opens
    /// one (grow), and the caller must have checked `has_room` first. Every
    /// live record whose bytes were moved (`loc < start`) has its location
    /// adjusted, as does an empty record sitting at `start`. Records at or
    /// above `start` with data do not move.
    fn slide(&mut self, start: u16, end: u16) {
        let shift = end as i32 - start as i32;
        if shift == 0 {
            return;
        }

        let from = self.end_free as usize + 1;
        let to = (from as i32 + shift) as usize;
        let len = start as usize - from;
        self.block.copy_within(from..from + len, to);

        for id in self.ids() {
            let (size, loc) = self.get_header(id);
            if loc < start || (loc == start && size == 0) {
                self.put_header(id, size, (loc as i32 + shift) as u16);
            }
        }

        self.end_free = (self.end_free as i32 + shift) as u16;
        self.put_page_header();
    }
}

impl DbBlock for SlottedPage {
    fn add(&mut self, data: &[u8]) -> Result<RecordId> {
        if !self.has_room(data.len()) {
            return Err(self.no_room(data.len()));
        }

        self.num_records += 1;
        let id = self.num_records;
        let size = data.len() as u16;
        self.end_free -= size;
        let loc = self.end_free + 1;

        self.put_page_header();
        self.put_header(id, size, loc);
        self.block[loc as usize..loc as usize + data.len()].copy_from_slice(data);

        trace!(block_id = self.block_id, record_id = id, size, loc, "added record");
        Ok(id)
    }

    fn get(&self, record_id: RecordId) -> Result<Option<Vec<u8>>> {
        let (size, loc) = self.slot(record_id)?;
        if loc == 0 {
            return Ok(None);
        }
        let start = loc as usize;
        Ok(Some(self.block[start..start + size as usize].to_vec()))
    }

    fn put(&mut self, record_id: RecordId, data: &[u8]) -> Result<()> {
        let (size, loc) = self.slot(record_id)?;
        if loc == 0 {
            return Err(HeapError::RecordDeleted {
                block_id: self.block_id,
                record_id,
            });
        }

        let new_size = data.len();
        let new_loc = if new_size > size as usize {
            let extra = new_size - size as usize;
            if !self.has_room(extra) {
                return Err(self.no_room(extra));
            }
            let new_loc = loc - extra as u16;
            self.slide(loc, new_loc);
            self.block[new_loc as usize..new_loc as usize + new_size].copy_from_slice(data);
            new_loc
        } else {
            let start = loc as usize;
            self.block[start..start + new_size].copy_from_slice(data);
            self.slide(loc + new_size as u16, loc + size);
            loc + (size - new_size as u16)
        };

        self.put_header(record_id, new_size as u16, new_loc);

        trace!(block_id = self.block_id, record_id, old_size = size, new_size, "updated record");
        Ok(())
    }

    fn del(&mut self, record_id: RecordId) -> Result<()> {
        let (size, loc) = self.slot(record_id)?;
        if loc == 0 {
            return Ok(());
        }

        self.put_header(record_id, 0, 0);
        self.slide(loc, loc + size);

        trace!(block_id = self.block_id, record_id, size, "deleted record");
        Ok(())
    }

    fn ids(&self) -> Vec<RecordId> {
        (1..=self.num_records)
            .filter(|&id| {
                let (_, loc) = self.get_header(id);
                loc != 0
            })
            .collect()
    }

    fn block_id(&self) -> BlockId {
        self.block_id
    }

    fn block(&self) -> &[u8] {
        &self.block
    }
}
