//! In-memory block device
//!
//! A [`MemoryVolume`] holds named block lists; each [`MemoryDevice`] is a
//! handle onto one name in a volume. Cloning a volume shares its contents, so
//! a relation can be closed and reopened through a fresh device.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{HeapError, Result};
use crate::storage::{BlockId, BLOCK_SZ};

use super::BlockDevice;

/// Shared in-memory store of named block lists
#[derive(Debug, Clone, Default)]
pub struct MemoryVolume {
    files: Arc<Mutex<HashMap<String, Vec<Vec<u8>>>>>,
}

impl MemoryVolume {
    /// Create an empty volume
    pub fn new() -> Self {
        Self::default()
    }

    /// A closed device for the named relation on this volume
    pub fn device(&self, name: &str) -> MemoryDevice {
        MemoryDevice {
            volume: self.clone(),
            name: name.to_string(),
            open: false,
        }
    }

    /// Whether storage exists for the named relation
    pub fn contains(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    /// Names of all relations on this volume, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Block device backed by a [`MemoryVolume`]
#[derive(Debug)]
pub struct MemoryDevice {
    volume: MemoryVolume,
    name: String,
    open: bool,
}

impl MemoryDevice {
    /// Run `f` against this relation's block list
    fn with_blocks<T>(&self, f: impl FnOnce(&mut Vec<Vec<u8>>) -> Result<T>) -> Result<T> {
        if !self.open {
            return Err(HeapError::RelationClosed(self.name.clone()));
        }
        let mut files = self.volume.files.lock();
        match files.get_mut(&self.name) {
            Some(blocks) => f(blocks),
            None => Err(HeapError::RelationNotFound(self.name.clone())),
        }
    }

    fn index(blocks: &[Vec<u8>], block_id: BlockId) -> Result<usize> {
        if block_id == 0 || block_id as usize > blocks.len() {
            return Err(HeapError::BlockNotFound(block_id));
        }
        Ok(block_id as usize - 1)
    }
}

impl BlockDevice for MemoryDevice {
    fn create(&mut self) -> Result<()> {
        let mut files = self.volume.files.lock();
        if files.contains_key(&self.name) {
            return Err(HeapError::RelationExists(self.name.clone()));
        }
        files.insert(self.name.clone(), Vec::new());
        self.open = true;
        debug!(relation = %self.name, "created memory device");
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        if self.open {
            return Ok(());
        }
        if !self.volume.contains(&self.name) {
            return Err(HeapError::RelationNotFound(self.name.clone()));
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        self.open = false;
        match self.volume.files.lock().remove(&self.name) {
            Some(_) => {
                debug!(relation = %self.name, "removed memory device");
                Ok(())
            }
            None => Err(HeapError::Storage(format!(
                "failed to remove {}: no such relation",
                self.name
            ))),
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn allocate(&mut self) -> Result<(BlockId, Vec<u8>)> {
        self.with_blocks(|blocks| {
            blocks.push(vec![0u8; BLOCK_SZ]);
            Ok((blocks.len() as BlockId, vec![0u8; BLOCK_SZ]))
        })
    }

    fn read(&mut self, block_id: BlockId) -> Result<Vec<u8>> {
        self.with_blocks(|blocks| {
            let index = Self::index(blocks, block_id)?;
            Ok(blocks[index].clone())
        })
    }

    fn write(&mut self, block_id: BlockId, data: &[u8]) -> Result<()> {
        if data.len() != BLOCK_SZ {
            return Err(HeapError::Storage(format!(
                "invalid block size: expected {}, got {}",
                BLOCK_SZ,
                data.len()
            )));
        }
        self.with_blocks(|blocks| {
            let index = Self::index(blocks, block_id)?;
            blocks[index].copy_from_slice(data);
            Ok(())
        })
    }

    fn block_count(&self) -> Result<u32> {
        self.with_blocks(|blocks| Ok(blocks.len() as u32))
    }
}
