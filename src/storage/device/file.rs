//! File-backed block device
//!
//! One file per relation. Blocks are stored as checksummed frames after a
//! small header.
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Header (16)                            │
//! │ ┌──────────┬──────────┬──────────────┐ │
//! │ │Magic (4) │Version(2)│BlockSize (4) │ │
//! │ └──────────┴──────────┴──────────────┘ │
//! ├────────────────────────────────────────┤
//! │ Frame 1                                │
//! │ ┌──────────────────────┬───────────┐   │
//! │ │ Block (4096)         │ CRC32 (4) │   │
//! │ └──────────────────────┴───────────┘   │
//! │ ... (one frame per block id)           │
//! └────────────────────────────────────────┘
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, SyncStrategy};
use crate::error::{HeapError, Result};
use crate::storage::{BlockId, BLOCK_SZ};

use super::BlockDevice;

/// Magic bytes: "HPDB"
pub const MAGIC: &[u8; 4] = b"HPDB";

/// File format version
pub const VERSION: u16 = 1;

/// Header size: bincode-encoded [`DeviceHeader`] padded with zeros
pub const HEADER_SIZE: u64 = 16;

/// Frame size: one block followed by its CRC32
pub const FRAME_SIZE: u64 = BLOCK_SZ as u64 + 4;

/// Fixed header at the start of every device file
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
struct DeviceHeader {
    magic: [u8; 4],
    version: u16,
    block_size: u32,
}

impl DeviceHeader {
    fn current() -> Self {
        Self {
            magic: *MAGIC,
            version: VERSION,
            block_size: BLOCK_SZ as u32,
        }
    }

    fn encode(&self) -> Result<[u8; HEADER_SIZE as usize]> {
        let encoded = bincode::serialize(self)?;
        let mut header = [0u8; HEADER_SIZE as usize];
        header[..encoded.len()].copy_from_slice(&encoded);
        Ok(header)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Block device storing one relation in a single file
pub struct FileDevice {
    /// Relation name (for error messages)
    name: String,
    /// Path of the backing file
    path: PathBuf,
    /// When to fsync writes
    sync_strategy: SyncStrategy,
    /// Open file handle, `None` while closed
    file: Option<File>,
    /// Number of blocks in the file
    block_count: u32,
}

impl FileDevice {
    /// Device for the named relation under `config.data_dir`
    pub fn new(config: &Config, name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: config.relation_path(name),
            sync_strategy: config.sync_strategy,
            file: None,
            block_count: 0,
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn file(&mut self) -> Result<&mut File> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(HeapError::RelationClosed(self.name.clone())),
        }
    }

    fn check_block_id(&self, block_id: BlockId) -> Result<()> {
        if self.file.is_none() {
            return Err(HeapError::RelationClosed(self.name.clone()));
        }
        if block_id == 0 || block_id > self.block_count {
            return Err(HeapError::BlockNotFound(block_id));
        }
        Ok(())
    }

    /// Byte offset of the frame holding `block_id`
    fn frame_offset(block_id: BlockId) -> u64 {
        HEADER_SIZE + (block_id as u64 - 1) * FRAME_SIZE
    }

    fn write_frame(&mut self, block_id: BlockId, data: &[u8]) -> Result<()> {
        let crc = crc32fast::hash(data);
        let mut frame = Vec::with_capacity(FRAME_SIZE as usize);
        frame.extend_from_slice(data);
        frame.extend_from_slice(&crc.to_le_bytes());

        let sync = self.sync_strategy == SyncStrategy::EveryWrite;
        let file = self.file()?;
        file.seek(SeekFrom::Start(Self::frame_offset(block_id)))?;
        file.write_all(&frame)?;
        if sync {
            file.sync_data()?;
        }
        Ok(())
    }
}

impl BlockDevice for FileDevice {
    fn create(&mut self) -> Result<()> {
        if self.file.is_some() {
            return Err(HeapError::RelationExists(self.name.clone()));
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                IoErrorKind::AlreadyExists => HeapError::RelationExists(self.name.clone()),
                _ => HeapError::Storage(format!(
                    "failed to create {}: {}",
                    self.path.display(),
                    e
                )),
            })?;

        file.write_all(&DeviceHeader::current().encode()?)?;
        file.sync_all()?;

        debug!(relation = %self.name, path = %self.path.display(), "created device file");
        self.file = Some(file);
        self.block_count = 0;
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        if self.file.is_some() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                IoErrorKind::NotFound => HeapError::RelationNotFound(self.name.clone()),
                _ => HeapError::Storage(format!(
                    "failed to open {}: {}",
                    self.path.display(),
                    e
                )),
            })?;

        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE {
            return Err(HeapError::Corruption(format!(
                "{}: file too short for header ({} bytes)",
                self.path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        let header = DeviceHeader::decode(&header)?;
        if header != DeviceHeader::current() {
            return Err(HeapError::Corruption(format!(
                "{}: unexpected header {:?}",
                self.path.display(),
                header
            )));
        }

        let body = file_size - HEADER_SIZE;
        if body % FRAME_SIZE != 0 {
            return Err(HeapError::Corruption(format!(
                "{}: body size {} is not a multiple of frame size {}",
                self.path.display(),
                body,
                FRAME_SIZE
            )));
        }

        self.block_count = (body / FRAME_SIZE) as u32;
        self.file = Some(file);
        debug!(relation = %self.name, blocks = self.block_count, "opened device file");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
            debug!(relation = %self.name, "closed device file");
        }
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        self.close()?;
        fs::remove_file(&self.path).map_err(|e| {
            HeapError::Storage(format!("failed to remove {}: {}", self.path.display(), e))
        })?;
        self.block_count = 0;
        debug!(relation = %self.name, "removed device file");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn allocate(&mut self) -> Result<(BlockId, Vec<u8>)> {
        let block_id = self.block_count + 1;
        let block = vec![0u8; BLOCK_SZ];
        self.write_frame(block_id, &block)?;
        self.block_count = block_id;
        Ok((block_id, block))
    }

    fn read(&mut self, block_id: BlockId) -> Result<Vec<u8>> {
        self.check_block_id(block_id)?;

        let file = self.file()?;
        file.seek(SeekFrom::Start(Self::frame_offset(block_id)))?;
        let mut frame = vec![0u8; FRAME_SIZE as usize];
        file.read_exact(&mut frame)?;

        let stored_crc = u32::from_le_bytes([
            frame[BLOCK_SZ],
            frame[BLOCK_SZ + 1],
            frame[BLOCK_SZ + 2],
            frame[BLOCK_SZ + 3],
        ]);
        frame.truncate(BLOCK_SZ);
        let actual_crc = crc32fast::hash(&frame);
        if stored_crc != actual_crc {
            return Err(HeapError::Corruption(format!(
                "block {} checksum mismatch: stored {:#010x}, computed {:#010x}",
                block_id, stored_crc, actual_crc
            )));
        }

        Ok(frame)
    }

    fn write(&mut self, block_id: BlockId, data: &[u8]) -> Result<()> {
        if data.len() != BLOCK_SZ {
            return Err(HeapError::Storage(format!(
                "invalid block size: expected {}, got {}",
                BLOCK_SZ,
                data.len()
            )));
        }
        self.check_block_id(block_id)?;
        self.write_frame(block_id, data)
    }

    fn block_count(&self) -> Result<u32> {
        if self.file.is_none() {
            return Err(HeapError::RelationClosed(self.name.clone()));
        }
        Ok(self.block_count)
    }
}
