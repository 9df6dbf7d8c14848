//! Heap Table
//!
//! Heap storage engine: rows are appended to whichever page has room and
//! found again by full scan or by handle.
//!
//! ## Responsibilities
//! - Validate rows against the schema
//! - Place marshaled rows in the heap file (spilling to a new page when the
//!   last one is full)
//! - Update, delete and project rows by handle

use std::path::Path;

use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::{HeapError, Result};
use crate::storage::{
    BlockDevice, BlockId, DbBlock, DbFile, FileDevice, HeapFile, MemoryDevice, MemoryVolume,
    SlottedPage,
};

use super::codec::{marshal, unmarshal};
use super::{DbRelation, Handle, Identifier, Schema, ValueDict};

/// Heap-file implementation of [`DbRelation`]
pub struct HeapTable<D> {
    /// Table name
    name: Identifier,
    /// Column names and types
    schema: Schema,
    /// Backing heap file
    file: HeapFile<D>,
}

impl HeapTable<FileDevice> {
    /// Table stored in `{config.data_dir}/{name}.db`
    pub fn on_disk(config: &Config, name: &str, schema: Schema) -> Self {
        Self::new(name, schema, FileDevice::new(config, name))
    }

    /// Path of the table's backing file
    pub fn path(&self) -> &Path {
        self.file.device().path()
    }
}

impl HeapTable<MemoryDevice> {
    /// Table stored on an in-memory volume
    pub fn in_memory(volume: &MemoryVolume, name: &str, schema: Schema) -> Self {
        Self::new(name, schema, volume.device(name))
    }
}

impl<D: BlockDevice> HeapTable<D> {
    /// Create a closed table over `device`
    pub fn new(name: impl Into<Identifier>, schema: Schema, device: D) -> Self {
        let name = name.into();
        Self {
            file: HeapFile::new(name.clone(), device),
            name,
            schema,
        }
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Whether the table is open
    pub fn is_open(&self) -> bool {
        self.file.is_open()
    }

    /// Block ids of the backing heap file
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.file.block_ids()
    }

    /// Check that `row` has every column; returns it reduced to the schema
    pub fn validate(&self, row: &ValueDict) -> Result<ValueDict> {
        let mut full_row = ValueDict::new();
        for column in self.schema.columns() {
            let value = row
                .get(&column.name)
                .ok_or_else(|| HeapError::MissingColumn(column.name.clone()))?;
            full_row.insert(column.name.clone(), value.clone());
        }
        Ok(full_row)
    }

    /// Place a validated row in the last page, or in a new page if it is full
    fn append(&mut self, row: &ValueDict) -> Result<Handle> {
        let data = marshal(&self.schema, row)?;
        SlottedPage::check_fits_empty(data.len())?;

        let mut page = self.file.get(self.file.get_last_block_id())?;
        let record_id = match page.add(&data) {
            Ok(record_id) => record_id,
            Err(HeapError::NoRoom { .. }) => {
                warn!(
                    table = %self.name,
                    block_id = page.block_id(),
                    size = data.len(),
                    "last page full, allocating a new one"
                );
                page = self.file.get_new()?;
                page.add(&data)?
            }
            Err(e) => return Err(e),
        };
        self.file.put(&page)?;

        Ok(Handle::new(page.block_id(), record_id))
    }

    /// Decode the row stored at `handle` in `page`
    fn read_row(&self, page: &SlottedPage, handle: Handle) -> Result<ValueDict> {
        match page.get(handle.record_id)? {
            Some(data) => unmarshal(&self.schema, &data),
            None => Err(HeapError::RowNotFound(handle)),
        }
    }
}

impl<D: BlockDevice> DbRelation for HeapTable<D> {
    fn create(&mut self) -> Result<()> {
        self.file.create()?;
        debug!(table = %self.name, "created table");
        Ok(())
    }

    fn create_if_not_exists(&mut self) -> Result<()> {
        match self.open() {
            Ok(()) => Ok(()),
            Err(HeapError::RelationNotFound(_)) => self.create(),
            Err(e) => Err(e),
        }
    }

    fn drop(&mut self) -> Result<()> {
        self.file.drop()?;
        debug!(table = %self.name, "dropped table");
        Ok(())
    }

    fn open(&mut self) -> Result<()> {
        self.file.open()
    }

    fn close(&mut self) -> Result<()> {
        self.file.close()
    }

    fn insert(&mut self, row: &ValueDict) -> Result<Handle> {
        let full_row = self.validate(row)?;
        let handle = self.append(&full_row)?;
        trace!(table = %self.name, %handle, "inserted row");
        Ok(handle)
    }

    fn update(&mut self, handle: Handle, new_values: &ValueDict) -> Result<()> {
        let mut page = self.file.get(handle.block_id)?;
        let mut row = self.read_row(&page, handle)?;
        for (column, value) in new_values {
            row.insert(column.clone(), value.clone());
        }

        let full_row = self.validate(&row)?;
        let data = marshal(&self.schema, &full_row)?;
        page.put(handle.record_id, &data)?;
        self.file.put(&page)?;

        trace!(table = %self.name, %handle, "updated row");
        Ok(())
    }

    fn del(&mut self, handle: Handle) -> Result<()> {
        let mut page = self.file.get(handle.block_id)?;
        page.del(handle.record_id)?;
        self.file.put(&page)?;

        trace!(table = %self.name, %handle, "deleted row");
        Ok(())
    }

    fn select(&mut self) -> Result<Vec<Handle>> {
        if !self.file.is_open() {
            return Err(HeapError::RelationClosed(self.name.clone()));
        }
        let mut handles = Vec::new();
        for block_id in self.file.block_ids() {
            let page = self.file.get(block_id)?;
            handles.extend(
                page.ids()
                    .into_iter()
                    .map(|record_id| Handle::new(block_id, record_id)),
            );
        }
        Ok(handles)
    }

    fn select_where(&mut self, predicate: &ValueDict) -> Result<Vec<Handle>> {
        if !predicate.is_empty() {
            return Err(HeapError::UnsupportedPredicate);
        }
        self.select()
    }

    fn project(&mut self, handle: Handle) -> Result<ValueDict> {
        let page = self.file.get(handle.block_id)?;
        self.read_row(&page, handle)
    }

    fn project_columns(&mut self, handle: Handle, column_names: &[Identifier]) -> Result<ValueDict> {
        let row = self.project(handle)?;
        Ok(row
            .into_iter()
            .filter(|(name, _)| column_names.contains(name))
            .collect())
    }
}
