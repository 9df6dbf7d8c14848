//! Configuration for heapdb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for on-disk relations
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all relation files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── {relation}.db    (one heap file per relation)
    ///     └── ...
    pub data_dir: PathBuf,

    /// Sync strategy: when to fsync block writes
    pub sync_strategy: SyncStrategy,
}

/// Block write sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every block write (safest, slowest)
    EveryWrite,

    /// fsync only when the device is closed
    OnClose,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./heapdb_data"),
            sync_strategy: SyncStrategy::EveryWrite,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Path of the heap file backing the named relation
    pub fn relation_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.db", name))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all relation files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the block write sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
