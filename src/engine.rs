//! Engine Module
//!
//! The reference leveled engine the harness measures.
//!
//! ## Responsibilities
//! - Coordinate MemTable and Storage
//! - Trigger flushes when MemTable is full
//! - Route reads memtable → level 0 → deeper levels
//! - Expose level statistics as textual properties

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::StorageEngine;
use crate::config::EngineOptions;
use crate::error::Result;
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::{LevelStatsSnapshot, StorageManager, STATS_PROPERTY};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/flush): Serialized by `write_lock`; flush and
///   any compaction it triggers run inside it
/// - **Reads** (get): MemTable read lock, then the storage level read lock;
///   SSTable readers lock only their own file handle
pub struct Engine {
    /// Engine configuration
    options: EngineOptions,

    /// Directory holding the SSTables
    data_dir: PathBuf,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent leveled storage (internal RwLock on levels)
    storage: StorageManager,

    /// Serializes write operations (put/delete/flush)
    write_lock: Mutex<()>,
}

impl Engine {
    /// Open or create an engine in `path`
    ///
    /// Existing SSTables are picked up from the directory; there is no log,
    /// so anything that was only in a previous memtable is gone.
    pub fn open(options: EngineOptions, path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;
        let storage = StorageManager::open(path, options.clone())?;

        info!(
            path = %path.display(),
            levels = options.level_count(),
            per_level_filters = options.per_level_filters,
            "Engine opened"
        );

        Ok(Self {
            options,
            data_dir: path.to_path_buf(),
            memtable: MemTable::new(),
            storage,
            write_lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default options
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(EngineOptions::default(), path)
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables, level by level
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(key) {
            return match entry {
                MemTableEntry::Value(value) => Ok(Some(value)),
                MemTableEntry::Tombstone => Ok(None),
            };
        }

        self.storage.get(key)
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.memtable.put(key.to_vec(), value.to_vec());
        if self.memtable.should_flush(self.options.write_buffer_size) {
            self.flush_internal()?;
        }
        Ok(())
    }

    /// Delete a key (writes a tombstone)
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.memtable.delete(key.to_vec());
        if self.memtable.should_flush(self.options.write_buffer_size) {
            self.flush_internal()?;
        }
        Ok(())
    }

    /// Flush memtable to disk
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }
        // Readers keep seeing the memtable until the SSTable is installed
        let entries = self.memtable.iter();
        debug!(entries = entries.len(), "Flushing memtable");
        self.storage.flush(entries)?;
        self.memtable.clear();
        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data
    pub fn close(self) -> Result<()> {
        self.flush()?;
        info!(sstables = self.storage.sstable_count(), "Engine closed");
        Ok(())
    }

    /// Remove a database directory and everything in it
    pub fn destroy(path: &Path) -> Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Engine property by name, see the `storage` property constants
    pub fn property(&self, name: &str) -> Option<String> {
        self.storage.property(name)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    pub fn files_at_level(&self, level: usize) -> usize {
        self.storage.files_at_level(level)
    }

    pub fn level_bytes(&self, level: usize) -> u64 {
        self.storage.level_bytes(level)
    }

    pub fn level_ranges(&self, level: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.storage.level_ranges(level)
    }

    pub fn level_stats(&self, level: usize) -> Option<LevelStatsSnapshot> {
        self.storage.level_stats(level)
    }

    /// Get the configuration
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }
}

impl StorageEngine for Engine {
    const STATS_PROPERTY: &'static str = STATS_PROPERTY;

    fn open(options: EngineOptions, path: &Path) -> Result<Self> {
        Engine::open(options, path)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        Engine::put(self, key, value)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Engine::get(self, key)
    }

    fn property(&self, name: &str) -> Option<String> {
        Engine::property(self, name)
    }

    fn close(self) -> Result<()> {
        Engine::close(self)
    }

    fn destroy(path: &Path) -> Result<()> {
        Engine::destroy(path)
    }
}
