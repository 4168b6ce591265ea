//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage, one
//! bloom filter per file.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (15 bytes)                                       │
//! │   Magic "MNKY" (4) | Version u16 (2) | Level u8 (1)     │
//! │   | Count u64 (8)                                       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Blocks (variable, ~block_size each)                │
//! │   [KeyLen: u32][ValLen: u32][Key][Value]                │
//! │   (ValLen = u32::MAX means tombstone, no value bytes)   │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                  │
//! │   [MinKeyLen: u32][MinKey]                              │
//! │   per block: [KeyLen: u32][Offset: u64][Size: u32][Key] │
//! │   (Key = last key of the block)                         │
//! ├─────────────────────────────────────────────────────────┤
//! │ Filter Block (variable, see `storage::bloom`)           │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (24 bytes)                                       │
//! │   IndexOffset u64 | FilterOffset u64 | DataCRC u32      │
//! │   | Padding (4)                                         │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::{ProbeOutcome, SSTableReader};

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a monkeybench SSTable file
pub(crate) const MAGIC: &[u8; 4] = b"MNKY";

/// Current SSTable format version
pub(crate) const VERSION: u16 = 2;

/// Header size: Magic (4) + Version (2) + Level (1) + EntryCount (8)
pub(crate) const HEADER_SIZE: u64 = 15;

/// Offset of the entry count inside the header
pub(crate) const COUNT_OFFSET: u64 = 7;

/// Footer size: IndexOffset (8) + FilterOffset (8) + DataCRC (4) + Padding (4)
pub(crate) const FOOTER_SIZE: u64 = 24;

/// Sentinel value indicating a tombstone (deleted key)
pub(crate) const TOMBSTONE_MARKER: u32 = u32::MAX;

/// Entry header: KeyLen (4) + ValLen (4)
pub(crate) const ENTRY_HEADER_SIZE: usize = 8;

pub(crate) fn read_u32(buf: &[u8], pos: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[pos..pos + 4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn read_u64(buf: &[u8], pos: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[pos..pos + 8]);
    u64::from_le_bytes(raw)
}

// =============================================================================
// SSTable Metadata
// =============================================================================

/// Metadata of a finished SSTable, returned by the builder
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Path to the SSTable file
    pub path: PathBuf,
    /// Level the file was written for
    pub level: usize,
    /// Number of entries in this SSTable
    pub entry_count: u64,
    /// Smallest key (for range filtering)
    pub min_key: Vec<u8>,
    /// Largest key (for range filtering)
    pub max_key: Vec<u8>,
    /// File size in bytes
    pub file_size: u64,
    /// Bits in the bloom filter (0 when disabled)
    pub filter_bits: usize,
}

impl SSTable {
    /// Get the number of entries
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false if key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        key >= self.min_key.as_slice() && key <= self.max_key.as_slice()
    }
}
