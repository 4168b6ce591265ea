//! Storage Module
//!
//! Persistent leveled storage: SSTables with per-file bloom filters,
//! organized into levels whose capacities and filter sizes come from the
//! level schedule.
//!
//! ## Layout
//! ```text
//!   L0   [t9] [t8] [t7]          overlapping, newest first
//!   L1   [a..f] [g..m] [n..z]    disjoint, capacity C1, b1 bits/key
//!   L2   [a..c] ... [x..z]       disjoint, capacity C1*T, b2 bits/key
//!   ..
//!   Ln   unbounded
//! ```
//!
//! See [`sstable`] for the file format and [`bloom`] for the filter encoding.

pub mod bloom;
pub mod sstable;
mod manager;
mod stats;

pub use bloom::BloomFilter;
pub use manager::{
    StorageManager, FILTER_BITS_PROPERTY, NUM_FILES_PROPERTY_PREFIX, SSTABLES_PROPERTY,
    STATS_PROPERTY,
};
pub use sstable::{ProbeOutcome, SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
pub use stats::{LevelStats, LevelStatsSnapshot};
