//! Storage Manager
//!
//! Owns the on-disk levels and moves data down through them.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup (level read from each header)
//! - Flush memtable contents into level 0
//! - Leveled compaction against the planned per-level capacities
//! - Point lookups: level 0 newest → oldest, then one file per deeper level
//! - Per-level filter and compaction statistics

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::EngineOptions;
use crate::error::{BenchError, Result};
use crate::memtable::MemTableEntry;

use super::stats::{LevelStats, LevelStatsSnapshot};
use super::{ProbeOutcome, SSTable, SSTableBuilder, SSTableReader};

/// Multi-line per-level statistics table
pub const STATS_PROPERTY: &str = "monkey.stats";
/// Followed by a level number, e.g. `monkey.num-files-at-level2`
pub const NUM_FILES_PROPERTY_PREFIX: &str = "monkey.num-files-at-level";
/// Comma-separated configured bits per key, one per level
pub const FILTER_BITS_PROPERTY: &str = "monkey.filter-bits";
/// One line per SSTable
pub const SSTABLES_PROPERTY: &str = "monkey.sstables";

type Levels = Vec<Vec<Arc<SSTableReader>>>;

/// Manages the storage layer
///
/// ## Concurrency:
/// - `levels`: RwLock; lookups share it, flush/compaction swap files under
///   the write side
/// - `next_sstable_id`: Atomic counter (lock-free)
/// - Callers serialize flushes (the engine's write lock)
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    options: EngineOptions,

    /// Level 0 ordered newest → oldest (ranges may overlap); deeper levels
    /// ordered by min key with disjoint ranges
    levels: RwLock<Levels>,

    /// Next ID for creating new SSTables (atomic, lock-free)
    next_sstable_id: AtomicU64,

    /// Largest key compacted out of each level, for round-robin picking
    compact_pointers: Mutex<Vec<Vec<u8>>>,

    stats: Vec<LevelStats>,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Discover existing SSTable files and verify their checksums
    /// 3. Place each one on the level stored in its header
    pub fn open(path: &Path, options: EngineOptions) -> Result<Self> {
        options.validate()?;
        fs::create_dir_all(path)?;

        let mut found: Vec<(u64, SSTableReader)> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            if let Some(id) = Self::parse_sstable_id(&file_path) {
                let reader = SSTableReader::open(&file_path)?;
                reader.verify_checksum()?;
                found.push((id, reader));
            }
        }

        let level_count = options.level_count();
        let last = level_count - 1;
        let next_id = found.iter().map(|(id, _)| id + 1).max().unwrap_or(1);

        // Newest first, so level 0 ends up in lookup order
        found.sort_by(|a, b| b.0.cmp(&a.0));
        let mut levels: Levels = vec![Vec::new(); level_count];
        for (_, reader) in found {
            let mut level = reader.level();
            if level > last {
                warn!(
                    path = %reader.path().display(),
                    level,
                    "SSTable level beyond configured levels, placing on last level"
                );
                level = last;
            }
            levels[level].push(Arc::new(reader));
        }
        for files in levels.iter_mut().skip(1) {
            files.sort_by(|a, b| a.min_key().cmp(b.min_key()));
        }

        let recovered: usize = levels.iter().map(Vec::len).sum();
        if recovered > 0 {
            info!(files = recovered, "Loaded existing SSTables");
        }

        Ok(Self {
            data_dir: path.to_path_buf(),
            options,
            levels: RwLock::new(levels),
            next_sstable_id: AtomicU64::new(next_id),
            compact_pointers: Mutex::new(vec![Vec::new(); level_count]),
            stats: (0..level_count).map(|_| LevelStats::default()).collect(),
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a value by key
    ///
    /// Returns:
    /// - `Ok(Some(value))`: newest version is a value
    /// - `Ok(None)`: key not found, or newest version is a tombstone
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let levels = self.levels.read();

        for (level, files) in levels.iter().enumerate() {
            if level == 0 {
                for reader in files {
                    if let Some(found) = self.probe(level, reader, key)? {
                        return Ok(found);
                    }
                }
            } else {
                // Disjoint ranges: only the first file ending at or after key
                let idx = files.partition_point(|reader| reader.max_key() < key);
                if let Some(reader) = files.get(idx) {
                    if let Some(found) = self.probe(level, reader, key)? {
                        return Ok(found);
                    }
                }
            }
        }

        Ok(None)
    }

    /// One file lookup; `Some` ends the search (value or tombstone)
    fn probe(
        &self,
        level: usize,
        reader: &SSTableReader,
        key: &[u8],
    ) -> Result<Option<Option<Vec<u8>>>> {
        let stats = &self.stats[level];
        match reader.get(key)? {
            ProbeOutcome::OutOfRange => Ok(None),
            ProbeOutcome::FilteredOut => {
                stats.record_filter_negative();
                Ok(None)
            }
            ProbeOutcome::FalsePositive => {
                stats.record_false_positive();
                Ok(None)
            }
            ProbeOutcome::Found(value) => {
                stats.record_hit();
                Ok(Some(value))
            }
        }
    }

    // =========================================================================
    // Flush
    // =========================================================================

    /// Write sorted memtable entries to a new level-0 SSTable, then compact
    /// until every level is within its capacity.
    pub fn flush(&self, entries: Vec<(Vec<u8>, MemTableEntry)>) -> Result<SSTable> {
        if entries.is_empty() {
            return Err(BenchError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let mut builder = self.new_builder(0)?;
        for (key, entry) in &entries {
            match entry {
                MemTableEntry::Value(v) => builder.add(key, v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(key)?,
            }
        }
        let metadata = builder.finish()?;
        let reader = SSTableReader::open(&metadata.path)?;

        debug!(
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            filter_bits = metadata.filter_bits,
            "Flushed memtable to level 0"
        );

        self.levels.write()[0].insert(0, Arc::new(reader));
        self.compact_if_needed()?;

        Ok(metadata)
    }

    // =========================================================================
    // Compaction
    // =========================================================================

    /// Run compactions until no level is over its trigger
    pub fn compact_if_needed(&self) -> Result<()> {
        while let Some(level) = self.pick_compaction() {
            self.compact_level(level)?;
        }
        Ok(())
    }

    /// Level 0 by file count, deeper levels by bytes against capacity.
    /// The last level never compacts.
    fn pick_compaction(&self) -> Option<usize> {
        let levels = self.levels.read();
        let last = levels.len().checked_sub(1)?;
        if last == 0 {
            return None;
        }
        if levels[0].len() >= self.options.l0_compaction_trigger {
            return Some(0);
        }
        (1..last).find(|&level| {
            match self.options.level_capacities.get(level).copied().flatten() {
                Some(capacity) => Self::bytes_of(&levels[level]) > capacity,
                None => false,
            }
        })
    }

    /// Merge `level` (all of level 0, or one file of a deeper level) with the
    /// overlapping files of the next level.
    fn compact_level(&self, level: usize) -> Result<()> {
        let target = level + 1;
        let last = self.options.level_count() - 1;

        let (inputs, overlaps) = {
            let levels = self.levels.read();
            let inputs = if level == 0 {
                levels[0].clone()
            } else {
                self.pick_round_robin(level, &levels[level])
                    .into_iter()
                    .collect()
            };
            let Some((lo, hi)) = Self::key_span(&inputs) else {
                return Ok(());
            };
            let overlaps: Vec<_> = levels[target]
                .iter()
                .filter(|t| t.max_key() >= lo.as_slice() && t.min_key() <= hi.as_slice())
                .cloned()
                .collect();
            (inputs, overlaps)
        };

        // Oldest first so newer versions overwrite: next level, then inputs
        // from oldest to newest (level 0 is stored newest first)
        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
        for table in overlaps.iter().chain(inputs.iter().rev()) {
            for entry in table.iter()? {
                let (key, value) = entry?;
                merged.insert(key, value);
            }
        }
        if target == last {
            merged.retain(|_, value| value.is_some());
        }

        let outputs = self.write_level(target, merged)?;
        let mut readers = Vec::with_capacity(outputs.len());
        for table in &outputs {
            readers.push(Arc::new(SSTableReader::open(&table.path)?));
        }

        let read_bytes: u64 = inputs
            .iter()
            .chain(overlaps.iter())
            .map(|t| t.file_size())
            .sum();
        let write_bytes: u64 = outputs.iter().map(|t| t.file_size).sum();
        self.stats[target].record_compaction(read_bytes, write_bytes);

        {
            let mut levels = self.levels.write();
            levels[level].retain(|t| !inputs.iter().any(|i| Arc::ptr_eq(i, t)));
            levels[target].retain(|t| !overlaps.iter().any(|o| Arc::ptr_eq(o, t)));
            levels[target].extend(readers);
            levels[target].sort_by(|a, b| a.min_key().cmp(b.min_key()));
        }

        debug!(
            from = level,
            to = target,
            inputs = inputs.len() + overlaps.len(),
            outputs = outputs.len(),
            read_bytes,
            write_bytes,
            "Compaction finished"
        );

        let obsolete: Vec<PathBuf> = inputs
            .into_iter()
            .chain(overlaps)
            .map(|t| t.path().to_path_buf())
            .collect();
        for path in obsolete {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Next file after the level's compaction pointer, wrapping around
    fn pick_round_robin(
        &self,
        level: usize,
        files: &[Arc<SSTableReader>],
    ) -> Option<Arc<SSTableReader>> {
        let mut pointers = self.compact_pointers.lock();
        let pointer = &mut pointers[level];
        let picked = files
            .iter()
            .find(|t| pointer.is_empty() || t.min_key() > pointer.as_slice())
            .or_else(|| files.first())?
            .clone();
        *pointer = picked.max_key().to_vec();
        Some(picked)
    }

    /// Write merged entries as one or more files of at most ~max_file_size
    fn write_level(
        &self,
        level: usize,
        merged: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    ) -> Result<Vec<SSTable>> {
        let mut outputs = Vec::new();
        let mut current: Option<SSTableBuilder> = None;

        for (key, value) in merged {
            let builder = match current.as_mut() {
                Some(builder) => builder,
                None => current.insert(self.new_builder(level)?),
            };
            match value {
                Some(v) => builder.add(&key, &v)?,
                None => builder.add_tombstone(&key)?,
            }
            if builder.estimated_size() >= self.options.max_file_size {
                if let Some(full) = current.take() {
                    outputs.push(full.finish()?);
                }
            }
        }
        if let Some(rest) = current.take() {
            outputs.push(rest.finish()?);
        }
        Ok(outputs)
    }

    fn new_builder(&self, level: usize) -> Result<SSTableBuilder> {
        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        SSTableBuilder::new(
            &self.sstable_path(id),
            level,
            self.options.filter_bits_for(level),
            self.options.block_size,
        )
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Engine property by name, `None` if unknown
    pub fn property(&self, name: &str) -> Option<String> {
        match name {
            STATS_PROPERTY => Some(self.stats_table()),
            FILTER_BITS_PROPERTY => Some(
                (0..self.options.level_count())
                    .map(|level| format!("{:.2}", self.options.filter_bits_for(level)))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            SSTABLES_PROPERTY => Some(self.sstables_listing()),
            _ => {
                let level: usize = name.strip_prefix(NUM_FILES_PROPERTY_PREFIX)?.parse().ok()?;
                self.levels.read().get(level).map(|files| files.len().to_string())
            }
        }
    }

    fn stats_table(&self) -> String {
        const MB: f64 = 1024.0 * 1024.0;
        let levels = self.levels.read();

        let mut out = String::new();
        out.push_str("                               Per-Level Stats\n");
        out.push_str(
            "Level Files  Size(MB) Bits/Key   Probes Negatives FalsePos     Hits Read(MB) Write(MB)\n",
        );
        out.push_str(&"-".repeat(86));
        for (level, files) in levels.iter().enumerate() {
            let s = self.stats[level].snapshot();
            let _ = write!(
                out,
                "\n{:>5} {:>5} {:>9.3} {:>8.2} {:>8} {:>9} {:>8} {:>8} {:>8.1} {:>9.1}",
                level,
                files.len(),
                Self::bytes_of(files) as f64 / MB,
                self.options.filter_bits_for(level),
                s.probes,
                s.filter_negatives,
                s.false_positives,
                s.hits,
                s.compaction_read_bytes as f64 / MB,
                s.compaction_write_bytes as f64 / MB,
            );
        }
        out
    }

    fn sstables_listing(&self) -> String {
        let levels = self.levels.read();
        let mut out = String::new();
        for (level, files) in levels.iter().enumerate() {
            let _ = writeln!(out, "--- level {} ---", level);
            for table in files {
                let name = table
                    .path()
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    " {}: {} entries, {} bytes, {:.2} bits/key ['{}' .. '{}']",
                    name,
                    table.entry_count(),
                    table.file_size(),
                    table.bits_per_key(),
                    String::from_utf8_lossy(table.min_key()),
                    String::from_utf8_lossy(table.max_key()),
                );
            }
        }
        out
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the number of SSTables across all levels
    pub fn sstable_count(&self) -> usize {
        self.levels.read().iter().map(Vec::len).sum()
    }

    pub fn level_count(&self) -> usize {
        self.options.level_count()
    }

    pub fn files_at_level(&self, level: usize) -> usize {
        self.levels.read().get(level).map_or(0, Vec::len)
    }

    /// Total SSTable bytes on a level
    pub fn level_bytes(&self, level: usize) -> u64 {
        self.levels.read().get(level).map_or(0, |files| Self::bytes_of(files))
    }

    /// (min, max) key of every file on a level, in level order
    pub fn level_ranges(&self, level: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.levels.read().get(level).map_or_else(Vec::new, |files| {
            files
                .iter()
                .map(|t| (t.min_key().to_vec(), t.max_key().to_vec()))
                .collect()
        })
    }

    pub fn level_stats(&self, level: usize) -> Option<LevelStatsSnapshot> {
        self.stats.get(level).map(LevelStats::snapshot)
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn bytes_of(files: &[Arc<SSTableReader>]) -> u64 {
        files.iter().map(|t| t.file_size()).sum()
    }

    /// Smallest min key and largest max key over `tables`
    fn key_span(tables: &[Arc<SSTableReader>]) -> Option<(Vec<u8>, Vec<u8>)> {
        let lo = tables.iter().map(|t| t.min_key()).min()?;
        let hi = tables.iter().map(|t| t.max_key()).max()?;
        Some((lo.to_vec(), hi.to_vec()))
    }

    /// Generate the file path for an SSTable with given ID
    fn sstable_path(&self, id: u64) -> PathBuf {
        self.data_dir.join(format!("{:06}.sst", id))
    }

    /// Parse SSTable ID from filename
    /// "000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        path.file_stem()?.to_str()?.parse().ok()
    }
}
