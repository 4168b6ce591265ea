//! SSTable Builder
//!
//! Writes sorted key-value entries to a new SSTable file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{BenchError, Result};
use crate::storage::bloom::BloomFilter;

use super::{SSTable, COUNT_OFFSET, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// One finished data block: (last key, file offset, byte size)
type BlockHandle = (Vec<u8>, u64, u32);

/// Builder for creating new SSTables from sorted entries
pub struct SSTableBuilder {
    /// Output file path
    path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    level: usize,
    bits_per_key: f64,
    block_size: usize,
    /// Number of entries written
    entry_count: u64,
    /// Current write position
    current_offset: u64,
    /// Start of the block being filled
    block_start: u64,
    /// Sparse index, one handle per finished block
    index: Vec<BlockHandle>,
    /// Keys seen so far, hashed into the filter on finish
    keys: Vec<Vec<u8>>,
    /// Running CRC hasher for data section
    data_hasher: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Create a new SSTable builder for `level`
    ///
    /// Writes header immediately; call `add()`/`add_tombstone()` in sorted order,
    /// then `finish()` to write index, filter and footer.
    pub fn new(path: &Path, level: usize, bits_per_key: f64, block_size: usize) -> Result<Self> {
        let level_byte = u8::try_from(level)
            .map_err(|_| BenchError::Storage(format!("level {} does not fit the header", level)))?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        // Entry count is a placeholder, patched in finish
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&[level_byte])?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            level,
            bits_per_key,
            block_size: block_size.max(1),
            entry_count: 0,
            current_offset: HEADER_SIZE,
            block_start: HEADER_SIZE,
            index: Vec::new(),
            keys: Vec::new(),
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Add a key-value pair (must be called in sorted key order)
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_entry(key, Some(value))
    }

    /// Add a tombstone (must be called in sorted key order)
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.write_entry(key, None)
    }

    /// Bytes written so far (header + data)
    pub fn estimated_size(&self) -> u64 {
        self.current_offset
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Internal: write an entry (value=None means tombstone)
    fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<()> {
        if let Some(last) = self.keys.last() {
            if key <= last.as_slice() {
                return Err(BenchError::Storage(
                    "SSTable keys must be added in strictly increasing order".into(),
                ));
            }
        }

        // Prepare entry bytes: [key_len(4)][val_len(4)][key][value]
        let key_len = key.len() as u32;
        let val_len = match value {
            Some(v) => v.len() as u32,
            None => TOMBSTONE_MARKER,
        };
        let key_len_bytes = key_len.to_le_bytes();
        let val_len_bytes = val_len.to_le_bytes();

        self.writer.write_all(&key_len_bytes)?;
        self.writer.write_all(&val_len_bytes)?;
        self.writer.write_all(key)?;

        self.data_hasher.update(&key_len_bytes);
        self.data_hasher.update(&val_len_bytes);
        self.data_hasher.update(key);

        let mut entry_size: u64 = 8 + key.len() as u64;
        if let Some(v) = value {
            self.writer.write_all(v)?;
            self.data_hasher.update(v);
            entry_size += v.len() as u64;
        }

        self.current_offset += entry_size;
        self.entry_count += 1;
        self.keys.push(key.to_vec());

        if self.current_offset - self.block_start >= self.block_size as u64 {
            self.close_block();
        }
        Ok(())
    }

    /// Seal the current block, if it holds anything
    fn close_block(&mut self) {
        if self.current_offset == self.block_start {
            return;
        }
        if let Some(last) = self.keys.last() {
            let size = (self.current_offset - self.block_start) as u32;
            self.index.push((last.clone(), self.block_start, size));
        }
        self.block_start = self.current_offset;
    }

    /// Finish building: write index, filter, footer, and return metadata
    pub fn finish(mut self) -> Result<SSTable> {
        self.close_block();

        // Index block
        let index_offset = self.current_offset;
        let min_key = self.keys.first().cloned().unwrap_or_default();
        let max_key = self.keys.last().cloned().unwrap_or_default();

        self.writer.write_all(&(min_key.len() as u32).to_le_bytes())?;
        self.writer.write_all(&min_key)?;
        let mut index_len = 4 + min_key.len() as u64;
        for (key, offset, size) in &self.index {
            self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(&size.to_le_bytes())?;
            self.writer.write_all(key)?;
            index_len += 16 + key.len() as u64;
        }

        // Filter block
        let filter_offset = index_offset + index_len;
        let mut filter = BloomFilter::new(self.keys.len(), self.bits_per_key);
        for key in &self.keys {
            filter.add(key);
        }
        self.writer.write_all(&filter.encode())?;

        // Footer
        let data_crc = self.data_hasher.finalize();
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&filter_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;

        self.writer.flush()?;

        // Seek back and update entry count in header
        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| BenchError::Storage(format!("Failed to flush SSTable: {}", e)))?;
        file.seek(SeekFrom::Start(COUNT_OFFSET))?;
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();

        Ok(SSTable {
            path: self.path,
            level: self.level,
            entry_count: self.entry_count,
            min_key,
            max_key,
            file_size,
            filter_bits: filter.num_bits(),
        })
    }
}
