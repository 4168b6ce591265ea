//! SSTable Reader
//!
//! Keeps the sparse index and the bloom filter in memory; a point lookup
//! costs at most one block read.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{BenchError, Result};
use crate::storage::bloom::BloomFilter;

use super::iterator::SSTableIterator;
use super::{
    read_u32, read_u64, ENTRY_HEADER_SIZE, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER,
    VERSION,
};

/// What a single-file lookup ran into
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// Key outside [min_key, max_key]; the filter was not consulted
    OutOfRange,
    /// Filter said "definitely absent"; no I/O
    FilteredOut,
    /// Filter said "maybe" but the block does not hold the key
    FalsePositive,
    /// Key present; `None` is a tombstone
    Found(Option<Vec<u8>>),
}

/// Sparse index entry: last key of a block and where the block lives
#[derive(Debug)]
struct BlockHandle {
    last_key: Vec<u8>,
    offset: u64,
    size: u32,
}

/// Reader for SSTable files
///
/// The file handle sits behind a mutex so lookups take `&self`.
pub struct SSTableReader {
    path: PathBuf,
    file: Mutex<File>,
    level: usize,
    entry_count: u64,
    file_size: u64,
    min_key: Vec<u8>,
    blocks: Vec<BlockHandle>,
    filter: BloomFilter,
    pub(super) index_offset: u64,
    data_crc: u32,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Loads the index and filter blocks into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(BenchError::Corruption(format!(
                "{}: {} bytes is too small for an SSTable",
                path.display(),
                file_size
            )));
        }

        // Header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(BenchError::Corruption(format!(
                "Invalid SSTable magic: expected MNKY, got {:?}",
                &header[0..4]
            )));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(BenchError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }
        let level = header[6] as usize;
        let entry_count = read_u64(&header, 7);

        // Footer
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = read_u64(&footer, 0);
        let filter_offset = read_u64(&footer, 8);
        let data_crc = read_u32(&footer, 16);

        let footer_start = file_size - FOOTER_SIZE;
        if index_offset < HEADER_SIZE || index_offset > filter_offset || filter_offset > footer_start
        {
            return Err(BenchError::Corruption(format!(
                "{}: bad block offsets (index {}, filter {})",
                path.display(),
                index_offset,
                filter_offset
            )));
        }

        // Index + filter blocks are contiguous
        file.seek(SeekFrom::Start(index_offset))?;
        let mut meta = vec![0u8; (footer_start - index_offset) as usize];
        file.read_exact(&mut meta)?;

        let split = (filter_offset - index_offset) as usize;
        let (min_key, blocks) = Self::parse_index(&meta[..split])?;
        let filter = BloomFilter::decode(&meta[split..])?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            level,
            entry_count,
            file_size,
            min_key,
            blocks,
            filter,
            index_offset,
            data_crc,
        })
    }

    fn parse_index(data: &[u8]) -> Result<(Vec<u8>, Vec<BlockHandle>)> {
        let truncated = || BenchError::Corruption("SSTable index block is truncated".into());

        if data.len() < 4 {
            return Err(truncated());
        }
        let min_len = read_u32(data, 0) as usize;
        let mut pos = 4;
        let min_key = data.get(pos..pos + min_len).ok_or_else(truncated)?.to_vec();
        pos += min_len;

        let mut blocks = Vec::new();
        while pos < data.len() {
            if pos + 16 > data.len() {
                return Err(truncated());
            }
            let key_len = read_u32(data, pos) as usize;
            let offset = read_u64(data, pos + 4);
            let size = read_u32(data, pos + 12);
            pos += 16;
            let last_key = data.get(pos..pos + key_len).ok_or_else(truncated)?.to_vec();
            pos += key_len;
            blocks.push(BlockHandle {
                last_key,
                offset,
                size,
            });
        }
        Ok((min_key, blocks))
    }

    /// Look a key up: range check, then filter, then one block read
    pub fn get(&self, key: &[u8]) -> Result<ProbeOutcome> {
        if !self.might_contain(key) {
            return Ok(ProbeOutcome::OutOfRange);
        }
        if !self.filter.may_contain(key) {
            return Ok(ProbeOutcome::FilteredOut);
        }

        // First block whose last key is >= key
        let idx = self
            .blocks
            .partition_point(|block| block.last_key.as_slice() < key);
        let Some(block) = self.blocks.get(idx) else {
            return Ok(ProbeOutcome::FalsePositive);
        };

        let data = self.read_block(block)?;
        match Self::scan_block(&data, key)? {
            Some(value) => Ok(ProbeOutcome::Found(value)),
            None => Ok(ProbeOutcome::FalsePositive),
        }
    }

    fn read_block(&self, block: &BlockHandle) -> Result<Vec<u8>> {
        let mut data = vec![0u8; block.size as usize];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(block.offset))?;
        file.read_exact(&mut data)?;
        Ok(data)
    }

    /// Linear scan of one block. Outer `None` means the key is not there.
    fn scan_block(data: &[u8], key: &[u8]) -> Result<Option<Option<Vec<u8>>>> {
        let truncated = || BenchError::Corruption("SSTable data block is truncated".into());

        let mut pos = 0;
        while pos < data.len() {
            if pos + ENTRY_HEADER_SIZE > data.len() {
                return Err(truncated());
            }
            let key_len = read_u32(data, pos) as usize;
            let val_len = read_u32(data, pos + 4);
            pos += ENTRY_HEADER_SIZE;

            let entry_key = data.get(pos..pos + key_len).ok_or_else(truncated)?;
            pos += key_len;

            let value = if val_len == TOMBSTONE_MARKER {
                None
            } else {
                let len = val_len as usize;
                let value = data.get(pos..pos + len).ok_or_else(truncated)?;
                pos += len;
                Some(value)
            };

            match entry_key.cmp(key) {
                std::cmp::Ordering::Less => continue,
                std::cmp::Ordering::Equal => return Ok(Some(value.map(<[u8]>::to_vec))),
                std::cmp::Ordering::Greater => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Recompute the data CRC and compare it with the footer
    pub fn verify_checksum(&self) -> Result<()> {
        let mut data = vec![0u8; (self.index_offset - HEADER_SIZE) as usize];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(HEADER_SIZE))?;
            file.read_exact(&mut data)?;
        }
        let actual = crc32fast::hash(&data);
        if actual != self.data_crc {
            return Err(BenchError::Corruption(format!(
                "{}: data CRC mismatch (stored {:08x}, computed {:08x})",
                self.path.display(),
                self.data_crc,
                actual
            )));
        }
        Ok(())
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Level recorded in the header
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> &[u8] {
        &self.min_key
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> &[u8] {
        self.blocks
            .last()
            .map(|block| block.last_key.as_slice())
            .unwrap_or_default()
    }

    /// Bits in this file's bloom filter (0 when disabled)
    pub fn filter_bits(&self) -> usize {
        self.filter.num_bits()
    }

    /// Filter bits divided by entries
    pub fn bits_per_key(&self) -> f64 {
        if self.entry_count == 0 {
            0.0
        } else {
            self.filter.num_bits() as f64 / self.entry_count as f64
        }
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        !self.blocks.is_empty() && key >= self.min_key() && key <= self.max_key()
    }

    /// Create an iterator over all entries (for compaction, debugging)
    pub fn iter(&self) -> Result<SSTableIterator> {
        SSTableIterator::open(&self.path, self.index_offset)
    }
}
