//! Bloom filter
//!
//! One filter per SSTable, sized from a fractional bits-per-key budget so a
//! level can get e.g. 14.26 bits per entry.
//!
//! Probe positions use double hashing over xxh64:
//! `h_i = h1 + i * h2 (mod m)` with `h1 = xxh64(key, 0)`, `h2 = xxh64(key, 1)`.
//!
//! ## Encoded form
//! ```text
//! ┌──────────────┬──────────────┬──────────────────┐
//! │ k: u32 (4)   │ m: u64 (8)   │ bits (ceil(m/8)) │
//! └──────────────┴──────────────┴──────────────────┘
//! ```
//! `m == 0` encodes "no filter": every probe answers "maybe".

use std::f64::consts::LN_2;

use xxhash_rust::xxh64::xxh64;

use crate::error::{BenchError, Result};

const MAX_HASHES: u32 = 30;

const ENCODED_HEADER: usize = 12;

#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u8>,
    num_hashes: u32,
    num_bits: usize,
}

impl BloomFilter {
    /// Size a filter for `num_keys` at `bits_per_key` (may be fractional).
    ///
    /// `bits_per_key <= 0` builds a disabled filter. There is no size floor:
    /// a table of `n` keys gets exactly `ceil(n * bits_per_key)` bits.
    pub fn new(num_keys: usize, bits_per_key: f64) -> Self {
        if !(bits_per_key > 0.0) || num_keys == 0 {
            return Self::disabled();
        }
        let num_bits = ((num_keys as f64 * bits_per_key).ceil() as usize).max(1);
        Self {
            bits: vec![0u8; num_bits.div_ceil(8)],
            num_hashes: Self::hashes_for(bits_per_key),
            num_bits,
        }
    }

    /// A filter that never rules anything out
    pub fn disabled() -> Self {
        Self {
            bits: Vec::new(),
            num_hashes: 0,
            num_bits: 0,
        }
    }

    /// `k = round(bits_per_key * ln 2)`, clamped to `1..=30`
    pub fn hashes_for(bits_per_key: f64) -> u32 {
        ((bits_per_key * LN_2).round() as u32).clamp(1, MAX_HASHES)
    }

    pub fn add(&mut self, key: &[u8]) {
        if self.num_bits == 0 {
            return;
        }
        let (h1, h2) = Self::hash(key);
        for i in 0..self.num_hashes {
            let pos = self.position(h1, h2, i);
            self.bits[pos >> 3] |= 1 << (pos & 7);
        }
    }

    /// False means the key is definitely absent.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        if self.num_bits == 0 {
            return true;
        }
        let (h1, h2) = Self::hash(key);
        (0..self.num_hashes).all(|i| {
            let pos = self.position(h1, h2, i);
            self.bits[pos >> 3] & (1 << (pos & 7)) != 0
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.num_bits > 0
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    #[inline]
    fn hash(key: &[u8]) -> (u64, u64) {
        (xxh64(key, 0), xxh64(key, 1))
    }

    #[inline]
    fn position(&self, h1: u64, h2: u64, i: u32) -> usize {
        (h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits as u64) as usize
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&self.num_hashes.to_le_bytes());
        buf.extend_from_slice(&(self.num_bits as u64).to_le_bytes());
        buf.extend_from_slice(&self.bits);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < ENCODED_HEADER {
            return Err(BenchError::Corruption(format!(
                "bloom filter block of {} bytes is truncated",
                data.len()
            )));
        }
        let num_hashes = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let mut m = [0u8; 8];
        m.copy_from_slice(&data[4..12]);
        let num_bits = u64::from_le_bytes(m) as usize;

        let expected = num_bits.div_ceil(8);
        if data.len() != ENCODED_HEADER + expected {
            return Err(BenchError::Corruption(format!(
                "bloom filter expects {} bit bytes, block holds {}",
                expected,
                data.len() - ENCODED_HEADER
            )));
        }
        if num_bits > 0 && !(1..=MAX_HASHES).contains(&num_hashes) {
            return Err(BenchError::Corruption(format!(
                "bloom filter hash count {} out of range",
                num_hashes
            )));
        }

        Ok(Self {
            bits: data[ENCODED_HEADER..].to_vec(),
            num_hashes,
            num_bits,
        })
    }

    pub fn encoded_len(&self) -> usize {
        ENCODED_HEADER + self.bits.len()
    }
}
