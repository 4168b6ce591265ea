//! Payload Generator
//!
//! Values are served from a pre-built pool so generating them costs nothing
//! on the measured path.
//!
//! ## Pool layout
//! ```text
//! ┌──────────┬──────────┬──────────┬─────┬──────────┐
//! │ fragment │ fragment │ fragment │ ... │ fragment │   >= pool_size bytes
//! └──────────┴──────────┴──────────┴─────┴──────────┘
//!   ▲ cursor advances by each request, back to 0 on overrun
//! ```
//! Each fragment is a short random seed tiled to the fragment length, so it
//! compresses to roughly `compression_ratio` of its raw size.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{BenchError, Result};

/// Minimum and default pool size (1 MiB)
pub const DEFAULT_POOL_SIZE: usize = 1 << 20;

/// Fragment length used to build the pool
pub const FRAGMENT_LEN: usize = 100;

/// Seed used when none is configured
pub const DEFAULT_PAYLOAD_SEED: u64 = 301;

/// Build one fragment of `len` bytes that compresses to about `ratio` of
/// its size: `max(1, len * ratio)` random printable bytes, repeated.
pub fn compressible_fragment(rng: &mut impl Rng, ratio: f64, len: usize) -> Vec<u8> {
    let raw = ((len as f64 * ratio) as usize).max(1);
    let seed: Vec<u8> = (0..raw).map(|_| b' ' + rng.gen_range(0..95u8)).collect();

    let mut fragment = Vec::with_capacity(len);
    while fragment.len() < len {
        let take = (len - fragment.len()).min(seed.len());
        fragment.extend_from_slice(&seed[..take]);
    }
    fragment
}

/// Ring buffer of compressible bytes
#[derive(Debug)]
pub struct PayloadGenerator {
    pool: Vec<u8>,
    cursor: usize,
    compression_ratio: f64,
}

impl PayloadGenerator {
    /// Default pool size, default seed
    pub fn new(compression_ratio: f64) -> Result<Self> {
        Self::with_pool_size(compression_ratio, DEFAULT_POOL_SIZE, DEFAULT_PAYLOAD_SEED)
    }

    /// Build a pool of at least `pool_size` bytes (never less than 1 MiB).
    pub fn with_pool_size(compression_ratio: f64, pool_size: usize, seed: u64) -> Result<Self> {
        if !(compression_ratio > 0.0 && compression_ratio <= 1.0) {
            return Err(BenchError::Config(format!(
                "compression ratio must be in (0, 1], got {}",
                compression_ratio
            )));
        }
        let target = pool_size.max(DEFAULT_POOL_SIZE);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut pool = Vec::with_capacity(target + FRAGMENT_LEN);
        while pool.len() < target {
            pool.extend(compressible_fragment(&mut rng, compression_ratio, FRAGMENT_LEN));
        }

        Ok(Self {
            pool,
            cursor: 0,
            compression_ratio,
        })
    }

    /// Next `len` bytes of the pool.
    ///
    /// Invariant: `len < pool_len()`; violating it is a configuration error.
    pub fn generate(&mut self, len: usize) -> Result<&[u8]> {
        if len >= self.pool.len() {
            return Err(BenchError::Config(format!(
                "payload of {} bytes does not fit the {} byte pool",
                len,
                self.pool.len()
            )));
        }
        if self.cursor + len > self.pool.len() {
            self.cursor = 0;
        }
        let start = self.cursor;
        self.cursor += len;
        Ok(&self.pool[start..self.cursor])
    }

    /// Offset of the next slice
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn compression_ratio(&self) -> f64 {
        self.compression_ratio
    }
}
