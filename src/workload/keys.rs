//! Fixed-width key encoding
//!
//! Keys are `prefix ++ zero-padded decimal ordinal [++ suffix]`, so every
//! key in a run has the same length and byte order matches numeric order.

use crate::error::{BenchError, Result};

/// Largest supported digit width (10^19 still fits in a u64)
pub const MAX_DIGIT_WIDTH: usize = 19;

/// Default digit width: 1-byte prefix + 15 digits = 16-byte keys
pub const DEFAULT_DIGIT_WIDTH: usize = 15;

/// Reusable key buffer
#[derive(Debug, Clone)]
pub struct KeyEncoder {
    buffer: Vec<u8>,
    prefix_len: usize,
    digit_width: usize,
    limit: u64,
}

impl KeyEncoder {
    /// Single-byte prefix with the default digit width
    pub fn new(prefix: u8) -> Self {
        Self {
            buffer: Self::initial_buffer(&[prefix], DEFAULT_DIGIT_WIDTH),
            prefix_len: 1,
            digit_width: DEFAULT_DIGIT_WIDTH,
            limit: 10u64.pow(DEFAULT_DIGIT_WIDTH as u32),
        }
    }

    /// Arbitrary prefix and digit width (1..=19)
    pub fn with_width(prefix: &[u8], digit_width: usize) -> Result<Self> {
        if digit_width == 0 || digit_width > MAX_DIGIT_WIDTH {
            return Err(BenchError::Config(format!(
                "key digit width must be in 1..={}, got {}",
                MAX_DIGIT_WIDTH, digit_width
            )));
        }
        Ok(Self {
            buffer: Self::initial_buffer(prefix, digit_width),
            prefix_len: prefix.len(),
            digit_width,
            limit: 10u64.pow(digit_width as u32),
        })
    }

    /// Append a fixed suffix after the digits.
    ///
    /// `a000042#` sorts strictly between `a000042` and `a000043`, so a
    /// suffixed stream never collides with the unsuffixed one.
    pub fn with_suffix(mut self, suffix: &[u8]) -> Self {
        self.buffer.extend_from_slice(suffix);
        self
    }

    fn initial_buffer(prefix: &[u8], digit_width: usize) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(prefix.len() + digit_width);
        buffer.extend_from_slice(prefix);
        buffer.resize(prefix.len() + digit_width, b'0');
        buffer
    }

    /// Encode `ordinal` into the buffer.
    ///
    /// Ordinals that need more than `digit_width` digits are rejected rather
    /// than truncated.
    pub fn set(&mut self, ordinal: u64) -> Result<()> {
        if ordinal >= self.limit {
            return Err(BenchError::Config(format!(
                "key ordinal {} does not fit in {} digits",
                ordinal, self.digit_width
            )));
        }

        let mut rest = ordinal;
        let digits_end = self.prefix_len + self.digit_width;
        for slot in self.buffer[self.prefix_len..digits_end].iter_mut().rev() {
            *slot = b'0' + (rest % 10) as u8;
            rest /= 10;
        }
        Ok(())
    }

    /// The current key: prefix followed by the digits
    pub fn slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn prefix(&self) -> &[u8] {
        &self.buffer[..self.prefix_len]
    }

    pub fn digit_width(&self) -> usize {
        self.digit_width
    }

    pub fn suffix(&self) -> &[u8] {
        &self.buffer[self.prefix_len + self.digit_width..]
    }

    /// Total key length in bytes
    pub fn key_len(&self) -> usize {
        self.buffer.len()
    }

    /// Exclusive upper bound on encodable ordinals (10^digit_width)
    pub fn ordinal_limit(&self) -> u64 {
        self.limit
    }
}
