//! Workload Module
//!
//! Describes what one benchmark scenario writes and reads.
//!
//! ## Responsibilities
//! - Map a scenario identifier + argument to a [`WorkloadSpec`]
//! - Fixed-width key encoding ([`KeyEncoder`])
//! - Compressible value generation ([`PayloadGenerator`])
//! - Ordinal sampling for sequential / uniform-random key streams

mod keys;
mod payload;

pub use keys::{KeyEncoder, DEFAULT_DIGIT_WIDTH, MAX_DIGIT_WIDTH};
pub use payload::{
    compressible_fragment, PayloadGenerator, DEFAULT_PAYLOAD_SEED, DEFAULT_POOL_SIZE,
    FRAGMENT_LEN,
};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::{BenchError, Result};

/// Prefix of keys written during the load phase
pub const WRITE_PREFIX: u8 = b'a';

/// Prefix of keys looked up during measurement (disjoint from writes)
pub const LOOKUP_PREFIX: u8 = b'b';

/// Suffix of in-range lookup keys; `a<n>#` sorts between `a<n>` and `a<n+1>`
pub const IN_RANGE_SUFFIX: u8 = b'#';

/// Lookups per measurement round
pub const DEFAULT_LOOKUP_COUNT: u64 = 16 * 1024;

/// Measurement rounds per phase
pub const DEFAULT_ROUNDS: usize = 3;

/// Upper bound of uniform ordinals (31-bit, like a classic LCG `Next()`)
pub const UNIFORM_KEY_SPACE: u64 = 1 << 31;

/// How key ordinals are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyDistribution {
    /// 0, 1, 2, ... continuing across checkpoints
    Sequential,
    /// Uniform over `[0, min(2^31, 10^digits))`
    Uniform,
}

/// Where lookup keys fall relative to the written keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LookupPlacement {
    /// Prefix `b`: above every file's range, filters are never consulted
    Disjoint,
    /// Write prefix plus a suffix: inside file ranges, still never written
    InRange,
}

/// Sampling granularity of the read phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasureMode {
    /// One sample per round covering every lookup in the round
    Coarse,
    /// One sample per lookup
    Fine,
}

/// Known scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Grow the database by doubling, measuring at each size (id 0)
    VaryEntryCount,
    /// Fixed entry count, entry size taken from the argument (ids 1-3)
    VaryEntrySize,
}

impl Scenario {
    pub fn from_id(id: i64) -> Result<Self> {
        match id {
            0 => Ok(Scenario::VaryEntryCount),
            1..=3 => Ok(Scenario::VaryEntrySize),
            other => Err(BenchError::Config(format!("Invalid scenario number {}", other))),
        }
    }
}

/// Immutable description of one benchmark scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadSpec {
    pub scenario: Scenario,
    /// Value bytes per entry (entry size minus key width)
    pub value_size: usize,
    /// Cumulative entry counts at which a measurement is taken
    pub checkpoints: Vec<u64>,
    pub lookup_count: u64,
    pub rounds: usize,
    pub write_distribution: KeyDistribution,
    pub lookup_distribution: KeyDistribution,
    pub lookup_placement: LookupPlacement,
    pub measure_mode: MeasureMode,
}

impl WorkloadSpec {
    /// First checkpoint of the vary-entry-count scenario
    pub const COUNT_START: u64 = 1 << 15;
    /// Exclusive end of the vary-entry-count scenario
    pub const COUNT_END: u64 = 1 << 19;
    /// Entries written by the vary-entry-size scenario
    pub const SIZE_SCENARIO_WRITES: u64 = 1024 * 1024;
    /// Entry size used by the vary-entry-count scenario
    pub const DEFAULT_ENTRY_SIZE: usize = 1024;

    /// Build the workload for `scenario`.
    ///
    /// `arg` is the total entry size (key + value) for the vary-entry-size
    /// scenario and is ignored by the vary-entry-count scenario.
    pub fn for_scenario(scenario: Scenario, arg: i64, key_len: usize) -> Result<Self> {
        let (value_size, checkpoints) = match scenario {
            Scenario::VaryEntryCount => {
                let mut checkpoints = Vec::new();
                let mut n = Self::COUNT_START;
                while n < Self::COUNT_END {
                    checkpoints.push(n);
                    n *= 2;
                }
                (Self::DEFAULT_ENTRY_SIZE.saturating_sub(key_len), checkpoints)
            }
            Scenario::VaryEntrySize => {
                if arg <= key_len as i64 {
                    return Err(BenchError::Config(format!(
                        "entry size {} must exceed the {} byte key",
                        arg, key_len
                    )));
                }
                (arg as usize - key_len, vec![Self::SIZE_SCENARIO_WRITES])
            }
        };

        Ok(Self::with_shape(scenario, value_size, checkpoints))
    }

    /// Vary-entry-size workload with an explicit value size
    pub fn vary_entry_size(value_size: usize) -> Self {
        Self::with_shape(
            Scenario::VaryEntrySize,
            value_size,
            vec![Self::SIZE_SCENARIO_WRITES],
        )
    }

    fn with_shape(scenario: Scenario, value_size: usize, checkpoints: Vec<u64>) -> Self {
        Self {
            scenario,
            value_size,
            checkpoints,
            lookup_count: DEFAULT_LOOKUP_COUNT,
            rounds: DEFAULT_ROUNDS,
            write_distribution: KeyDistribution::Sequential,
            lookup_distribution: KeyDistribution::Uniform,
            lookup_placement: LookupPlacement::Disjoint,
            measure_mode: MeasureMode::Coarse,
        }
    }

    /// Total entries written over the whole run
    pub fn write_count(&self) -> u64 {
        self.checkpoints.last().copied().unwrap_or(0)
    }

    /// Replace the checkpoints with a single load of `count` entries.
    pub fn with_write_count(mut self, count: u64) -> Self {
        self.checkpoints = vec![count];
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.checkpoints.is_empty() {
            return Err(BenchError::Config("workload has no load checkpoints".into()));
        }
        if self.checkpoints.windows(2).any(|w| w[1] <= w[0]) {
            return Err(BenchError::Config(
                "load checkpoints must be strictly increasing".into(),
            ));
        }
        if self.rounds == 0 {
            return Err(BenchError::Config("at least one measurement round is required".into()));
        }
        if self.lookup_count == 0 {
            return Err(BenchError::Config("lookup count must be positive".into()));
        }
        Ok(())
    }
}

/// Produces key ordinals for one key stream
#[derive(Debug)]
pub struct KeySampler {
    distribution: KeyDistribution,
    next: u64,
    limit: u64,
    rng: StdRng,
}

impl KeySampler {
    /// `limit` is the exclusive ordinal bound of the key encoder.
    pub fn new(distribution: KeyDistribution, limit: u64, seed: u64) -> Self {
        Self {
            distribution,
            next: 0,
            limit: limit.min(UNIFORM_KEY_SPACE).max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_ordinal(&mut self) -> u64 {
        match self.distribution {
            KeyDistribution::Sequential => {
                let ordinal = self.next;
                self.next += 1;
                ordinal
            }
            KeyDistribution::Uniform => self.rng.gen_range(0..self.limit),
        }
    }

    /// Next ordinal below `bound` (and below the sampler's own limit)
    pub fn next_ordinal_below(&mut self, bound: u64) -> u64 {
        let bound = bound.min(self.limit).max(1);
        match self.distribution {
            KeyDistribution::Sequential => {
                let ordinal = self.next % bound;
                self.next += 1;
                ordinal
            }
            KeyDistribution::Uniform => self.rng.gen_range(0..bound),
        }
    }

    /// Exclusive bound of the ordinals handed out so far
    pub fn span(&self) -> u64 {
        match self.distribution {
            KeyDistribution::Sequential => self.next,
            KeyDistribution::Uniform => self.limit,
        }
    }

    pub fn distribution(&self) -> KeyDistribution {
        self.distribution
    }
}
