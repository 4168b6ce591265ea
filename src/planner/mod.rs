//! Level Budget Planner
//!
//! Derives the per-level geometry handed to the engine at open time.
//!
//! ## Responsibilities
//! - Capacity of every level from the base level size and size ratio
//! - Bits-per-entry of every level's bloom filter, either supplied verbatim
//!   (override mode) or derived from a total budget by a pluggable strategy
//! - Verify the result: non-negative, budget respected, non-increasing
//!
//! ## Shape of a 7-level schedule (size ratio 10, Monkey strategy, B = 10)
//! ```text
//! level   capacity     bits/entry
//! ─────   ──────────   ──────────
//!   0     (unbounded)     38.22
//!   1       20 MiB        33.43
//!   2      200 MiB        28.64
//!   3      ~2 GiB         23.85
//!   4     ~20 GiB         19.05
//!   5    ~200 GiB         14.26
//!   6      ~2 TiB          9.47
//! ```

mod capacity;
mod schedule;
mod strategy;

use thiserror::Error;

pub use capacity::{plan_capacities, CapacityParams};
pub use schedule::{expected_weights, plan_filter_bits, FilterAllocation, FilterPlan, LevelPlan, LevelSchedule};
pub use strategy::{
    FilterAllocator, HandTunedAllocator, InverseCapacityAllocator, MonkeyAllocator,
    UniformAllocator, HAND_TUNED_BITS,
};

/// Relative tolerance for the weighted-budget check
pub const BUDGET_TOLERANCE: f64 = 1e-6;

/// Planner input or post-condition violations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("size ratio must be a finite value > 1, got {0}")]
    InvalidSizeRatio(f64),

    #[error("level count must be at least 1")]
    InvalidLevelCount,

    #[error("base level size must be non-zero")]
    ZeroBaseLevel,

    #[error("capacity of level {level} overflows u64")]
    CapacityOverflow { level: usize },

    #[error("filter budget must be a finite value >= 0, got {0}")]
    InvalidBudget(f64),

    #[error("expected {expected} per-level filter values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("level {level} has invalid bits per entry {bits}")]
    InvalidBits { level: usize, bits: f64 },

    #[error("allocation not monotonic: level {level} has {bits} bits, level {} has {previous}", .level - 1)]
    NotMonotonic {
        level: usize,
        previous: f64,
        bits: f64,
    },

    #[error("weighted average {actual} bits per entry does not match budget {expected}")]
    BudgetMismatch { expected: f64, actual: f64 },

    #[error("hand-tuned table covers {available} levels, {requested} requested")]
    TableTooShort { available: usize, requested: usize },
}
