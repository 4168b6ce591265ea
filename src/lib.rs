//! # monkeybench
//!
//! A benchmark harness for leveled LSM trees with per-level bloom filters:
//! - Level budget planning (capacities + bits per key per level)
//! - Deterministic workload generation (fixed-width keys, compressible values)
//! - Phase-driven load / measure / report loop over any [`StorageEngine`]
//! - A reference leveled engine with per-level filter statistics
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    monkey-bench (CLI)                        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ BenchConfig
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Driver                                │
//! │     Idle → Opened → Loaded → Measuring → Reported → Closed   │
//! └───┬─────────────┬───────────────┬───────────────┬───────────┘
//!     │             │               │               │
//!     ▼             ▼               ▼               ▼
//! ┌─────────┐ ┌───────────┐ ┌──────────────┐ ┌─────────────┐
//! │ Planner │ │ Workload  │ │  Histogram   │ │ StorageEngine│
//! │(levels) │ │(keys/vals)│ │  (samples)   │ │   (trait)    │
//! └─────────┘ └───────────┘ └──────────────┘ └──────┬──────┘
//!                                                   │
//!                                    ┌──────────────▼──────────────┐
//!                                    │ Engine: MemTable → L0 .. Ln │
//!                                    │  (SSTables + bloom filters) │
//!                                    └─────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod planner;
pub mod workload;
pub mod clock;
pub mod histogram;

pub mod backend;
pub mod memtable;
pub mod storage;
pub mod engine;

pub mod driver;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use backend::StorageEngine;
pub use config::{BenchConfig, EngineOptions};
pub use driver::{Driver, RunReport};
pub use engine::Engine;
pub use error::{BenchError, Result};
pub use planner::LevelSchedule;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of monkeybench
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
