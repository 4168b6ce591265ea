//! Per-level counters
//!
//! Lookups and compactions bump these with relaxed atomics; the engine
//! renders them through its statistics property.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct LevelStats {
    /// Filter consultations (range check passed)
    probes: AtomicU64,
    /// Filter said "absent", block read avoided
    filter_negatives: AtomicU64,
    /// Filter said "maybe", block read, key absent
    false_positives: AtomicU64,
    hits: AtomicU64,
    compaction_read_bytes: AtomicU64,
    compaction_write_bytes: AtomicU64,
    compactions: AtomicU64,
}

/// Plain copy of [`LevelStats`] at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelStatsSnapshot {
    pub probes: u64,
    pub filter_negatives: u64,
    pub false_positives: u64,
    pub hits: u64,
    pub compaction_read_bytes: u64,
    pub compaction_write_bytes: u64,
    pub compactions: u64,
}

impl LevelStats {
    pub fn record_filter_negative(&self) {
        self.probes.fetch_add(1, Ordering::Relaxed);
        self.filter_negatives.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_false_positive(&self) {
        self.probes.fetch_add(1, Ordering::Relaxed);
        self.false_positives.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.probes.fetch_add(1, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Credit one compaction whose output landed on this level
    pub fn record_compaction(&self, read_bytes: u64, write_bytes: u64) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
        self.compaction_read_bytes.fetch_add(read_bytes, Ordering::Relaxed);
        self.compaction_write_bytes.fetch_add(write_bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LevelStatsSnapshot {
        LevelStatsSnapshot {
            probes: self.probes.load(Ordering::Relaxed),
            filter_negatives: self.filter_negatives.load(Ordering::Relaxed),
            false_positives: self.false_positives.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            compaction_read_bytes: self.compaction_read_bytes.load(Ordering::Relaxed),
            compaction_write_bytes: self.compaction_write_bytes.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
        }
    }
}

impl LevelStatsSnapshot {
    /// Fraction of filter probes that ended in a wasted block read
    pub fn false_positive_rate(&self) -> f64 {
        let misses = self.filter_negatives + self.false_positives;
        if misses == 0 {
            0.0
        } else {
            self.false_positives as f64 / misses as f64
        }
    }
}
