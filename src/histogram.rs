//! Histogram Collector
//!
//! Latency samples in microseconds. Count, sum, sum of squares, min and max
//! are tracked exactly; percentiles and the bucket report come from an HDR
//! histogram recorded in nanoseconds with 3 significant figures.

use std::fmt;

use hdrhistogram::Histogram;
use serde::Serialize;

use crate::error::{BenchError, Result};

const SIGFIGS: u8 = 3;

/// Largest trackable sample, one hour in nanoseconds; longer samples saturate
const MAX_TRACKABLE_NS: u64 = 3_600_000_000_000;

/// Width of the `#` bar in the bucket report at 100%
const BAR_WIDTH: f64 = 20.0;

/// Append-only sample collection for one measurement phase
#[derive(Debug, Clone)]
pub struct SampleHistogram {
    hdr: Histogram<u64>,
    count: u64,
    sum: f64,
    sum_squares: f64,
    min: f64,
    max: f64,
}

/// Derived statistics, all in microseconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p99: f64,
    pub p999: f64,
}

impl SampleHistogram {
    pub fn new() -> Result<Self> {
        let hdr = Histogram::<u64>::new_with_bounds(1, MAX_TRACKABLE_NS, SIGFIGS)
            .map_err(|e| BenchError::Config(format!("histogram: {:?}", e)))?;
        Ok(Self {
            hdr,
            count: 0,
            sum: 0.0,
            sum_squares: 0.0,
            min: f64::MAX,
            max: 0.0,
        })
    }

    pub fn clear(&mut self) {
        self.hdr.reset();
        self.count = 0;
        self.sum = 0.0;
        self.sum_squares = 0.0;
        self.min = f64::MAX;
        self.max = 0.0;
    }

    /// Record one sample. Negative values are clamped to zero.
    pub fn add(&mut self, micros: f64) {
        let value = if micros.is_finite() { micros.max(0.0) } else { 0.0 };
        self.hdr.saturating_record((value * 1_000.0).round() as u64);
        self.count += 1;
        self.sum += value;
        self.sum_squares += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// Population standard deviation
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        let variance = (self.sum_squares * n - self.sum * self.sum) / (n * n);
        variance.max(0.0).sqrt()
    }

    pub fn min(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.min
        }
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Value at percentile `p` (0..=100), quantized to 3 significant figures
    pub fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let q = (p / 100.0).clamp(0.0, 1.0);
        self.hdr.value_at_quantile(q) as f64 / 1_000.0
    }

    pub fn median(&self) -> f64 {
        self.percentile(50.0)
    }

    pub fn summary(&self) -> HistogramSummary {
        HistogramSummary {
            count: self.count,
            mean: self.mean(),
            std_dev: self.std_dev(),
            min: self.min(),
            max: self.max(),
            p50: self.percentile(50.0),
            p75: self.percentile(75.0),
            p90: self.percentile(90.0),
            p99: self.percentile(99.0),
            p999: self.percentile(99.9),
        }
    }

    /// Power-of-two buckets: `(lower_us, upper_us, count)`, empty ones skipped
    pub fn buckets(&self) -> Vec<(f64, f64, u64)> {
        if self.count == 0 {
            return Vec::new();
        }
        let mut buckets = Vec::new();
        let mut lower = 0u64;
        for step in self.hdr.iter_log(1_000, 2.0) {
            let upper = step.value_iterated_to();
            let count = step.count_since_last_iteration();
            if count > 0 {
                buckets.push((lower as f64 / 1_000.0, upper as f64 / 1_000.0, count));
            }
            lower = upper;
        }
        buckets
    }
}

impl fmt::Display for SampleHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Count: {}  Average: {:.4}  StdDev: {:.2}",
            self.count,
            self.mean(),
            self.std_dev()
        )?;
        writeln!(
            f,
            "Min: {:.4}  Median: {:.4}  Max: {:.4}",
            self.min(),
            self.median(),
            self.max()
        )?;
        writeln!(
            f,
            "P75: {:.4}  P90: {:.4}  P99: {:.4}  P99.9: {:.4}",
            self.percentile(75.0),
            self.percentile(90.0),
            self.percentile(99.0),
            self.percentile(99.9)
        )?;
        write!(f, "------------------------------------------------------")?;

        let total = self.count.max(1) as f64;
        let mut cumulative = 0.0;
        for (lower, upper, count) in self.buckets() {
            let pct = 100.0 * count as f64 / total;
            cumulative += pct;
            let bar = "#".repeat((pct / 100.0 * BAR_WIDTH).round() as usize);
            write!(
                f,
                "\n[ {:>10.3}, {:>10.3} ) {:>8} {:>8.3}% {:>8.3}% {}",
                lower, upper, count, pct, cumulative, bar
            )?;
        }
        Ok(())
    }
}
