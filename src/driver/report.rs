//! Measurement results and their rendering
//!
//! Text output keeps the classic shape: the engine's statistics verbatim,
//! then `"<entries> <mean> <stddev>"`, then (fine mode) the bucket table.
//! JSON output is one object per measurement.

use std::io::Write;

use serde::Serialize;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::histogram::{HistogramSummary, SampleHistogram};
use crate::planner::LevelSchedule;
use crate::workload::{MeasureMode, Scenario};

/// One measurement phase
#[derive(Debug, Clone, Serialize)]
pub struct MeasurementReport {
    /// Zero-based checkpoint index
    pub checkpoint: usize,
    /// Entries written so far
    pub entries: u64,
    pub value_size: usize,
    pub measure_mode: MeasureMode,
    pub rounds: usize,
    pub lookups_per_round: u64,
    /// Lookups that found a value
    pub lookup_hits: u64,
    /// Wall time of the load leading up to this checkpoint
    pub load_micros: f64,
    pub mean_micros: f64,
    pub std_dev_micros: f64,
    pub latency: HistogramSummary,
    /// Engine statistics property, verbatim
    pub engine_stats: Option<String>,
    /// Bucket table (fine mode only)
    #[serde(skip)]
    pub histogram_table: Option<String>,
}

impl MeasurementReport {
    pub(super) fn from_histogram(
        checkpoint: usize,
        entries: u64,
        histogram: &SampleHistogram,
    ) -> Self {
        Self {
            checkpoint,
            entries,
            value_size: 0,
            measure_mode: MeasureMode::Coarse,
            rounds: 0,
            lookups_per_round: 0,
            lookup_hits: 0,
            load_micros: 0.0,
            mean_micros: histogram.mean(),
            std_dev_micros: histogram.std_dev(),
            latency: histogram.summary(),
            engine_stats: None,
            histogram_table: None,
        }
    }

    /// Classic `entries mean stddev` line
    pub fn summary_line(&self) -> String {
        format!(
            "{} {:.4} {:.4}",
            self.entries, self.mean_micros, self.std_dev_micros
        )
    }

    /// Write in the requested format
    pub fn render(&self, format: OutputFormat, out: &mut impl Write) -> Result<()> {
        match format {
            OutputFormat::Text => {
                if let Some(stats) = &self.engine_stats {
                    writeln!(out, "{}", stats)?;
                }
                writeln!(out, "{}", self.summary_line())?;
                if let Some(table) = &self.histogram_table {
                    writeln!(out, "{}", table)?;
                }
            }
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, self).map_err(std::io::Error::from)?;
                writeln!(out)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}

/// Everything one `Driver::run` produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub scenario: Scenario,
    pub use_monkey: bool,
    pub schedule: LevelSchedule,
    pub measurements: Vec<MeasurementReport>,
}

impl RunReport {
    pub fn last(&self) -> Option<&MeasurementReport> {
        self.measurements.last()
    }
}
