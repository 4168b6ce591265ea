//! Driver Module
//!
//! Runs one scenario against a [`StorageEngine`]: open, load to each
//! checkpoint, measure lookups, report, close.
//!
//! ## Responsibilities
//! - Enforce the phase order (see [`Phase`])
//! - Generate keys and values without allocating on the hot path
//! - Time lookups through a pluggable [`Clock`]
//! - Hand each measurement to the output as soon as it is taken

mod report;
mod state;

pub use report::{MeasurementReport, RunReport};
pub use state::Phase;

use std::io::Write;

use tracing::{debug, info};

use crate::backend::StorageEngine;
use crate::clock::{Clock, MonotonicClock};
use crate::config::BenchConfig;
use crate::error::{BenchError, Result};
use crate::histogram::SampleHistogram;
use crate::planner::LevelSchedule;
use crate::workload::{
    KeyEncoder, KeySampler, LookupPlacement, MeasureMode, PayloadGenerator, IN_RANGE_SUFFIX,
    LOOKUP_PREFIX, WRITE_PREFIX,
};

/// Seed offset of the lookup key stream, keeps it independent of writes
const LOOKUP_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Benchmark driver over engine `E`, timed by clock `C`
pub struct Driver<E: StorageEngine, C: Clock = MonotonicClock> {
    config: BenchConfig,
    schedule: LevelSchedule,
    clock: C,
    phase: Phase,
    engine: Option<E>,

    payload: PayloadGenerator,
    write_keys: KeyEncoder,
    lookup_keys: KeyEncoder,
    write_sampler: KeySampler,
    lookup_sampler: KeySampler,
    histogram: SampleHistogram,

    /// Index of the next checkpoint to load to
    checkpoint: usize,
    entries_loaded: u64,
    last_load_micros: f64,
    lookup_hits: u64,
}

impl<E: StorageEngine> Driver<E> {
    /// Driver timed by the monotonic wall clock
    pub fn new(config: BenchConfig) -> Result<Self> {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<E: StorageEngine, C: Clock> Driver<E, C> {
    /// Plan the level schedule and build generators; no I/O yet.
    pub fn with_clock(config: BenchConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let schedule = config.plan_schedule()?;

        let payload = PayloadGenerator::with_pool_size(
            config.compression_ratio,
            config.payload_pool_size,
            config.seed,
        )?;
        let write_keys = KeyEncoder::with_width(&[WRITE_PREFIX], config.key_digit_width)?;
        let workload = &config.workload;
        let lookup_keys = match workload.lookup_placement {
            LookupPlacement::Disjoint => {
                KeyEncoder::with_width(&[LOOKUP_PREFIX], config.key_digit_width)?
            }
            LookupPlacement::InRange => {
                KeyEncoder::with_width(&[WRITE_PREFIX], config.key_digit_width)?
                    .with_suffix(&[IN_RANGE_SUFFIX])
            }
        };

        let write_sampler = KeySampler::new(
            workload.write_distribution,
            write_keys.ordinal_limit(),
            config.seed,
        );
        let lookup_sampler = KeySampler::new(
            workload.lookup_distribution,
            lookup_keys.ordinal_limit(),
            config.seed ^ LOOKUP_SEED_SALT,
        );

        Ok(Self {
            schedule,
            clock,
            phase: Phase::Idle,
            engine: None,
            payload,
            write_keys,
            lookup_keys,
            write_sampler,
            lookup_sampler,
            histogram: SampleHistogram::new()?,
            checkpoint: 0,
            entries_loaded: 0,
            last_load_micros: 0.0,
            lookup_hits: 0,
            config,
        })
    }

    /// Execute the whole scenario, writing each measurement to `out`
    pub fn run(&mut self, out: &mut impl Write) -> Result<RunReport> {
        info!(
            scenario = ?self.config.scenario,
            strategy = self.schedule.strategy_name(),
            db = %self.config.db_path.display(),
            "Starting benchmark"
        );
        debug!("Level schedule:\n{}", self.schedule);

        self.open()?;
        let mut measurements = Vec::with_capacity(self.config.workload.checkpoints.len());
        while self.checkpoint < self.config.workload.checkpoints.len() {
            self.load()?;
            self.measure()?;
            measurements.push(self.report(out)?);
        }
        self.close()?;

        Ok(RunReport {
            scenario: self.config.scenario,
            use_monkey: self.config.use_monkey,
            schedule: self.schedule.clone(),
            measurements,
        })
    }

    /// Idle → Opened: wipe the database directory and open the engine
    pub fn open(&mut self) -> Result<()> {
        let next = self.phase.transition(Phase::Opened)?;
        let path = &self.config.db_path;

        E::destroy(path).map_err(|e| BenchError::engine("destroy", e))?;
        let options = self.config.engine_options(&self.schedule);
        let engine = E::open(options, path).map_err(|e| BenchError::engine("open", e))?;

        self.engine = Some(engine);
        self.phase = next;
        Ok(())
    }

    /// Opened/Reported → Loaded: write up to the next checkpoint.
    /// Returns the number of entries written so far.
    pub fn load(&mut self) -> Result<u64> {
        let next = self.phase.transition(Phase::Loaded)?;
        let target = *self
            .config
            .workload
            .checkpoints
            .get(self.checkpoint)
            .ok_or_else(|| BenchError::Config("no checkpoint left to load".into()))?;
        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| BenchError::engine("put", "engine is not open"))?;
        let value_size = self.config.workload.value_size;

        let start = self.clock.now_micros();
        while self.entries_loaded < target {
            let ordinal = self.write_sampler.next_ordinal();
            self.write_keys.set(ordinal)?;
            let value = self.payload.generate(value_size)?;
            engine
                .put(self.write_keys.slice(), value)
                .map_err(|e| BenchError::engine("put", e))?;
            self.entries_loaded += 1;
        }
        self.last_load_micros = self.clock.now_micros() - start;

        debug!(
            entries = self.entries_loaded,
            load_micros = self.last_load_micros,
            "Load finished"
        );
        self.phase = next;
        Ok(self.entries_loaded)
    }

    /// Loaded → Measuring: run every lookup round into a fresh histogram
    pub fn measure(&mut self) -> Result<()> {
        let next = self.phase.transition(Phase::Measuring)?;
        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| BenchError::engine("get", "engine is not open"))?;
        let workload = &self.config.workload;

        self.histogram.clear();
        self.lookup_hits = 0;
        // In-range lookups stay within the ordinals written so far
        let bound = match workload.lookup_placement {
            LookupPlacement::Disjoint => u64::MAX,
            LookupPlacement::InRange => self.write_sampler.span(),
        };

        for _ in 0..workload.rounds {
            match workload.measure_mode {
                MeasureMode::Coarse => {
                    let start = self.clock.now_micros();
                    for _ in 0..workload.lookup_count {
                        self.lookup_keys.set(self.lookup_sampler.next_ordinal_below(bound))?;
                        let found = engine
                            .get(self.lookup_keys.slice())
                            .map_err(|e| BenchError::engine("get", e))?;
                        self.lookup_hits += u64::from(found.is_some());
                    }
                    self.histogram.add(self.clock.now_micros() - start);
                }
                MeasureMode::Fine => {
                    for _ in 0..workload.lookup_count {
                        self.lookup_keys.set(self.lookup_sampler.next_ordinal_below(bound))?;
                        let start = self.clock.now_micros();
                        let found = engine
                            .get(self.lookup_keys.slice())
                            .map_err(|e| BenchError::engine("get", e))?;
                        self.histogram.add(self.clock.now_micros() - start);
                        self.lookup_hits += u64::from(found.is_some());
                    }
                }
            }
        }

        self.phase = next;
        Ok(())
    }

    /// Measuring → Reported: collect engine stats and write the measurement
    pub fn report(&mut self, out: &mut impl Write) -> Result<MeasurementReport> {
        let next = self.phase.transition(Phase::Reported)?;
        let workload = &self.config.workload;

        let mut report =
            MeasurementReport::from_histogram(self.checkpoint, self.entries_loaded, &self.histogram);
        report.value_size = workload.value_size;
        report.measure_mode = workload.measure_mode;
        report.rounds = workload.rounds;
        report.lookups_per_round = workload.lookup_count;
        report.lookup_hits = self.lookup_hits;
        report.load_micros = self.last_load_micros;
        report.engine_stats = self
            .engine
            .as_ref()
            .and_then(|engine| engine.property(E::STATS_PROPERTY));
        if workload.measure_mode == MeasureMode::Fine {
            report.histogram_table = Some(self.histogram.to_string());
        }

        report.render(self.config.output, out)?;

        info!(
            entries = report.entries,
            mean_micros = report.mean_micros,
            std_dev_micros = report.std_dev_micros,
            hits = report.lookup_hits,
            "Measurement reported"
        );
        self.checkpoint += 1;
        self.phase = next;
        Ok(report)
    }

    /// Reported → Closed: close the engine and release it
    pub fn close(&mut self) -> Result<()> {
        let next = self.phase.transition(Phase::Closed)?;
        if let Some(engine) = self.engine.take() {
            engine.close().map_err(|e| BenchError::engine("close", e))?;
        }
        self.phase = next;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn schedule(&self) -> &LevelSchedule {
        &self.schedule
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Samples gathered by the latest measurement phase
    pub fn histogram(&self) -> &SampleHistogram {
        &self.histogram
    }

    pub fn entries_loaded(&self) -> u64 {
        self.entries_loaded
    }

    /// The open engine, if any
    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }
}
