//! Configuration for monkeybench
//!
//! Two immutable structs, each with a builder:
//! - [`EngineOptions`]: what the storage engine is opened with
//! - [`BenchConfig`]: everything the driver needs for one run

use std::path::PathBuf;

use crate::error::{BenchError, Result};
use crate::planner::{
    CapacityParams, FilterPlan, HandTunedAllocator, InverseCapacityAllocator, LevelSchedule,
    MonkeyAllocator, UniformAllocator,
};
use crate::workload::{
    KeyDistribution, LookupPlacement, MeasureMode, Scenario, WorkloadSpec, DEFAULT_DIGIT_WIDTH,
    DEFAULT_PAYLOAD_SEED, DEFAULT_POOL_SIZE,
};

/// Subdirectory of the test directory holding the database
pub const DB_SUBDIR: &str = "monkey";

// =============================================================================
// Engine Options
// =============================================================================

/// Options the engine is opened with
#[derive(Debug, Clone)]
pub struct EngineOptions {
    // -------------------------------------------------------------------------
    // Level Geometry
    // -------------------------------------------------------------------------
    /// Byte capacity of each level; `None` for level 0
    pub level_capacities: Vec<Option<u64>>,

    /// Target size of a single SSTable produced by compaction
    pub max_file_size: u64,

    /// Number of level-0 files that triggers a level-0 compaction
    pub l0_compaction_trigger: usize,

    // -------------------------------------------------------------------------
    // Filters
    // -------------------------------------------------------------------------
    /// Bloom bits per key for each level
    pub level_filter_bits: Vec<f64>,

    /// Use `level_filter_bits` (true) or `fallback_filter_bits` everywhere
    pub per_level_filters: bool,

    /// Bits per key of the global filter policy
    pub fallback_filter_bits: f64,

    // -------------------------------------------------------------------------
    // Write Path
    // -------------------------------------------------------------------------
    /// Max size of memtable before flush (in bytes)
    pub write_buffer_size: usize,

    /// Approximate size of an SSTable data block (in bytes)
    pub block_size: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        let max_file_size = 2 * 1024 * 1024; // 2 MB
        let level_capacities = (0..7)
            .map(|level| (level > 0).then(|| max_file_size * 10u64.pow(level)))
            .collect();
        Self {
            level_capacities,
            max_file_size,
            l0_compaction_trigger: 4,
            level_filter_bits: vec![10.0; 7],
            per_level_filters: false,
            fallback_filter_bits: 10.0,
            write_buffer_size: 4 * 1024 * 1024, // 4 MB
            block_size: 4096,
        }
    }
}

impl EngineOptions {
    /// Create a new options builder
    pub fn builder() -> EngineOptionsBuilder {
        EngineOptionsBuilder::default()
    }

    pub fn level_count(&self) -> usize {
        self.level_capacities.len()
    }

    /// Bits per key for files written to `level`
    pub fn filter_bits_for(&self, level: usize) -> f64 {
        if self.per_level_filters {
            self.level_filter_bits
                .get(level)
                .copied()
                .unwrap_or(self.fallback_filter_bits)
        } else {
            self.fallback_filter_bits
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.level_capacities.is_empty() {
            return Err(BenchError::Config("engine needs at least one level".into()));
        }
        if self.level_filter_bits.len() != self.level_capacities.len() {
            return Err(BenchError::Config(format!(
                "{} filter entries for {} levels",
                self.level_filter_bits.len(),
                self.level_capacities.len()
            )));
        }
        if self.write_buffer_size == 0 || self.max_file_size == 0 || self.block_size == 0 {
            return Err(BenchError::Config(
                "write buffer, file and block sizes must be positive".into(),
            ));
        }
        if self.l0_compaction_trigger == 0 {
            return Err(BenchError::Config(
                "level-0 compaction trigger must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for EngineOptions
#[derive(Default)]
pub struct EngineOptionsBuilder {
    options: EngineOptions,
}

impl EngineOptionsBuilder {
    /// Copy capacities and filter bits from a planned schedule
    pub fn schedule(mut self, schedule: &LevelSchedule) -> Self {
        self.options.level_capacities = schedule.capacities();
        self.options.level_filter_bits = schedule.filter_bits();
        self
    }

    pub fn per_level_filters(mut self, enabled: bool) -> Self {
        self.options.per_level_filters = enabled;
        self
    }

    pub fn fallback_filter_bits(mut self, bits: f64) -> Self {
        self.options.fallback_filter_bits = bits;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.options.max_file_size = bytes;
        self
    }

    pub fn l0_compaction_trigger(mut self, files: usize) -> Self {
        self.options.l0_compaction_trigger = files;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.options.write_buffer_size = bytes;
        self
    }

    pub fn block_size(mut self, bytes: usize) -> Self {
        self.options.block_size = bytes;
        self
    }

    pub fn build(self) -> EngineOptions {
        self.options
    }
}

// =============================================================================
// Benchmark Configuration
// =============================================================================

/// Which formula assigns filter bits when differentiated filters are on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStrategy {
    /// Closed-form Monkey allocation
    Monkey,
    /// Bits inversely proportional to level size
    InverseCapacity,
    /// Hand-tuned table, rescaled to the budget
    HandTuned,
    /// Hand-tuned table verbatim (override mode)
    Table,
}

/// Output rendering of measurement results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Immutable configuration for one benchmark run
#[derive(Debug, Clone)]
pub struct BenchConfig {
    // -------------------------------------------------------------------------
    // Scenario
    // -------------------------------------------------------------------------
    pub scenario: Scenario,

    /// Scenario-specific argument (entry size for the size scenario)
    pub scenario_arg: i64,

    /// Fully resolved workload (scenario defaults plus overrides)
    pub workload: WorkloadSpec,

    // -------------------------------------------------------------------------
    // Filters
    // -------------------------------------------------------------------------
    /// Differentiated per-level filters (true) or the uniform baseline
    pub use_monkey: bool,

    pub filter_strategy: FilterStrategy,

    /// Average bits per entry over the whole tree
    pub bits_per_key: f64,

    // -------------------------------------------------------------------------
    // Level Geometry
    // -------------------------------------------------------------------------
    pub level_count: usize,

    pub size_ratio: f64,

    pub max_file_size: u64,

    pub write_buffer_size: usize,

    pub l0_compaction_trigger: usize,

    // -------------------------------------------------------------------------
    // Data Generation
    // -------------------------------------------------------------------------
    pub compression_ratio: f64,

    pub payload_pool_size: usize,

    /// Seed of the payload pool and of the key samplers
    pub seed: u64,

    pub key_digit_width: usize,

    // -------------------------------------------------------------------------
    // Environment / Output
    // -------------------------------------------------------------------------
    /// Database directory, destroyed at the start of every run
    pub db_path: PathBuf,

    pub output: OutputFormat,
}

impl Default for BenchConfig {
    fn default() -> Self {
        let scenario_arg = 1024;
        let workload =
            WorkloadSpec::vary_entry_size(scenario_arg as usize - (1 + DEFAULT_DIGIT_WIDTH));
        Self {
            scenario: Scenario::VaryEntrySize,
            scenario_arg,
            workload,
            use_monkey: false,
            filter_strategy: FilterStrategy::Monkey,
            bits_per_key: 10.0,
            level_count: 7,
            size_ratio: 10.0,
            max_file_size: 2 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            l0_compaction_trigger: 4,
            compression_ratio: 0.5,
            payload_pool_size: DEFAULT_POOL_SIZE,
            seed: DEFAULT_PAYLOAD_SEED,
            key_digit_width: DEFAULT_DIGIT_WIDTH,
            db_path: default_db_path(),
            output: OutputFormat::Text,
        }
    }
}

impl BenchConfig {
    /// Create a new config builder
    pub fn builder() -> BenchConfigBuilder {
        BenchConfigBuilder::default()
    }

    /// Key length in bytes (1-byte prefix plus digits)
    pub fn key_len(&self) -> usize {
        1 + self.key_digit_width
    }

    /// Plan the level schedule for this run.
    ///
    /// With differentiated filters off, every level gets the budget.
    pub fn plan_schedule(&self) -> Result<LevelSchedule> {
        let params =
            CapacityParams::from_file_size(self.max_file_size, self.size_ratio, self.level_count);
        let filter = if !self.use_monkey {
            FilterPlan::derived(self.bits_per_key, UniformAllocator)
        } else {
            match self.filter_strategy {
                FilterStrategy::Monkey => FilterPlan::derived(self.bits_per_key, MonkeyAllocator),
                FilterStrategy::InverseCapacity => {
                    FilterPlan::derived(self.bits_per_key, InverseCapacityAllocator)
                }
                FilterStrategy::HandTuned => {
                    FilterPlan::derived(self.bits_per_key, HandTunedAllocator::default())
                }
                FilterStrategy::Table => FilterPlan::hand_tuned_table(self.level_count)?,
            }
        };
        Ok(LevelSchedule::plan(params, &filter)?)
    }

    /// Engine options for a planned schedule
    pub fn engine_options(&self, schedule: &LevelSchedule) -> EngineOptions {
        EngineOptions::builder()
            .schedule(schedule)
            .per_level_filters(self.use_monkey)
            .fallback_filter_bits(self.bits_per_key)
            .max_file_size(self.max_file_size)
            .write_buffer_size(self.write_buffer_size)
            .l0_compaction_trigger(self.l0_compaction_trigger)
            .build()
    }

    pub fn validate(&self) -> Result<()> {
        self.workload.validate()?;
        if self.workload.value_size >= self.payload_pool_size.max(DEFAULT_POOL_SIZE) {
            return Err(BenchError::Config(format!(
                "value size {} must be smaller than the payload pool",
                self.workload.value_size
            )));
        }
        if !self.bits_per_key.is_finite() || self.bits_per_key < 0.0 {
            return Err(BenchError::Config(format!(
                "bits per key must be >= 0, got {}",
                self.bits_per_key
            )));
        }
        if self.write_buffer_size == 0 || self.max_file_size == 0 {
            return Err(BenchError::Config(
                "write buffer and file sizes must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// `$TEST_TMPDIR` or the system temp dir, plus the fixed subdirectory.
pub fn default_db_path() -> PathBuf {
    let base = std::env::var_os("TEST_TMPDIR")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("monkeybench-test"));
    base.join(DB_SUBDIR)
}

/// Builder for BenchConfig
///
/// The workload is resolved in [`build`](BenchConfigBuilder::build) from the
/// scenario and argument, then the explicit overrides are applied on top.
#[derive(Default)]
pub struct BenchConfigBuilder {
    config: BenchConfig,
    value_size: Option<usize>,
    write_count: Option<u64>,
    lookup_count: Option<u64>,
    rounds: Option<usize>,
    write_distribution: Option<KeyDistribution>,
    lookup_distribution: Option<KeyDistribution>,
    lookup_placement: Option<LookupPlacement>,
    measure_mode: Option<MeasureMode>,
}

impl BenchConfigBuilder {
    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.config.scenario = scenario;
        self
    }

    pub fn scenario_arg(mut self, arg: i64) -> Self {
        self.config.scenario_arg = arg;
        self
    }

    pub fn use_monkey(mut self, enabled: bool) -> Self {
        self.config.use_monkey = enabled;
        self
    }

    pub fn filter_strategy(mut self, strategy: FilterStrategy) -> Self {
        self.config.filter_strategy = strategy;
        self
    }

    pub fn bits_per_key(mut self, bits: f64) -> Self {
        self.config.bits_per_key = bits;
        self
    }

    pub fn level_count(mut self, levels: usize) -> Self {
        self.config.level_count = levels;
        self
    }

    pub fn size_ratio(mut self, ratio: f64) -> Self {
        self.config.size_ratio = ratio;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.config.write_buffer_size = bytes;
        self
    }

    pub fn l0_compaction_trigger(mut self, files: usize) -> Self {
        self.config.l0_compaction_trigger = files;
        self
    }

    pub fn compression_ratio(mut self, ratio: f64) -> Self {
        self.config.compression_ratio = ratio;
        self
    }

    pub fn payload_pool_size(mut self, bytes: usize) -> Self {
        self.config.payload_pool_size = bytes;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn key_digit_width(mut self, digits: usize) -> Self {
        self.config.key_digit_width = digits;
        self
    }

    /// Set the database directory
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = path.into();
        self
    }

    pub fn output(mut self, format: OutputFormat) -> Self {
        self.config.output = format;
        self
    }

    /// Override the value size derived from the scenario
    pub fn value_size(mut self, bytes: usize) -> Self {
        self.value_size = Some(bytes);
        self
    }

    /// Replace the scenario's checkpoints with a single load
    pub fn write_count(mut self, count: u64) -> Self {
        self.write_count = Some(count);
        self
    }

    pub fn lookup_count(mut self, count: u64) -> Self {
        self.lookup_count = Some(count);
        self
    }

    pub fn rounds(mut self, rounds: usize) -> Self {
        self.rounds = Some(rounds);
        self
    }

    pub fn write_distribution(mut self, distribution: KeyDistribution) -> Self {
        self.write_distribution = Some(distribution);
        self
    }

    pub fn lookup_distribution(mut self, distribution: KeyDistribution) -> Self {
        self.lookup_distribution = Some(distribution);
        self
    }

    /// Disjoint lookups (default) or in-range zero-result lookups
    pub fn lookup_placement(mut self, placement: LookupPlacement) -> Self {
        self.lookup_placement = Some(placement);
        self
    }

    pub fn measure_mode(mut self, mode: MeasureMode) -> Self {
        self.measure_mode = Some(mode);
        self
    }

    /// Resolve the workload and validate the result
    pub fn build(self) -> Result<BenchConfig> {
        let mut config = self.config;

        let mut workload = match self.value_size {
            // An explicit value size makes the scenario argument irrelevant.
            Some(bytes) if config.scenario == Scenario::VaryEntrySize => {
                WorkloadSpec::vary_entry_size(bytes)
            }
            _ => WorkloadSpec::for_scenario(config.scenario, config.scenario_arg, config.key_len())?,
        };
        if let Some(bytes) = self.value_size {
            workload.value_size = bytes;
        }
        if let Some(count) = self.write_count {
            workload = workload.with_write_count(count);
        }
        if let Some(count) = self.lookup_count {
            workload.lookup_count = count;
        }
        if let Some(rounds) = self.rounds {
            workload.rounds = rounds;
        }
        if let Some(distribution) = self.write_distribution {
            workload.write_distribution = distribution;
        }
        if let Some(distribution) = self.lookup_distribution {
            workload.lookup_distribution = distribution;
        }
        if let Some(placement) = self.lookup_placement {
            workload.lookup_placement = placement;
        }
        if let Some(mode) = self.measure_mode {
            workload.measure_mode = mode;
        }

        config.workload = workload;
        config.validate()?;
        Ok(config)
    }
}
