//! monkey-bench Binary
//!
//! Runs one benchmark scenario against the reference engine and prints
//! the measurements to stdout. Logs go to stderr.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use monkeybench::config::{FilterStrategy, OutputFormat};
use monkeybench::workload::{KeyDistribution, LookupPlacement, MeasureMode, Scenario};
use monkeybench::{BenchConfig, Driver, Engine, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Leveled LSM lookup benchmark with per-level bloom filters
#[derive(Parser, Debug)]
#[command(name = "monkey-bench")]
#[command(about = "Measure zero-result lookup latency of a leveled LSM tree")]
#[command(version)]
struct Args {
    /// Scenario: 0 = vary entry count, 1-3 = vary entry size
    #[arg(short = 'g', long = "scenario", default_value_t = 1, allow_negative_numbers = true)]
    scenario: i64,

    /// Scenario argument (entry size in bytes for scenarios 1-3)
    #[arg(short = 'a', long = "arg", default_value_t = 1024, allow_negative_numbers = true)]
    arg: i64,

    /// Differentiated per-level bloom filters
    #[arg(short = 'm', long = "monkey")]
    monkey: bool,

    /// Allocation strategy used with --monkey
    #[arg(long, value_enum, default_value_t = StrategyArg::Monkey)]
    strategy: StrategyArg,

    /// Average filter bits per entry over the whole tree
    #[arg(long, default_value_t = 10.0)]
    bits_per_key: f64,

    /// Number of levels
    #[arg(long, default_value_t = 7)]
    levels: usize,

    /// Capacity growth factor between adjacent levels
    #[arg(long, default_value_t = 10.0)]
    size_ratio: f64,

    /// Target compressed/raw ratio of generated values
    #[arg(long, default_value_t = 0.5)]
    compression_ratio: f64,

    /// Seed for values and random key streams
    #[arg(long)]
    seed: Option<u64>,

    /// One sample per round (coarse) or per lookup (fine)
    #[arg(long, value_enum)]
    measure: Option<MeasureArg>,

    /// Override the number of entries written
    #[arg(long)]
    writes: Option<u64>,

    /// Override lookups per round
    #[arg(long)]
    lookups: Option<u64>,

    /// Override measurement rounds
    #[arg(long)]
    rounds: Option<usize>,

    /// Write uniform-random keys instead of sequential ones
    #[arg(long)]
    random_writes: bool,

    /// Look up absent keys inside the written key range so filters are probed
    #[arg(long)]
    in_range_lookups: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    format: FormatArg,

    /// Database directory (default: $TEST_TMPDIR/monkey)
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Monkey,
    InverseCapacity,
    HandTuned,
    Table,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MeasureArg {
    Coarse,
    Fine,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

fn build_config(args: &Args) -> Result<BenchConfig> {
    let mut builder = BenchConfig::builder()
        .scenario(Scenario::from_id(args.scenario)?)
        .scenario_arg(args.arg)
        .use_monkey(args.monkey)
        .filter_strategy(match args.strategy {
            StrategyArg::Monkey => FilterStrategy::Monkey,
            StrategyArg::InverseCapacity => FilterStrategy::InverseCapacity,
            StrategyArg::HandTuned => FilterStrategy::HandTuned,
            StrategyArg::Table => FilterStrategy::Table,
        })
        .bits_per_key(args.bits_per_key)
        .level_count(args.levels)
        .size_ratio(args.size_ratio)
        .compression_ratio(args.compression_ratio)
        .output(match args.format {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        });

    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    if let Some(mode) = args.measure {
        builder = builder.measure_mode(match mode {
            MeasureArg::Coarse => MeasureMode::Coarse,
            MeasureArg::Fine => MeasureMode::Fine,
        });
    }
    if let Some(writes) = args.writes {
        builder = builder.write_count(writes);
    }
    if let Some(lookups) = args.lookups {
        builder = builder.lookup_count(lookups);
    }
    if let Some(rounds) = args.rounds {
        builder = builder.rounds(rounds);
    }
    if args.random_writes {
        builder = builder.write_distribution(KeyDistribution::Uniform);
    }
    if args.in_range_lookups {
        builder = builder.lookup_placement(LookupPlacement::InRange);
    }
    if let Some(db) = &args.db {
        builder = builder.db_path(db);
    }

    builder.build()
}

fn run(args: &Args) -> Result<()> {
    let config = build_config(args)?;
    let mut driver: Driver<Engine> = Driver::new(config)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let report = driver.run(&mut out)?;

    tracing::info!(
        measurements = report.measurements.len(),
        strategy = report.schedule.strategy_name(),
        "Benchmark complete"
    );
    Ok(())
}

fn main() -> ExitCode {
    // Logs on stderr keep stdout for measurements
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,monkeybench=info,monkey_bench=info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();

    let args = Args::parse();

    tracing::info!("monkey-bench v{}", monkeybench::VERSION);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
