//! Tests for the benchmark driver
//!
//! These tests verify:
//! - The full open / load / measure / report / close cycle
//! - Deterministic timing with a stepping clock
//! - Phase order enforcement
//! - Text and JSON output
//! - Engine failures are reported with the failing call

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use monkeybench::clock::SteppingClock;
use monkeybench::config::{BenchConfig, EngineOptions, OutputFormat};
use monkeybench::driver::Phase;
use monkeybench::workload::{
    KeyDistribution, LookupPlacement, MeasureMode, Scenario, WorkloadSpec,
};
use monkeybench::{BenchError, Driver, Engine, Result, StorageEngine};
use parking_lot::Mutex;
use tempfile::TempDir;

// =============================================================================
// Test Engines
// =============================================================================

/// In-memory engine that remembers every lookup
#[derive(Default)]
struct MapEngine {
    data: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
    lookups: Mutex<Vec<Vec<u8>>>,
}

impl MapEngine {
    fn lookups(&self) -> Vec<Vec<u8>> {
        self.lookups.lock().clone()
    }

    fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl StorageEngine for MapEngine {
    const STATS_PROPERTY: &'static str = "map.stats";

    fn open(_options: EngineOptions, _path: &Path) -> Result<Self> {
        Ok(Self::default())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.lock().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.lookups.lock().push(key.to_vec());
        Ok(self.data.lock().get(key).cloned())
    }

    fn property(&self, name: &str) -> Option<String> {
        (name == Self::STATS_PROPERTY).then(|| format!("map: {} entries", self.data.lock().len()))
    }

    fn close(self) -> Result<()> {
        Ok(())
    }

    fn destroy(_path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Engine whose every lookup finds something
struct HitEngine;

impl StorageEngine for HitEngine {
    const STATS_PROPERTY: &'static str = "hit.stats";

    fn open(_options: EngineOptions, _path: &Path) -> Result<Self> {
        Ok(HitEngine)
    }

    fn put(&self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(Some(b"x".to_vec()))
    }

    fn property(&self, _name: &str) -> Option<String> {
        None
    }

    fn close(self) -> Result<()> {
        Ok(())
    }

    fn destroy(_path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Engine that cannot be opened
struct BrokenEngine;

impl StorageEngine for BrokenEngine {
    const STATS_PROPERTY: &'static str = "broken.stats";

    fn open(_options: EngineOptions, _path: &Path) -> Result<Self> {
        Err(BenchError::Storage("no space left on device".into()))
    }

    fn put(&self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn property(&self, _name: &str) -> Option<String> {
        None
    }

    fn close(self) -> Result<()> {
        Ok(())
    }

    fn destroy(_path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Engine whose writes start failing at a given put
struct FailingPutEngine {
    puts: AtomicU64,
    fail_at: u64,
}

impl StorageEngine for FailingPutEngine {
    const STATS_PROPERTY: &'static str = "failing.stats";

    fn open(_options: EngineOptions, _path: &Path) -> Result<Self> {
        Ok(Self {
            puts: AtomicU64::new(0),
            fail_at: 10,
        })
    }

    fn put(&self, _key: &[u8], _value: &[u8]) -> Result<()> {
        let n = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= self.fail_at {
            return Err(BenchError::Storage("disk full".into()));
        }
        Ok(())
    }

    fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn property(&self, _name: &str) -> Option<String> {
        Some("failing: stats".into())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }

    fn destroy(_path: &Path) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn small_config(dir: &TempDir) -> BenchConfig {
    BenchConfig::builder()
        .value_size(100)
        .write_count(500)
        .lookup_count(50)
        .rounds(4)
        .db_path(dir.path().join("monkey"))
        .build()
        .unwrap()
}

fn stepping_driver<E: StorageEngine>(config: BenchConfig) -> Driver<E, SteppingClock> {
    Driver::with_clock(config, SteppingClock::new(2.0)).unwrap()
}

fn output_text(out: Vec<u8>) -> String {
    String::from_utf8(out).unwrap()
}

// =============================================================================
// Coarse Mode Tests
// =============================================================================

#[test]
fn test_coarse_run_with_stepping_clock() {
    let dir = TempDir::new().unwrap();
    let mut driver = stepping_driver::<MapEngine>(small_config(&dir));

    let mut out = Vec::new();
    let report = driver.run(&mut out).unwrap();

    assert_eq!(
        output_text(out),
        "map: 500 entries\n500 2.0000 0.0000\n"
    );
    assert_eq!(report.measurements.len(), 1);
    let m = report.last().unwrap();
    assert_eq!(m.entries, 500);
    assert_eq!(m.latency.count, 4);
    assert_eq!(m.mean_micros, 2.0);
    assert_eq!(m.std_dev_micros, 0.0);
    assert_eq!(m.load_micros, 2.0);
    assert_eq!(m.lookups_per_round, 50);
    assert_eq!(m.lookup_hits, 0);
    assert!(m.histogram_table.is_none());
    assert_eq!(driver.phase(), Phase::Closed);
}

#[test]
fn test_lookup_hits_are_counted() {
    let dir = TempDir::new().unwrap();
    let mut driver = stepping_driver::<HitEngine>(small_config(&dir));

    let report = driver.run(&mut Vec::new()).unwrap();
    assert_eq!(report.last().unwrap().lookup_hits, 4 * 50);
    // No stats property: only the summary line is printed
    assert!(report.last().unwrap().engine_stats.is_none());
}

#[test]
fn test_loaded_entries_shape() {
    let dir = TempDir::new().unwrap();
    let mut driver = stepping_driver::<MapEngine>(small_config(&dir));
    driver.open().unwrap();
    assert_eq!(driver.load().unwrap(), 500);

    let entries = driver.engine().unwrap().entries();
    assert_eq!(entries.len(), 500);
    assert_eq!(entries[0].0, b"a000000000000000".to_vec());
    assert_eq!(entries[499].0, b"a000000000000499".to_vec());
    assert!(entries.iter().all(|(_, v)| v.len() == 100));
}

#[test]
fn test_lookups_never_touch_written_keys() {
    let dir = TempDir::new().unwrap();
    let mut driver = stepping_driver::<MapEngine>(small_config(&dir));
    driver.open().unwrap();
    driver.load().unwrap();
    driver.measure().unwrap();

    let lookups = driver.engine().unwrap().lookups();
    assert_eq!(lookups.len(), 4 * 50);
    assert!(lookups.iter().all(|k| k[0] == b'b' && k.len() == 16));
}

// =============================================================================
// Fine Mode Tests
// =============================================================================

#[test]
fn test_fine_mode_samples_every_lookup() {
    let dir = TempDir::new().unwrap();
    let config = BenchConfig::builder()
        .value_size(100)
        .write_count(100)
        .lookup_count(10)
        .rounds(2)
        .measure_mode(MeasureMode::Fine)
        .db_path(dir.path().join("monkey"))
        .build()
        .unwrap();
    let mut driver = stepping_driver::<MapEngine>(config);

    let mut out = Vec::new();
    let report = driver.run(&mut out).unwrap();
    let m = report.last().unwrap();
    assert_eq!(m.latency.count, 20);
    assert_eq!(m.mean_micros, 2.0);

    let text = output_text(out);
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("map: 100 entries"));
    assert_eq!(lines.next(), Some("100 2.0000 0.0000"));
    assert!(lines.next().unwrap().starts_with("Count: 20"));
    assert!(text.contains('#'));
    assert!(m.histogram_table.is_some());
}

#[test]
fn test_fine_mode_percentiles_match_step() {
    let dir = TempDir::new().unwrap();
    let config = BenchConfig::builder()
        .value_size(100)
        .write_count(100)
        .lookup_count(50)
        .rounds(2)
        .measure_mode(MeasureMode::Fine)
        .output(OutputFormat::Json)
        .db_path(dir.path().join("monkey"))
        .build()
        .unwrap();
    let mut driver: Driver<MapEngine, SteppingClock> =
        Driver::with_clock(config, SteppingClock::new(250.0)).unwrap();

    let mut out = Vec::new();
    let report = driver.run(&mut out).unwrap();
    let latency = &report.last().unwrap().latency;

    assert_eq!(latency.count, 100);
    assert_eq!(latency.min, 250.0);
    assert_eq!(latency.max, 250.0);
    for (name, p) in [
        ("p50", latency.p50),
        ("p75", latency.p75),
        ("p90", latency.p90),
        ("p99", latency.p99),
        ("p999", latency.p999),
    ] {
        assert!((p - 250.0).abs() / 250.0 < 0.01, "{} = {}", name, p);
    }

    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let p99 = value["latency"]["p99"].as_f64().unwrap();
    assert!((p99 - 250.0).abs() / 250.0 < 0.01, "json p99 = {}", p99);
}

// =============================================================================
// Multi-Checkpoint Tests
// =============================================================================

#[test]
fn test_vary_entry_count_reports_every_checkpoint() {
    let dir = TempDir::new().unwrap();
    let config = BenchConfig::builder()
        .scenario(Scenario::VaryEntryCount)
        .value_size(8)
        .lookup_count(10)
        .rounds(1)
        .db_path(dir.path().join("monkey"))
        .build()
        .unwrap();
    let mut driver = stepping_driver::<MapEngine>(config);

    let mut out = Vec::new();
    let report = driver.run(&mut out).unwrap();

    let entries: Vec<u64> = report.measurements.iter().map(|m| m.entries).collect();
    assert_eq!(entries, vec![1 << 15, 1 << 16, 1 << 17, 1 << 18]);
    let checkpoints: Vec<usize> = report.measurements.iter().map(|m| m.checkpoint).collect();
    assert_eq!(checkpoints, vec![0, 1, 2, 3]);
    assert_eq!(report.scenario, Scenario::VaryEntryCount);

    let summaries: Vec<String> = output_text(out)
        .lines()
        .filter(|l| !l.starts_with("map:"))
        .filter_map(|l| l.split(' ').next().map(str::to_string))
        .collect();
    assert_eq!(summaries, vec!["32768", "65536", "131072", "262144"]);
}

#[test]
fn test_vary_entry_size_single_checkpoint() {
    let config = BenchConfig::builder().scenario_arg(64).build().unwrap();
    assert_eq!(config.workload.value_size, 48);
    assert_eq!(config.workload.checkpoints, vec![WorkloadSpec::SIZE_SCENARIO_WRITES]);
}

// =============================================================================
// Determinism Tests
// =============================================================================

fn lookups_for_seed(seed: u64) -> Vec<Vec<u8>> {
    let dir = TempDir::new().unwrap();
    let config = BenchConfig::builder()
        .value_size(10)
        .write_count(10)
        .lookup_count(100)
        .rounds(1)
        .seed(seed)
        .db_path(dir.path().join("monkey"))
        .build()
        .unwrap();
    let mut driver = stepping_driver::<MapEngine>(config);
    driver.open().unwrap();
    driver.load().unwrap();
    driver.measure().unwrap();
    driver.engine().unwrap().lookups()
}

#[test]
fn test_same_seed_same_lookups() {
    assert_eq!(lookups_for_seed(301), lookups_for_seed(301));
    assert_ne!(lookups_for_seed(301), lookups_for_seed(302));
}

#[test]
fn test_uniform_writes() {
    let dir = TempDir::new().unwrap();
    let config = BenchConfig::builder()
        .value_size(10)
        .write_count(200)
        .write_distribution(KeyDistribution::Uniform)
        .db_path(dir.path().join("monkey"))
        .build()
        .unwrap();
    let mut driver = stepping_driver::<MapEngine>(config);
    driver.open().unwrap();
    assert_eq!(driver.load().unwrap(), 200);

    let entries = driver.engine().unwrap().entries();
    // Duplicates overwrite, so at most 200 distinct keys
    assert!(entries.len() <= 200 && entries.len() > 150);
    assert!(entries.iter().any(|(k, _)| k.as_slice() > b"a000000000001000".as_slice()));
}

// =============================================================================
// Phase Order Tests
// =============================================================================

#[test]
fn test_measure_before_load_rejected() {
    let dir = TempDir::new().unwrap();
    let mut driver = stepping_driver::<MapEngine>(small_config(&dir));

    let err = driver.measure().unwrap_err();
    assert!(matches!(
        err,
        BenchError::Phase {
            from: "idle",
            to: "measuring"
        }
    ));

    driver.open().unwrap();
    assert!(matches!(driver.measure(), Err(BenchError::Phase { .. })));
    assert!(matches!(driver.report(&mut Vec::new()), Err(BenchError::Phase { .. })));
    assert_eq!(driver.phase(), Phase::Opened);
}

#[test]
fn test_manual_cycle_and_exhausted_checkpoints() {
    let dir = TempDir::new().unwrap();
    let mut driver = stepping_driver::<MapEngine>(small_config(&dir));

    driver.open().unwrap();
    driver.load().unwrap();
    driver.measure().unwrap();
    let report = driver.report(&mut Vec::new()).unwrap();
    assert_eq!(report.entries, 500);
    assert_eq!(driver.phase(), Phase::Reported);

    // Only one checkpoint in this workload
    assert!(matches!(driver.load(), Err(BenchError::Config(_))));
    assert_eq!(driver.phase(), Phase::Reported);

    driver.close().unwrap();
    assert!(driver.engine().is_none());
    assert!(matches!(driver.open(), Err(BenchError::Phase { .. })));
}

#[test]
fn test_open_failure_names_the_call() {
    let dir = TempDir::new().unwrap();
    let mut driver = stepping_driver::<BrokenEngine>(small_config(&dir));

    let err = driver.run(&mut Vec::new()).unwrap_err();
    match err {
        BenchError::Engine { op, message } => {
            assert_eq!(op, "open");
            assert!(message.contains("no space left"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(driver.phase(), Phase::Idle);
}

#[test]
fn test_put_failure_aborts_run() {
    let dir = TempDir::new().unwrap();
    let mut driver = stepping_driver::<FailingPutEngine>(small_config(&dir));

    let mut out = Vec::new();
    let err = driver.run(&mut out).unwrap_err();
    match err {
        BenchError::Engine { op, message } => {
            assert_eq!(op, "put");
            assert!(message.contains("disk full"), "message = {}", message);
        }
        other => panic!("unexpected error: {}", other),
    }

    assert_eq!(driver.phase(), Phase::Opened);
    assert_eq!(driver.entries_loaded(), 9);
    assert!(out.is_empty());
    assert!(matches!(driver.measure(), Err(BenchError::Phase { .. })));
}

// =============================================================================
// Output Format Tests
// =============================================================================

#[test]
fn test_json_output_one_object_per_measurement() {
    let dir = TempDir::new().unwrap();
    let config = BenchConfig::builder()
        .value_size(100)
        .write_count(300)
        .lookup_count(20)
        .rounds(2)
        .output(OutputFormat::Json)
        .db_path(dir.path().join("monkey"))
        .build()
        .unwrap();
    let mut driver = stepping_driver::<MapEngine>(config);

    let mut out = Vec::new();
    driver.run(&mut out).unwrap();
    let text = output_text(out);
    assert_eq!(text.lines().count(), 1);

    let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
    assert_eq!(value["entries"], 300);
    assert_eq!(value["mean_micros"], 2.0);
    assert_eq!(value["measure_mode"], "coarse");
    assert_eq!(value["engine_stats"], "map: 300 entries");
    assert_eq!(value["latency"]["count"], 2);
    assert!(value.get("histogram_table").is_none());
}

// =============================================================================
// End-to-End Tests
// =============================================================================

fn engine_config(dir: &TempDir, use_monkey: bool) -> BenchConfig {
    BenchConfig::builder()
        .use_monkey(use_monkey)
        .key_digit_width(16)
        .value_size(1000)
        .write_count(1000)
        .lookup_count(100)
        .rounds(3)
        .level_count(4)
        .write_buffer_size(64 * 1024)
        .max_file_size(64 * 1024)
        .db_path(dir.path().join("monkey"))
        .build()
        .unwrap()
}

#[test]
fn test_end_to_end_with_engine() {
    let dir = TempDir::new().unwrap();
    let config = engine_config(&dir, true);
    let mut driver: Driver<Engine> = Driver::new(config).unwrap();

    let mut out = Vec::new();
    let report = driver.run(&mut out).unwrap();

    let m = report.last().unwrap();
    assert_eq!(m.entries, 1000);
    assert!(m.mean_micros > 0.0);
    assert_eq!(m.latency.count, 3);
    assert_eq!(m.lookup_hits, 0);
    let stats = m.engine_stats.as_deref().unwrap();
    assert!(stats.contains("Per-Level Stats"));
    assert_eq!(stats.lines().count(), 3 + 4);

    let text = output_text(out);
    assert!(text.lines().any(|l| l.starts_with("1000 ")));
    assert_eq!(report.schedule.strategy_name(), "monkey");
}

#[test]
fn test_end_to_end_data_survives_close() {
    let dir = TempDir::new().unwrap();
    let config = engine_config(&dir, false);
    let mut driver: Driver<Engine> = Driver::new(config.clone()).unwrap();
    driver.run(&mut Vec::new()).unwrap();

    let options = config.engine_options(driver.schedule());
    let engine = Engine::open(options, &config.db_path).unwrap();
    let first = engine.get(b"a0000000000000000").unwrap().unwrap();
    assert_eq!(first.len(), 1000);
    assert!(engine.get(b"a0000000000000999").unwrap().is_some());
    assert!(engine.get(b"a0000000000001000").unwrap().is_none());
    assert!(engine.sstable_count() > 0);
}

#[test]
fn test_open_wipes_previous_database() {
    let dir = TempDir::new().unwrap();
    let config = engine_config(&dir, false);
    std::fs::create_dir_all(&config.db_path).unwrap();
    let stale = config.db_path.join("stale.log");
    std::fs::write(&stale, b"left over").unwrap();

    let mut driver: Driver<Engine> = Driver::new(config).unwrap();
    driver.open().unwrap();
    assert!(!stale.exists());
    assert_eq!(driver.engine().unwrap().sstable_count(), 0);
}

fn filter_probes(engine: &Engine, levels: usize) -> u64 {
    (0..levels)
        .filter_map(|level| engine.level_stats(level))
        .map(|stats| stats.probes)
        .sum()
}

#[test]
fn test_disjoint_lookups_skip_filters() {
    let dir = TempDir::new().unwrap();
    let mut driver: Driver<Engine> = Driver::new(engine_config(&dir, true)).unwrap();

    driver.open().unwrap();
    driver.load().unwrap();
    driver.measure().unwrap();

    let engine = driver.engine().unwrap();
    assert!(engine.sstable_count() > 0);
    assert_eq!(filter_probes(engine, 4), 0);
}

#[test]
fn test_in_range_lookups_probe_filters() {
    let dir = TempDir::new().unwrap();
    let mut config = engine_config(&dir, true);
    config.workload.lookup_placement = LookupPlacement::InRange;
    let mut driver: Driver<Engine> = Driver::new(config).unwrap();

    driver.open().unwrap();
    driver.load().unwrap();
    driver.measure().unwrap();

    let engine = driver.engine().unwrap();
    assert!(filter_probes(engine, 4) > 0);
    let negatives: u64 = (0..4)
        .filter_map(|level| engine.level_stats(level))
        .map(|stats| stats.filter_negatives)
        .sum();
    assert!(negatives > 0);

    let report = driver.report(&mut Vec::new()).unwrap();
    assert_eq!(report.lookup_hits, 0);
}
