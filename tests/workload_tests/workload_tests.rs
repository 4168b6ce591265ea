//! Tests for workload generation
//!
//! These tests verify:
//! - Key encoding keeps byte order equal to numeric order
//! - Write and lookup key spaces never overlap
//! - Payload slices are deterministic and sized exactly
//! - Scenario resolution through BenchConfig

use monkeybench::config::{BenchConfig, FilterStrategy};
use monkeybench::workload::{
    KeyDistribution, KeyEncoder, KeySampler, MeasureMode, PayloadGenerator, Scenario,
    WorkloadSpec, DEFAULT_POOL_SIZE, LOOKUP_PREFIX, UNIFORM_KEY_SPACE, WRITE_PREFIX,
};
use monkeybench::BenchError;
use proptest::prelude::*;

// =============================================================================
// Key Encoding Tests
// =============================================================================

#[test]
fn test_write_and_lookup_keys_are_disjoint() {
    let mut write = KeyEncoder::new(WRITE_PREFIX);
    let mut lookup = KeyEncoder::new(LOOKUP_PREFIX);

    for ordinal in [0, 1, 42, 999_999] {
        write.set(ordinal).unwrap();
        lookup.set(ordinal).unwrap();
        assert_ne!(write.slice(), lookup.slice());
        assert_eq!(write.slice().len(), lookup.slice().len());
    }

    // Every write key sorts before every lookup key
    write.set(write.ordinal_limit() - 1).unwrap();
    lookup.set(0).unwrap();
    assert!(write.slice() < lookup.slice());
}

#[test]
fn test_multi_byte_prefix() {
    let mut key = KeyEncoder::with_width(b"user", 4).unwrap();
    key.set(12).unwrap();
    assert_eq!(key.slice(), b"user0012");
    assert_eq!(key.prefix(), b"user");
    assert_eq!(key.key_len(), 8);
}

proptest! {
    #[test]
    fn prop_key_order_matches_ordinal_order(
        a in 0u64..1_000_000_000_000_000,
        b in 0u64..1_000_000_000_000_000,
    ) {
        let mut ka = KeyEncoder::new(WRITE_PREFIX);
        let mut kb = KeyEncoder::new(WRITE_PREFIX);
        ka.set(a).unwrap();
        kb.set(b).unwrap();
        prop_assert_eq!(ka.slice().cmp(kb.slice()), a.cmp(&b));
    }

    #[test]
    fn prop_key_digits_parse_back(ordinal in 0u64..10_000_000_000_000, width in 16usize..=19) {
        let mut key = KeyEncoder::with_width(b"a", width).unwrap();
        key.set(ordinal).unwrap();
        let digits = std::str::from_utf8(&key.slice()[1..]).unwrap();
        prop_assert_eq!(digits.len(), width);
        prop_assert_eq!(digits.parse::<u64>().unwrap(), ordinal);
    }
}

// =============================================================================
// Payload Tests
// =============================================================================

#[test]
fn test_payload_sequence_is_reproducible() {
    let mut a = PayloadGenerator::with_pool_size(0.5, DEFAULT_POOL_SIZE, 301).unwrap();
    let mut b = PayloadGenerator::with_pool_size(0.5, DEFAULT_POOL_SIZE, 301).unwrap();
    for len in [1, 100, 1008, 4096, 65536] {
        assert_eq!(a.generate(len).unwrap(), b.generate(len).unwrap());
    }
}

#[test]
fn test_payload_differs_by_seed() {
    let mut a = PayloadGenerator::with_pool_size(0.5, DEFAULT_POOL_SIZE, 1).unwrap();
    let mut b = PayloadGenerator::with_pool_size(0.5, DEFAULT_POOL_SIZE, 2).unwrap();
    assert_ne!(a.generate(1000).unwrap(), b.generate(1000).unwrap());
}

#[test]
fn test_payload_bytes_are_printable() {
    let mut gen = PayloadGenerator::new(0.3).unwrap();
    let value = gen.generate(10_000).unwrap();
    assert!(value.iter().all(|b| (b' '..=b'~').contains(b)));
}

proptest! {
    #[test]
    fn prop_payload_length_is_exact(lens in proptest::collection::vec(1usize..200_000, 1..50)) {
        let mut gen = PayloadGenerator::new(0.5).unwrap();
        for len in lens {
            prop_assert_eq!(gen.generate(len).unwrap().len(), len);
            prop_assert!(gen.cursor() <= gen.pool_len());
        }
    }
}

// =============================================================================
// Sampler Tests
// =============================================================================

#[test]
fn test_sequential_sampler_continues() {
    let mut sampler = KeySampler::new(KeyDistribution::Sequential, 10, 0);
    for expected in 0..25 {
        // Sequential streams are not wrapped at the bound
        assert_eq!(sampler.next_ordinal(), expected);
    }
}

#[test]
fn test_uniform_sampler_capped_at_31_bits() {
    let mut sampler = KeySampler::new(KeyDistribution::Uniform, u64::MAX, 3);
    for _ in 0..10_000 {
        assert!(sampler.next_ordinal() < UNIFORM_KEY_SPACE);
    }
}

#[test]
fn test_uniform_sampler_seed_changes_stream() {
    let mut a = KeySampler::new(KeyDistribution::Uniform, 1 << 20, 1);
    let mut b = KeySampler::new(KeyDistribution::Uniform, 1 << 20, 2);
    let xs: Vec<u64> = (0..16).map(|_| a.next_ordinal()).collect();
    let ys: Vec<u64> = (0..16).map(|_| b.next_ordinal()).collect();
    assert_ne!(xs, ys);
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_scenario_zero_checkpoints_double() {
    let spec = WorkloadSpec::for_scenario(Scenario::VaryEntryCount, 0, 16).unwrap();
    assert_eq!(spec.checkpoints.first(), Some(&WorkloadSpec::COUNT_START));
    assert!(spec.checkpoints.windows(2).all(|w| w[1] == 2 * w[0]));
    assert!(*spec.checkpoints.last().unwrap() < WorkloadSpec::COUNT_END);
    assert_eq!(spec.measure_mode, MeasureMode::Coarse);
    assert_eq!(spec.write_distribution, KeyDistribution::Sequential);
    assert_eq!(spec.lookup_distribution, KeyDistribution::Uniform);
}

#[test]
fn test_config_resolves_entry_size_against_key_width() {
    let config = BenchConfig::builder()
        .scenario_arg(128)
        .key_digit_width(19)
        .build()
        .unwrap();
    assert_eq!(config.key_len(), 20);
    assert_eq!(config.workload.value_size, 108);
}

#[test]
fn test_config_rejects_entry_size_not_above_key() {
    let err = BenchConfig::builder().scenario_arg(16).build().unwrap_err();
    assert!(matches!(err, BenchError::Config(_)));
    assert!(err.is_config());
}

#[test]
fn test_config_rejects_oversized_values() {
    let err = BenchConfig::builder()
        .value_size(DEFAULT_POOL_SIZE * 2)
        .build()
        .unwrap_err();
    assert!(matches!(err, BenchError::Config(_)));
}

#[test]
fn test_config_rejects_zero_rounds_and_lookups() {
    assert!(BenchConfig::builder().rounds(0).build().is_err());
    assert!(BenchConfig::builder().lookup_count(0).build().is_err());
}

#[test]
fn test_config_schedule_follows_monkey_flag() {
    let uniform = BenchConfig::builder().bits_per_key(8.0).build().unwrap();
    let schedule = uniform.plan_schedule().unwrap();
    assert_eq!(schedule.strategy_name(), "uniform");
    assert!(schedule.filter_bits().iter().all(|b| *b == 8.0));
    assert!(!uniform.engine_options(&schedule).per_level_filters);

    let monkey = BenchConfig::builder()
        .use_monkey(true)
        .bits_per_key(8.0)
        .build()
        .unwrap();
    let schedule = monkey.plan_schedule().unwrap();
    assert_eq!(schedule.strategy_name(), "monkey");
    let bits = schedule.filter_bits();
    assert!(bits[0] > bits[bits.len() - 1]);
    let options = monkey.engine_options(&schedule);
    assert!(options.per_level_filters);
    assert_eq!(options.level_filter_bits, bits);
    assert_eq!(options.level_count(), 7);
}

#[test]
fn test_config_table_strategy() {
    let config = BenchConfig::builder()
        .use_monkey(true)
        .filter_strategy(FilterStrategy::Table)
        .level_count(4)
        .build()
        .unwrap();
    let schedule = config.plan_schedule().unwrap();
    assert_eq!(schedule.strategy_name(), "override");
    assert_eq!(schedule.filter_bits(), vec![40.0, 35.0, 30.0, 25.0]);
}
