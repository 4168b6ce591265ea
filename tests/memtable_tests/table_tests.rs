//! Tests for the MemTable
//!
//! These tests verify:
//! - Point reads see the newest value or tombstone
//! - Size accounting drives the flush threshold
//! - Snapshots are sorted and independent of later writes
//! - Concurrent readers and writers

use std::sync::Arc;
use std::thread;

use monkeybench::memtable::{MemTable, MemTableEntry};

// =============================================================================
// Helper Functions
// =============================================================================

/// Benchmark-shaped key: prefix `a` plus 15 digits
fn key(i: u64) -> Vec<u8> {
    format!("a{:015}", i).into_bytes()
}

fn value(len: usize) -> Vec<u8> {
    vec![b'v'; len]
}

// =============================================================================
// Read / Write Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new();

    assert!(memtable.is_empty());
    assert_eq!(memtable.size(), 0);
    assert_eq!(memtable.entry_count(), 0);
    assert!(memtable.get(&key(0)).is_none());
}

#[test]
fn test_newest_value_wins() {
    let memtable = MemTable::new();

    memtable.put(key(1), b"first".to_vec());
    memtable.put(key(1), b"second".to_vec());

    assert_eq!(
        memtable.get(&key(1)),
        Some(MemTableEntry::Value(b"second".to_vec()))
    );
    assert_eq!(memtable.entry_count(), 1);
}

#[test]
fn test_tombstone_hides_value_until_rewritten() {
    let memtable = MemTable::new();

    memtable.put(key(7), b"v".to_vec());
    memtable.delete(key(7));
    assert_eq!(memtable.get(&key(7)), Some(MemTableEntry::Tombstone));

    // Deleting an absent key still records the tombstone
    memtable.delete(key(8));
    assert_eq!(memtable.get(&key(8)), Some(MemTableEntry::Tombstone));

    memtable.put(key(7), b"back".to_vec());
    assert_eq!(
        memtable.get(&key(7)),
        Some(MemTableEntry::Value(b"back".to_vec()))
    );
}

#[test]
fn test_empty_value_is_not_a_tombstone() {
    let memtable = MemTable::new();

    memtable.put(key(3), Vec::new());
    assert_eq!(memtable.get(&key(3)), Some(MemTableEntry::Value(Vec::new())));
}

// =============================================================================
// Size Accounting Tests
// =============================================================================

#[test]
fn test_put_returns_new_size() {
    let memtable = MemTable::new();

    assert_eq!(memtable.put(b"ab".to_vec(), b"123".to_vec()), 5);
    assert_eq!(memtable.delete(b"ab".to_vec()), 2);
}

#[test]
fn test_size_follows_overwrites_and_deletes() {
    let memtable = MemTable::new();

    memtable.put(key(1), value(100));
    memtable.put(key(2), value(100));
    assert_eq!(memtable.size(), 2 * (16 + 100));

    // Shrinking overwrite
    memtable.put(key(1), value(10));
    assert_eq!(memtable.size(), (16 + 10) + (16 + 100));

    // Tombstone counts the key only
    memtable.delete(key(2));
    assert_eq!(memtable.size(), (16 + 10) + 16);
}

#[test]
fn test_flush_threshold() {
    let memtable = MemTable::new();
    let limit = 10 * (16 + 1008);

    for i in 0..9 {
        memtable.put(key(i), value(1008));
        assert!(!memtable.should_flush(limit));
    }
    memtable.put(key(9), value(1008));
    assert!(memtable.should_flush(limit));
    assert!(memtable.should_flush(memtable.size()));
}

// =============================================================================
// Snapshot Tests
// =============================================================================

#[test]
fn test_snapshot_sorted_then_clear() {
    let memtable = MemTable::new();

    memtable.put(b"b".to_vec(), b"2".to_vec());
    memtable.delete(b"c".to_vec());
    memtable.put(b"a".to_vec(), b"1".to_vec());

    let entries = memtable.iter();

    assert_eq!(
        entries,
        vec![
            (b"a".to_vec(), MemTableEntry::Value(b"1".to_vec())),
            (b"b".to_vec(), MemTableEntry::Value(b"2".to_vec())),
            (b"c".to_vec(), MemTableEntry::Tombstone),
        ]
    );
    // Snapshot leaves the table untouched
    assert_eq!(memtable.entry_count(), 3);

    memtable.clear();
    assert!(memtable.is_empty());
    assert_eq!(memtable.size(), 0);
}

#[test]
fn test_snapshot_is_independent_of_later_writes() {
    let memtable = MemTable::new();
    memtable.put(key(1), b"old".to_vec());

    let snapshot = memtable.iter();
    memtable.put(key(1), b"new".to_vec());
    memtable.put(key(2), b"extra".to_vec());

    assert_eq!(snapshot, vec![(key(1), MemTableEntry::Value(b"old".to_vec()))]);
}

#[test]
fn test_numeric_order_survives_in_snapshot() {
    let memtable = MemTable::new();
    for i in [1000u64, 9, 99, 10, 0] {
        memtable.put(key(i), value(1));
    }

    let keys: Vec<Vec<u8>> = memtable.iter().into_iter().map(|(k, _)| k).collect();
    let expected: Vec<Vec<u8>> = [0u64, 9, 10, 99, 1000].iter().map(|&i| key(i)).collect();
    assert_eq!(keys, expected);
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_concurrent_readers_and_writer() {
    let memtable = Arc::new(MemTable::new());
    for i in 0..1000 {
        memtable.put(key(i), value(8));
    }

    let writer = {
        let memtable = Arc::clone(&memtable);
        thread::spawn(move || {
            for i in 1000..2000 {
                memtable.put(key(i), value(8));
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let memtable = Arc::clone(&memtable);
            thread::spawn(move || {
                for i in 0..1000 {
                    assert_eq!(memtable.get(&key(i)), Some(MemTableEntry::Value(value(8))));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(memtable.entry_count(), 2000);
    assert_eq!(memtable.size(), 2000 * (16 + 8));
}

#[test]
fn test_concurrent_writers_disjoint_keys() {
    let memtable = Arc::new(MemTable::new());

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let memtable = Arc::clone(&memtable);
            thread::spawn(move || {
                for i in 0..250 {
                    memtable.put(key(t * 1000 + i), value(4));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(memtable.entry_count(), 1000);
    let snapshot = memtable.iter();
    assert!(snapshot.windows(2).all(|w| w[0].0 < w[1].0));
}
