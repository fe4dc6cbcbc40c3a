//! Benchmark for serde serialization/deserialization of persistent data structures.
//!
//! Compares the performance of imshare's persistent collections against
//! standard library collections for serde operations.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use imshare::persistent::{PersistentHashMap, PersistentHashSet, PersistentVector};
use std::collections::{HashMap, HashSet};
use std::hint::black_box;

// =============================================================================
// PersistentVector vs Vec
// =============================================================================

fn benchmark_vector_serialize(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("serde_serialize_vector");

    for size in [100, 1000, 10000] {
        let persistent_vector: PersistentVector<i32> = (0..size).collect();
        let standard_vector: Vec<i32> = (0..size).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &size,
            |bencher, _| {
                bencher.iter(|| black_box(serde_json::to_string(&persistent_vector).unwrap()));
            },
        );

        group.bench_with_input(BenchmarkId::new("Vec", size), &size, |bencher, _| {
            bencher.iter(|| black_box(serde_json::to_string(&standard_vector).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_vector_deserialize(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("serde_deserialize_vector");

    for size in [100, 1000, 10000] {
        let json = serde_json::to_string(&(0..size).collect::<Vec<i32>>()).unwrap();

        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &json,
            |bencher, json| {
                bencher.iter(|| {
                    let vector: PersistentVector<i32> = serde_json::from_str(json).unwrap();
                    black_box(vector)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("Vec", size), &json, |bencher, json| {
            bencher.iter(|| {
                let vector: Vec<i32> = serde_json::from_str(json).unwrap();
                black_box(vector)
            });
        });
    }

    group.finish();
}

// =============================================================================
// PersistentHashSet vs HashSet
// =============================================================================

fn benchmark_hashset_deserialize(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("serde_deserialize_hashset");

    for size in [100, 1000, 10000] {
        let json = serde_json::to_string(&(0..size).collect::<Vec<i32>>()).unwrap();

        group.bench_with_input(
            BenchmarkId::new("PersistentHashSet", size),
            &json,
            |bencher, json| {
                bencher.iter(|| {
                    let set: PersistentHashSet<i32> = serde_json::from_str(json).unwrap();
                    black_box(set)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("HashSet", size), &json, |bencher, json| {
            bencher.iter(|| {
                let set: HashSet<i32> = serde_json::from_str(json).unwrap();
                black_box(set)
            });
        });
    }

    group.finish();
}

// =============================================================================
// PersistentHashMap vs HashMap
// =============================================================================

fn benchmark_hashmap_serialize(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("serde_serialize_hashmap");

    for size in [100, 1000, 10000] {
        let persistent_map: PersistentHashMap<String, i32> =
            (0..size).map(|index| (format!("key{index}"), index)).collect();
        let standard_map: HashMap<String, i32> =
            (0..size).map(|index| (format!("key{index}"), index)).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &size,
            |bencher, _| {
                bencher.iter(|| black_box(serde_json::to_string(&persistent_map).unwrap()));
            },
        );

        group.bench_with_input(BenchmarkId::new("HashMap", size), &size, |bencher, _| {
            bencher.iter(|| black_box(serde_json::to_string(&standard_map).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_hashmap_deserialize(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("serde_deserialize_hashmap");

    for size in [100, 1000, 10000] {
        let source: HashMap<String, i32> =
            (0..size).map(|index| (format!("key{index}"), index)).collect();
        let json = serde_json::to_string(&source).unwrap();

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &json,
            |bencher, json| {
                bencher.iter(|| {
                    let map: PersistentHashMap<String, i32> = serde_json::from_str(json).unwrap();
                    black_box(map)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("HashMap", size), &json, |bencher, json| {
            bencher.iter(|| {
                let map: HashMap<String, i32> = serde_json::from_str(json).unwrap();
                black_box(map)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_vector_serialize,
    benchmark_vector_deserialize,
    benchmark_hashset_deserialize,
    benchmark_hashmap_serialize,
    benchmark_hashmap_deserialize,
);

criterion_main!(benches);
