//! Benchmark for PersistentHashMap vs standard HashMap.
//!
//! Compares the performance of imshare's PersistentHashMap against Rust's standard HashMap
//! for common operations.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use imshare::persistent::{PersistentHashMap, PersistentHashSet};
use std::collections::HashMap;
use std::hint::black_box;

// =============================================================================
// insert Benchmark
// =============================================================================

fn benchmark_insert(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("hashmap_insert");

    for size in [100, 1000, 10000] {
        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = PersistentHashMap::new();
                    for key in 0..size {
                        map = map.insert(black_box(key), key * 2);
                    }
                    black_box(map)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("HashMap", size), &size, |bencher, &size| {
            bencher.iter(|| {
                let mut map = HashMap::new();
                for key in 0..size {
                    map.insert(black_box(key), key * 2);
                }
                black_box(map)
            });
        });
    }

    group.finish();
}

// =============================================================================
// get Benchmark
// =============================================================================

fn benchmark_get(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("hashmap_get");

    for size in [100, 1000, 10000, 100_000] {
        let persistent_map: PersistentHashMap<i32, i32> = (0..size).map(|key| (key, key)).collect();
        let standard_map: HashMap<i32, i32> = (0..size).map(|key| (key, key)).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut sum = 0_i64;
                    for key in 0..size {
                        if let Some(&value) = persistent_map.get(&black_box(key)) {
                            sum += i64::from(value);
                        }
                    }
                    black_box(sum)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("HashMap", size), &size, |bencher, &size| {
            bencher.iter(|| {
                let mut sum = 0_i64;
                for key in 0..size {
                    if let Some(&value) = standard_map.get(&black_box(key)) {
                        sum += i64::from(value);
                    }
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

// =============================================================================
// remove Benchmark
// =============================================================================

fn benchmark_remove(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("hashmap_remove");

    for size in [100, 1000, 10000] {
        let persistent_map: PersistentHashMap<i32, i32> = (0..size).map(|key| (key, key)).collect();
        let standard_map: HashMap<i32, i32> = (0..size).map(|key| (key, key)).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = persistent_map.clone();
                    for key in 0..size {
                        map = map.remove(&black_box(key));
                    }
                    black_box(map)
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("HashMap clone+remove", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = standard_map.clone();
                    for key in 0..size {
                        map.remove(&black_box(key));
                    }
                    black_box(map)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Iteration Benchmark
// =============================================================================

fn benchmark_iteration(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("hashmap_iteration");

    for size in [100, 1000, 10000, 100_000] {
        let persistent_map: PersistentHashMap<i32, i32> = (0..size).map(|key| (key, key)).collect();
        let standard_map: HashMap<i32, i32> = (0..size).map(|key| (key, key)).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    black_box(persistent_map.values().map(|value| i64::from(*value)).sum::<i64>())
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("HashMap", size), &size, |bencher, _| {
            bencher.iter(|| {
                black_box(standard_map.values().map(|value| i64::from(*value)).sum::<i64>())
            });
        });
    }

    group.finish();
}

fn benchmark_iteration_early_exit(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("hashmap_iteration_early_exit");

    for size in [1000, 100_000] {
        let persistent_map: PersistentHashMap<i32, i32> = (0..size).map(|key| (key, key)).collect();

        // The lazy walk only descends into the first few nodes
        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap take(10)", size),
            &size,
            |bencher, _| {
                bencher.iter(|| black_box(persistent_map.iter().take(10).count()));
            },
        );
    }

    group.finish();
}

// =============================================================================
// Set algebra Benchmark
// =============================================================================

fn benchmark_set_union(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("hashset_union");

    for size in [100, 1000, 10000] {
        let left: PersistentHashSet<i32> = (0..size).collect();
        let right: PersistentHashSet<i32> = (size / 2..size + size / 2).collect();

        group.bench_with_input(
            BenchmarkId::new("PersistentHashSet", size),
            &size,
            |bencher, _| {
                bencher.iter(|| black_box(left.union(&right)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_insert,
    benchmark_get,
    benchmark_remove,
    benchmark_iteration,
    benchmark_iteration_early_exit,
    benchmark_set_union,
);

criterion_main!(benches);
