//! Benchmark for Transient data structures.
//!
//! Compares the performance of TransientVector, TransientHashMap, and TransientHashSet
//! against their Persistent counterparts and standard library equivalents for batch operations.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use imshare::persistent::{
    PersistentHashMap, PersistentHashSet, PersistentVector, TransientHashMap, TransientHashSet,
    TransientVector,
};
use std::collections::{HashMap, HashSet};
use std::hint::black_box;

// =============================================================================
// TransientVector Benchmarks
// =============================================================================

fn benchmark_transient_vector_push_back(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("transient_vector_push_back");

    for size in [1_000, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("TransientVector", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut transient = TransientVector::new();
                    for index in 0..size {
                        transient.push_back(black_box(index)).unwrap();
                    }
                    black_box(transient.commit().unwrap())
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut vector = PersistentVector::new();
                    for index in 0..size {
                        vector = vector.push_back(black_box(index));
                    }
                    black_box(vector)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("Vec", size), &size, |bencher, &size| {
            bencher.iter(|| {
                let mut vector = Vec::new();
                for index in 0..size {
                    vector.push(black_box(index));
                }
                black_box(vector)
            });
        });
    }

    group.finish();
}

fn benchmark_transient_vector_update(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("transient_vector_update");

    for size in [1_000, 10_000, 100_000] {
        let source: PersistentVector<usize> = (0..size).collect();

        group.bench_with_input(
            BenchmarkId::new("TransientVector", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut transient = source.transient();
                    for index in 0..size {
                        transient.set(index, black_box(index * 2)).unwrap();
                    }
                    black_box(transient.commit().unwrap())
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("PersistentVector", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut vector = source.clone();
                    for index in 0..size {
                        vector = vector.set(index, black_box(index * 2)).unwrap();
                    }
                    black_box(vector)
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// TransientHashMap Benchmarks
// =============================================================================

fn benchmark_transient_hashmap_insert(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("transient_hashmap_insert");

    for size in [1_000, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("TransientHashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut transient = TransientHashMap::new();
                    for key in 0..size {
                        transient.insert(black_box(key), key).unwrap();
                    }
                    black_box(transient.commit().unwrap())
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("PersistentHashMap", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut map = PersistentHashMap::new();
                    for key in 0..size {
                        map = map.insert(black_box(key), key);
                    }
                    black_box(map)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("HashMap", size), &size, |bencher, &size| {
            bencher.iter(|| {
                let mut map = HashMap::new();
                for key in 0..size {
                    map.insert(black_box(key), key);
                }
                black_box(map)
            });
        });
    }

    group.finish();
}

// =============================================================================
// TransientHashSet Benchmarks
// =============================================================================

fn benchmark_transient_hashset_insert(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("transient_hashset_insert");

    for size in [1_000, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("TransientHashSet", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut transient = TransientHashSet::new();
                    for element in 0..size {
                        transient.insert(black_box(element)).unwrap();
                    }
                    black_box(transient.commit().unwrap())
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("PersistentHashSet", size),
            &size,
            |bencher, &size| {
                bencher.iter(|| {
                    let mut set = PersistentHashSet::new();
                    for element in 0..size {
                        set = set.insert(black_box(element));
                    }
                    black_box(set)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("HashSet", size), &size, |bencher, &size| {
            bencher.iter(|| {
                let mut set = HashSet::new();
                for element in 0..size {
                    set.insert(black_box(element));
                }
                black_box(set)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_transient_vector_push_back,
    benchmark_transient_vector_update,
    benchmark_transient_hashmap_insert,
    benchmark_transient_hashset_insert,
);

criterion_main!(benches);
