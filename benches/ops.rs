//! Micro-operation benchmarks for the cache and sort engines.
//!
//! Run with: `cargo bench --bench ops`
//!
//! Measures per-operation cache latency at a few associativities and
//! parallel-vs-sequential sort wall time on uniform random data.

use std::hint::black_box;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use emkit::cache::SetAssocCache;
use emkit::sort::ParallelSorterBuilder;

const CACHE_CAPACITY: usize = 16_384;
const CACHE_OPS: u64 = 100_000;
const SORT_N: usize = 1 << 20;

// ============================================================================
// Cache write/read throughput per associativity
// ============================================================================

fn bench_cache_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_ops_ns");
    group.throughput(Throughput::Elements(CACHE_OPS));

    for assoc in [1usize, 2, 4, 8] {
        group.bench_function(format!("write_assoc_{assoc}"), |b| {
            b.iter_custom(|iters| {
                let mut cache = SetAssocCache::new(CACHE_CAPACITY, assoc, |v: u64| {
                    black_box(v);
                });
                let start = Instant::now();
                for _ in 0..iters {
                    for i in 0..CACHE_OPS {
                        cache.write(i % (CACHE_CAPACITY as u64) + 1, i);
                    }
                }
                start.elapsed()
            })
        });

        group.bench_function(format!("write_read_assoc_{assoc}"), |b| {
            b.iter_custom(|iters| {
                let mut cache = SetAssocCache::new(CACHE_CAPACITY, assoc, |v: u64| {
                    black_box(v);
                });
                let start = Instant::now();
                for _ in 0..iters {
                    for i in 0..CACHE_OPS {
                        let key = i % (CACHE_CAPACITY as u64) + 1;
                        cache.write(key, i);
                        black_box(cache.read(key));
                    }
                }
                start.elapsed()
            })
        });
    }

    group.finish();
}

// ============================================================================
// Sort wall time: sequential cutoff vs parallel fan-out
// ============================================================================

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_wall");
    group.sample_size(10);
    group.throughput(Throughput::Elements(SORT_N as u64));

    let mut rng = StdRng::seed_from_u64(0xb4c5);
    let input: Vec<u64> = (0..SORT_N).map(|_| rng.gen()).collect();

    group.bench_function("std_sort_unstable", |b| {
        b.iter_custom(|iters| {
            let mut elapsed = std::time::Duration::ZERO;
            for _ in 0..iters {
                let mut v = input.clone();
                let start = Instant::now();
                v.sort_unstable();
                elapsed += start.elapsed();
                black_box(v);
            }
            elapsed
        })
    });

    for threads in [2usize, 4, 8] {
        let sorter = ParallelSorterBuilder::new()
            .with_threads(threads)
            .with_min_size(64 * 1024)
            .build()
            .unwrap();
        group.bench_function(format!("parallel_{threads}_threads"), |b| {
            b.iter_custom(|iters| {
                let mut elapsed = std::time::Duration::ZERO;
                for _ in 0..iters {
                    let mut v = input.clone();
                    let start = Instant::now();
                    sorter.sort(&mut v);
                    elapsed += start.elapsed();
                    black_box(v);
                }
                elapsed
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cache_ops, bench_sort);
criterion_main!(benches);
