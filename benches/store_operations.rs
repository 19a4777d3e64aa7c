//! # Store and Digest Benchmarks
//!
//! Measures the hot paths behind the hash endpoints: id allocation under
//! contention, digest computation for varying secret sizes, and the
//! statistics accumulator.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hash_server::crypto::digest_secret;
use hash_server::{ManualClock, RecordStore, StatsAccumulator};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Store whose records are already past the age gate
fn aged_store(records: u64) -> RecordStore {
    let clock = Arc::new(ManualClock::new(0));
    let store = RecordStore::with_clock(clock.clone());
    for i in 0..records {
        store
            .submit(format!("secret-{i}").as_bytes())
            .expect("Non-empty secret");
    }
    clock.advance(60);
    store
}

fn bench_submit(c: &mut Criterion) {
    let store = RecordStore::new();

    c.bench_function("store_submit", |b| {
        b.iter(|| black_box(store.submit(black_box(b"angryMonkey")).unwrap()));
    });
}

fn bench_retrieve(c: &mut Criterion) {
    let store = aged_store(10_000);

    let mut group = c.benchmark_group("store_retrieve");
    group.bench_function("ready", |b| {
        b.iter(|| black_box(store.retrieve(black_box(5_000)).unwrap()));
    });
    group.bench_function("not_found", |b| {
        b.iter(|| black_box(store.retrieve(black_box(20_000)).is_err()));
    });
    group.finish();
}

fn bench_digest_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("digest_secret");

    for size in [16usize, 256, 4096, 65_536] {
        let secret = vec![0x5a_u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &secret, |b, secret| {
            b.iter(|| black_box(digest_secret(black_box(secret))));
        });
    }

    group.finish();
}

fn bench_contended_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_submit");

    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let store = Arc::new(RecordStore::new());
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let store = Arc::clone(&store);
                        thread::spawn(move || {
                            for _ in 0..100 {
                                store.submit(b"angryMonkey").unwrap();
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
                black_box(store.len())
            });
        });
    }

    group.finish();
}

fn bench_stats(c: &mut Criterion) {
    let stats = StatsAccumulator::new();

    let mut group = c.benchmark_group("stats");
    group.bench_function("record", |b| {
        b.iter(|| stats.record(black_box(Duration::from_micros(120))));
    });
    group.bench_function("snapshot", |b| {
        b.iter(|| black_box(stats.snapshot()));
    });
    group.finish();
}

criterion_group!(
    name = store_benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .sample_size(100)
        .warm_up_time(Duration::from_secs(2));
    targets =
        bench_submit,
        bench_retrieve,
        bench_digest_sizes,
        bench_contended_submit,
        bench_stats
);

criterion_main!(store_benches);
