//! False-sharing benchmark: two threads bumping adjacent counters, packed
//! into one cache line versus each on its own padded line.
//!
//! Run: cargo bench --bench sequence_padding

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use crossbeam_utils::CachePadded;
use seqring::Sequence;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;

const INCREMENTS: u64 = 1_000_000;

struct Packed {
    a: AtomicI64,
    b: AtomicI64,
}

fn run_packed() {
    let counters = Arc::new(Packed {
        a: AtomicI64::new(0),
        b: AtomicI64::new(0),
    });
    let other = counters.clone();
    let handle = thread::spawn(move || {
        for i in 0..INCREMENTS as i64 {
            other.b.store(i, Ordering::Release);
        }
    });
    for i in 0..INCREMENTS as i64 {
        counters.a.store(i, Ordering::Release);
    }
    handle.join().unwrap();
}

fn run_padded() {
    let counters = Arc::new([
        CachePadded::new(AtomicI64::new(0)),
        CachePadded::new(AtomicI64::new(0)),
    ]);
    let other = counters.clone();
    let handle = thread::spawn(move || {
        for i in 0..INCREMENTS as i64 {
            other[1].store(i, Ordering::Release);
        }
    });
    for i in 0..INCREMENTS as i64 {
        counters[0].store(i, Ordering::Release);
    }
    handle.join().unwrap();
}

fn run_sequences() {
    let sequences = Arc::new([Sequence::new(0), Sequence::new(0)]);
    let other = sequences.clone();
    let handle = thread::spawn(move || {
        for i in 0..INCREMENTS as i64 {
            other[1].set(i);
        }
    });
    for i in 0..INCREMENTS as i64 {
        sequences[0].set(i);
    }
    handle.join().unwrap();
}

fn bench_padding(c: &mut Criterion) {
    let mut group = c.benchmark_group("adjacent_counters");
    group.throughput(Throughput::Elements(INCREMENTS * 2));
    group.sample_size(20);
    group.bench_function("packed", |b| b.iter(run_packed));
    group.bench_function("cache_padded", |b| b.iter(run_padded));
    group.bench_function("sequence", |b| b.iter(run_sequences));
    group.finish();
}

criterion_group!(benches, bench_padding);
criterion_main!(benches);
