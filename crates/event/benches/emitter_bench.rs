//! Benchmarks for the sluice-event coalescing engine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sluice_event::CollectionEmitter;
use std::rc::Rc;

fn bench_single_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("emitter");

    group.bench_function("add_dispatch", |b| {
        b.iter(|| {
            let mut emitter: CollectionEmitter<u64, u64> = CollectionEmitter::new();
            emitter.add_event(black_box(1), Rc::new(1)).unwrap()
        })
    });

    group.bench_function("add_remove_cancel", |b| {
        b.iter(|| {
            let mut emitter: CollectionEmitter<u64, u64> = CollectionEmitter::new();
            emitter.pause_events();
            emitter.add_event(black_box(1), Rc::new(1)).unwrap();
            emitter.remove_event(black_box(1), Rc::new(1)).unwrap();
            emitter.resume_events()
        })
    });

    group.finish();
}

fn bench_coalesce_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("emitter/coalesce");

    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("add_batch", size), &size, |b, &size| {
            b.iter(|| {
                let mut emitter: CollectionEmitter<u64, u64> = CollectionEmitter::new();
                emitter.pause_events();
                for i in 0..size {
                    emitter.add_event(i, Rc::new(i)).unwrap();
                }
                emitter.resume_events()
            })
        });

        group.bench_with_input(
            BenchmarkId::new("update_churn", size),
            &size,
            |b, &size| {
                b.iter(|| {
                    let mut emitter: CollectionEmitter<u64, u64> = CollectionEmitter::new();
                    emitter.pause_events();
                    for i in 0..size {
                        emitter.update_event(i % 16, Rc::new(i)).unwrap();
                    }
                    emitter.resume_events()
                })
            },
        );
    }

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("emitter/replay");

    for size in [10, 100, 1000] {
        let batch = {
            let mut emitter: CollectionEmitter<u64, u64> = CollectionEmitter::new();
            emitter.pause_events();
            for i in 0..size {
                emitter.add_event(i, Rc::new(i)).unwrap();
            }
            emitter.resume_events().unwrap()
        };

        group.bench_with_input(BenchmarkId::new("forward", size), &batch, |b, batch| {
            b.iter(|| {
                let mut downstream: CollectionEmitter<u64, u64> = CollectionEmitter::new();
                downstream.replay(black_box(batch)).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_ops, bench_coalesce_batches, bench_replay);
criterion_main!(benches);
