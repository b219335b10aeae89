//! Handle table and event delivery benchmarks
//!
//! Measures:
//! - Table lookup under a growing number of registered handles
//! - Add/remove churn
//! - End-to-end delivery of a native event through the manual dispatcher
//!
//! Run with: cargo bench -p remotemedia-mediastream --bench bench_handle_table

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use remotemedia_mediastream::testing::FakeEngine;
use remotemedia_mediastream::{
    BridgeConfig, Context, DispatchMode, HandleTable, MediaStream, NativeHandle, TrackKind,
};

fn handle(raw: u64) -> NativeHandle {
    NativeHandle::new(raw + 1).unwrap()
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle_table_lookup");

    for size in [16u64, 256, 4096] {
        let table = HandleTable::new();
        let wrappers: Vec<Arc<u64>> = (0..size).map(Arc::new).collect();
        for (i, wrapper) in wrappers.iter().enumerate() {
            table.add(handle(i as u64), wrapper).unwrap();
        }

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 7) % size;
                black_box(table.lookup(handle(i)))
            });
        });
    }

    group.finish();
}

fn bench_add_remove(c: &mut Criterion) {
    let table = HandleTable::new();
    let wrapper = Arc::new(());

    c.bench_function("handle_table_add_remove", |b| {
        b.iter(|| {
            table.add(handle(42), &wrapper).unwrap();
            black_box(table.remove(handle(42)))
        });
    });
}

fn bench_event_delivery(c: &mut Criterion) {
    let engine = FakeEngine::new();
    let context =
        Context::new(engine.clone(), BridgeConfig::with_mode(DispatchMode::Manual)).unwrap();
    let stream = MediaStream::new_in(&context).unwrap();
    let stream_handle = stream.handle().unwrap();
    stream.set_on_add_track(|event| {
        black_box(event.track);
    });

    let track = engine.create_track(TrackKind::Audio);
    let sink = engine.sink_for(stream_handle).unwrap();

    c.bench_function("observer_add_track_delivery", |b| {
        b.iter(|| {
            sink.on_add_track(stream_handle, track.handle());
            black_box(context.dispatch_pending())
        });
    });

    stream.dispose();
}

criterion_group!(benches, bench_lookup, bench_add_remove, bench_event_delivery);
criterion_main!(benches);
