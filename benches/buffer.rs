//! Benchmarks for the hot buffer append path

use clientpulse::BoundedBuffer;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_append(c: &mut Criterion) {
    c.bench_function("append_with_halving_eviction", |b| {
        let buffer = BoundedBuffer::new(1000);
        let mut i = 0u64;
        b.iter(|| {
            buffer.append(black_box(i));
            i += 1;
        });
    });

    c.bench_function("snapshot_full_buffer", |b| {
        let buffer = BoundedBuffer::new(1000);
        for i in 0..1000u64 {
            buffer.append(i);
        }
        b.iter(|| black_box(buffer.snapshot()));
    });
}

criterion_group!(benches, bench_append);
criterion_main!(benches);
