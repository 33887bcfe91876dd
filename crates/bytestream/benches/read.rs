// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![expect(missing_docs, reason = "Benchmark code")]

use std::hint::black_box;

use bytestream::ByteStream;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

// One retransmission window's worth of payload: enough for the read loop to cross many
// chunk boundaries without outgrowing the cache.
const TEST_DATA: &[u8] = &[0x62_u8; 24 * 1024];

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("ByteStream");

    group.bench_function("read_1k_chunks", |b| {
        b.iter_batched_ref(
            || ByteStream::from_static(TEST_DATA).unwrap(),
            |stream| {
                let mut buffer = [0_u8; 1024];

                while stream.read(black_box(&mut buffer)).is_ok() {}
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("clone_at", |b| {
        b.iter_batched_ref(
            || ByteStream::from_static(TEST_DATA).unwrap(),
            |stream| stream.clone_at(black_box(0)).unwrap(),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("concat", |b| {
        b.iter_batched(
            || {
                (
                    ByteStream::from_static(TEST_DATA).unwrap(),
                    ByteStream::from_static(TEST_DATA).unwrap(),
                )
            },
            |(head, tail)| head.concat(black_box(&tail)).unwrap(),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("composite_read_1k_chunks", |b| {
        b.iter_batched_ref(
            || {
                ByteStream::from_static(TEST_DATA)
                    .unwrap()
                    .concat(&ByteStream::from_static(TEST_DATA).unwrap())
                    .unwrap()
            },
            |stream| {
                let mut buffer = [0_u8; 1024];

                while stream.read(black_box(&mut buffer)).is_ok() {}
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}
