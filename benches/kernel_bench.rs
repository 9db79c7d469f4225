//! Access-pattern kernel benchmarks
//!
//! Measures the kernels themselves across cache-resident and memory-resident
//! working sets. Throughput is reported in bytes so criterion prints GB/s
//! directly comparable with the engine's own numbers.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::AtomicBool;

use membench::buffer::AlignedBuffer;
use membench::kernels;

const SIZES: &[(&str, usize)] = &[
    ("L1_16KB", 16 * 1024),
    ("L2_128KB", 128 * 1024),
    ("L3_2MB", 2 * 1024 * 1024),
    ("DRAM_32MB", 32 * 1024 * 1024),
];

fn benchmark_sequential_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("Sequential Access");
    let cancel = AtomicBool::new(false);

    for &(name, size) in SIZES {
        group.throughput(Throughput::Bytes(size as u64));

        let buffer = AlignedBuffer::new(size, 64).unwrap();
        group.bench_function(BenchmarkId::new("read", name), |b| {
            b.iter(|| {
                black_box(kernels::sequential_read(
                    buffer.data(),
                    0,
                    size,
                    1,
                    &cancel,
                    f64::INFINITY,
                ))
            });
        });

        let mut buffer = AlignedBuffer::new(size, 64).unwrap();
        group.bench_function(BenchmarkId::new("write", name), |b| {
            b.iter(|| {
                black_box(kernels::sequential_write(
                    buffer.data_mut(),
                    0,
                    size,
                    1,
                    &cancel,
                    f64::INFINITY,
                ))
            });
        });
    }
    group.finish();
}

fn benchmark_random_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("Random Access");
    let cancel = AtomicBool::new(false);

    for &(name, size) in SIZES {
        group.throughput(Throughput::Bytes(size as u64));

        let buffer = AlignedBuffer::new(size, 64).unwrap();
        group.bench_function(BenchmarkId::new("read", name), |b| {
            b.iter(|| {
                black_box(kernels::random_read(
                    buffer.data(),
                    0,
                    size,
                    1,
                    &cancel,
                    f64::INFINITY,
                ))
            });
        });

        let mut buffer = AlignedBuffer::new(size, 64).unwrap();
        group.bench_function(BenchmarkId::new("write", name), |b| {
            b.iter(|| {
                black_box(kernels::random_write(
                    buffer.data_mut(),
                    0,
                    size,
                    1,
                    &cancel,
                    f64::INFINITY,
                ))
            });
        });
    }
    group.finish();
}

fn benchmark_stream_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("Stream Kernels");
    let cancel = AtomicBool::new(false);

    for &(name, size) in SIZES {
        // Copy reads and writes the full range
        group.throughput(Throughput::Bytes(2 * size as u64));
        let src = AlignedBuffer::new(size, 64).unwrap();
        let mut dst = AlignedBuffer::new(size, 64).unwrap();
        group.bench_function(BenchmarkId::new("copy", name), |b| {
            b.iter(|| {
                black_box(kernels::copy(
                    src.data(),
                    dst.data_mut(),
                    0,
                    size,
                    1,
                    &cancel,
                    f64::INFINITY,
                ))
            });
        });

        // Triad moves three streams
        group.throughput(Throughput::Bytes(3 * size as u64));
        let mut a = AlignedBuffer::new(size, 64).unwrap();
        let b_buf = AlignedBuffer::new(size, 64).unwrap();
        let c_buf = AlignedBuffer::new(size, 64).unwrap();
        group.bench_function(BenchmarkId::new("triad", name), |b| {
            b.iter(|| {
                black_box(kernels::triad(
                    a.data_mut(),
                    b_buf.data(),
                    c_buf.data(),
                    0,
                    size,
                    1,
                    &cancel,
                    f64::INFINITY,
                ))
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_sequential_kernels,
    benchmark_random_kernels,
    benchmark_stream_kernels
);
criterion_main!(benches);
