//! Region multiplication throughput per method
//!
//! Usage:
//!   cargo bench -p gf16-mul                 # every supported method
//!   cargo bench -p gf16-mul -- mul_add      # accumulate only
//!   cargo bench -p gf16-mul -- "Xor-Jit"    # one family

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gf16_mul::{available_methods, AlignedBuffer, Galois16Mul, MethodHint};
use rand::Rng;

const REGION: usize = 64 * 1024;

fn setup(gf: &Galois16Mul) -> (AlignedBuffer, AlignedBuffer) {
    let mut rng = rand::thread_rng();
    let raw: Vec<u8> = (0..REGION).map(|_| rng.gen()).collect();
    let len = gf.prepared_len(REGION);
    let mut src = AlignedBuffer::zeroed(len, gf.info().alignment);
    gf.prepare(&mut src, &raw);
    (src, AlignedBuffer::zeroed(len, gf.info().alignment))
}

fn bench_mul(c: &mut Criterion) {
    let mut group = c.benchmark_group("mul");
    group.throughput(Throughput::Bytes(REGION as u64));

    for id in available_methods(true) {
        let gf = Galois16Mul::new(MethodHint::Method(id));
        let (src, mut dst) = setup(&gf);
        let mut scratch = gf.mut_scratch_alloc();

        group.bench_function(BenchmarkId::new(id.name(), "64KiB"), |b| {
            b.iter(|| gf.mul(&mut dst, black_box(&src), black_box(0x1234), scratch.as_mut()));
        });
    }

    group.finish();
}

fn bench_mul_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("mul_add");
    group.throughput(Throughput::Bytes(REGION as u64));

    for id in available_methods(true) {
        let gf = Galois16Mul::new(MethodHint::Method(id));
        let (src, mut dst) = setup(&gf);
        let mut scratch = gf.mut_scratch_alloc();

        group.bench_function(BenchmarkId::new(id.name(), "64KiB"), |b| {
            b.iter(|| gf.mul_add(&mut dst, black_box(&src), black_box(0xBEEF), scratch.as_mut()));
        });
    }

    group.finish();
}

fn bench_mul_add_multi(c: &mut Criterion) {
    let mut group = c.benchmark_group("mul_add_multi");
    const SOURCES: usize = 8;
    group.throughput(Throughput::Bytes((SOURCES * REGION) as u64));

    for id in available_methods(true) {
        let gf = Galois16Mul::new(MethodHint::Method(id));
        let srcs: Vec<AlignedBuffer> = (0..SOURCES).map(|_| setup(&gf).0).collect();
        let src_refs: Vec<&[u8]> = srcs.iter().map(|s| &s[..]).collect();
        let coeffs: Vec<u16> = (0..SOURCES as u16).map(|i| 0x1000 + 17 * i).collect();
        let mut dst = AlignedBuffer::zeroed(gf.prepared_len(REGION), gf.info().alignment);
        let mut scratch = gf.mut_scratch_alloc();

        group.bench_function(BenchmarkId::new(id.name(), SOURCES), |b| {
            b.iter(|| gf.mul_add_multi(&mut dst, black_box(&src_refs), &coeffs, scratch.as_mut()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_mul, bench_mul_add, bench_mul_add_multi);
criterion_main!(benches);
