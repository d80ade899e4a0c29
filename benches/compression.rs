//! Benchmarks for pruning, quantization and model encoding.

use cnnkit::prelude::*;
use cnnkit::serialization::to_bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn network(num_kernels: usize) -> ConvNet {
    let compression = CompressionConfig::default()
        .with_pruning(0.5)
        .with_quantization();
    let config = NetworkConfig::new(28, 28, 3, num_kernels, 10)
        .with_seed(42)
        .with_compression(compression);
    ConvNet::new(config).unwrap()
}

fn bench_prune(c: &mut Criterion) {
    let mut group = c.benchmark_group("prune");

    for kernels in [4, 16, 32].iter() {
        let net = network(*kernels);

        group.bench_with_input(BenchmarkId::from_parameter(kernels), kernels, |b, _| {
            b.iter(|| {
                let mut net = net.clone();
                net.prune(black_box(0.5)).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_quantize(c: &mut Criterion) {
    let mut group = c.benchmark_group("quantize");

    for kernels in [4, 16, 32].iter() {
        let net = network(*kernels);

        group.bench_with_input(BenchmarkId::from_parameter(kernels), kernels, |b, _| {
            b.iter(|| {
                let mut net = net.clone();
                net.quantize_model()
            });
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let net = network(16);

    for format in [ModelFormat::Original, ModelFormat::Quantized] {
        group.bench_with_input(BenchmarkId::from_parameter(format.name()), &format, |b, &f| {
            b.iter(|| to_bytes(black_box(&net), f).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_prune, bench_quantize, bench_encode);
criterion_main!(benches);
