//! Benchmarks for tile down-sampling, NaN encoding and compression.
//!
//! Run with: cargo bench --package tile-pipeline --bench tile_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use tile_pipeline::stats::{BinnedPercentiles, ExactPercentiles, PercentileCalculator};
use tile_pipeline::{
    downsample, encode_and_fill, BlockCodec, CompressionSettings, TileCompressor, ZfpCodec,
};

/// Smooth field with noise and a sprinkling of NaN, like a masked image.
fn generate_plane(width: usize, height: usize, nan_fraction: f64) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    let mut data = vec![0.0f32; width * height];

    for y in 0..height {
        for x in 0..width {
            let base = ((x as f32 / width as f32) * std::f32::consts::PI * 4.0).sin()
                * ((y as f32 / height as f32) * std::f32::consts::PI * 2.0).cos();
            data[y * width + x] = if rng.gen_bool(nan_fraction) {
                f32::NAN
            } else {
                base * 10.0 + rng.gen_range(-0.5..0.5)
            };
        }
    }

    data
}

// =============================================================================
// DOWNSAMPLE BENCHMARKS
// =============================================================================

fn bench_downsample(c: &mut Criterion) {
    let mut group = c.benchmark_group("downsample");
    let plane = generate_plane(2048, 2048, 0.01);
    group.throughput(Throughput::Elements((2048 * 2048) as u64));

    for mip in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("mip", mip), &mip, |b, &mip| {
            b.iter(|| black_box(downsample(&plane, 2048, 2048, mip)));
        });
    }

    group.finish();
}

// =============================================================================
// NAN ENCODING BENCHMARKS
// =============================================================================

fn bench_nan_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("nan_encoding");

    for fraction in [0.0, 0.01, 0.25] {
        let plane = generate_plane(1024, 1024, fraction);
        group.bench_with_input(
            BenchmarkId::new("encode_and_fill", format!("{fraction}")),
            &plane,
            |b, plane| {
                b.iter_batched(
                    || plane.clone(),
                    |mut data| black_box(encode_and_fill(&mut data, 1024, 1024)),
                    criterion::BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

// =============================================================================
// COMPRESSION BENCHMARKS
// =============================================================================

fn bench_codec_precision(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_precision");
    let plane = generate_plane(512, 512, 0.0);
    group.throughput(Throughput::Elements((512 * 512) as u64));

    for precision in [8u32, 16, 24, 32] {
        group.bench_with_input(BenchmarkId::new("zfp", precision), &precision, |b, &p| {
            b.iter(|| black_box(ZfpCodec.compress(&plane, 512, 512, p)));
        });
    }

    group.finish();
}

fn bench_tile_subsets(c: &mut Criterion) {
    let mut group = c.benchmark_group("tile_subsets");
    let plane = generate_plane(1024, 1024, 0.01);
    let compressor = TileCompressor::default();

    for subsets in [1usize, 2, 4, 8] {
        let settings = CompressionSettings::zfp(16, subsets);
        group.bench_with_input(BenchmarkId::new("subsets", subsets), &settings, |b, settings| {
            b.iter_batched(
                || plane.clone(),
                |mut data| black_box(compressor.compress(&mut data, 1024, 1024, settings)),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

// =============================================================================
// PERCENTILE BENCHMARKS
// =============================================================================

fn bench_percentiles(c: &mut Criterion) {
    let mut group = c.benchmark_group("percentiles");
    let values: Vec<f64> = generate_plane(1024, 1024, 0.0)
        .into_iter()
        .map(f64::from)
        .collect();
    let wanted = [0.0, 0.005, 0.5, 0.995, 1.0];

    group.bench_function("exact", |b| {
        b.iter_batched(
            || values.clone(),
            |mut v| black_box(ExactPercentiles.compute(&mut v, &wanted)),
            criterion::BatchSize::LargeInput,
        );
    });
    group.bench_function("binned_10000", |b| {
        let calc = BinnedPercentiles::new(10_000);
        b.iter_batched(
            || values.clone(),
            |mut v| black_box(calc.compute(&mut v, &wanted)),
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_downsample,
    bench_nan_encoding,
    bench_codec_precision,
    bench_tile_subsets,
    bench_percentiles,
);
criterion_main!(benches);
