//! Benchmarks for the hydrology stages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rillmap_algorithms::hydrology::{
    extract_stream_network, flow_accumulation, flow_direction, resolve_depressions, ResolveMode, ResolveParams,
    StreamParams,
};
use rillmap_core::{GeoTransform, Raster};

/// Tilted plane with a ripple of closed pits, draining south
fn create_pitted_dem(size: usize) -> Raster<f64> {
    let mut dem = Raster::new(size, size);
    dem.set_transform(GeoTransform::new(0.0, size as f64 * 10.0, 10.0, -10.0));
    for row in 0..size {
        for col in 0..size {
            let ripple = ((row as f64 * 0.7).sin() * (col as f64 * 0.9).cos()) * 3.0;
            let noise = ((row * 7 + col * 13) % 17) as f64 * 0.01;
            dem.set(row, col, 1000.0 - row as f64 * 0.5 + ripple + noise).unwrap();
        }
    }
    dem
}

fn bench_resolve(c: &mut Criterion) {
    for (label, mode) in [("breach", ResolveMode::Breach), ("fill", ResolveMode::Fill)] {
        let mut group = c.benchmark_group(format!("hydrology/resolve_{label}"));
        let params = ResolveParams {
            mode,
            ..Default::default()
        };
        for size in [128, 256, 512] {
            let dem = create_pitted_dem(size);
            group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
                b.iter(|| resolve_depressions(black_box(&dem), &params).unwrap())
            });
        }
        group.finish();
    }
}

fn bench_flow_direction(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_direction");
    for size in [256, 512, 1024] {
        let dem = resolve_depressions(&create_pitted_dem(size), &ResolveParams::default())
            .unwrap()
            .dem;
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| flow_direction(black_box(&dem)).unwrap())
        });
    }
    group.finish();
}

fn bench_flow_accumulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_accumulation");
    for size in [256, 512, 1024] {
        let dem = resolve_depressions(&create_pitted_dem(size), &ResolveParams::default())
            .unwrap()
            .dem;
        let fdir = flow_direction(&dem).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| flow_accumulation(black_box(&fdir)).unwrap())
        });
    }
    group.finish();
}

fn bench_stream_network(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/stream_network");
    let params = StreamParams::default();
    for size in [256, 512] {
        let dem = resolve_depressions(&create_pitted_dem(size), &ResolveParams::default())
            .unwrap()
            .dem;
        let fdir = flow_direction(&dem).unwrap();
        let acc = flow_accumulation(&fdir).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| extract_stream_network(black_box(&fdir), black_box(&acc), &params).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_resolve,
    bench_flow_direction,
    bench_flow_accumulation,
    bench_stream_network,
);
criterion_main!(benches);
