//! End-to-end NAPP build and search benchmarks: pivot selection, chunked
//! parallel posting-list construction, and query-time intersection, at
//! dataset sizes and dimensionalities typical of embedding search.

use annex_core::{EuclideanSpace, NappIndex, NappParams, PivotSelectionStrategy};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

fn synthetic_dataset(num_objects: usize, dims: usize) -> Vec<Vec<f32>> {
    (0..num_objects)
        .map(|i| {
            let cluster = (i / 100) as f32;
            (0..dims).map(|j| cluster + ((i * 31 + j * 7) as f32 * 0.01).sin()).collect()
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("napp_build");
    group.sample_size(10);

    for &num_objects in &[1_000usize, 10_000] {
        let data = synthetic_dataset(num_objects, 128);
        group.throughput(Throughput::Elements(num_objects as u64));

        group.bench_with_input(BenchmarkId::new("build", num_objects), &num_objects, |b, _| {
            b.iter(|| {
                black_box(
                    NappIndex::build(
                        EuclideanSpace,
                        NappParams::default(),
                        data.clone(),
                        PivotSelectionStrategy::Random,
                        42,
                    )
                    .unwrap(),
                )
            });
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("napp_search");

    let data = synthetic_dataset(50_000, 128);
    let index =
        NappIndex::build(EuclideanSpace, NappParams::default(), data, PivotSelectionStrategy::MaxVariance, 7)
            .unwrap();
    let query: Vec<f32> = (0..128).map(|j| (j as f32 * 0.01).sin()).collect();

    for &k in &[1usize, 10, 100] {
        group.bench_with_input(BenchmarkId::new("search", k), &k, |b, &k| {
            b.iter(|| black_box(index.search(black_box(&query), k).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_search);
criterion_main!(benches);
