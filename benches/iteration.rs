//! Benchmarks for one clustering round
//!
//! Run with: cargo bench --bench iteration

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use kmeans_mr::stage::{aggregate, assign, map_all};
use kmeans_mr::{seed, MeanReducer, NearestCentroid, Parallelism};

const K: usize = 8;

fn bench_assignment(c: &mut Criterion) {
  let mut group = c.benchmark_group("assignment");

  for count in [1_000usize, 10_000, 100_000] {
    let points = seed::generate_points(count, 100, 1000, Some(42)).expect("points");
    let centroids = seed::random_centroids(K, 100, 1000, Some(123)).expect("centroids");
    group.throughput(Throughput::Elements(count as u64));

    for (name, parallelism) in [
      ("sequential", Parallelism::Sequential),
      ("rayon", Parallelism::Rayon),
      ("workers_4", Parallelism::Workers(4)),
    ] {
      let mapper = NearestCentroid::new(parallelism);
      group.bench_with_input(BenchmarkId::new(name, count), &count, |bencher, _| {
        bencher.iter(|| {
          let pairs = map_all(&mapper, black_box(&points), black_box(&centroids)).expect("map");
          black_box(pairs);
        });
      });
    }
  }

  group.finish();
}

fn bench_round(c: &mut Criterion) {
  let mut group = c.benchmark_group("round");

  for count in [1_000usize, 100_000] {
    let points = seed::generate_points(count, 100, 1000, Some(42)).expect("points");
    let centroids = seed::random_centroids(K, 100, 1000, Some(123)).expect("centroids");
    let mapper = NearestCentroid::default();
    group.throughput(Throughput::Elements(count as u64));

    group.bench_with_input(BenchmarkId::new("assign_aggregate", count), &count, |bencher, _| {
      bencher.iter(|| {
        let partitions = assign(&mapper, black_box(&points), &centroids).expect("assign");
        let next = aggregate(&MeanReducer, &partitions, &centroids).expect("aggregate");
        black_box(next);
      });
    });
  }

  group.finish();
}

criterion_group!(benches, bench_assignment, bench_round);
criterion_main!(benches);
