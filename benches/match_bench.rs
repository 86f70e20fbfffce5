//! Benchmarks for the brute-force reference scan

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pawmatch::{FeatureCache, Matcher, ReferenceSet, Vector};

fn create_cache(n: usize, dim: usize) -> FeatureCache {
    let mut cache = FeatureCache::new(dim);
    for i in 0..n {
        let data: Vec<f32> = (0..dim).map(|_| rand::random::<f32>()).collect();
        cache.insert(format!("breed{}_{}", i % 37, i), Vector::new(data)).unwrap();
    }
    cache
}

fn benchmark_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("best_match");
    let matcher = Matcher::default();

    for size in [100, 1000, 10000].iter() {
        let cache = create_cache(*size, 64);
        let reference = ReferenceSet::full(&cache);
        let query = Vector::new(vec![0.5; 64]);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| matcher.best_match(black_box(&query), black_box(&reference)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_match);
criterion_main!(benches);
