use affinity::{
    score_pairs, AdjacencyMatrix, BackgroundStats, Method, PairSelection, ScoringConfig,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use std::hint::black_box;
use std::time::Duration;

/// Random sparse 0/1 matrix with roughly `density · n · m` nonzeros.
fn generate_adjacency(n_items: usize, n_affils: usize, density: f64, seed: u64) -> AdjacencyMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut triplets = Vec::new();
    for i in 0..n_items {
        for j in 0..n_affils {
            if rng.random_bool(density) {
                triplets.push((i, j, 1.0));
            }
        }
    }
    AdjacencyMatrix::from_triplets(n_items, n_affils, &triplets).unwrap()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_all_pairs");
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(3));
    group.sample_size(20);

    let config = ScoringConfig::default();
    for &n in &[100usize, 400] {
        let sparse = generate_adjacency(n, 200, 0.05, 42);
        let stats = BackgroundStats::learn(&sparse).unwrap();
        let dense = stats.matrix.to_dense().unwrap();

        for method in [Method::Cosine, Method::WeightedCorr, Method::MixedPairs(0.1)] {
            group.bench_with_input(
                BenchmarkId::new(format!("{method}_sparse"), n),
                &stats.matrix,
                |b, m| {
                    b.iter(|| {
                        score_pairs(
                            black_box(&PairSelection::All),
                            black_box(m),
                            &[method],
                            &stats.pi,
                            &config,
                        )
                        .unwrap()
                    })
                },
            );
            group.bench_with_input(
                BenchmarkId::new(format!("{method}_dense"), n),
                &dense,
                |b, m| {
                    b.iter(|| {
                        score_pairs(
                            black_box(&PairSelection::All),
                            black_box(m),
                            &[method],
                            &stats.pi,
                            &config,
                        )
                        .unwrap()
                    })
                },
            );
        }
    }
    group.finish();

    // Restricted pairs against the full matrix
    let mut group = c.benchmark_group("score_restricted_pairs");
    group.sample_size(20);
    let sparse = generate_adjacency(2000, 500, 0.02, 7);
    let stats = BackgroundStats::learn(&sparse).unwrap();
    let pairs = PairSelection::Pairs((0..1000).map(|i| (i, 1999 - i)).collect());
    group.bench_function("weighted_corr_1000_pairs", |b| {
        b.iter(|| {
            score_pairs(
                black_box(&pairs),
                &stats.matrix,
                &[Method::WeightedCorr],
                &stats.pi,
                &config,
            )
            .unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
