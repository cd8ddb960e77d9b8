mod test_equivalence;

use approx::relative_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Bernoulli, Uniform};

use crate::matrix::AdjacencyMatrix;
use crate::scoring::ScoreMatrix;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Absolute/relative tolerance for comparing implementations.
pub const TOL: f64 = 1e-9;

/// The three-item example used throughout the end-to-end tests.
pub fn small_binary_rows() -> Vec<Vec<f64>> {
    vec![
        vec![1.0, 1.0, 0.0, 0.0],
        vec![1.0, 0.0, 1.0, 0.0],
        vec![0.0, 0.0, 0.0, 1.0],
    ]
}

/// Seeded random 0/1 rows. Every column is forced to hold at least one 1 and
/// one 0 so popularities stay strictly inside (0, 1).
pub fn random_binary_rows(n: usize, m: usize, density: f64, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let bernoulli = Bernoulli::new(density).unwrap();
    let mut rows: Vec<Vec<f64>> = (0..n)
        .map(|_| {
            (0..m)
                .map(|_| if rng.sample(bernoulli) { 1.0 } else { 0.0 })
                .collect()
        })
        .collect();
    for j in 0..m {
        rows[j % n][j] = 1.0;
        rows[(j + 1) % n][j] = 0.0;
    }
    rows
}

/// Seeded random weighted rows: the binary pattern of
/// [`random_binary_rows`] with nonzeros drawn from `[0.5, 3)`.
pub fn random_weighted_rows(n: usize, m: usize, density: f64, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x5eed);
    let weights = Uniform::new(0.5, 3.0).unwrap();
    random_binary_rows(n, m, density, seed)
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|x| if x != 0.0 { rng.sample(weights) } else { 0.0 })
                .collect()
        })
        .collect()
}

/// Same rows in both representations: (dense, sparse).
pub fn both_representations(rows: Vec<Vec<f64>>) -> (AdjacencyMatrix, AdjacencyMatrix) {
    let dense = AdjacencyMatrix::from_dense_rows(rows).unwrap();
    let sparse = dense.to_sparse();
    (dense, sparse)
}

/// Compare every entry of `expected` against `actual` within [`TOL`].
/// `actual` may hold more entries than `expected`.
pub fn assert_scores_close(expected: &ScoreMatrix, actual: &ScoreMatrix) {
    for (a, b, want) in expected.entries() {
        let got = actual
            .get(a, b)
            .unwrap_or_else(|| panic!("missing pair ({a}, {b})"));
        assert!(
            relative_eq!(want, got, epsilon = TOL, max_relative = TOL),
            "pair ({a}, {b}): expected {want}, got {got}"
        );
    }
}
