//! Every implementation of every method must agree on the same input, in both
//! representations.

use crate::background::learn_pi_vector;
use crate::dispatch::{plan_implementations, run_implementation, Implementation};
use crate::matrix::AdjacencyMatrix;
use crate::methods::Method;
use crate::scoring::{PairSelection, ScoreMatrix};
use crate::tests::{
    assert_scores_close, both_representations, init, random_binary_rows, random_weighted_rows,
};
use crate::transforms::TransformParams;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use smartcore::linalg::basic::matrix::DenseMatrix;

use log::{debug, info};

fn random_edge_probs(n: usize, m: usize, seed: u64) -> DenseMatrix<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..m).map(|_| rng.random_range(0.05..0.95)).collect())
        .collect();
    DenseMatrix::from_2d_vec(&rows).unwrap()
}

fn all_methods() -> Vec<Method> {
    let mut methods = Method::FIXED.to_vec();
    methods.extend([Method::MixedPairs(0.01), Method::MixedPairs(0.3)]);
    methods
}

fn score_every_path(
    matrix: &AdjacencyMatrix,
    method: &Method,
    pairs: &PairSelection,
    params: &TransformParams<'_>,
) -> Vec<(Implementation, ScoreMatrix)> {
    plan_implementations(method, matrix)
        .into_iter()
        .map(|imp| {
            let scores = run_implementation(method, imp, matrix, pairs, params)
                .unwrap_or_else(|e| panic!("{method} via {imp:?}: {e}"));
            (imp, scores)
        })
        .collect()
}

fn check_all_paths_agree(rows: Vec<Vec<f64>>, seed: u64) {
    let (dense, sparse) = both_representations(rows);
    let (n, m) = dense.shape();
    let pi = learn_pi_vector(&dense);
    let probs = random_edge_probs(n, m, seed);

    for back_compat in [false, true] {
        let params = TransformParams {
            pi: &pi,
            num_docs: n,
            back_compat,
            edge_probs: Some(&probs),
        };
        for method in all_methods() {
            let dense_paths = score_every_path(&dense, &method, &PairSelection::All, &params);
            let sparse_paths = score_every_path(&sparse, &method, &PairSelection::All, &params);
            debug!(
                "{}: dense {:?}, sparse {:?}",
                method,
                dense_paths.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
                sparse_paths.iter().map(|(i, _)| *i).collect::<Vec<_>>()
            );

            let (_, reference) = &dense_paths[0];
            for (_, scores) in dense_paths.iter().chain(&sparse_paths) {
                assert_scores_close(reference, scores);
            }
        }
    }
}

#[test]
fn test_binary_paths_agree() {
    init();
    for seed in [1, 2, 3] {
        info!("binary equivalence, seed {}", seed);
        check_all_paths_agree(random_binary_rows(15, 10, 0.3, seed), seed);
    }
}

#[test]
fn test_weighted_paths_agree() {
    init();
    for seed in [4, 5] {
        info!("weighted equivalence, seed {}", seed);
        check_all_paths_agree(random_weighted_rows(12, 9, 0.4, seed), seed);
    }
}

#[test]
fn test_restricted_pairs_agree_with_full() {
    init();
    let (dense, sparse) = both_representations(random_binary_rows(9, 7, 0.4, 21));
    let pi = learn_pi_vector(&dense);
    let probs = random_edge_probs(9, 7, 21);
    let params = TransformParams {
        pi: &pi,
        num_docs: 9,
        back_compat: false,
        edge_probs: Some(&probs),
    };
    let pairs = PairSelection::upper_triangle(9);

    for m in [&dense, &sparse] {
        for method in all_methods() {
            let full = score_every_path(m, &method, &PairSelection::All, &params);
            let restricted = score_every_path(m, &method, &pairs, &params);
            for ((_, f), (_, r)) in full.iter().zip(&restricted) {
                assert_scores_close(r, f);
            }
        }
    }
}

#[test]
fn test_planning_by_representation() {
    let (dense, sparse) = both_representations(random_binary_rows(6, 5, 0.4, 9));
    assert_eq!(
        plan_implementations(&Method::WeightedCorr, &dense),
        vec![Implementation::Transform, Implementation::Terms]
    );
    assert_eq!(
        plan_implementations(&Method::WeightedCorr, &sparse),
        vec![Implementation::Terms, Implementation::Transform]
    );
    assert_eq!(
        plan_implementations(&Method::Cosine, &sparse),
        vec![Implementation::Transform, Implementation::Terms]
    );
    assert_eq!(
        plan_implementations(&Method::Jaccard, &sparse),
        vec![Implementation::GramFormula, Implementation::Terms]
    );
    assert_eq!(
        plan_implementations(&Method::MixedPairs(0.1), &dense),
        vec![Implementation::Terms]
    );

    let weighted = AdjacencyMatrix::from_dense_rows(random_weighted_rows(6, 5, 0.4, 9)).unwrap();
    assert_eq!(
        plan_implementations(&Method::SharedWeight11, &weighted),
        vec![Implementation::Terms]
    );
    assert_eq!(
        plan_implementations(&Method::Hamming, &weighted),
        vec![Implementation::Terms]
    );
}
