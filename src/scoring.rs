//! # Dot-product scorer
//!
//! Turns a transformed matrix `T` into pairwise scores `T · Tᵗ`:
//!
//! - `PairSelection::All`: one Gram product. Sparse input uses the sprs CSR
//!   product and returns a sparse score matrix (absent entries are 0); dense
//!   input computes row dot products in parallel over rows.
//! - `PairSelection::Pairs`: only the requested entries, never the full n×n.
//!
//! Full and restricted results agree within floating-point tolerance; the
//! sparse Gram product may sum in a different order than the per-pair merge.
//!
//! Jaccard and Hamming have no transform, but both are closed-form functions
//! of the binarized Gram matrix and the per-row nonzero counts; see
//! [`gram_formula_scores`].

use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use sprs::CsMat;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use log::{debug, trace};

use crate::error::{AffinityError, Result};
use crate::matrix::{AdjacencyMatrix, MatrixOps};

/// Which item pairs to score.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PairSelection {
    /// Every ordered pair: an n × n score matrix.
    #[default]
    All,
    /// Only these (a, b) pairs, in this order.
    Pairs(Vec<(usize, usize)>),
}

impl PairSelection {
    /// Every unordered pair (a < b) listed explicitly.
    pub fn upper_triangle(n: usize) -> Self {
        PairSelection::Pairs(
            (0..n)
                .flat_map(|a| (a + 1..n).map(move |b| (a, b)))
                .collect(),
        )
    }

    /// Check every pair index against `n` items.
    pub fn validate(&self, n: usize) -> Result<()> {
        if let PairSelection::Pairs(pairs) = self {
            if let Some(&(a, b)) = pairs.iter().find(|&&(a, b)| a >= n || b >= n) {
                return Err(AffinityError::PairOutOfRange { a, b, n });
            }
        }
        Ok(())
    }
}

/// Score of a single item pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    pub a: usize,
    pub b: usize,
    pub score: f64,
}

/// Pairwise scores for one method.
#[derive(Debug, Clone)]
pub enum ScoreMatrix {
    /// Full n × n matrix.
    Dense(DenseMatrix<f64>),
    /// Full n × n matrix in CSR form; absent entries are 0.
    Sparse(CsMat<f64>),
    /// Restricted pair list, in request order.
    Pairs(Vec<PairScore>),
}

impl ScoreMatrix {
    /// Score for (a, b). `None` when the pair is out of range or was not
    /// requested. Pair lists are searched linearly and match either order.
    pub fn get(&self, a: usize, b: usize) -> Option<f64> {
        match self {
            ScoreMatrix::Dense(m) => {
                let (n, _) = m.shape();
                (a < n && b < n).then(|| *m.get((a, b)))
            }
            ScoreMatrix::Sparse(m) => {
                (a < m.rows() && b < m.cols()).then(|| m.get(a, b).copied().unwrap_or(0.0))
            }
            ScoreMatrix::Pairs(scores) => scores
                .iter()
                .find(|p| (p.a, p.b) == (a, b) || (p.a, p.b) == (b, a))
                .map(|p| p.score),
        }
    }

    /// Every (a, b, score) this structure holds: all n² entries for full
    /// matrices, the requested pairs otherwise.
    pub fn entries(&self) -> Vec<(usize, usize, f64)> {
        match self {
            ScoreMatrix::Dense(m) => {
                let (n, _) = m.shape();
                (0..n)
                    .flat_map(|a| (0..n).map(move |b| (a, b)))
                    .map(|(a, b)| (a, b, *m.get((a, b))))
                    .collect()
            }
            ScoreMatrix::Sparse(m) => {
                let n = m.rows();
                (0..n)
                    .flat_map(|a| (0..n).map(move |b| (a, b)))
                    .map(|(a, b)| (a, b, m.get(a, b).copied().unwrap_or(0.0)))
                    .collect()
            }
            ScoreMatrix::Pairs(scores) => scores.iter().map(|p| (p.a, p.b, p.score)).collect(),
        }
    }

    /// Number of items for full matrices, number of pairs for pair lists.
    pub fn len(&self) -> usize {
        match self {
            ScoreMatrix::Dense(m) => m.shape().0,
            ScoreMatrix::Sparse(m) => m.rows(),
            ScoreMatrix::Pairs(scores) => scores.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        !matches!(self, ScoreMatrix::Pairs(_))
    }
}

/// Gram-product capability, implemented once per storage type.
pub trait DotScorer: Sync {
    /// `M · Mᵗ` over all rows.
    fn gram(&self) -> Result<ScoreMatrix>;

    /// Inner product of rows `a` and `b`.
    fn pair_dot(&self, a: usize, b: usize) -> f64;
}

impl AdjacencyMatrix {
    /// The representation-specific Gram implementation.
    pub fn scorer(&self) -> &dyn DotScorer {
        match self {
            AdjacencyMatrix::Dense(m) => m,
            AdjacencyMatrix::Sparse(m) => m,
        }
    }
}

impl DotScorer for DenseMatrix<f64> {
    fn gram(&self) -> Result<ScoreMatrix> {
        let rows = self.dense_rows();
        let n = rows.len();
        trace!("Dense Gram product over {} rows", n);
        let gram: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|a| (0..n).map(|b| dot(&rows[a], &rows[b])).collect())
            .collect();
        let dense =
            DenseMatrix::from_2d_vec(&gram).map_err(|e| AffinityError::Matrix(e.to_string()))?;
        Ok(ScoreMatrix::Dense(dense))
    }

    fn pair_dot(&self, a: usize, b: usize) -> f64 {
        let (_, m) = self.dims();
        (0..m).map(|j| self.value(a, j) * self.value(b, j)).sum()
    }
}

impl DotScorer for CsMat<f64> {
    fn gram(&self) -> Result<ScoreMatrix> {
        let transposed: CsMat<f64> = self.transpose_view().to_csr();
        let gram: CsMat<f64> = self * &transposed;
        trace!("Sparse Gram product with {} non-zeros", gram.nnz());
        Ok(ScoreMatrix::Sparse(gram))
    }

    fn pair_dot(&self, a: usize, b: usize) -> f64 {
        let mut sum = 0.0;
        self.for_each_union(a, b, &mut |_, x, y| sum += x * y);
        sum
    }
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Row inner products of an already transformed matrix.
pub fn dot_product_scores(matrix: &AdjacencyMatrix, pairs: &PairSelection) -> Result<ScoreMatrix> {
    let n = matrix.nrows();
    pairs.validate(n)?;
    match pairs {
        PairSelection::All => {
            debug!(
                "Computing full {}x{} Gram matrix ({})",
                n,
                n,
                if matrix.is_sparse() { "sparse" } else { "dense" }
            );
            matrix.scorer().gram()
        }
        PairSelection::Pairs(list) => {
            debug!("Computing {} restricted dot products", list.len());
            let scorer = matrix.scorer();
            let scores = list
                .par_iter()
                .map(|&(a, b)| PairScore {
                    a,
                    b,
                    score: scorer.pair_dot(a, b),
                })
                .collect();
            Ok(ScoreMatrix::Pairs(scores))
        }
    }
}

/// Metrics computed from the binarized Gram matrix and row nonzero counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GramFormula {
    /// `shared / (|a| + |b| − shared)`, 0 when both rows are empty.
    Jaccard,
    /// Agreeing positions `m − |a| − |b| + 2·shared`, divided by m unless in
    /// back-compat mode. Only meaningful for 0/1 input.
    Hamming,
}

impl GramFormula {
    pub fn apply(
        &self,
        shared: f64,
        count_a: usize,
        count_b: usize,
        ncols: usize,
        back_compat: bool,
    ) -> f64 {
        let (ca, cb) = (count_a as f64, count_b as f64);
        match self {
            GramFormula::Jaccard => {
                let union = ca + cb - shared;
                if union > 0.0 {
                    shared / union
                } else {
                    0.0
                }
            }
            GramFormula::Hamming => {
                let agree = ncols as f64 - ca - cb + 2.0 * shared;
                if back_compat {
                    agree
                } else {
                    agree / ncols as f64
                }
            }
        }
    }
}

/// Jaccard or Hamming through one Gram product of the binarized matrix.
pub fn gram_formula_scores(
    matrix: &AdjacencyMatrix,
    pairs: &PairSelection,
    formula: GramFormula,
    back_compat: bool,
) -> Result<ScoreMatrix> {
    let (n, m) = matrix.shape();
    let binary = matrix.ops().binarize()?;
    let counts = matrix.ops().row_nonzero_counts();
    let shared = dot_product_scores(&binary, pairs)?;

    match shared {
        ScoreMatrix::Pairs(list) => Ok(ScoreMatrix::Pairs(
            list.into_iter()
                .map(|p| PairScore {
                    score: formula.apply(p.score, counts[p.a], counts[p.b], m, back_compat),
                    ..p
                })
                .collect(),
        )),
        full => {
            let rows: Vec<Vec<f64>> = (0..n)
                .into_par_iter()
                .map(|a| {
                    (0..n)
                        .map(|b| {
                            let s = full.get(a, b).unwrap_or(0.0);
                            formula.apply(s, counts[a], counts[b], m, back_compat)
                        })
                        .collect()
                })
                .collect();
            let dense = DenseMatrix::from_2d_vec(&rows)
                .map_err(|e| AffinityError::Matrix(e.to_string()))?;
            Ok(ScoreMatrix::Dense(dense))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upper_triangle() {
        assert_eq!(
            PairSelection::upper_triangle(3),
            PairSelection::Pairs(vec![(0, 1), (0, 2), (1, 2)])
        );
    }

    #[test]
    fn test_pairs_out_of_range() {
        let m = AdjacencyMatrix::from_dense_rows(vec![vec![1.0], vec![0.0]]).unwrap();
        let err = dot_product_scores(&m, &PairSelection::Pairs(vec![(0, 2)])).unwrap_err();
        assert!(matches!(err, AffinityError::PairOutOfRange { a: 0, b: 2, n: 2 }));
    }

    #[test]
    fn test_jaccard_formula_empty_rows() {
        assert_eq!(GramFormula::Jaccard.apply(0.0, 0, 0, 4, false), 0.0);
        assert_eq!(GramFormula::Jaccard.apply(1.0, 2, 2, 4, false), 1.0 / 3.0);
    }
}
