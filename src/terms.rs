//! # Term-based scoring
//!
//! The fallback (and cross-check) path for metrics without a valid
//! transform. A metric is described by a per-affiliation contribution
//! `term(a, b, j, x, y)`; the score of a pair is the sum of its terms over all
//! m affiliations, optionally normalised by `finish`.
//!
//! Only the union of the two rows' nonzero entries is visited. Affiliations
//! where both rows are zero contribute `zero_term`, whose sum over all columns
//! is supplied up front by `zero_total`, so
//!
//! ```text
//! score(a, b) = finish(zero_total(a, b) + Σ_{j ∈ nz(a) ∪ nz(b)} (term − zero_term))
//! ```
//!
//! Cost is about O(n² · avg_nnz) for all pairs, against one matrix multiply for
//! the transform path. The matrix is never densified.

use rayon::prelude::*;
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;

use log::{debug, trace};

use crate::background::{affil_counts, substitute_degenerate, validate_pi_vector};
use crate::error::{AffinityError, Result};
use crate::matrix::AdjacencyMatrix;
use crate::scoring::{PairScore, PairSelection, ScoreMatrix};
use crate::transforms::{check_edge_probs, idf_weights};

/// Per-affiliation contribution of a metric.
pub trait PairTerms: Send + Sync {
    fn name(&self) -> &'static str;

    /// Contribution of affiliation `j` where row `a` holds `x` and row `b`
    /// holds `y`.
    fn term(&self, a: usize, b: usize, j: usize, x: f64, y: f64) -> f64;

    /// Contribution of affiliation `j` when both rows are zero there.
    fn zero_term(&self, _a: usize, _b: usize, _j: usize) -> f64 {
        0.0
    }

    /// Sum of `zero_term` over every affiliation.
    fn zero_total(&self, _a: usize, _b: usize) -> f64 {
        0.0
    }

    /// Map the summed terms to the final score.
    fn finish(&self, _a: usize, _b: usize, sum: f64) -> f64 {
        sum
    }
}

/// Score `pairs` by summing `terms` over each pair's nonzero union.
pub fn score_from_terms(
    matrix: &AdjacencyMatrix,
    terms: &dyn PairTerms,
    pairs: &PairSelection,
) -> Result<ScoreMatrix> {
    let n = matrix.nrows();
    pairs.validate(n)?;
    debug!(
        "Scoring {} from terms on {} matrix",
        terms.name(),
        if matrix.is_sparse() { "sparse" } else { "dense" }
    );

    let pair_score = |a: usize, b: usize| -> f64 {
        let mut sum = terms.zero_total(a, b);
        matrix.ops().for_each_union(a, b, &mut |j, x, y| {
            sum += terms.term(a, b, j, x, y) - terms.zero_term(a, b, j);
        });
        terms.finish(a, b, sum)
    };

    match pairs {
        PairSelection::All => {
            let rows: Vec<Vec<f64>> = (0..n)
                .into_par_iter()
                .map(|a| (0..n).map(|b| pair_score(a, b)).collect())
                .collect();
            trace!("{}: scored {} pairs", terms.name(), n * n);
            let dense = DenseMatrix::from_2d_vec(&rows)
                .map_err(|e| AffinityError::Matrix(e.to_string()))?;
            Ok(ScoreMatrix::Dense(dense))
        }
        PairSelection::Pairs(list) => Ok(ScoreMatrix::Pairs(
            list.par_iter()
                .map(|&(a, b)| PairScore {
                    a,
                    b,
                    score: pair_score(a, b),
                })
                .collect(),
        )),
    }
}

#[inline]
fn both(x: f64, y: f64) -> bool {
    x != 0.0 && y != 0.0
}

/// Weighted correlation: `(x − π_j)(y − π_j) / (π_j(1 − π_j)·m)`.
pub struct WeightedCorrTerms {
    pi: Vec<f64>,
    denominators: Vec<f64>,
    zero_total: f64,
}

impl WeightedCorrTerms {
    pub fn new(pi_vector: &[f64]) -> Result<Self> {
        let m = pi_vector.len();
        validate_pi_vector(pi_vector, m)?;
        let denominators: Vec<f64> = pi_vector
            .iter()
            .map(|&p| {
                let q = substitute_degenerate(p);
                q * (1.0 - q) * m as f64
            })
            .collect();
        let zero_total = pi_vector
            .iter()
            .zip(&denominators)
            .map(|(p, d)| p * p / d)
            .sum();
        Ok(Self {
            pi: pi_vector.to_vec(),
            denominators,
            zero_total,
        })
    }
}

impl PairTerms for WeightedCorrTerms {
    fn name(&self) -> &'static str {
        "weighted_corr"
    }

    fn term(&self, _a: usize, _b: usize, j: usize, x: f64, y: f64) -> f64 {
        (x - self.pi[j]) * (y - self.pi[j]) / self.denominators[j]
    }

    fn zero_term(&self, _a: usize, _b: usize, j: usize) -> f64 {
        self.pi[j] * self.pi[j] / self.denominators[j]
    }

    fn zero_total(&self, _a: usize, _b: usize) -> f64 {
        self.zero_total
    }
}

/// Weighted correlation against modeled per-entry probabilities.
///
/// The 0/0 contribution depends on both rows, so `zero_total` costs O(m) per
/// pair.
pub struct WeightedCorrExpTerms {
    probs: Vec<Vec<f64>>,
    scales: Vec<Vec<f64>>,
}

impl WeightedCorrExpTerms {
    pub fn new(matrix: &AdjacencyMatrix, edge_probs: &DenseMatrix<f64>) -> Result<Self> {
        let (n, m) = matrix.shape();
        check_edge_probs(edge_probs, n, m)?;
        let probs: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..m).map(|j| *edge_probs.get((i, j))).collect())
            .collect();
        let scales = probs
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&p| {
                        let q = substitute_degenerate(p);
                        (q * (1.0 - q) * m as f64).sqrt()
                    })
                    .collect()
            })
            .collect();
        Ok(Self { probs, scales })
    }
}

impl PairTerms for WeightedCorrExpTerms {
    fn name(&self) -> &'static str {
        "weighted_corr_exp"
    }

    fn term(&self, a: usize, b: usize, j: usize, x: f64, y: f64) -> f64 {
        ((x - self.probs[a][j]) / self.scales[a][j]) * ((y - self.probs[b][j]) / self.scales[b][j])
    }

    fn zero_term(&self, a: usize, b: usize, j: usize) -> f64 {
        self.term(a, b, j, 0.0, 0.0)
    }

    fn zero_total(&self, a: usize, b: usize) -> f64 {
        (0..self.probs[a].len())
            .map(|j| self.zero_term(a, b, j))
            .sum()
    }
}

/// `x · y · w_j`: shared size, Newman and Adamic–Adar.
pub struct ColumnWeightTerms {
    name: &'static str,
    weights: Vec<f64>,
}

impl ColumnWeightTerms {
    /// Shared affiliations, divided by m unless `back_compat`.
    pub fn shared_size(ncols: usize, back_compat: bool) -> Self {
        let w = if back_compat { 1.0 } else { 1.0 / ncols as f64 };
        Self {
            name: "shared_size",
            weights: vec![w; ncols],
        }
    }

    /// Each shared affiliation weighted `1 / (c_j − 1)`.
    pub fn newman(pi_vector: &[f64], num_docs: usize) -> Result<Self> {
        validate_pi_vector(pi_vector, pi_vector.len())?;
        Ok(Self {
            name: "newman",
            weights: affil_counts(pi_vector, num_docs)
                .into_iter()
                .map(|c| 1.0 / (c - 1.0))
                .collect(),
        })
    }

    /// Each shared affiliation weighted `1 / ln(c_j)`.
    pub fn adamic_adar(pi_vector: &[f64], num_docs: usize) -> Result<Self> {
        validate_pi_vector(pi_vector, pi_vector.len())?;
        Ok(Self {
            name: "adamic_adar",
            weights: affil_counts(pi_vector, num_docs)
                .into_iter()
                .map(|c| 1.0 / c.ln())
                .collect(),
        })
    }
}

impl PairTerms for ColumnWeightTerms {
    fn name(&self) -> &'static str {
        self.name
    }

    fn term(&self, _a: usize, _b: usize, j: usize, x: f64, y: f64) -> f64 {
        x * y * self.weights[j]
    }
}

/// `ln(1/π_j)` for every affiliation both items hold (0/1 semantics, so
/// weighted entries count as present).
pub struct SharedWeight11Terms {
    weights: Vec<f64>,
}

impl SharedWeight11Terms {
    pub fn new(pi_vector: &[f64]) -> Result<Self> {
        validate_pi_vector(pi_vector, pi_vector.len())?;
        let weights = pi_vector
            .iter()
            .enumerate()
            .map(|(j, &p)| {
                if p <= 0.0 {
                    Err(AffinityError::degenerate("shared_weight11", j, p))
                } else {
                    Ok((1.0 / p).ln())
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { weights })
    }
}

impl PairTerms for SharedWeight11Terms {
    fn name(&self) -> &'static str {
        "shared_weight11"
    }

    fn term(&self, _a: usize, _b: usize, j: usize, x: f64, y: f64) -> f64 {
        if both(x, y) {
            self.weights[j]
        } else {
            0.0
        }
    }
}

/// `ln(1/π_j)` for shared presences plus `ln(1/(1 − π_j))` for shared
/// absences. Requires every π_j in (0, 1).
pub struct SharedWeight1100Terms {
    present: Vec<f64>,
    absent: Vec<f64>,
    absent_total: f64,
}

impl SharedWeight1100Terms {
    pub fn new(pi_vector: &[f64]) -> Result<Self> {
        check_open_unit("shared_weight1100", pi_vector)?;
        let present: Vec<f64> = pi_vector.iter().map(|&p| (1.0 / p).ln()).collect();
        let absent: Vec<f64> = pi_vector.iter().map(|&p| (1.0 / (1.0 - p)).ln()).collect();
        let absent_total = absent.iter().sum();
        Ok(Self {
            present,
            absent,
            absent_total,
        })
    }
}

impl PairTerms for SharedWeight1100Terms {
    fn name(&self) -> &'static str {
        "shared_weight1100"
    }

    fn term(&self, _a: usize, _b: usize, j: usize, x: f64, y: f64) -> f64 {
        match (x != 0.0, y != 0.0) {
            (true, true) => self.present[j],
            (false, false) => self.absent[j],
            _ => 0.0,
        }
    }

    fn zero_term(&self, _a: usize, _b: usize, j: usize) -> f64 {
        self.absent[j]
    }

    fn zero_total(&self, _a: usize, _b: usize) -> f64 {
        self.absent_total
    }
}

/// Log-likelihood ratio of a pair under a mixture model where, with
/// probability `s`, the second item copies the first's affiliation and
/// otherwise draws independently from π.
///
/// - 1/1: `ln((s·π + (1 − s)·π²) / π²)`
/// - 1/0 or 0/1: `ln(1 − s)`
/// - 0/0: `ln((s·(1 − π) + (1 − s)·(1 − π)²) / (1 − π)²)`
pub struct MixedPairsTerms {
    mixture_weight: f64,
    both_present: Vec<f64>,
    one_present: f64,
    both_absent: Vec<f64>,
    absent_total: f64,
}

impl MixedPairsTerms {
    pub fn new(pi_vector: &[f64], mixture_weight: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&mixture_weight) {
            return Err(AffinityError::InvalidParameter(format!(
                "mixed_pairs weight must lie in [0, 1), got {mixture_weight}"
            )));
        }
        check_open_unit("mixed_pairs", pi_vector)?;
        let s = mixture_weight;
        let both_present: Vec<f64> = pi_vector
            .iter()
            .map(|&p| ((s * p + (1.0 - s) * p * p) / (p * p)).ln())
            .collect();
        let both_absent: Vec<f64> = pi_vector
            .iter()
            .map(|&p| {
                let q = 1.0 - p;
                ((s * q + (1.0 - s) * q * q) / (q * q)).ln()
            })
            .collect();
        let absent_total = both_absent.iter().sum();
        Ok(Self {
            mixture_weight,
            both_present,
            one_present: (1.0 - s).ln(),
            both_absent,
            absent_total,
        })
    }

    pub fn mixture_weight(&self) -> f64 {
        self.mixture_weight
    }
}

impl PairTerms for MixedPairsTerms {
    fn name(&self) -> &'static str {
        "mixed_pairs"
    }

    fn term(&self, _a: usize, _b: usize, j: usize, x: f64, y: f64) -> f64 {
        match (x != 0.0, y != 0.0) {
            (true, true) => self.both_present[j],
            (false, false) => self.both_absent[j],
            _ => self.one_present,
        }
    }

    fn zero_term(&self, _a: usize, _b: usize, j: usize) -> f64 {
        self.both_absent[j]
    }

    fn zero_total(&self, _a: usize, _b: usize) -> f64 {
        self.absent_total
    }
}

/// Cosine of (optionally column-weighted) rows.
pub struct CosineTerms {
    name: &'static str,
    sq_weights: Option<Vec<f64>>,
    inverse_norms: Vec<f64>,
}

impl CosineTerms {
    pub fn new(matrix: &AdjacencyMatrix) -> Self {
        Self {
            name: "cosine",
            sq_weights: None,
            inverse_norms: inverse_norms(matrix.ops().row_sq_sums()),
        }
    }

    /// Cosine over rows weighted by `ln(1/π_j)`.
    pub fn idf(matrix: &AdjacencyMatrix, pi_vector: &[f64]) -> Result<Self> {
        validate_pi_vector(pi_vector, matrix.ncols())?;
        let weights = idf_weights(pi_vector)?;
        let weighted = matrix.ops().scale_columns(&weights)?;
        Ok(Self {
            name: "cosineIDF",
            sq_weights: Some(weights.iter().map(|w| w * w).collect()),
            inverse_norms: inverse_norms(weighted.ops().row_sq_sums()),
        })
    }
}

fn inverse_norms(sq_sums: Vec<f64>) -> Vec<f64> {
    sq_sums
        .into_iter()
        .map(|s| if s > 0.0 { 1.0 / s.sqrt() } else { 0.0 })
        .collect()
}

impl PairTerms for CosineTerms {
    fn name(&self) -> &'static str {
        self.name
    }

    fn term(&self, _a: usize, _b: usize, j: usize, x: f64, y: f64) -> f64 {
        match &self.sq_weights {
            Some(w) => x * y * w[j],
            None => x * y,
        }
    }

    fn finish(&self, a: usize, b: usize, sum: f64) -> f64 {
        sum * self.inverse_norms[a] * self.inverse_norms[b]
    }
}

/// Pearson correlation from the raw dot product:
/// `(x·y − m·μ_a·μ_b) / (m·σ_a·σ_b)`, 0 when either row is constant.
pub struct PearsonTerms {
    ncols: f64,
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl PearsonTerms {
    pub fn new(matrix: &AdjacencyMatrix) -> Self {
        let (n, m) = matrix.shape();
        let (means, stds) = (0..n)
            .map(|i| sparse_row_moments(&matrix.ops().row_entries(i), m))
            .unzip();
        Self {
            ncols: m as f64,
            means,
            stds,
        }
    }
}

/// Mean and population deviation of a row given only its nonzero entries.
fn sparse_row_moments(entries: &[(usize, f64)], ncols: usize) -> (f64, f64) {
    let values: Vec<f64> = entries
        .iter()
        .map(|&(_, v)| v)
        .filter(|&v| v != 0.0)
        .collect();
    let m = ncols as f64;
    let mean = values.iter().sum::<f64>() / m;
    let constant = values.is_empty()
        || (values.len() == ncols && values.iter().all(|&v| v == values[0]));
    if constant {
        return (mean, 0.0);
    }
    let zeros = (ncols - values.len()) as f64;
    let var = (values.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>()
        + zeros * mean * mean)
        / m;
    (mean, var.sqrt())
}

impl PairTerms for PearsonTerms {
    fn name(&self) -> &'static str {
        "pearson"
    }

    fn term(&self, _a: usize, _b: usize, _j: usize, x: f64, y: f64) -> f64 {
        x * y
    }

    fn finish(&self, a: usize, b: usize, sum: f64) -> f64 {
        let (sa, sb) = (self.stds[a], self.stds[b]);
        if sa == 0.0 || sb == 0.0 {
            return 0.0;
        }
        (sum - self.ncols * self.means[a] * self.means[b]) / (self.ncols * sa * sb)
    }
}

/// Shared affiliations over the union of affiliations.
pub struct JaccardTerms {
    counts: Vec<usize>,
}

impl JaccardTerms {
    pub fn new(matrix: &AdjacencyMatrix) -> Self {
        Self {
            counts: matrix.ops().row_nonzero_counts(),
        }
    }
}

impl PairTerms for JaccardTerms {
    fn name(&self) -> &'static str {
        "jaccard"
    }

    fn term(&self, _a: usize, _b: usize, _j: usize, x: f64, y: f64) -> f64 {
        if both(x, y) {
            1.0
        } else {
            0.0
        }
    }

    fn finish(&self, a: usize, b: usize, sum: f64) -> f64 {
        let union = (self.counts[a] + self.counts[b]) as f64 - sum;
        if union > 0.0 {
            sum / union
        } else {
            0.0
        }
    }
}

/// Positions where both items hold the same value, divided by m unless
/// `back_compat`.
pub struct HammingTerms {
    ncols: usize,
    back_compat: bool,
}

impl HammingTerms {
    pub fn new(ncols: usize, back_compat: bool) -> Self {
        Self { ncols, back_compat }
    }
}

impl PairTerms for HammingTerms {
    fn name(&self) -> &'static str {
        "hamming"
    }

    fn term(&self, _a: usize, _b: usize, _j: usize, x: f64, y: f64) -> f64 {
        if x == y {
            1.0
        } else {
            0.0
        }
    }

    fn zero_term(&self, _a: usize, _b: usize, _j: usize) -> f64 {
        1.0
    }

    fn zero_total(&self, _a: usize, _b: usize) -> f64 {
        self.ncols as f64
    }

    fn finish(&self, _a: usize, _b: usize, sum: f64) -> f64 {
        if self.back_compat {
            sum
        } else {
            sum / self.ncols as f64
        }
    }
}

fn check_open_unit(method: &'static str, pi_vector: &[f64]) -> Result<()> {
    validate_pi_vector(pi_vector, pi_vector.len())?;
    match pi_vector
        .iter()
        .enumerate()
        .find(|&(_, &p)| p <= 0.0 || p >= 1.0)
    {
        Some((j, &p)) => Err(AffinityError::degenerate(method, j, p)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sparse_row_moments_match_dense() {
        let row = [0.0, 2.0, 0.0, 1.0];
        let entries = vec![(1, 2.0), (3, 1.0)];
        let (mean, std) = sparse_row_moments(&entries, 4);
        let (dmean, dstd) = crate::transforms::row_moments(&row);
        assert_relative_eq!(mean, dmean, epsilon = 1e-15);
        assert_relative_eq!(std, dstd, epsilon = 1e-15);
    }

    #[test]
    fn test_mixed_pairs_rejects_bad_weight() {
        assert!(MixedPairsTerms::new(&[0.5], 1.0).is_err());
        assert!(MixedPairsTerms::new(&[0.5], -0.1).is_err());
        assert!(MixedPairsTerms::new(&[1.0], 0.1).is_err());
    }

    #[test]
    fn test_shared_weight1100_counts_shared_absences() {
        let m = AdjacencyMatrix::from_triplets(2, 3, &[(0, 0, 1.0), (1, 0, 1.0)]).unwrap();
        let pi = [0.5, 0.25, 0.75];
        let terms = SharedWeight1100Terms::new(&pi).unwrap();
        let scores = score_from_terms(&m, &terms, &PairSelection::Pairs(vec![(0, 1)])).unwrap();
        let expected = 2f64.ln() + (1.0f64 / 0.75).ln() + 4f64.ln();
        assert_relative_eq!(scores.get(0, 1).unwrap(), expected, epsilon = 1e-12);
    }
}
