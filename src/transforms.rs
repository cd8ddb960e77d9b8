//! # Transforms for dot-product scoring
//!
//! Each function maps an adjacency matrix (plus background statistics) to a
//! new matrix `T` such that the row inner product `T_a · T_b` equals the
//! target similarity of items a and b. The dot-product scorer then turns any
//! of these into a full score matrix with one Gram product.
//!
//! | transform | rule | sparsity |
//! |---|---|---|
//! | `wc_transform` | `(x − π_j) / sqrt(π_j(1 − π_j)·m)` | dense |
//! | `wc_exp_transform` | `(x_ij − p_ij) / sqrt(p_ij(1 − p_ij)·m)` | dense |
//! | `newman_transform` | column ÷ `sqrt(c_j − 1)` | kept |
//! | `adamic_adar_transform` | column ÷ `sqrt(ln c_j)` | kept |
//! | `shared_size_transform` | ÷ `sqrt(m)` (identity in back-compat mode) | kept |
//! | `shared_weight11_transform` | column × `sqrt(ln(1/π_j))` | kept |
//! | `cosine_transform` | row ÷ L2 norm | kept |
//! | `cosine_weights_transform` | column × w_j, then cosine | kept |
//! | `pearson_transform` | row standardised, centred, ÷ `sqrt(m)` | dense |
//!
//! with `c_j = max(num_docs·π_j, 2)`. Popularities of exactly 0 or 1 are
//! replaced by 0.5 in variance denominators, so constant columns contribute a
//! zero deviation instead of NaN.
//!
//! None of the transforms mutates its input.

use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;

use log::{debug, trace};

use crate::background::{affil_counts, substitute_degenerate, validate_pi_vector};
use crate::error::{AffinityError, Result};
use crate::matrix::AdjacencyMatrix;

/// Parameters a transform may read. Built once per scoring call.
#[derive(Debug, Clone, Copy)]
pub struct TransformParams<'a> {
    pub pi: &'a [f64],
    pub num_docs: usize,
    pub back_compat: bool,
    /// Modeled per-entry edge probabilities (n × m), for `wc_exp_transform`.
    pub edge_probs: Option<&'a DenseMatrix<f64>>,
}

/// Uniform signature the method catalogue stores per metric.
pub type TransformFn = fn(&AdjacencyMatrix, &TransformParams<'_>) -> Result<AdjacencyMatrix>;

/// Weighted correlation: standardise each column by its popularity.
///
/// The extra `sqrt(m)` in the denominator makes the dot product a mean over
/// affiliations instead of a sum. Always returns a dense matrix.
pub fn wc_transform(matrix: &AdjacencyMatrix, pi_vector: &[f64]) -> Result<AdjacencyMatrix> {
    let (_, m) = matrix.shape();
    validate_pi_vector(pi_vector, m)?;
    let denominators: Vec<f64> = pi_vector
        .iter()
        .map(|&p| {
            let q = substitute_degenerate(p);
            (q * (1.0 - q) * m as f64).sqrt()
        })
        .collect();

    debug!("wc_transform: densifying {}x{}", matrix.nrows(), m);
    let rows = matrix
        .ops()
        .dense_rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .zip(pi_vector.iter().zip(&denominators))
                .map(|(&x, (&p, &d))| (x - p) / d)
                .collect()
        })
        .collect();
    AdjacencyMatrix::from_transformed_rows(rows)
}

/// Weighted correlation against a per-entry model of edge probabilities.
///
/// Same standardisation as [`wc_transform`] with `edge_probs[(i, j)]` in place
/// of the column marginal; 0/1 probabilities are substituted entrywise.
pub fn wc_exp_transform(
    matrix: &AdjacencyMatrix,
    edge_probs: &DenseMatrix<f64>,
) -> Result<AdjacencyMatrix> {
    let (n, m) = matrix.shape();
    check_edge_probs(edge_probs, n, m)?;

    let rows = matrix
        .ops()
        .dense_rows()
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            row.iter()
                .enumerate()
                .map(|(j, &x)| {
                    let p = *edge_probs.get((i, j));
                    let q = substitute_degenerate(p);
                    (x - p) / (q * (1.0 - q) * m as f64).sqrt()
                })
                .collect()
        })
        .collect();
    AdjacencyMatrix::from_transformed_rows(rows)
}

/// Shape and range checks for a modeled edge-probability matrix.
pub(crate) fn check_edge_probs(edge_probs: &DenseMatrix<f64>, n: usize, m: usize) -> Result<()> {
    let (pn, pm) = edge_probs.shape();
    if pn != n {
        return Err(AffinityError::dimension_mismatch("edge probability rows", n, pn));
    }
    if pm != m {
        return Err(AffinityError::dimension_mismatch("edge probability columns", m, pm));
    }
    for i in 0..n {
        for j in 0..m {
            let p = *edge_probs.get((i, j));
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(AffinityError::InvalidPopularity { index: j, value: p });
            }
        }
    }
    Ok(())
}

/// Newman's collaboration weighting: each shared affiliation counts
/// `1 / (c_j − 1)`.
pub fn newman_transform(
    matrix: &AdjacencyMatrix,
    pi_vector: &[f64],
    num_docs: usize,
) -> Result<AdjacencyMatrix> {
    validate_pi_vector(pi_vector, matrix.ncols())?;
    let weights: Vec<f64> = affil_counts(pi_vector, num_docs)
        .into_iter()
        .map(|c| 1.0 / (c - 1.0).sqrt())
        .collect();
    matrix.ops().scale_columns(&weights)
}

/// Adamic–Adar: each shared affiliation counts `1 / ln(c_j)`.
pub fn adamic_adar_transform(
    matrix: &AdjacencyMatrix,
    pi_vector: &[f64],
    num_docs: usize,
) -> Result<AdjacencyMatrix> {
    validate_pi_vector(pi_vector, matrix.ncols())?;
    let weights: Vec<f64> = affil_counts(pi_vector, num_docs)
        .into_iter()
        .map(|c| 1.0 / c.ln().sqrt())
        .collect();
    matrix.ops().scale_columns(&weights)
}

/// Shared size: number of shared affiliations, divided by m unless
/// `back_compat` asks for the raw count.
pub fn shared_size_transform(
    matrix: &AdjacencyMatrix,
    back_compat: bool,
) -> Result<AdjacencyMatrix> {
    if back_compat {
        return Ok(matrix.clone());
    }
    let m = matrix.ncols();
    let weights = vec![1.0 / (m as f64).sqrt(); m];
    matrix.ops().scale_columns(&weights)
}

/// Shared weight over 1/1 affiliations: each shared affiliation counts
/// `ln(1/π_j)`.
///
/// The column scaling gives `x·y·ln(1/π_j)`, which only matches the metric
/// for 0/1 entries. Sparse weighted input is rejected rather than silently
/// scored differently; use the term-based scorer for it. Columns with
/// `π_j = 0` have no finite weight and are rejected as well.
pub fn shared_weight11_transform(
    matrix: &AdjacencyMatrix,
    pi_vector: &[f64],
) -> Result<AdjacencyMatrix> {
    validate_pi_vector(pi_vector, matrix.ncols())?;
    if matrix.is_sparse() && !matrix.is_binary() {
        return Err(AffinityError::RepresentationMismatch {
            method: "shared_weight11",
            reason: "column scaling is only valid for 0/1 entries on sparse input".to_string(),
        });
    }
    let weights = log_inverse_weights("shared_weight11", pi_vector)?
        .into_iter()
        .map(f64::sqrt)
        .collect::<Vec<_>>();
    matrix.ops().scale_columns(&weights)
}

/// Inverse document frequency weights `ln(1/π_j)`, used for cosine-IDF.
pub fn idf_weights(pi_vector: &[f64]) -> Result<Vec<f64>> {
    log_inverse_weights("cosineIDF", pi_vector)
}

fn log_inverse_weights(method: &'static str, pi_vector: &[f64]) -> Result<Vec<f64>> {
    pi_vector
        .iter()
        .enumerate()
        .map(|(j, &p)| {
            if p <= 0.0 {
                Err(AffinityError::degenerate(method, j, p))
            } else {
                Ok((1.0 / p).ln())
            }
        })
        .collect()
}

/// Scale every row to unit L2 norm. All-zero rows stay all-zero.
pub fn cosine_transform(matrix: &AdjacencyMatrix) -> Result<AdjacencyMatrix> {
    let inverse_norms: Vec<f64> = matrix
        .ops()
        .row_sq_sums()
        .into_iter()
        .map(|s| if s > 0.0 { 1.0 / s.sqrt() } else { 0.0 })
        .collect();
    trace!(
        "cosine_transform: {} zero rows",
        inverse_norms.iter().filter(|&&w| w == 0.0).count()
    );
    matrix.ops().scale_rows(&inverse_norms)
}

/// Weight the columns, then apply [`cosine_transform`].
pub fn cosine_weights_transform(
    matrix: &AdjacencyMatrix,
    weights: &[f64],
) -> Result<AdjacencyMatrix> {
    let weighted = matrix.ops().scale_columns(weights)?;
    cosine_transform(&weighted)
}

/// Pearson correlation between rows.
///
/// Rows are scaled to unit population standard deviation, centred on their
/// mean and divided by `sqrt(m)`. Constant rows (zero variance) become zero
/// rows. Always returns a dense matrix.
pub fn pearson_transform(matrix: &AdjacencyMatrix) -> Result<AdjacencyMatrix> {
    let m = matrix.ncols() as f64;
    debug!("pearson_transform: densifying {}x{}", matrix.nrows(), m);
    let rows = matrix
        .ops()
        .dense_rows()
        .into_iter()
        .map(|row| {
            let (mean, std) = row_moments(&row);
            if std == 0.0 {
                return vec![0.0; row.len()];
            }
            row.iter()
                .map(|&x| (x / std - mean / std) / m.sqrt())
                .collect()
        })
        .collect();
    AdjacencyMatrix::from_transformed_rows(rows)
}

/// Mean and population standard deviation of a dense row; the deviation is
/// exactly 0 for constant rows.
pub(crate) fn row_moments(row: &[f64]) -> (f64, f64) {
    let m = row.len() as f64;
    let mean = row.iter().sum::<f64>() / m;
    if row.iter().all(|&x| x == row[0]) {
        return (mean, 0.0);
    }
    let var = row.iter().map(|&x| (x - mean) * (x - mean)).sum::<f64>() / m;
    (mean, var.sqrt())
}
