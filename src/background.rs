//! Background statistics learned from the adjacency matrix.
//!
//! - `learn_pi_vector`: per-affiliation popularity π_j (fraction of items
//!   holding affiliation j)
//! - `adjust_pi_vector`: drops affiliations whose popularity is 0 or 1, which
//!   carry no signal for most metrics
//! - `affil_counts`: occurrence counts floored at `MIN_AFFIL_COUNT`
//!
//! [`BackgroundStats`] bundles all of the above as an immutable value that
//! callers pass into every scoring call.

use log::{debug, info, warn};

use crate::error::{AffinityError, Result};
use crate::matrix::AdjacencyMatrix;

/// Floor for the effective number of items an affiliation occurs in.
pub const MIN_AFFIL_COUNT: f64 = 2.0;

/// Popularity used in variance denominators when π_j is exactly 0 or 1.
pub const DEGENERATE_PI_SUBSTITUTE: f64 = 0.5;

/// Popularity vector plus the adjusted matrix it was learned from.
#[derive(Debug, Clone)]
pub struct BackgroundStats {
    /// π learned from the raw matrix, one entry per original column.
    pub pi_raw: Vec<f64>,
    /// π restricted to the kept columns.
    pub pi: Vec<f64>,
    /// Raw matrix restricted to the kept columns.
    pub matrix: AdjacencyMatrix,
    /// Original indices of the kept columns.
    pub kept_columns: Vec<usize>,
    /// Number of items the statistics were learned from.
    pub num_docs: usize,
}

impl BackgroundStats {
    /// Learn π from `matrix` and drop the degenerate affiliations.
    pub fn learn(matrix: &AdjacencyMatrix) -> Result<Self> {
        let pi_raw = learn_pi_vector(matrix);
        let kept_columns = informative_columns(&pi_raw, matrix.nrows());
        let (pi, adjusted) = select(&pi_raw, matrix, &kept_columns)?;
        Ok(Self {
            pi_raw,
            pi,
            matrix: adjusted,
            kept_columns,
            num_docs: matrix.nrows(),
        })
    }

    /// Occurrence counts for the kept affiliations.
    pub fn affil_counts(&self) -> Vec<f64> {
        affil_counts(&self.pi, self.num_docs)
    }
}

/// π_j = fraction of rows with a nonzero entry in column j.
pub fn learn_pi_vector(matrix: &AdjacencyMatrix) -> Vec<f64> {
    let n = matrix.nrows() as f64;
    let pi: Vec<f64> = matrix
        .ops()
        .col_nonzero_counts()
        .into_iter()
        .map(|c| c as f64 / n)
        .collect();
    debug!("Learned popularity for {} affiliations", pi.len());
    pi
}

/// Remove affiliations whose popularity is (numerically) 0 or 1.
///
/// Popularities learned from n rows move in steps of 1/n, so a quarter step
/// separates "never"/"always" from the nearest informative value. Returns the
/// adjusted π and a new matrix holding only the kept columns.
pub fn adjust_pi_vector(
    pi_vector: &[f64],
    matrix: &AdjacencyMatrix,
) -> Result<(Vec<f64>, AdjacencyMatrix)> {
    validate_pi_vector(pi_vector, matrix.ncols())?;
    let keep = informative_columns(pi_vector, matrix.nrows());
    select(pi_vector, matrix, &keep)
}

fn informative_columns(pi_vector: &[f64], nrows: usize) -> Vec<usize> {
    let epsilon = 0.25 / nrows as f64;
    pi_vector
        .iter()
        .enumerate()
        .filter(|&(_, &p)| p >= epsilon && p <= 1.0 - epsilon)
        .map(|(j, _)| j)
        .collect()
}

fn select(
    pi_vector: &[f64],
    matrix: &AdjacencyMatrix,
    keep: &[usize],
) -> Result<(Vec<f64>, AdjacencyMatrix)> {
    info!(
        "Keeping {} of {} affiliations",
        keep.len(),
        pi_vector.len()
    );
    if keep.is_empty() {
        warn!("Every affiliation has popularity 0 or 1");
        return Err(AffinityError::EmptyMatrix {
            nrows: matrix.nrows(),
            ncols: 0,
        });
    }
    let pi = keep.iter().map(|&j| pi_vector[j]).collect();
    let adjusted = matrix.ops().select_columns(keep)?;
    Ok((pi, adjusted))
}

/// Effective occurrence count per affiliation: `max(num_docs · π_j, 2)`.
pub fn affil_counts(pi_vector: &[f64], num_docs: usize) -> Vec<f64> {
    pi_vector
        .iter()
        .map(|&p| (num_docs as f64 * p).max(MIN_AFFIL_COUNT))
        .collect()
}

/// π with 0 and 1 replaced by `DEGENERATE_PI_SUBSTITUTE`, for use in
/// `π(1 − π)` denominators.
pub fn pi_for_denominator(pi_vector: &[f64]) -> Vec<f64> {
    pi_vector.iter().map(|&p| substitute_degenerate(p)).collect()
}

#[inline]
pub(crate) fn substitute_degenerate(p: f64) -> f64 {
    if p == 0.0 || p == 1.0 {
        DEGENERATE_PI_SUBSTITUTE
    } else {
        p
    }
}

/// Check that π has one finite entry in [0, 1] per column.
pub fn validate_pi_vector(pi_vector: &[f64], ncols: usize) -> Result<()> {
    if pi_vector.len() != ncols {
        return Err(AffinityError::dimension_mismatch(
            "popularity vector",
            ncols,
            pi_vector.len(),
        ));
    }
    for (index, &value) in pi_vector.iter().enumerate() {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(AffinityError::InvalidPopularity { index, value });
        }
    }
    Ok(())
}
