//! Error types for matrix construction, transforms and scoring.

use thiserror::Error;

use crate::dispatch::Discrepancy;

/// Errors that can occur while building matrices or scoring pairs.
#[derive(Debug, Error)]
pub enum AffinityError {
    /// Matrix with no rows or no columns.
    #[error("adjacency matrix is empty: {nrows}x{ncols}")]
    EmptyMatrix { nrows: usize, ncols: usize },

    /// Dense input rows of differing length.
    #[error("ragged rows: row {row} has {actual} entries, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// Negative or non-finite adjacency entry.
    #[error("invalid entry at ({row}, {col}): {value}")]
    InvalidEntry { row: usize, col: usize, value: f64 },

    /// Length or shape of an auxiliary input does not match the matrix.
    #[error("dimension mismatch for {what}: expected {expected}, actual {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Popularity value outside [0, 1] or non-finite.
    #[error("invalid popularity at affiliation {index}: {value}")]
    InvalidPopularity { index: usize, value: f64 },

    /// Input for which the metric has no safe substitution.
    #[error("{method}: degenerate input at affiliation {index} (value {value})")]
    DegenerateInput {
        method: &'static str,
        index: usize,
        value: f64,
    },

    /// Transform that cannot be applied to this representation.
    #[error("{method}: unsupported representation: {reason}")]
    RepresentationMismatch {
        method: &'static str,
        reason: String,
    },

    /// Pair index outside the item range.
    #[error("pair ({a}, {b}) out of range for {n} items")]
    PairOutOfRange { a: usize, b: usize, n: usize },

    /// Required configuration value not supplied.
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// Method name not recognised.
    #[error("unknown scoring method: {0}")]
    UnknownMethod(String),

    /// Parameter outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Two implementations of one method disagree beyond tolerance.
    #[error("implementations disagree: {0}")]
    ImplementationMismatch(Box<Discrepancy>),

    /// Failure reported by the dense matrix backend.
    #[error("matrix backend error: {0}")]
    Matrix(String),
}

impl AffinityError {
    pub fn dimension_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }

    pub fn degenerate(method: &'static str, index: usize, value: f64) -> Self {
        Self::DegenerateInput {
            method,
            index,
            value,
        }
    }
}

pub type Result<T> = std::result::Result<T, AffinityError>;
