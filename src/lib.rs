//! # affinity
//!
//! Pairwise similarity between the rows of an item × affiliation adjacency
//! matrix.
//!
//! Most metrics factor as "transform the matrix, then take row inner
//! products", so a full n × n score matrix costs one Gram product on the
//! original representation (dense via smartcore, sparse via sprs). Metrics
//! without such a factorisation are scored from per-affiliation terms over the
//! nonzero union of each pair, and Jaccard/Hamming come from closed-form
//! functions of the binarized Gram matrix.
//!
//! ```ignore
//! use affinity::{AdjacencyMatrix, PairScorer, PairSelection, ScoringConfig};
//!
//! let m = AdjacencyMatrix::from_triplets(3, 4, &[(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0)])?;
//! let scorer = PairScorer::learn(&m, ScoringConfig::default())?;
//! let out = scorer.score_named(&PairSelection::All, &["cosine", "mixed_pairs"])?;
//! ```

pub mod background;
pub mod dispatch;
pub mod error;
pub mod matrix;
pub mod methods;
pub mod scoring;
pub mod terms;
pub mod transforms;

#[cfg(test)]
mod tests;

pub use background::{adjust_pi_vector, learn_pi_vector, BackgroundStats};
pub use dispatch::{
    score_pairs, Discrepancy, Implementation, PairScorer, ScoringConfig, ScoringOutput,
};
pub use error::{AffinityError, Result};
pub use matrix::{AdjacencyMatrix, MatrixOps};
pub use methods::{parse_methods, Method};
pub use scoring::{PairScore, PairSelection, ScoreMatrix};
