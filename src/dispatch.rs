//! # Dispatcher
//!
//! Maps each requested [`Method`] to one of its implementations, runs it and
//! assembles the results into a [`ScoringOutput`] keyed by method name.
//!
//! Path selection, per method:
//! - dense input: transform, else Gram formula, else terms;
//! - sparse input: the transform only when it keeps the matrix sparse,
//!   otherwise Gram formula or terms (the densifying transform is still
//!   available for cross-checks);
//! - transforms that are only valid on 0/1 entries (shared-weight-11) and the
//!   Hamming formula are skipped for weighted input.
//!
//! With `run_all_implementations` every available implementation runs and is
//! compared against the primary one; a disagreement beyond tolerance stops
//! the call with [`AffinityError::ImplementationMismatch`].

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use approx::relative_eq;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;

use log::{debug, error, info, trace, warn};

use crate::background::{validate_pi_vector, BackgroundStats};
use crate::error::{AffinityError, Result};
use crate::matrix::AdjacencyMatrix;
use crate::methods::{parse_methods, Method};
use crate::scoring::{dot_product_scores, gram_formula_scores, PairSelection, ScoreMatrix};
use crate::terms::score_from_terms;
use crate::transforms::TransformParams;

/// Relative (and near-zero absolute) tolerance for cross-implementation checks.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Mixture weights used when `mixed_pairs` is requested by bare name.
pub const DEFAULT_MIXED_PAIRS_SIMS: [f64; 1] = [0.1];

/// Options consumed by [`score_pairs`]. Passed explicitly on every call.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Legacy formulas: raw shared counts for shared size and Hamming.
    pub back_compat: bool,
    /// Item count used for affiliation occurrence counts; defaults to n.
    pub num_docs: Option<usize>,
    /// Mixture weights for `mixed_pairs`.
    pub mixed_pairs_sims: Vec<f64>,
    /// Log per-method elapsed time at info level.
    pub print_timing: bool,
    /// Run every implementation of each method and compare them.
    pub run_all_implementations: bool,
    /// Modeled edge probabilities (n × m) for `weighted_corr_exp`.
    pub edge_probs: Option<DenseMatrix<f64>>,
    pub tolerance: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            back_compat: false,
            num_docs: None,
            mixed_pairs_sims: DEFAULT_MIXED_PAIRS_SIMS.to_vec(),
            print_timing: false,
            run_all_implementations: false,
            edge_probs: None,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl ScoringConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_back_compat(mut self, back_compat: bool) -> Self {
        debug!("Setting back_compat: {}", back_compat);
        self.back_compat = back_compat;
        self
    }

    pub fn with_num_docs(mut self, num_docs: usize) -> Self {
        debug!("Setting num_docs: {}", num_docs);
        self.num_docs = Some(num_docs);
        self
    }

    pub fn with_mixed_pairs_sims(mut self, sims: Vec<f64>) -> Self {
        debug!("Setting mixed_pairs_sims: {:?}", sims);
        self.mixed_pairs_sims = sims;
        self
    }

    pub fn with_timing(mut self, print_timing: bool) -> Self {
        self.print_timing = print_timing;
        self
    }

    /// Cross-check every implementation of each method.
    pub fn with_all_implementations(mut self, run_all: bool) -> Self {
        debug!("Setting run_all_implementations: {}", run_all);
        self.run_all_implementations = run_all;
        self
    }

    pub fn with_edge_probs(mut self, edge_probs: DenseMatrix<f64>) -> Self {
        self.edge_probs = Some(edge_probs);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// The ways a method can be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Implementation {
    Transform,
    GramFormula,
    Terms,
}

/// Result of comparing two implementations of one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub method: String,
    pub reference: Implementation,
    pub candidate: Implementation,
    /// Entries compared.
    pub compared: usize,
    /// Entries outside tolerance, including entries missing from the candidate.
    pub mismatches: usize,
    pub max_abs_diff: f64,
    /// Pair with the largest difference.
    pub worst_pair: Option<(usize, usize)>,
    pub tolerance: f64,
}

impl Discrepancy {
    pub fn agrees(&self) -> bool {
        self.mismatches == 0
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:?} vs {:?}: {} of {} entries differ (max |Δ| = {:.3e} at {:?}, tol {:.1e})",
            self.method,
            self.reference,
            self.candidate,
            self.mismatches,
            self.compared,
            self.max_abs_diff,
            self.worst_pair,
            self.tolerance
        )
    }
}

/// Compare two score structures entry by entry.
///
/// Pair lists are compared positionally; otherwise every entry of the
/// reference is looked up in the candidate.
pub fn cross_check(
    method: &str,
    reference: (Implementation, &ScoreMatrix),
    candidate: (Implementation, &ScoreMatrix),
    tolerance: f64,
) -> Discrepancy {
    let (ref_impl, ref_scores) = reference;
    let (cand_impl, cand_scores) = candidate;

    let pairs: Vec<((usize, usize), f64, Option<f64>)> = match (ref_scores, cand_scores) {
        (ScoreMatrix::Pairs(a), ScoreMatrix::Pairs(b)) if a.len() == b.len() => a
            .iter()
            .zip(b)
            .map(|(x, y)| {
                let same = (x.a, x.b) == (y.a, y.b);
                ((x.a, x.b), x.score, same.then_some(y.score))
            })
            .collect(),
        _ => ref_scores
            .entries()
            .into_iter()
            .map(|(a, b, s)| ((a, b), s, cand_scores.get(a, b)))
            .collect(),
    };

    let mut report = Discrepancy {
        method: method.to_string(),
        reference: ref_impl,
        candidate: cand_impl,
        compared: pairs.len(),
        mismatches: 0,
        max_abs_diff: 0.0,
        worst_pair: None,
        tolerance,
    };
    for (pair, expected, actual) in pairs {
        let Some(actual) = actual else {
            report.mismatches += 1;
            continue;
        };
        let diff = (expected - actual).abs();
        if diff > report.max_abs_diff || report.worst_pair.is_none() {
            report.max_abs_diff = diff;
            report.worst_pair = Some(pair);
        }
        if !relative_eq!(expected, actual, epsilon = tolerance, max_relative = tolerance) {
            report.mismatches += 1;
        }
    }
    report
}

/// Scores, timings and validation reports of one [`score_pairs`] call.
#[derive(Debug, Clone, Default)]
pub struct ScoringOutput {
    pub scores: BTreeMap<String, ScoreMatrix>,
    /// Elapsed time per method, validation runs included.
    pub timings: BTreeMap<String, Duration>,
    /// One entry per extra implementation run under `run_all_implementations`.
    pub checks: Vec<Discrepancy>,
}

impl ScoringOutput {
    pub fn get(&self, method: &str) -> Option<&ScoreMatrix> {
        self.scores.get(method)
    }
}

/// Implementations that are valid for `method` on `matrix`, primary first.
pub fn plan_implementations(method: &Method, matrix: &AdjacencyMatrix) -> Vec<Implementation> {
    let binary = matrix.is_binary();
    let transform_ok =
        method.transform().is_some() && (binary || !method.transform_needs_binary());
    let formula_ok = match method.gram_formula() {
        Some(crate::scoring::GramFormula::Hamming) => binary,
        Some(_) => true,
        None => false,
    };
    if method.transform().is_some() && !transform_ok {
        warn!(
            "{}: transform needs 0/1 entries, scoring weighted input from terms",
            method
        );
    }

    let mut plan = Vec::with_capacity(3);
    let transform_first = transform_ok && (!matrix.is_sparse() || method.transform_keeps_sparsity());
    if transform_first {
        plan.push(Implementation::Transform);
    }
    if formula_ok {
        plan.push(Implementation::GramFormula);
    }
    plan.push(Implementation::Terms);
    if transform_ok && !transform_first {
        trace!("{}: sparse input, densifying transform kept for cross-checks only", method);
        plan.push(Implementation::Transform);
    }
    plan
}

/// Run one implementation of `method`.
pub fn run_implementation(
    method: &Method,
    implementation: Implementation,
    matrix: &AdjacencyMatrix,
    pairs: &PairSelection,
    params: &TransformParams<'_>,
) -> Result<ScoreMatrix> {
    match implementation {
        Implementation::Transform => {
            let transform = method.transform().ok_or_else(|| {
                AffinityError::InvalidParameter(format!("{method} has no transform"))
            })?;
            let transformed = transform(matrix, params)?;
            dot_product_scores(&transformed, pairs)
        }
        Implementation::GramFormula => {
            let formula = method.gram_formula().ok_or_else(|| {
                AffinityError::InvalidParameter(format!("{method} has no Gram formula"))
            })?;
            gram_formula_scores(matrix, pairs, formula, params.back_compat)
        }
        Implementation::Terms => {
            let terms = method.terms(matrix, params)?;
            score_from_terms(matrix, terms.as_ref(), pairs)
        }
    }
}

/// Score `pairs` of `matrix` under every method in `which_methods`.
pub fn score_pairs(
    pairs: &PairSelection,
    matrix: &AdjacencyMatrix,
    which_methods: &[Method],
    pi_vector: &[f64],
    config: &ScoringConfig,
) -> Result<ScoringOutput> {
    let (n, m) = matrix.shape();
    validate_pi_vector(pi_vector, m)?;
    pairs.validate(n)?;

    let params = TransformParams {
        pi: pi_vector,
        num_docs: config.num_docs.unwrap_or(n),
        back_compat: config.back_compat,
        edge_probs: config.edge_probs.as_ref(),
    };

    info!(
        "Scoring {} methods over {} items x {} affiliations ({}, {})",
        which_methods.len(),
        n,
        m,
        if matrix.is_sparse() { "sparse" } else { "dense" },
        match pairs {
            PairSelection::All => "all pairs".to_string(),
            PairSelection::Pairs(p) => format!("{} pairs", p.len()),
        }
    );

    let mut output = ScoringOutput::default();
    for method in which_methods {
        let name = method.name();
        let start = Instant::now();
        let plan = plan_implementations(method, matrix);
        debug!("{}: implementations {:?}", name, plan);

        let primary = plan[0];
        let scores = run_implementation(method, primary, matrix, pairs, &params)?;

        if config.run_all_implementations {
            for &other in &plan[1..] {
                let candidate = run_implementation(method, other, matrix, pairs, &params)?;
                let report = cross_check(
                    &name,
                    (primary, &scores),
                    (other, &candidate),
                    config.tolerance,
                );
                if !report.agrees() {
                    error!("{}", report);
                    return Err(AffinityError::ImplementationMismatch(Box::new(report)));
                }
                debug!("{}", report);
                output.checks.push(report);
            }
        }

        let elapsed = start.elapsed();
        if config.print_timing {
            info!("{}: {:.3?} via {:?}", name, elapsed, primary);
        }
        output.timings.insert(name.clone(), elapsed);
        output.scores.insert(name, scores);
    }
    Ok(output)
}

/// Background statistics plus configuration, for repeated scoring calls on the
/// same adjusted matrix.
#[derive(Debug, Clone)]
pub struct PairScorer {
    stats: BackgroundStats,
    config: ScoringConfig,
}

impl PairScorer {
    /// Learn π from `matrix`, drop degenerate affiliations and keep the result.
    pub fn learn(matrix: &AdjacencyMatrix, config: ScoringConfig) -> Result<Self> {
        info!(
            "Learning background statistics for {}x{} matrix",
            matrix.nrows(),
            matrix.ncols()
        );
        Ok(Self::from_stats(BackgroundStats::learn(matrix)?, config))
    }

    pub fn from_stats(stats: BackgroundStats, config: ScoringConfig) -> Self {
        Self { stats, config }
    }

    pub fn stats(&self) -> &BackgroundStats {
        &self.stats
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score the adjusted matrix. `num_docs` defaults to the number of items
    /// the statistics were learned from.
    pub fn score(&self, pairs: &PairSelection, methods: &[Method]) -> Result<ScoringOutput> {
        let mut config = self.config.clone();
        config.num_docs = config.num_docs.or(Some(self.stats.num_docs));
        score_pairs(pairs, &self.stats.matrix, methods, &self.stats.pi, &config)
    }

    /// Like [`PairScorer::score`] with methods given by name.
    pub fn score_named<S: AsRef<str>>(
        &self,
        pairs: &PairSelection,
        names: &[S],
    ) -> Result<ScoringOutput> {
        let methods = parse_methods(names, &self.config.mixed_pairs_sims)?;
        self.score(pairs, &methods)
    }
}
