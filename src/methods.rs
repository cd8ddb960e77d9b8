//! Catalogue of supported similarity methods.
//!
//! Each [`Method`] variant knows its canonical name, its transform (if a
//! dot-product factorisation exists), its Gram formula (Jaccard, Hamming),
//! whether the transform keeps sparse input sparse, and how to build its
//! per-affiliation terms. The dispatcher matches on the variant; names are only
//! parsed at the boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AffinityError, Result};
use crate::matrix::AdjacencyMatrix;
use crate::scoring::GramFormula;
use crate::terms::{
    ColumnWeightTerms, CosineTerms, HammingTerms, JaccardTerms, MixedPairsTerms, PairTerms,
    PearsonTerms, SharedWeight1100Terms, SharedWeight11Terms, WeightedCorrExpTerms,
    WeightedCorrTerms,
};
use crate::transforms::{
    adamic_adar_transform, cosine_transform, cosine_weights_transform, idf_weights,
    newman_transform, pearson_transform, shared_size_transform, shared_weight11_transform,
    wc_exp_transform, wc_transform, TransformFn, TransformParams,
};

/// Prefix of the per-weight mixed-pairs method names.
pub const MIXED_PAIRS_PREFIX: &str = "mixed_pairs";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Method {
    Jaccard,
    Cosine,
    CosineIdf,
    SharedSize,
    Hamming,
    Pearson,
    SharedWeight11,
    SharedWeight1100,
    AdamicAdar,
    Newman,
    /// Mixture-model log-likelihood ratio with the given mixture weight.
    MixedPairs(f64),
    WeightedCorr,
    /// Weighted correlation against modeled per-entry edge probabilities.
    WeightedCorrExp,
}

impl Method {
    /// Every method except the parameterised `MixedPairs`.
    pub const FIXED: [Method; 12] = [
        Method::Jaccard,
        Method::Cosine,
        Method::CosineIdf,
        Method::SharedSize,
        Method::Hamming,
        Method::Pearson,
        Method::SharedWeight11,
        Method::SharedWeight1100,
        Method::AdamicAdar,
        Method::Newman,
        Method::WeightedCorr,
        Method::WeightedCorrExp,
    ];

    /// Canonical name, also the key in scoring output.
    pub fn name(&self) -> String {
        match self {
            Method::Jaccard => "jaccard".into(),
            Method::Cosine => "cosine".into(),
            Method::CosineIdf => "cosineIDF".into(),
            Method::SharedSize => "shared_size".into(),
            Method::Hamming => "hamming".into(),
            Method::Pearson => "pearson".into(),
            Method::SharedWeight11 => "shared_weight11".into(),
            Method::SharedWeight1100 => "shared_weight1100".into(),
            Method::AdamicAdar => "adamic_adar".into(),
            Method::Newman => "newman".into(),
            Method::MixedPairs(s) => format!("{MIXED_PAIRS_PREFIX}_{s}"),
            Method::WeightedCorr => "weighted_corr".into(),
            Method::WeightedCorrExp => "weighted_corr_exp".into(),
        }
    }

    /// Dot-product transform, if the metric factorises.
    pub fn transform(&self) -> Option<TransformFn> {
        match self {
            Method::Cosine => Some(cosine),
            Method::CosineIdf => Some(cosine_idf),
            Method::SharedSize => Some(shared_size),
            Method::Pearson => Some(pearson),
            Method::SharedWeight11 => Some(shared_weight11),
            Method::AdamicAdar => Some(adamic_adar),
            Method::Newman => Some(newman),
            Method::WeightedCorr => Some(weighted_corr),
            Method::WeightedCorrExp => Some(weighted_corr_exp),
            Method::Jaccard | Method::Hamming | Method::SharedWeight1100 | Method::MixedPairs(_) => {
                None
            }
        }
    }

    /// True when the transform maps sparse input to sparse output.
    pub fn transform_keeps_sparsity(&self) -> bool {
        matches!(
            self,
            Method::Cosine
                | Method::CosineIdf
                | Method::SharedSize
                | Method::SharedWeight11
                | Method::AdamicAdar
                | Method::Newman
        )
    }

    /// True when the transform is only valid for 0/1 entries.
    pub fn transform_needs_binary(&self) -> bool {
        matches!(self, Method::SharedWeight11)
    }

    /// Closed form over the binarized Gram matrix, if any.
    pub fn gram_formula(&self) -> Option<GramFormula> {
        match self {
            Method::Jaccard => Some(GramFormula::Jaccard),
            Method::Hamming => Some(GramFormula::Hamming),
            _ => None,
        }
    }

    /// Per-affiliation terms for the term-based scorer.
    pub fn terms(
        &self,
        matrix: &AdjacencyMatrix,
        params: &TransformParams<'_>,
    ) -> Result<Box<dyn PairTerms>> {
        let terms: Box<dyn PairTerms> = match self {
            Method::Jaccard => Box::new(JaccardTerms::new(matrix)),
            Method::Cosine => Box::new(CosineTerms::new(matrix)),
            Method::CosineIdf => Box::new(CosineTerms::idf(matrix, params.pi)?),
            Method::SharedSize => Box::new(ColumnWeightTerms::shared_size(
                matrix.ncols(),
                params.back_compat,
            )),
            Method::Hamming => Box::new(HammingTerms::new(matrix.ncols(), params.back_compat)),
            Method::Pearson => Box::new(PearsonTerms::new(matrix)),
            Method::SharedWeight11 => Box::new(SharedWeight11Terms::new(params.pi)?),
            Method::SharedWeight1100 => Box::new(SharedWeight1100Terms::new(params.pi)?),
            Method::AdamicAdar => Box::new(ColumnWeightTerms::adamic_adar(
                params.pi,
                params.num_docs,
            )?),
            Method::Newman => Box::new(ColumnWeightTerms::newman(params.pi, params.num_docs)?),
            Method::MixedPairs(s) => Box::new(MixedPairsTerms::new(params.pi, *s)?),
            Method::WeightedCorr => Box::new(WeightedCorrTerms::new(params.pi)?),
            Method::WeightedCorrExp => Box::new(WeightedCorrExpTerms::new(
                matrix,
                params
                    .edge_probs
                    .ok_or(AffinityError::MissingParameter("edge_probs"))?,
            )?),
        };
        Ok(terms)
    }
}

fn cosine(m: &AdjacencyMatrix, _p: &TransformParams<'_>) -> Result<AdjacencyMatrix> {
    cosine_transform(m)
}

fn cosine_idf(m: &AdjacencyMatrix, p: &TransformParams<'_>) -> Result<AdjacencyMatrix> {
    cosine_weights_transform(m, &idf_weights(p.pi)?)
}

fn shared_size(m: &AdjacencyMatrix, p: &TransformParams<'_>) -> Result<AdjacencyMatrix> {
    shared_size_transform(m, p.back_compat)
}

fn pearson(m: &AdjacencyMatrix, _p: &TransformParams<'_>) -> Result<AdjacencyMatrix> {
    pearson_transform(m)
}

fn shared_weight11(m: &AdjacencyMatrix, p: &TransformParams<'_>) -> Result<AdjacencyMatrix> {
    shared_weight11_transform(m, p.pi)
}

fn adamic_adar(m: &AdjacencyMatrix, p: &TransformParams<'_>) -> Result<AdjacencyMatrix> {
    adamic_adar_transform(m, p.pi, p.num_docs)
}

fn newman(m: &AdjacencyMatrix, p: &TransformParams<'_>) -> Result<AdjacencyMatrix> {
    newman_transform(m, p.pi, p.num_docs)
}

fn weighted_corr(m: &AdjacencyMatrix, p: &TransformParams<'_>) -> Result<AdjacencyMatrix> {
    wc_transform(m, p.pi)
}

fn weighted_corr_exp(m: &AdjacencyMatrix, p: &TransformParams<'_>) -> Result<AdjacencyMatrix> {
    let probs = p
        .edge_probs
        .ok_or(AffinityError::MissingParameter("edge_probs"))?;
    wc_exp_transform(m, probs)
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Method {
    type Err = AffinityError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(fixed) = Method::FIXED.iter().find(|m| m.name() == s) {
            return Ok(*fixed);
        }
        s.strip_prefix(MIXED_PAIRS_PREFIX)
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|weight| weight.parse::<f64>().ok())
            .map(Method::MixedPairs)
            .ok_or_else(|| AffinityError::UnknownMethod(s.to_string()))
    }
}

impl TryFrom<String> for Method {
    type Error = AffinityError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.name()
    }
}

/// Parse method names. The bare name `mixed_pairs` expands to one method per
/// entry of `mixed_pairs_sims`.
pub fn parse_methods<S: AsRef<str>>(names: &[S], mixed_pairs_sims: &[f64]) -> Result<Vec<Method>> {
    let mut methods = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        if name == MIXED_PAIRS_PREFIX {
            methods.extend(mixed_pairs_sims.iter().map(|&s| Method::MixedPairs(s)));
        } else {
            methods.push(name.parse()?);
        }
    }
    Ok(methods)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for m in Method::FIXED {
            assert_eq!(m.name().parse::<Method>().unwrap(), m);
        }
        assert_eq!(
            "mixed_pairs_0.01".parse::<Method>().unwrap(),
            Method::MixedPairs(0.01)
        );
        assert!(matches!(
            "euclidean".parse::<Method>(),
            Err(AffinityError::UnknownMethod(_))
        ));
    }

    #[test]
    fn test_parse_methods_expands_mixed_pairs() {
        let methods = parse_methods(&["cosine", "mixed_pairs"], &[0.01, 0.1]).unwrap();
        assert_eq!(
            methods,
            vec![
                Method::Cosine,
                Method::MixedPairs(0.01),
                Method::MixedPairs(0.1)
            ]
        );
    }

    #[test]
    fn test_catalogue_flags() {
        assert!(Method::Cosine.transform().is_some());
        assert!(Method::MixedPairs(0.1).transform().is_none());
        assert!(!Method::WeightedCorr.transform_keeps_sparsity());
        assert!(Method::Newman.transform_keeps_sparsity());
        assert_eq!(Method::Jaccard.gram_formula(), Some(GramFormula::Jaccard));
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&Method::CosineIdf).unwrap();
        assert_eq!(json, "\"cosineIDF\"");
        let back: Method = serde_json::from_str("\"mixed_pairs_0.5\"").unwrap();
        assert_eq!(back, Method::MixedPairs(0.5));
    }
}
