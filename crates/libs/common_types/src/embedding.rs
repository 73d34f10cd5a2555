use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allowed deviation of a stored embedding's L2 norm from 1.
pub const UNIT_NORM_EPSILON: f32 = 1e-3;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding is empty")]
    Empty,

    #[error("embedding has zero norm")]
    ZeroNorm,

    #[error("embedding contains a non-finite value")]
    NonFinite,

    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding is not unit length (norm {0})")]
    NotUnitLength(f32),
}

/// A face embedding scaled to unit Euclidean length.
///
/// The only ways to obtain one are [`Embedding::normalize`], which divides a raw
/// detector vector by its norm, and [`Embedding::from_unit`], which checks that a
/// previously stored vector is still unit length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn normalize(raw: &[f32]) -> Result<Self, EmbeddingError> {
        if raw.is_empty() {
            return Err(EmbeddingError::Empty);
        }
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::NonFinite);
        }
        // Accumulate in f64 so very large or very small components don't lose the norm.
        let norm = raw
            .iter()
            .map(|&v| f64::from(v) * f64::from(v))
            .sum::<f64>()
            .sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return Err(EmbeddingError::ZeroNorm);
        }
        #[allow(clippy::cast_possible_truncation)]
        let values = raw
            .iter()
            .map(|&v| (f64::from(v) / norm) as f32)
            .collect();
        Ok(Self(values))
    }

    /// Wraps a vector that should already be unit length, e.g. one read back from storage.
    pub fn from_unit(values: Vec<f32>) -> Result<Self, EmbeddingError> {
        if values.is_empty() {
            return Err(EmbeddingError::Empty);
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::NonFinite);
        }
        let norm = l2_norm(&values);
        if (norm - 1.0).abs() > UNIT_NORM_EPSILON {
            return Err(EmbeddingError::NotUnitLength(norm));
        }
        Ok(Self(values))
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }

    pub fn ensure_dimensions(&self, expected: usize) -> Result<(), EmbeddingError> {
        if self.dimensions() == expected {
            Ok(())
        } else {
            Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: self.dimensions(),
            })
        }
    }

    /// Euclidean distance. Refuses to compare vectors of different dimensionality.
    pub fn distance(&self, other: &Self) -> Result<f32, EmbeddingError> {
        other.ensure_dimensions(self.dimensions())?;
        Ok(self
            .0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt())
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = EmbeddingError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::from_unit(values)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.0
    }
}

fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|v| v * v).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(vec![3.0, 4.0], vec![0.6, 0.8])]
    #[case(vec![0.0, 0.0, 2.0], vec![0.0, 0.0, 1.0])]
    #[case(vec![-5.0], vec![-1.0])]
    fn normalizes_to_unit_length(#[case] raw: Vec<f32>, #[case] expected: Vec<f32>) {
        let embedding = Embedding::normalize(&raw).expect("normalizable");
        for (got, want) in embedding.as_slice().iter().zip(&expected) {
            assert!((got - want).abs() < 1e-6, "{got} != {want}");
        }
    }

    #[rstest]
    #[case(vec![], EmbeddingError::Empty)]
    #[case(vec![0.0, 0.0, 0.0], EmbeddingError::ZeroNorm)]
    #[case(vec![1.0, f32::NAN], EmbeddingError::NonFinite)]
    fn rejects_degenerate_input(#[case] raw: Vec<f32>, #[case] expected: EmbeddingError) {
        assert_eq!(Embedding::normalize(&raw), Err(expected));
    }

    #[test]
    fn distance_requires_same_dimensions() {
        let a = Embedding::normalize(&[1.0, 0.0]).expect("valid");
        let b = Embedding::normalize(&[1.0, 0.0, 0.0]).expect("valid");
        assert_eq!(
            a.distance(&b),
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn orthogonal_unit_vectors_are_sqrt2_apart() {
        let a = Embedding::normalize(&[1.0, 0.0]).expect("valid");
        let b = Embedding::normalize(&[0.0, 7.0]).expect("valid");
        let distance = a.distance(&b).expect("same dims");
        assert!((distance - 2f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn from_unit_rejects_unnormalized_vectors() {
        assert!(matches!(
            Embedding::from_unit(vec![3.0, 4.0]),
            Err(EmbeddingError::NotUnitLength(_))
        ));
        assert!(Embedding::from_unit(vec![0.6, 0.8]).is_ok());
    }

    #[test]
    fn deserialization_checks_unit_length() {
        let ok: Result<Embedding, _> = serde_json::from_str("[0.0, 1.0]");
        let bad: Result<Embedding, _> = serde_json::from_str("[0.0, 2.0]");
        assert!(ok.is_ok());
        assert!(bad.is_err());
    }

    proptest! {
        #[test]
        fn normalized_vectors_have_unit_norm(raw in prop::collection::vec(-1.0e3f32..1.0e3, 1..64)) {
            match Embedding::normalize(&raw) {
                Ok(embedding) => {
                    prop_assert_eq!(embedding.dimensions(), raw.len());
                    prop_assert!((l2_norm(embedding.as_slice()) - 1.0).abs() < 1e-4);
                }
                Err(err) => {
                    prop_assert_eq!(err, EmbeddingError::ZeroNorm);
                    prop_assert!(raw.iter().all(|v| *v == 0.0));
                }
            }
        }
    }
}
