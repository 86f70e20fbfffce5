//! Euclidean distance between feature vectors

use crate::error::{Result, MatchError};
use crate::vector::Vector;

/// Compute Euclidean (L2) distance, checking that the dimensions agree
pub fn distance(v1: &Vector, v2: &Vector) -> Result<f32> {
    if !v1.has_same_dimension(v2) {
        return Err(MatchError::DimensionMismatch {
            expected: v1.dimension(),
            actual: v2.dimension(),
        });
    }
    Ok(euclidean_distance(v1, v2))
}

/// Compute Euclidean (L2) distance between two vectors
pub fn euclidean_distance(v1: &Vector, v2: &Vector) -> f32 {
    v1.as_slice()
        .iter()
        .zip(v2.as_slice().iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f32>()
        .sqrt()
}
