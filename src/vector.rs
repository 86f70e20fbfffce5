//! Fixed-length feature vectors

use crate::error::{Result, MatchError};
use serde::{Deserialize, Serialize};

/// A feature vector produced by the extractor for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    /// Create a new vector from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// The all-zero vector of the given dimension, used when extraction fails
    pub fn zeros(dimension: usize) -> Self {
        Self {
            data: vec![0.0; dimension],
        }
    }

    /// Get the dimension of the vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Check if this vector has the same dimension as another
    pub fn has_same_dimension(&self, other: &Vector) -> bool {
        self.dimension() == other.dimension()
    }

    /// True when every component is exactly zero
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|x| *x == 0.0)
    }

    /// Fit raw extractor output to `dimension`.
    ///
    /// Longer output keeps its leading `dimension` values. Shorter output, or
    /// a non-finite value among the kept ones, is rejected.
    pub fn fit_to(mut self, dimension: usize) -> Result<Vector> {
        if self.data.len() < dimension {
            return Err(MatchError::DimensionMismatch {
                expected: dimension,
                actual: self.data.len(),
            });
        }
        self.data.truncate(dimension);
        self.ensure_finite()?;
        Ok(self)
    }

    /// Reject NaN and infinite components.
    pub fn ensure_finite(&self) -> Result<()> {
        match self.data.iter().find(|x| !x.is_finite()) {
            Some(bad) => Err(MatchError::InvalidVector {
                reason: format!("Non-finite component: {}", bad),
            }),
            None => Ok(()),
        }
    }

    /// Parse a vector from a comma-separated string of finite floats
    pub fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(MatchError::InvalidVector {
                reason: "Empty vector".to_string(),
            });
        }
        let data: Result<Vec<f32>> = trimmed
            .split(',')
            .map(|x| {
                x.trim()
                    .parse::<f32>()
                    .map_err(|_| MatchError::InvalidVector {
                        reason: format!("Invalid float: {}", x),
                    })
            })
            .collect();
        let vector = Vector::new(data?);
        vector.ensure_finite()?;
        Ok(vector)
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Vector::new(data)
    }
}
