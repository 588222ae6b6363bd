//! Vector type and operations

use crate::error::{DocvecError, Result};

/// A dense embedding vector in D-dimensional space.
///
/// The L2 norm is computed once at construction so that ranking a query
/// against every stored record does not recompute record norms.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    data: Vec<f32>,
    norm: f32,
}

impl Vector {
    /// Create a new vector from a Vec<f32>
    pub fn new(data: Vec<f32>) -> Self {
        let norm = data.iter().map(|x| x * x).sum::<f32>().sqrt();
        Self { data, norm }
    }

    /// Get the dimension of the vector
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// The cached L2 norm (magnitude) of the vector
    pub fn norm(&self) -> f32 {
        self.norm
    }

    /// Whether the vector has zero magnitude
    pub fn is_zero(&self) -> bool {
        self.norm == 0.0
    }

    /// Check if this vector has the same dimension as another
    pub fn has_same_dimension(&self, other: &Vector) -> bool {
        self.dimension() == other.dimension()
    }

    /// Reject vectors containing NaN or infinite components.
    pub fn ensure_finite(&self) -> Result<()> {
        match self.data.iter().position(|x| !x.is_finite()) {
            Some(pos) => Err(DocvecError::InvalidVector {
                reason: format!("component {} is not finite ({})", pos, self.data[pos]),
            }),
            None => Ok(()),
        }
    }

    /// Check that the vector has exactly `expected` components.
    pub fn ensure_dimension(&self, expected: usize) -> Result<()> {
        if self.dimension() != expected {
            return Err(DocvecError::DimensionMismatch {
                expected,
                actual: self.dimension(),
            });
        }
        Ok(())
    }
}
