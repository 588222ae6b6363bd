//! Cosine similarity scoring

use crate::error::{DocvecError, Result};
use crate::vector::Vector;

/// Compute dot product of two vectors
pub fn dot_product(v1: &Vector, v2: &Vector) -> f32 {
    v1.as_slice()
        .iter()
        .zip(v2.as_slice().iter())
        .map(|(a, b)| a * b)
        .sum()
}

/// Cosine similarity of two vectors, in `[-1, 1]`.
///
/// Cosine similarity is undefined when either vector has zero magnitude.
/// Such pairs score exactly `0.0`, the same as orthogonal vectors.
pub fn cosine_similarity(v1: &Vector, v2: &Vector) -> f32 {
    if v1.is_zero() || v2.is_zero() {
        return 0.0;
    }

    let similarity = dot_product(v1, v2) / (v1.norm() * v2.norm());

    // Clamp to [-1, 1] to handle floating point errors
    similarity.clamp(-1.0, 1.0)
}

/// Compute cosine distance between two vectors (1 - cosine similarity)
pub fn cosine_distance(v1: &Vector, v2: &Vector) -> f32 {
    1.0 - cosine_similarity(v1, v2)
}

/// Similarity score used for ranking: `1 - cosine_distance`.
pub fn score(query: &Vector, candidate: &Vector) -> Result<f32> {
    if !query.has_same_dimension(candidate) {
        return Err(DocvecError::DimensionMismatch {
            expected: candidate.dimension(),
            actual: query.dimension(),
        });
    }
    Ok(1.0 - cosine_distance(query, candidate))
}
