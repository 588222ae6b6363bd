//! Brute-force exact top-k ranking by cosine similarity

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::distance;
use crate::error::{DocvecError, Result};
use crate::storage::{RecordId, VectorRecord};
use crate::vector::Vector;

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub id: RecordId,
    pub text: String,
    pub score: f32,
}

/// Score every record against `query` and return the best `k`.
///
/// Results are ordered by descending score; equal scores are ordered by
/// ascending id. The output has `min(k, records.len())` entries.
pub fn top_k(query: &Vector, k: usize, records: &[VectorRecord]) -> Result<Vec<RankedResult>> {
    if k == 0 {
        return Err(DocvecError::InvalidArgument(
            "k must be a positive integer".to_string(),
        ));
    }

    let mut scored: Vec<(usize, f32)> = records
        .par_iter()
        .enumerate()
        .map(|(pos, record)| distance::score(query, &record.vector).map(|s| (pos, s)))
        .collect::<Result<Vec<_>>>()?;

    scored.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then_with(|| records[a.0].id.cmp(&records[b.0].id))
    });
    scored.truncate(k);

    Ok(scored
        .into_iter()
        .map(|(pos, score)| {
            let record = &records[pos];
            RankedResult {
                id: record.id,
                text: record.text.clone(),
                score,
            }
        })
        .collect())
}
