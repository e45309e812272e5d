//! Pseudo-relevance feedback query construction.
//!
//! Rocchio-style with positive-only weighting: the corrected query is
//! `α·q + (1−α)·c` where `c` is the centroid of the survivor vectors.
//! Keeping `α` on the original query biases refinement toward the user's
//! intent while the centroid supplies context learned from survivors.
//! Survivor vectors come exclusively from the adapter's request cache;
//! PRF never triggers a store call of its own.

use crate::error::SearchError;
use crate::math;
use crate::store::{DocId, DocVector, StoreAdapter};

/// Weight of the original query in the corrected query.
pub const PRF_ALPHA: f32 = 0.7;

/// Arithmetic mean of the given vectors.
///
/// Fails on empty input or any dimension mismatch. Cached vectors are
/// validated at insert, so a mismatch here indicates a corrupted reply.
pub fn centroid(vectors: &[DocVector], dim: usize) -> Result<Vec<f32>, SearchError> {
    if vectors.is_empty() {
        return Err(SearchError::NoSurvivors);
    }

    let mut center = vec![0.0f32; dim];
    for doc in vectors {
        if doc.vector.len() != dim {
            return Err(SearchError::AdapterProtocolViolation {
                field: "vectors",
                detail: format!(
                    "doc_id={} has dimension {}, expected {}",
                    doc.id,
                    doc.vector.len(),
                    dim
                ),
            });
        }
        for (dst, src) in center.iter_mut().zip(doc.vector.iter()) {
            *dst += *src;
        }
    }

    let inv = 1.0f32 / vectors.len() as f32;
    for value in center.iter_mut() {
        *value *= inv;
    }
    Ok(center)
}

/// Build the unit-norm PRF-corrected query from the survivors' centroid.
///
/// Fails with [`SearchError::CacheMiss`] when a survivor vector was never
/// cached, and with [`SearchError::DegeneratePrf`] when the blend has zero
/// norm (which happens when the query roughly opposes the centroid).
pub fn build_prf_query(
    query: &[f32],
    survivors: &[DocId],
    adapter: &StoreAdapter<'_>,
) -> Result<Vec<f32>, SearchError> {
    if survivors.is_empty() {
        return Err(SearchError::NoSurvivors);
    }

    let survivor_vectors = adapter.fetch_vectors(survivors)?;
    let center = centroid(&survivor_vectors, query.len())?;

    let blended: Vec<f32> = query
        .iter()
        .zip(center.iter())
        .map(|(q, c)| PRF_ALPHA * q + (1.0 - PRF_ALPHA) * c)
        .collect();

    math::normalized_copy(&blended).ok_or(SearchError::DegeneratePrf)
}
