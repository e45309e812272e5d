//! Vector-store capability and the validating adapter in front of it.
//!
//! The pipeline never talks to a vector database directly. The host
//! supplies a [`VectorStore`] value (any `Fn(&[f32], usize)` closure
//! qualifies) and the per-request [`StoreAdapter`] enforces the reply
//! contract:
//!
//! - `ids`, `scores`, and `vectors` have equal length, at most `limit`;
//! - every vector has the declared dimensionality;
//! - every vector has a non-zero finite norm.
//!
//! Each validated `(id, vector)` pair is kept in a request-scoped cache so
//! the PRF stage can reference survivor vectors without a second trip to
//! the store. Violations are terminal; the adapter never retries.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::SearchError;
use crate::math;

/// Opaque document identifier. Never interpreted by the pipeline.
pub type DocId = u32;

/// A `(doc_id, score)` pair; higher score means more similar.
pub type ScoredHit = (DocId, f32);

/// A document id with its embedding, as cached from a store reply.
#[derive(Debug, Clone, PartialEq)]
pub struct DocVector {
    pub id: DocId,
    pub vector: Vec<f32>,
}

/// Raw reply from the backing store, struct-of-arrays.
///
/// `ids` need not be unique across calls; duplicates are merged downstream
/// by the vote aggregator or the refinement merge.
#[derive(Debug, Clone, Default)]
pub struct StoreReply {
    pub ids: Vec<DocId>,
    pub scores: Vec<f32>,
    pub vectors: Vec<Vec<f32>>,
}

/// The sole I/O capability the pipeline depends on.
///
/// The host's callback failures surface as plain strings; the adapter
/// wraps them into
/// [`AdapterProtocolViolation`](SearchError::AdapterProtocolViolation).
///
/// A blanket impl lets a plain closure serve as the backend:
///
/// ```
/// use svve::{StoreReply, VectorStore};
///
/// let store = |_query: &[f32], _limit: usize| -> Result<StoreReply, String> {
///     Ok(StoreReply {
///         ids: vec![1],
///         scores: vec![0.9],
///         vectors: vec![vec![1.0, 0.0]],
///     })
/// };
/// let reply = store.raw_search(&[1.0, 0.0], 10).unwrap();
/// assert_eq!(reply.ids, vec![1]);
/// ```
pub trait VectorStore: Send + Sync {
    /// Query the store for up to `limit` nearest documents.
    fn raw_search(&self, query: &[f32], limit: usize) -> Result<StoreReply, String>;
}

impl<F> VectorStore for F
where
    F: Fn(&[f32], usize) -> Result<StoreReply, String> + Send + Sync,
{
    fn raw_search(&self, query: &[f32], limit: usize) -> Result<StoreReply, String> {
        self(query, limit)
    }
}

/// Request-scoped validating wrapper around a [`VectorStore`].
///
/// Owns the per-request vector cache exclusively; the cache dies with the
/// adapter at request completion. The interior mutex exists only because
/// segment searches may run on a rayon pool; there is no cross-request
/// sharing.
pub struct StoreAdapter<'a> {
    dim: usize,
    store: &'a dyn VectorStore,
    vector_cache: Mutex<HashMap<DocId, Vec<f32>>>,
}

impl<'a> StoreAdapter<'a> {
    pub fn new(store: &'a dyn VectorStore, dim: usize) -> Self {
        Self {
            dim,
            store,
            vector_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Declared embedding dimensionality. Immutable after construction.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Search the store and validate its reply.
    ///
    /// The validated hits are returned sorted by descending score (ties by
    /// ascending id) so downstream segment ranks are deterministic even
    /// when the backend's own ordering is not. A `limit` of zero
    /// short-circuits to an empty hit list without invoking the backend.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredHit>, SearchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let reply = self.store.raw_search(query, limit).map_err(|detail| {
            SearchError::AdapterProtocolViolation {
                field: "callback",
                detail,
            }
        })?;

        self.validate_and_cache(reply, limit)
    }

    fn validate_and_cache(
        &self,
        reply: StoreReply,
        limit: usize,
    ) -> Result<Vec<ScoredHit>, SearchError> {
        let StoreReply {
            ids,
            scores,
            vectors,
        } = reply;

        if scores.len() != ids.len() {
            return Err(SearchError::AdapterProtocolViolation {
                field: "scores",
                detail: format!("ids={} scores={}", ids.len(), scores.len()),
            });
        }
        if vectors.len() != ids.len() {
            return Err(SearchError::AdapterProtocolViolation {
                field: "vectors",
                detail: format!("ids={} vectors={}", ids.len(), vectors.len()),
            });
        }
        if ids.len() > limit {
            return Err(SearchError::AdapterProtocolViolation {
                field: "ids",
                detail: format!("returned {} hits for limit {}", ids.len(), limit),
            });
        }

        let mut cache = lock_cache(&self.vector_cache);
        let mut hits = Vec::with_capacity(ids.len());
        for ((doc_id, score), mut vector) in ids.into_iter().zip(scores).zip(vectors) {
            if vector.len() != self.dim {
                return Err(SearchError::AdapterProtocolViolation {
                    field: "vectors",
                    detail: format!(
                        "doc_id={} has dimension {}, expected {}",
                        doc_id,
                        vector.len(),
                        self.dim
                    ),
                });
            }
            if !math::normalize_in_place(&mut vector) {
                return Err(SearchError::AdapterProtocolViolation {
                    field: "vectors",
                    detail: format!("doc_id={} has zero or non-finite norm", doc_id),
                });
            }

            // Most recent write wins on repeated ids.
            cache.insert(doc_id, vector);
            hits.push((doc_id, score));
        }
        drop(cache);

        math::sort_desc_take(&mut hits, limit);
        Ok(hits)
    }

    /// Return cached vectors for `ids`, in the order given.
    ///
    /// Never calls the backing store: PRF may only reference documents
    /// that appeared in some earlier search of this request.
    pub fn fetch_vectors(&self, ids: &[DocId]) -> Result<Vec<DocVector>, SearchError> {
        let cache = lock_cache(&self.vector_cache);
        ids.iter()
            .map(|&id| {
                cache
                    .get(&id)
                    .map(|vector| DocVector {
                        id,
                        vector: vector.clone(),
                    })
                    .ok_or(SearchError::CacheMiss { id })
            })
            .collect()
    }
}

fn lock_cache<'m>(
    cache: &'m Mutex<HashMap<DocId, Vec<f32>>>,
) -> std::sync::MutexGuard<'m, HashMap<DocId, Vec<f32>>> {
    // Cache writes cannot panic mid-update, so a poisoned lock still holds
    // consistent data.
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
