//! Public entry point: ingress validation and struct-of-arrays egress.
//!
//! The engine holds the only state that outlives a request: the shared
//! store handle, the declared dimensionality, and the concurrency
//! declaration. Everything else (the normalized query, the vote records,
//! the vector cache) is created per request and dropped on return.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::cancel::CancellationToken;
use crate::error::SearchError;
use crate::pipeline::{self, PipelineOutcome};
use crate::store::{DocId, StoreAdapter, VectorStore};

/// SVVE search engine over an injected vector store.
///
/// Construction is cheap and the engine is reusable across requests; it
/// never mutates shared state on the hot path, so no locking is involved
/// beyond the per-request vector cache.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use svve::{SearchEngine, StoreReply, VectorStore};
///
/// let store: Arc<dyn VectorStore> = Arc::new(
///     |_query: &[f32], _limit: usize| -> Result<StoreReply, String> {
///         Ok(StoreReply {
///             ids: vec![1, 2],
///             scores: vec![0.9, 0.5],
///             vectors: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
///         })
///     },
/// );
///
/// let engine = SearchEngine::new(store, 2);
/// let (ids, scores) = engine.search(&[1.0, 0.0], 2).unwrap();
/// assert_eq!(ids, vec![1, 2]);
/// assert_eq!(scores, vec![0.9, 0.5]);
/// ```
pub struct SearchEngine {
    store: Arc<dyn VectorStore>,
    dim: usize,
    parallel_segments: bool,
    request_count: AtomicU64,
}

impl SearchEngine {
    /// Create an engine for a store of the given dimensionality.
    ///
    /// Segment searches run sequentially; see
    /// [`with_parallel_segments`](Self::with_parallel_segments).
    pub fn new(store: Arc<dyn VectorStore>, dim: usize) -> Self {
        Self {
            store,
            dim,
            parallel_segments: false,
            request_count: AtomicU64::new(0),
        }
    }

    /// Declare the store callback safe for concurrent use, enabling the
    /// rayon fan-out for segment searches. Concurrency is an
    /// optimization, not a contract: output is identical either way.
    pub fn with_parallel_segments(mut self, enabled: bool) -> Self {
        self.parallel_segments = enabled;
        self
    }

    /// Declared embedding dimensionality.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Requests served since construction.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Run a search request: ranked document ids with their scores, both
    /// at most `top_k` long and in the same order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<(Vec<DocId>, Vec<f32>), SearchError> {
        self.search_with_cancel(query, top_k, &CancellationToken::new())
    }

    /// Like [`search`](Self::search), polling `cancel` between stages.
    pub fn search_with_cancel(
        &self,
        query: &[f32],
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<(Vec<DocId>, Vec<f32>), SearchError> {
        let outcome = self.search_detailed(query, top_k, cancel)?;
        Ok((outcome.doc_ids, outcome.scores))
    }

    /// Full request output including per-request stats.
    pub fn search_detailed(
        &self,
        query: &[f32],
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome, SearchError> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.validate_ingress(query)?;

        let adapter = StoreAdapter::new(self.store.as_ref(), self.dim);
        let result = pipeline::execute_search(
            &adapter,
            query,
            top_k,
            self.parallel_segments,
            cancel,
        );

        if let Err(err) = &result {
            warn!(kind = err.kind(), %err, "search request failed");
        }
        result
    }

    fn validate_ingress(&self, query: &[f32]) -> Result<(), SearchError> {
        if let Some(position) = query.iter().position(|v| !v.is_finite()) {
            return Err(SearchError::InvalidInput(format!(
                "query contains a non-finite value at index {}",
                position
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("dim", &self.dim)
            .field("parallel_segments", &self.parallel_segments)
            .field("request_count", &self.request_count.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
