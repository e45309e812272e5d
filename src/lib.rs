//! # svve
//!
//! Segmented Vector Voting & Expansion: dense-vector Top-K retrieval
//! orchestrated on top of an already-populated external vector store,
//! without building any auxiliary index.
//!
//! One request flows through five stages:
//! 1. Segment the normalized query into coordinate sub-projections.
//! 2. Retrieve candidates per segment through the injected store callback.
//! 3. Merge per-segment votes and select the surviving documents.
//! 4. Build a pseudo-relevance-feedback corrected query from the
//!    survivors' centroid.
//! 5. Re-search and re-rank iteratively until two consecutive stable
//!    rounds.
//!
//! The host supplies the store as a [`VectorStore`] value (a closure
//! works) and calls [`SearchEngine::search`]; everything in between is
//! synchronous, CPU-bound, and deterministic under the documented
//! tie-break rules.

pub mod cancel;
pub mod engine;
pub mod error;
pub mod math;
pub mod pipeline;
pub mod prf;
pub mod refine;
pub mod segment;
pub mod store;
pub mod voting;

pub use cancel::CancellationToken;
pub use engine::SearchEngine;
pub use error::SearchError;
pub use pipeline::{PipelineOutcome, SearchStats};
pub use store::{DocId, DocVector, ScoredHit, StoreReply, VectorStore};
pub use voting::{VoteClass, VoteRecord};
