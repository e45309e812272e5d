//! Iterative re-search and re-ranking with stability-based early exit.
//!
//! Each round searches the store with the PRF-corrected query at a
//! doubling (capped) limit, folds the new hits into a running
//! best-score-per-id map, and compares the resulting Top-K against the
//! previous round. Two consecutive stable rounds end the loop early;
//! exhausting the round budget returns the current Top-K rather than an
//! error, since convergence is a quality heuristic, not a correctness
//! requirement.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::SearchError;
use crate::math;
use crate::store::{DocId, ScoredHit, StoreAdapter};

/// Maximum refinement rounds per request.
pub const MAX_REFINEMENT_ROUNDS: usize = 8;

/// Jaccard similarity of successive Top-K id sets required for a round to
/// count as stable.
pub const STABLE_JACCARD_THRESHOLD: f32 = 0.95;

/// Maximum relative score-sum improvement for a round to count as stable.
pub const STABLE_IMPROVEMENT_THRESHOLD: f32 = 0.005;

/// Consecutive stable rounds required for early termination.
pub const REQUIRED_STABLE_ROUNDS: usize = 2;

/// Exponent cap for the per-round limit schedule.
const LIMIT_DOUBLING_CAP: u32 = 3;

const SCORE_SUM_EPSILON: f32 = 1e-12;

/// Top-K state after one refinement round.
#[derive(Debug, Clone)]
struct RoundState {
    top_ids: Vec<DocId>,
    score_sum: f32,
}

/// Result of the refinement loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RefineOutcome {
    /// Final Top-K, descending score, ids tie-broken ascending. May be
    /// shorter than `top_k` when the store never surfaced enough distinct
    /// documents; that is part of the error-free path.
    pub hits: Vec<ScoredHit>,
    /// Rounds actually executed.
    pub rounds: usize,
    /// Distinct candidate ids seen across all rounds.
    pub candidates_seen: usize,
}

/// Per-round store limit: `top_k * 2^min(round - 1, 3)`.
///
/// Concretely `top_k, 2*top_k, 4*top_k, 8*top_k, 8*top_k, ...`: a
/// deterministic, monotonically non-decreasing schedule with bounded
/// growth.
fn round_limit(top_k: usize, round: usize) -> usize {
    let exponent = ((round - 1) as u32).min(LIMIT_DOUBLING_CAP);
    top_k.saturating_mul(1usize << exponent)
}

/// Run refinement rounds until two consecutive stable rounds or the round
/// budget is exhausted.
///
/// Cancellation is polled after every round.
pub fn rerank_until_top_k(
    adapter: &StoreAdapter<'_>,
    prf_query: &[f32],
    top_k: usize,
    cancel: &CancellationToken,
) -> Result<RefineOutcome, SearchError> {
    let mut merged: HashMap<DocId, f32> = HashMap::new();
    let mut previous: Option<RoundState> = None;
    let mut stable_rounds = 0usize;
    let mut rounds = 0usize;

    for round in 1..=MAX_REFINEMENT_ROUNDS {
        let limit = round_limit(top_k, round);
        let round_hits = adapter.search(prf_query, limit)?;
        rounds = round;

        for (doc_id, score) in round_hits {
            merged
                .entry(doc_id)
                .and_modify(|best| *best = best.max(score))
                .or_insert(score);
        }

        let current = round_state(&merged, top_k);
        if let Some(prev) = &previous {
            let jaccard = jaccard_similarity(&prev.top_ids, &current.top_ids);
            let improvement =
                (current.score_sum - prev.score_sum) / prev.score_sum.max(SCORE_SUM_EPSILON);

            if jaccard >= STABLE_JACCARD_THRESHOLD && improvement <= STABLE_IMPROVEMENT_THRESHOLD {
                stable_rounds += 1;
            } else {
                stable_rounds = 0;
            }

            debug!(
                round,
                limit,
                candidates = merged.len(),
                jaccard,
                improvement,
                stable_rounds,
                "refinement round"
            );
        } else {
            debug!(round, limit, candidates = merged.len(), "refinement round");
        }
        previous = Some(current);

        if cancel.is_canceled() {
            return Err(SearchError::Canceled);
        }
        if stable_rounds >= REQUIRED_STABLE_ROUNDS {
            break;
        }
    }

    let candidates_seen = merged.len();
    let mut hits: Vec<ScoredHit> = merged.into_iter().collect();
    math::sort_desc_take(&mut hits, top_k);

    Ok(RefineOutcome {
        hits,
        rounds,
        candidates_seen,
    })
}

fn round_state(merged: &HashMap<DocId, f32>, top_k: usize) -> RoundState {
    let mut top: Vec<ScoredHit> = merged.iter().map(|(&id, &score)| (id, score)).collect();
    math::sort_desc_take(&mut top, top_k);

    RoundState {
        score_sum: top.iter().map(|(_, score)| *score).sum(),
        top_ids: top.into_iter().map(|(id, _)| id).collect(),
    }
}

/// `|A ∩ B| / |A ∪ B|` over id sequences; two empty sets count as
/// identical.
fn jaccard_similarity(left: &[DocId], right: &[DocId]) -> f32 {
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }

    let left: HashSet<DocId> = left.iter().copied().collect();
    let right: HashSet<DocId> = right.iter().copied().collect();
    let intersection = left.intersection(&right).count() as f32;
    let union = left.union(&right).count() as f32;
    intersection / union
}
