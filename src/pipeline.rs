//! The SVVE request state machine.
//!
//! `Init → Segmented → Voted → PRFReady → Refining → Done`, with no
//! back-edges: any stage failure ends the run and surfaces the first
//! error unchanged. The only parallelism point is the per-segment search
//! fan-out, which runs on the rayon pool when the store callback was
//! declared safe for concurrent use; the final ordering is identical
//! either way because every merge is keyed by doc id and sorted with
//! total comparators.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::SearchError;
use crate::math;
use crate::prf;
use crate::refine;
use crate::segment::{self, SegmentRange, SEGMENT_TOP_K, SURVIVOR_COUNT};
use crate::store::{DocId, ScoredHit, StoreAdapter};
use crate::voting;

/// Per-request summary counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Non-empty segments actually searched.
    pub segments_searched: usize,
    /// Distinct documents seen during vote aggregation.
    pub candidates_voted: usize,
    /// Survivors admitted to PRF.
    pub survivor_count: usize,
    /// Refinement rounds executed.
    pub refinement_rounds: usize,
    /// Distinct documents seen during refinement.
    pub refinement_candidates: usize,
}

/// Final ranked output plus stats.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOutcome {
    pub doc_ids: Vec<DocId>,
    pub scores: Vec<f32>,
    pub stats: SearchStats,
}

/// Execute one full SVVE request against a prepared adapter.
///
/// `parallel` opts the segment fan-out and the vote merge into the rayon
/// pool; it must only be set when the store callback is re-entrant.
pub fn execute_search(
    adapter: &StoreAdapter<'_>,
    query: &[f32],
    top_k: usize,
    parallel: bool,
    cancel: &CancellationToken,
) -> Result<PipelineOutcome, SearchError> {
    if top_k == 0 {
        return Err(SearchError::InvalidInput("top_k must be at least 1".into()));
    }
    if query.is_empty() {
        return Err(SearchError::InvalidInput("query must not be empty".into()));
    }
    if query.len() != adapter.dim() {
        return Err(SearchError::InvalidInput(format!(
            "query dimension {} does not match store dimension {}",
            query.len(),
            adapter.dim()
        )));
    }

    let normalized_query = math::normalized_copy(query).ok_or(SearchError::ZeroQuery)?;

    let ranges = segment::segment_ranges(normalized_query.len());
    let segment_results = search_segments(adapter, &normalized_query, &ranges, parallel, cancel)?;
    let segments_searched = ranges.iter().filter(|r| !r.is_empty()).count();
    debug!(
        segments = segments_searched,
        dim = normalized_query.len(),
        "segment fan-out complete"
    );

    if cancel.is_canceled() {
        return Err(SearchError::Canceled);
    }

    let records = voting::merge_segment_results_parallel(&segment_results, parallel);
    let candidates_voted = records.len();
    let survivors = voting::select_survivor_ids(&records, SURVIVOR_COUNT);
    debug!(
        candidates = candidates_voted,
        survivors = survivors.len(),
        "vote aggregation complete"
    );
    if survivors.is_empty() {
        return Err(SearchError::NoSurvivors);
    }

    if cancel.is_canceled() {
        return Err(SearchError::Canceled);
    }

    let prf_query = prf::build_prf_query(&normalized_query, &survivors, adapter)?;
    let outcome = refine::rerank_until_top_k(adapter, &prf_query, top_k, cancel)?;
    if outcome.hits.is_empty() {
        return Err(SearchError::NoResults);
    }

    let stats = SearchStats {
        segments_searched,
        candidates_voted,
        survivor_count: survivors.len(),
        refinement_rounds: outcome.rounds,
        refinement_candidates: outcome.candidates_seen,
    };
    let (doc_ids, scores): (Vec<DocId>, Vec<f32>) = outcome.hits.into_iter().unzip();

    Ok(PipelineOutcome {
        doc_ids,
        scores,
        stats,
    })
}

/// Run the per-segment searches. Empty ranges contribute an empty hit
/// list without touching the store.
fn search_segments(
    adapter: &StoreAdapter<'_>,
    query: &[f32],
    ranges: &[SegmentRange],
    parallel: bool,
    cancel: &CancellationToken,
) -> Result<Vec<Vec<ScoredHit>>, SearchError> {
    let search_one = |range: &SegmentRange| -> Result<Vec<ScoredHit>, SearchError> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let segment_query = segment::build_segment_query(query, *range);
        adapter.search(&segment_query, SEGMENT_TOP_K)
    };

    if parallel {
        if cancel.is_canceled() {
            return Err(SearchError::Canceled);
        }
        ranges.par_iter().map(search_one).collect()
    } else {
        let mut results = Vec::with_capacity(ranges.len());
        for range in ranges {
            results.push(search_one(range)?);
            if cancel.is_canceled() {
                return Err(SearchError::Canceled);
            }
        }
        Ok(results)
    }
}
