//! Multi-segment vote aggregation and survivor selection.
//!
//! Per-segment hit lists are merged by document id. A document earns one
//! vote per segment appearance, accumulates a rank-position score, and
//! keeps its best raw score. Classification by vote count separates the
//! documents supported by multiple sub-projections from single-segment
//! noise.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::segment::SEGMENT_TOP_K;
use crate::store::{DocId, ScoredHit};

/// Vote-count tier of a merged document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteClass {
    /// Appeared in at least three segments.
    Strong,
    /// Appeared in exactly two segments.
    Weak,
    /// Appeared in at most one segment.
    Noise,
}

/// Merged evidence for one document across all segments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub doc_id: DocId,
    /// Number of segments whose top list contained this document.
    pub votes: u8,
    /// Sum over appearances of `(SEGMENT_TOP_K - rank_within_segment)`;
    /// higher means earlier placement.
    pub rank_score: f32,
    /// Best raw score over the document's appearances.
    pub best_score: f32,
}

#[derive(Clone, Copy, Debug)]
struct VoteAggregate {
    votes: u8,
    rank_score: f32,
    best_score: f32,
}

impl VoteAggregate {
    fn absorb(&mut self, other: VoteAggregate) {
        self.votes = self.votes.saturating_add(other.votes);
        self.rank_score += other.rank_score;
        self.best_score = self.best_score.max(other.best_score);
    }
}

/// Merge per-segment hit lists into sorted vote records.
///
/// Records are ordered by votes, then rank score, then best score, all
/// descending, with ascending doc id as the final tie-break. Segment order
/// does not affect the output.
pub fn merge_segment_results(segment_results: &[Vec<ScoredHit>]) -> Vec<VoteRecord> {
    merge_impl(segment_results, false)
}

/// Same as [`merge_segment_results`], with an optional rayon fold for
/// large inputs. Both paths produce identical records.
pub fn merge_segment_results_parallel(
    segment_results: &[Vec<ScoredHit>],
    parallel: bool,
) -> Vec<VoteRecord> {
    merge_impl(segment_results, parallel)
}

fn merge_impl(segment_results: &[Vec<ScoredHit>], parallel: bool) -> Vec<VoteRecord> {
    let aggregated: HashMap<DocId, VoteAggregate> = if parallel {
        segment_results
            .par_iter()
            .map(|hits| accumulate_segment(hits))
            .reduce(HashMap::new, merge_aggregates)
    } else {
        let mut merged = HashMap::new();
        for hits in segment_results {
            merged = merge_aggregates(merged, accumulate_segment(hits));
        }
        merged
    };

    let mut records: Vec<VoteRecord> = aggregated
        .into_iter()
        .map(|(doc_id, agg)| VoteRecord {
            doc_id,
            votes: agg.votes,
            rank_score: agg.rank_score,
            best_score: agg.best_score,
        })
        .collect();

    records.sort_by(|left, right| {
        right
            .votes
            .cmp(&left.votes)
            .then_with(|| {
                right
                    .rank_score
                    .partial_cmp(&left.rank_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                right
                    .best_score
                    .partial_cmp(&left.best_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| left.doc_id.cmp(&right.doc_id))
    });

    records
}

fn accumulate_segment(hits: &[ScoredHit]) -> HashMap<DocId, VoteAggregate> {
    let mut local = HashMap::with_capacity(hits.len());
    for (rank, &(doc_id, score)) in hits.iter().enumerate() {
        let rank_score = SEGMENT_TOP_K.saturating_sub(rank) as f32;
        local
            .entry(doc_id)
            .or_insert(VoteAggregate {
                votes: 0,
                rank_score: 0.0,
                best_score: f32::NEG_INFINITY,
            })
            .absorb(VoteAggregate {
                votes: 1,
                rank_score,
                best_score: score,
            });
    }
    local
}

fn merge_aggregates(
    mut into: HashMap<DocId, VoteAggregate>,
    from: HashMap<DocId, VoteAggregate>,
) -> HashMap<DocId, VoteAggregate> {
    for (doc_id, agg) in from {
        match into.entry(doc_id) {
            std::collections::hash_map::Entry::Occupied(mut entry) => entry.get_mut().absorb(agg),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(agg);
            }
        }
    }
    into
}

/// Tier a vote count: `>= 3` strong, `== 2` weak, otherwise noise.
pub fn classify_vote(votes: u8) -> VoteClass {
    match votes {
        3..=u8::MAX => VoteClass::Strong,
        2 => VoteClass::Weak,
        _ => VoteClass::Noise,
    }
}

/// Ids of the first `limit` non-noise records, in record order.
///
/// Returns fewer than `limit` ids when the evidence is thin; the caller
/// decides whether an empty set is terminal.
pub fn select_survivor_ids(records: &[VoteRecord], limit: usize) -> Vec<DocId> {
    records
        .iter()
        .filter(|record| classify_vote(record.votes) != VoteClass::Noise)
        .take(limit)
        .map(|record| record.doc_id)
        .collect()
}
