//! Coordinate-range segmentation of the query vector.
//!
//! The query's `[0, D)` coordinate range is partitioned into
//! [`SEGMENT_COUNT`] contiguous segments; each segment query keeps the
//! original values inside its range and is zero elsewhere. Segment queries
//! are deliberately not renormalized: scores are only compared within a
//! segment, and cross-segment magnitude differences are absorbed by the
//! vote aggregator.

use serde::{Deserialize, Serialize};

/// Number of coordinate segments per query.
pub const SEGMENT_COUNT: usize = 4;

/// Hits requested from the store per segment.
pub const SEGMENT_TOP_K: usize = 100;

/// Maximum survivors admitted to PRF centroid computation.
pub const SURVIVOR_COUNT: usize = 5;

/// Half-open coordinate interval `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRange {
    pub start: usize,
    pub end: usize,
}

impl SegmentRange {
    /// An empty range carries no coordinates and is skipped without a
    /// store call.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

/// Contiguous partition of `[0, dim)` into [`SEGMENT_COUNT`] ranges.
///
/// When `dim` is not divisible by the segment count, the first
/// `dim % SEGMENT_COUNT` ranges carry one extra coordinate. Dimensions
/// below the segment count produce trailing empty ranges.
pub fn segment_ranges(dim: usize) -> Vec<SegmentRange> {
    let base_len = dim / SEGMENT_COUNT;
    let remainder = dim % SEGMENT_COUNT;

    let mut ranges = Vec::with_capacity(SEGMENT_COUNT);
    let mut start = 0usize;
    for idx in 0..SEGMENT_COUNT {
        let extra = usize::from(idx < remainder);
        let end = start + base_len + extra;
        ranges.push(SegmentRange { start, end });
        start = end;
    }
    ranges
}

/// Project `query` onto a segment: equal to `query` inside the range,
/// zero outside. Always returns a full-length vector.
pub fn build_segment_query(query: &[f32], range: SegmentRange) -> Vec<f32> {
    let mut projected = vec![0.0; query.len()];
    if !range.is_empty() {
        projected[range.start..range.end].copy_from_slice(&query[range.start..range.end]);
    }
    projected
}
