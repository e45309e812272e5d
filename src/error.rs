//! Error types for the SVVE pipeline.
//!
//! The error set is closed: every failure a request can surface is one of
//! the variants below, and no error is recovered internally. Each variant
//! carries a stable kind tag (see [`SearchError::kind`]) so hosts can map
//! failures to their own exception or result idioms without parsing
//! messages.

use crate::store::DocId;

/// Terminal failure of a search request.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchError {
    /// Boundary validation failed: wrong length, empty input, or
    /// non-finite values in the query.
    InvalidInput(String),
    /// The query has zero L2 norm and cannot be normalized.
    ZeroQuery,
    /// The injected store callback returned malformed output.
    AdapterProtocolViolation {
        /// Which part of the reply was malformed: `"callback"`, `"ids"`,
        /// `"scores"`, or `"vectors"`.
        field: &'static str,
        detail: String,
    },
    /// PRF requested a vector that never appeared in any earlier search.
    CacheMiss { id: DocId },
    /// No document passed the vote classification; PRF cannot proceed.
    NoSurvivors,
    /// The PRF-corrected query has zero or non-finite norm.
    DegeneratePrf,
    /// Refinement ended with an empty candidate pool.
    NoResults,
    /// Cooperative cancellation was observed between stages.
    Canceled,
}

impl SearchError {
    /// Stable kind tag for host-side error mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::InvalidInput(_) => "invalid_input",
            SearchError::ZeroQuery => "zero_query",
            SearchError::AdapterProtocolViolation { .. } => "adapter_protocol_violation",
            SearchError::CacheMiss { .. } => "cache_miss",
            SearchError::NoSurvivors => "no_survivors",
            SearchError::DegeneratePrf => "degenerate_prf",
            SearchError::NoResults => "no_results",
            SearchError::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for SearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchError::InvalidInput(detail) => write!(f, "invalid input: {}", detail),
            SearchError::ZeroQuery => write!(f, "query vector has zero L2 norm"),
            SearchError::AdapterProtocolViolation { field, detail } => {
                write!(f, "store reply violated the adapter contract ({}): {}", field, detail)
            }
            SearchError::CacheMiss { id } => {
                write!(
                    f,
                    "vector for doc_id={} was never returned by any search; the store must \
                     return a vector for every hit",
                    id
                )
            }
            SearchError::NoSurvivors => {
                write!(f, "no document passed vote classification; cannot build PRF query")
            }
            SearchError::DegeneratePrf => {
                write!(f, "PRF-corrected query has zero norm and cannot be normalized")
            }
            SearchError::NoResults => write!(f, "refinement produced no candidates"),
            SearchError::Canceled => write!(f, "search was canceled"),
        }
    }
}

impl std::error::Error for SearchError {}
