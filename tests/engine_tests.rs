use std::sync::Arc;

use svve::{
    CancellationToken, SearchEngine, SearchError, StoreReply, VectorStore,
};

/// Deterministic brute-force backend over a fixed corpus of unit vectors.
///
/// Scores by dot product, keeps only positive matches, and returns hits
/// sorted by descending score with ascending id as tie-break, the same
/// ordering contract a production store would honor.
struct BruteForceStore {
    docs: Vec<(u32, Vec<f32>)>,
}

impl BruteForceStore {
    fn new(docs: Vec<(u32, Vec<f32>)>) -> Self {
        Self { docs }
    }
}

impl VectorStore for BruteForceStore {
    fn raw_search(&self, query: &[f32], limit: usize) -> Result<StoreReply, String> {
        let mut scored: Vec<(u32, f32)> = self
            .docs
            .iter()
            .map(|(id, vec)| {
                let dot: f32 = query.iter().zip(vec.iter()).map(|(q, d)| q * d).sum();
                (*id, dot)
            })
            .filter(|(_, score)| *score > 1e-6)
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(limit);

        let vectors = scored
            .iter()
            .map(|(id, _)| {
                self.docs
                    .iter()
                    .find(|(doc_id, _)| doc_id == id)
                    .map(|(_, vec)| vec.clone())
                    .ok_or_else(|| format!("unknown doc_id {}", id))
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(StoreReply {
            ids: scored.iter().map(|(id, _)| *id).collect(),
            scores: scored.iter().map(|(_, score)| *score).collect(),
            vectors,
        })
    }
}

fn unit(coords: &[(usize, f32)], dim: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dim];
    for &(idx, value) in coords {
        v[idx] = value;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    for x in v.iter_mut() {
        *x /= norm;
    }
    v
}

fn fixed_engine(reply: StoreReply, dim: usize) -> SearchEngine {
    let store: Arc<dyn VectorStore> = Arc::new(
        move |_query: &[f32], limit: usize| -> Result<StoreReply, String> {
            let mut reply = reply.clone();
            reply.ids.truncate(limit);
            reply.scores.truncate(limit);
            reply.vectors.truncate(limit);
            Ok(reply)
        },
    );
    SearchEngine::new(store, dim)
}

#[test]
fn test_happy_path_returns_ranked_hits() {
    let engine = fixed_engine(
        StoreReply {
            ids: vec![10, 20, 30],
            scores: vec![0.9, 0.8, 0.7],
            vectors: vec![
                vec![1.0, 0.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0, 0.0],
                vec![0.0, 0.0, 1.0, 0.0],
            ],
        },
        4,
    );

    let (ids, scores) = engine.search(&[1.0, 0.0, 0.0, 0.0], 5).unwrap();
    assert_eq!(ids, vec![10, 20, 30]);
    assert_eq!(scores, vec![0.9, 0.8, 0.7]);
}

#[test]
fn test_happy_path_respects_top_k() {
    let engine = fixed_engine(
        StoreReply {
            ids: vec![10, 20, 30],
            scores: vec![0.9, 0.8, 0.7],
            vectors: vec![
                vec![1.0, 0.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0, 0.0],
                vec![0.0, 0.0, 1.0, 0.0],
            ],
        },
        4,
    );

    let (ids, scores) = engine.search(&[1.0, 0.0, 0.0, 0.0], 1).unwrap();
    assert_eq!(ids, vec![10]);
    assert_eq!(scores, vec![0.9]);
}

#[test]
fn test_identical_evidence_breaks_ties_by_smaller_id() {
    let engine = fixed_engine(
        StoreReply {
            ids: vec![7, 5],
            scores: vec![0.5, 0.5],
            vectors: vec![vec![1.0, 0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0, 0.0]],
        },
        4,
    );

    let (ids, _) = engine.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
    assert_eq!(ids[0], 5, "The smaller id must win a full score tie");
    assert_eq!(ids, vec![5, 7]);
}

#[test]
fn test_single_segment_document_is_rejected_as_noise() {
    // Doc 99 only shows up for the first segment's projection (a single
    // non-zero coordinate at index 0) with a huge score; docs 1 and 2
    // show up everywhere. Noise classification must keep 99 out of the
    // survivors, and since the store never returns it for the PRF query,
    // it cannot reappear later.
    let store: Arc<dyn VectorStore> = Arc::new(
        |query: &[f32], _limit: usize| -> Result<StoreReply, String> {
            let nonzero = query.iter().filter(|v| **v != 0.0).count();
            let only_first_coord = nonzero == 1 && query[0] != 0.0;

            let (mut ids, mut scores, mut vectors) = (
                vec![1, 2],
                vec![0.9, 0.8],
                vec![vec![0.0, 1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0, 0.0]],
            );
            if only_first_coord {
                ids.insert(0, 99);
                scores.insert(0, 5.0);
                vectors.insert(0, vec![1.0, 0.0, 0.0, 0.0]);
            }
            Ok(StoreReply {
                ids,
                scores,
                vectors,
            })
        },
    );
    let engine = SearchEngine::new(store, 4);

    let (ids, _) = engine.search(&[1.0, 0.0, 0.0, 0.0], 3).unwrap();
    assert!(
        !ids.contains(&99),
        "Single-segment document must not survive voting: {:?}",
        ids
    );
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn test_stable_store_converges_in_three_rounds() {
    let engine = fixed_engine(
        StoreReply {
            ids: vec![10, 20, 30],
            scores: vec![0.9, 0.8, 0.7],
            vectors: vec![
                vec![1.0, 0.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0, 0.0],
                vec![0.0, 0.0, 1.0, 0.0],
            ],
        },
        4,
    );

    let outcome = engine
        .search_detailed(&[1.0, 0.0, 0.0, 0.0], 3, &CancellationToken::new())
        .unwrap();
    // Round 1 is the baseline; rounds 2 and 3 are the two consecutive
    // stable rounds that trigger early termination.
    assert_eq!(outcome.stats.refinement_rounds, 3);
    assert!(outcome.stats.refinement_rounds <= 3);
}

#[test]
fn test_zero_query_is_rejected() {
    let engine = fixed_engine(StoreReply::default(), 4);
    assert_eq!(
        engine.search(&[0.0, 0.0, 0.0, 0.0], 3).unwrap_err(),
        SearchError::ZeroQuery
    );
}

#[test]
fn test_vector_length_mismatch_is_a_protocol_violation() {
    let engine = fixed_engine(
        StoreReply {
            ids: vec![1, 2],
            scores: vec![0.9, 0.8],
            vectors: vec![vec![1.0, 0.0, 0.0, 0.0]],
        },
        4,
    );

    match engine.search(&[1.0, 0.0, 0.0, 0.0], 3) {
        Err(SearchError::AdapterProtocolViolation { field, .. }) => assert_eq!(field, "vectors"),
        other => panic!("Expected protocol violation on vectors, got {:?}", other),
    }
}

#[test]
fn test_orthogonal_corpus_yields_no_survivors() {
    // Nothing in the corpus overlaps the query's only active coordinate,
    // so every segment search comes back empty.
    let store: Arc<dyn VectorStore> = Arc::new(BruteForceStore::new(vec![
        (1, unit(&[(1, 1.0)], 4)),
        (2, unit(&[(2, 1.0)], 4)),
        (3, unit(&[(3, 1.0)], 4)),
    ]));
    let engine = SearchEngine::new(store, 4);

    assert_eq!(
        engine.search(&[1.0, 0.0, 0.0, 0.0], 3).unwrap_err(),
        SearchError::NoSurvivors
    );
}

#[test]
fn test_two_vote_documents_are_admitted_as_survivors() {
    // Each document spans exactly two adjacent coordinates, so with one
    // coordinate per segment each earns exactly two votes: Weak, but not
    // Noise.
    let store: Arc<dyn VectorStore> = Arc::new(BruteForceStore::new(vec![
        (1, unit(&[(0, 1.0), (1, 1.0)], 4)),
        (2, unit(&[(1, 1.0), (2, 1.0)], 4)),
        (3, unit(&[(2, 1.0), (3, 1.0)], 4)),
    ]));
    let engine = SearchEngine::new(store, 4);

    let outcome = engine
        .search_detailed(&[0.5, 0.5, 0.5, 0.5], 3, &CancellationToken::new())
        .unwrap();
    assert_eq!(outcome.stats.survivor_count, 3);
    assert_eq!(outcome.doc_ids.len(), 3);
}

#[test]
fn test_small_dimension_tolerates_empty_segments() {
    let store: Arc<dyn VectorStore> = Arc::new(BruteForceStore::new(vec![
        (1, unit(&[(0, 1.0), (1, 0.5)], 2)),
        (2, unit(&[(0, 0.5), (1, 1.0)], 2)),
    ]));
    let engine = SearchEngine::new(store, 2);

    let outcome = engine
        .search_detailed(&[0.8, 0.6], 2, &CancellationToken::new())
        .unwrap();
    assert_eq!(outcome.stats.segments_searched, 2);
    assert!(!outcome.doc_ids.is_empty());
}

#[test]
fn test_top_k_one_is_valid() {
    let store: Arc<dyn VectorStore> = Arc::new(BruteForceStore::new(vec![
        (1, unit(&[(0, 1.0), (1, 0.2)], 4)),
        (2, unit(&[(0, 0.2), (1, 1.0), (2, 0.4)], 4)),
    ]));
    let engine = SearchEngine::new(store, 4);

    let (ids, scores) = engine.search(&[0.7, 0.7, 0.1, 0.0], 1).unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(scores.len(), 1);
}

fn pseudo_random_corpus(count: u32, dim: usize) -> Vec<(u32, Vec<f32>)> {
    // Small deterministic LCG; no seeding from the environment so runs
    // are reproducible.
    let mut state = 0x2545F491u64;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((state >> 32) as u32 as f32 / u32::MAX as f32) * 2.0 - 1.0
    };

    (0..count)
        .map(|id| {
            let mut vec: Vec<f32> = (0..dim).map(|_| next()).collect();
            let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
            for x in vec.iter_mut() {
                *x /= norm;
            }
            (id, vec)
        })
        .collect()
}

#[test]
fn test_repeated_searches_are_byte_identical() {
    let store: Arc<dyn VectorStore> =
        Arc::new(BruteForceStore::new(pseudo_random_corpus(60, 16)));
    let engine = SearchEngine::new(store, 16);
    let query: Vec<f32> = (0..16).map(|i| ((i % 5) as f32) * 0.3 + 0.1).collect();

    let first = engine.search(&query, 10).unwrap();
    let second = engine.search(&query, 10).unwrap();
    assert_eq!(first, second, "Identical inputs must produce identical output");
}

#[test]
fn test_parallel_engine_matches_sequential_engine() {
    let corpus = pseudo_random_corpus(60, 16);
    let sequential_store: Arc<dyn VectorStore> = Arc::new(BruteForceStore::new(corpus.clone()));
    let parallel_store: Arc<dyn VectorStore> = Arc::new(BruteForceStore::new(corpus));

    let sequential = SearchEngine::new(sequential_store, 16);
    let parallel = SearchEngine::new(parallel_store, 16).with_parallel_segments(true);
    let query: Vec<f32> = (0..16).map(|i| ((i % 7) as f32) * 0.2 - 0.4).collect();

    assert_eq!(
        sequential.search(&query, 10).unwrap(),
        parallel.search(&query, 10).unwrap(),
        "Parallel segment execution must not change the final order"
    );
}

#[test]
fn test_output_invariants_hold() {
    let store: Arc<dyn VectorStore> =
        Arc::new(BruteForceStore::new(pseudo_random_corpus(40, 12)));
    let engine = SearchEngine::new(store, 12);
    let query: Vec<f32> = (0..12).map(|i| (i as f32 * 0.17).sin().abs() + 0.05).collect();

    let (ids, scores) = engine.search(&query, 8).unwrap();

    assert_eq!(ids.len(), scores.len(), "ids and scores must stay parallel");
    assert!(ids.len() <= 8);

    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), ids.len(), "Output ids must be pairwise distinct");

    for pair in scores.windows(2) {
        assert!(pair[0] >= pair[1], "Scores must be non-increasing: {:?}", scores);
    }
}

#[test]
fn test_pre_canceled_token_returns_canceled() {
    let store: Arc<dyn VectorStore> =
        Arc::new(BruteForceStore::new(pseudo_random_corpus(10, 8)));
    let engine = SearchEngine::new(store, 8);
    let token = CancellationToken::new();
    token.cancel();

    let query = vec![0.5f32; 8];
    assert_eq!(
        engine.search_with_cancel(&query, 3, &token).unwrap_err(),
        SearchError::Canceled
    );
}
