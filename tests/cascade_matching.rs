//! Property tests for cascade hashing matching
//!
//! **Feature: Cascade Matching, Property 1: Self-Match Identity**
//! **Feature: Cascade Matching, Property 2: Ratio Threshold Monotonicity**
//! **Feature: Cascade Matching, Property 3: Seeded Determinism**
//! **Feature: Cascade Matching, Property 4: Cross-Check Only Removes**
//! **Feature: Cascade Matching, Property 5: Bucket Coverage**
//! **Feature: Cascade Matching, Property 6: k-NN Distances Are Exact And Sorted**

use proptest::prelude::*;
use syna_match::cascade::{CascadeConfig, CascadeHasher};
use syna_match::distance::euclidean_distance;
use syna_match::{CascadeHashingMatcher, DescriptorMatrix, Descriptors, MatchError};

/// Generate `rows` descriptors of width `dims`
fn arb_rows(rows: std::ops::Range<usize>, dims: usize) -> impl Strategy<Value = Vec<Vec<f32>>> {
    proptest::collection::vec(proptest::collection::vec(-1.0f32..1.0f32, dims), rows)
}

fn to_descriptors(rows: Vec<Vec<f32>>) -> Descriptors {
    Descriptors::F32(DescriptorMatrix::from_rows(rows).unwrap())
}

/// Few bits per bucket: large buckets, almost no dropped queries
fn dense_config() -> CascadeConfig {
    CascadeConfig {
        bits_per_bucket: 2,
        ..Default::default()
    }
}

fn pairs(output: &syna_match::MatchOutput) -> Vec<(usize, usize)> {
    output
        .matches
        .iter()
        .map(|m| (m.query_index, m.database_index))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// **Property 1: Self-Match Identity**
    /// Matching a set against itself pairs every surviving row with itself
    #[test]
    fn prop_self_match_identity(rows in arb_rows(64..160, 32)) {
        let n = rows.len();
        let db = to_descriptors(rows);
        let mut matcher = CascadeHashingMatcher::new(dense_config());
        matcher.build_index(&db).unwrap();

        let output = matcher.match_descriptors(&db, 0.8, false).unwrap();
        prop_assert_eq!(output.len() + output.stats.dropped_queries, n);
        for m in &output.matches {
            prop_assert_eq!(m.query_index, m.database_index);
            prop_assert_eq!(m.distance, 0.0);
        }
    }

    /// **Property 2: Ratio Threshold Monotonicity**
    /// Raising the threshold never removes a match
    #[test]
    fn prop_ratio_monotonic(
        db_rows in arb_rows(80..150, 16),
        query_rows in arb_rows(20..60, 16),
        low in 0.3f32..0.6,
        delta in 0.05f32..0.35,
    ) {
        let db = to_descriptors(db_rows);
        let query = to_descriptors(query_rows);
        let mut matcher = CascadeHashingMatcher::new(dense_config());
        matcher.build_index(&db).unwrap();

        let strict = matcher.match_descriptors(&query, low, false).unwrap();
        let loose = matcher.match_descriptors(&query, low + delta, false).unwrap();

        let loose_pairs = pairs(&loose);
        for pair in pairs(&strict) {
            prop_assert!(loose_pairs.contains(&pair), "{:?} lost at higher ratio", pair);
        }
        prop_assert_eq!(strict.stats.dropped_queries, loose.stats.dropped_queries);
    }

    /// **Property 3: Seeded Determinism**
    /// Independently built matchers with equal seeds produce equal output
    #[test]
    fn prop_seeded_determinism(
        db_rows in arb_rows(50..120, 24),
        query_rows in arb_rows(10..40, 24),
        seed in any::<u64>(),
    ) {
        let db = to_descriptors(db_rows);
        let query = to_descriptors(query_rows);
        let config = CascadeConfig::small().with_seed(seed);

        let mut a = CascadeHashingMatcher::new(config.clone());
        let mut b = CascadeHashingMatcher::new(config);
        a.build_index(&db).unwrap();
        b.build_index(&db).unwrap();

        prop_assert_eq!(
            a.match_descriptors(&query, 0.8, true).unwrap(),
            b.match_descriptors(&query, 0.8, true).unwrap()
        );
        prop_assert_eq!(a.knn_match(&query, 3).unwrap(), b.knn_match(&query, 3).unwrap());
    }

    /// **Property 4: Cross-Check Only Removes**
    /// Cross-checked matches are a subset of plain matches
    #[test]
    fn prop_cross_check_subset(
        db_rows in arb_rows(60..140, 16),
        query_rows in arb_rows(30..90, 16),
    ) {
        let db = to_descriptors(db_rows);
        let query = to_descriptors(query_rows);
        let mut matcher = CascadeHashingMatcher::new(dense_config());
        matcher.build_index(&db).unwrap();

        let plain = matcher.match_descriptors(&query, 0.8, false).unwrap();
        let checked = matcher.match_descriptors(&query, 0.8, true).unwrap();

        prop_assert!(checked.len() <= plain.len());
        for m in &checked.matches {
            prop_assert!(plain.matches.contains(m));
        }
    }

    /// **Property 5: Bucket Coverage**
    /// Every row sits in exactly one bucket of every group
    #[test]
    fn prop_bucket_coverage(rows in arb_rows(1..200, 20), bits in 1u8..12) {
        let n = rows.len();
        let m = DescriptorMatrix::from_rows(rows).unwrap();
        let config = CascadeConfig { bits_per_bucket: bits, ..Default::default() };
        let hasher = CascadeHasher::new(20, config).unwrap();
        let hashed = hasher.hash_set(&m, &CascadeHasher::zero_mean(&m)).unwrap();

        prop_assert_eq!(hashed.buckets_per_group(), 1usize << bits);
        for group in 0..hashed.bucket_groups() {
            prop_assert_eq!(hashed.bucket_sizes(group).iter().sum::<usize>(), n);
        }
        for (row, h) in hashed.iter().enumerate() {
            for (group, &id) in h.bucket_ids.iter().enumerate() {
                prop_assert!((id as usize) < hashed.buckets_per_group());
                prop_assert!(hashed.bucket(group, id).contains(&(row as u32)));
            }
        }
    }

    /// **Property 6: k-NN Distances Are Exact And Sorted**
    #[test]
    fn prop_knn_exact_sorted(
        db_rows in arb_rows(40..120, 12),
        query_rows in arb_rows(5..30, 12),
        k in 1usize..6,
    ) {
        let db_matrix = DescriptorMatrix::from_rows(db_rows).unwrap();
        let query_matrix = DescriptorMatrix::from_rows(query_rows).unwrap();
        let mut matcher = CascadeHashingMatcher::new(dense_config());
        matcher.build_index(&Descriptors::F32(db_matrix.clone())).unwrap();

        let knn = matcher.knn_match(&Descriptors::F32(query_matrix.clone()), k).unwrap();
        prop_assert_eq!(knn.len(), query_matrix.rows());
        for (q, list) in knn.iter().enumerate() {
            prop_assert!(list.is_empty() || list.len() == k);
            for c in list {
                let expected = euclidean_distance(query_matrix.row(q), db_matrix.row(c.database_index));
                prop_assert_eq!(c.distance, expected);
            }
            for w in list.windows(2) {
                prop_assert!(w[0].distance <= w[1].distance);
                prop_assert_ne!(w[0].database_index, w[1].database_index);
            }
        }
    }
}

#[test]
fn test_width_mismatch_is_reported() {
    let mut matcher = CascadeHashingMatcher::default();
    matcher
        .build_index(&to_descriptors(vec![vec![0.5; 8]; 10]))
        .unwrap();

    let result = matcher.match_descriptors(&to_descriptors(vec![vec![0.5; 9]]), 0.8, false);
    assert!(matches!(
        result,
        Err(MatchError::DimensionMismatch { expected: 8, got: 9 })
    ));
}

#[test]
fn test_binary_query_rejected() {
    let mut matcher = CascadeHashingMatcher::default();
    matcher
        .build_index(&to_descriptors(vec![vec![0.5; 8]; 10]))
        .unwrap();

    let binary = Descriptors::U8(DescriptorMatrix::from_rows(vec![vec![1u8; 8]]).unwrap());
    assert!(matches!(
        matcher.match_descriptors(&binary, 0.8, false),
        Err(MatchError::Incompatible(_))
    ));
}

#[test]
fn test_two_point_database_drops_query() {
    // Centered rows are opposite, so they never share a bucket: the query
    // gathers at most two candidates and is skipped.
    let db = to_descriptors(vec![vec![0.0; 4], vec![10.0; 4]]);
    let query = to_descriptors(vec![vec![0.0, 0.0, 0.0, 0.1]]);

    let output =
        CascadeHashingMatcher::match_pair(&query, &db, 0.8, false, CascadeConfig::default())
            .unwrap();
    assert!(output.is_empty());
    assert_eq!(output.stats.dropped_queries, 1);
}
