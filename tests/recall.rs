//! Recall of cascade hashing against exhaustive matching
//!
//! Queries are slightly perturbed copies of database rows, so every query has
//! a known true match.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use syna_match::cascade::CascadeConfig;
use syna_match::{
    BruteForceMatcher, CascadeHashingMatcher, DescriptorMatrix, Descriptors, DistanceMetric,
};

const DIMS: usize = 128;

fn perturbed_pair(rows: usize, queries: usize, noise: f32, seed: u64) -> (Descriptors, Descriptors) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let db: Vec<f32> = (0..rows * DIMS).map(|_| rng.gen::<f32>()).collect();
    let query: Vec<f32> = db[..queries * DIMS]
        .iter()
        .map(|&x| x + rng.gen_range(-noise..noise))
        .collect();
    (
        Descriptors::F32(DescriptorMatrix::from_flat(db, DIMS).unwrap()),
        Descriptors::F32(DescriptorMatrix::from_flat(query, DIMS).unwrap()),
    )
}

#[test]
fn test_recall_against_ground_truth() {
    let (db, query) = perturbed_pair(2_000, 500, 0.02, 11);
    let mut matcher = CascadeHashingMatcher::default();
    matcher.build_index(&db).unwrap();

    let output = matcher.match_descriptors(&query, 0.8, false).unwrap();
    let hits = output
        .matches
        .iter()
        .filter(|m| m.query_index == m.database_index)
        .count();

    assert!(hits >= 450, "only {} of 500 queries recovered", hits);
    assert!(output.stats.dropped_queries <= 25);
}

#[test]
fn test_agreement_with_brute_force() {
    let (db, query) = perturbed_pair(2_000, 500, 0.02, 12);

    let mut cascade = CascadeHashingMatcher::default();
    cascade.build_index(&db).unwrap();
    let approx = cascade.match_descriptors(&query, 0.8, false).unwrap();

    let exact =
        BruteForceMatcher::match_pair(&query, &db, 0.8, false, DistanceMetric::L2).unwrap();
    assert_eq!(exact.len(), 500);

    let agreeing = approx
        .matches
        .iter()
        .filter(|m| exact.matches[m.query_index].database_index == m.database_index)
        .count();
    assert!(
        agreeing * 100 >= approx.len() * 95,
        "{} of {} cascade matches agree with brute force",
        agreeing,
        approx.len()
    );
}

#[test]
fn test_high_recall_preset_drops_fewer_queries() {
    let (db, query) = perturbed_pair(1_000, 300, 0.02, 13);

    let dropped = |config: CascadeConfig| {
        CascadeHashingMatcher::match_pair(&query, &db, 0.8, false, config)
            .unwrap()
            .stats
            .dropped_queries
    };

    // Fewer bits per bucket and more groups gather more candidates
    assert!(dropped(CascadeConfig::high_recall()) <= dropped(CascadeConfig::default()));
}
