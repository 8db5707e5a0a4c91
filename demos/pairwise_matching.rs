//! Pairwise Matching Demo
//!
//! This demo walks through matching the descriptors of two "images":
//! - Building a cascade hashing index over image A
//! - Matching image B (noisy copies of A plus outliers) against it
//! - Tightening the result with the cross-check
//! - Running the same request through the configurable fallback path
//!
//! Run with: cargo run --example pairwise_matching

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use syna_match::cascade::CascadeConfig;
use syna_match::{
    match_with_fallback, CascadeHashingMatcher, DescriptorMatrix, Descriptors, MatcherType,
    MatchingParams, Result,
};

const DIMS: usize = 128;
const SHARED: usize = 1_500;
const OUTLIERS: usize = 500;

fn main() -> Result<()> {
    println!("=== syna-match Pairwise Matching Demo ===\n");

    // 1. Synthesize two descriptor sets sharing SHARED keypoints
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let image_a: Vec<f32> = (0..(SHARED + OUTLIERS) * DIMS)
        .map(|_| rng.gen::<f32>() * 255.0)
        .collect();
    let mut image_b: Vec<f32> = image_a[..SHARED * DIMS]
        .iter()
        .map(|&x| x + rng.gen_range(-4.0..4.0))
        .collect();
    image_b.extend((0..OUTLIERS * DIMS).map(|_| rng.gen::<f32>() * 255.0));

    let image_a = Descriptors::F32(DescriptorMatrix::from_flat(image_a, DIMS)?);
    let image_b = Descriptors::F32(DescriptorMatrix::from_flat(image_b, DIMS)?);
    println!(
        "1. Image A: {} descriptors, image B: {} descriptors ({} shared)\n",
        image_a.rows(),
        image_b.rows(),
        SHARED
    );

    // 2. Index image A
    println!("2. Building cascade index over image A...");
    let mut matcher = CascadeHashingMatcher::new(CascadeConfig::small());
    matcher.build_index(&image_a)?;
    println!("   ✓ {} descriptors indexed\n", matcher.len());

    // 3. Plain ratio-test matching
    println!("3. Matching image B (ratio 0.8)...");
    let output = matcher.match_descriptors(&image_b, 0.8, false)?;
    report(&output);

    // 4. Cross-checked matching
    println!("4. Matching with cross-check...");
    let checked = matcher.match_descriptors(&image_b, 0.8, true)?;
    report(&checked);

    // 5. Same request from a parameter set, capped to the 200 best
    println!("5. Exhaustive L2 through MatchingParams (max 200 matches)...");
    let params = MatchingParams {
        max_matches: 200,
        ..MatchingParams::for_matcher(MatcherType::BruteForce)
    };
    let capped = match_with_fallback(&image_b, &image_a, &params)?;
    report(&capped);

    println!("=== Demo Complete ===");
    Ok(())
}

fn report(output: &syna_match::MatchOutput) {
    let correct = output
        .matches
        .iter()
        .filter(|m| m.query_index == m.database_index)
        .count();
    println!(
        "   ✓ {} matches ({} correct), {} dropped, {} ratio-rejected, {} cross-check-rejected\n",
        output.len(),
        correct,
        output.stats.dropped_queries,
        output.stats.ratio_rejected,
        output.stats.cross_check_rejected
    );
}
