// Copyright (c) 2025 SynaDB Contributors
// Licensed under the SynaDB License. See LICENSE file for details.

//! # syna-match
//!
//! Fast approximate matching of image feature descriptors.
//!
//! Given two sets of descriptors (one row per detected keypoint), syna-match
//! finds, for each query descriptor, its closest database descriptor and keeps
//! the correspondence only when it is clearly better than the runner-up
//! (Lowe's ratio test).
//!
//! ## Features
//!
//! - **[`cascade`]** - Cascade hashing: random-hyperplane codes and bucket
//!   tables that shortlist a few candidates before exact L2 re-ranking
//! - **[`CascadeHashingMatcher`]** - Index once, match many query sets
//! - **[`BruteForceMatcher`]** - Exact L2, L1 and Hamming matching
//! - **[`match_with_fallback`]** - Runtime strategy selection with an
//!   exhaustive fallback
//! - **Deterministic** - Identical seeds, inputs and parameters give
//!   identical output, regardless of the thread count
//!
//! ## Architecture
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`DescriptorMatrix`] | Dense row-major descriptor storage |
//! | [`cascade::CascadeHasher`] | Projections, hashing and candidate search |
//! | [`cascade::HashedSet`] | Hash codes and bucket tables of one descriptor set |
//! | [`CascadeHashingMatcher`] | Ratio test, deduplication and cross-check |
//! | [`MatchingParams`] | JSON-loadable request configuration |
//!
//! ## Quick Start
//!
//! ```rust
//! use syna_match::{CascadeHashingMatcher, DescriptorMatrix, Descriptors, Result};
//! use syna_match::cascade::CascadeConfig;
//!
//! fn main() -> Result<()> {
//!     let rows: Vec<Vec<f32>> = (0..400)
//!         .map(|i| (0..64).map(|j| ((i * 7919 + j * 104729) % 251) as f32).collect())
//!         .collect();
//!     let image_a = Descriptors::F32(DescriptorMatrix::from_rows(rows)?);
//!
//!     let mut matcher = CascadeHashingMatcher::new(CascadeConfig::small());
//!     matcher.build_index(&image_a)?;
//!
//!     // Every descriptor matches itself
//!     let output = matcher.match_descriptors(&image_a, 0.8, true)?;
//!     for m in output.matches.iter().take(5) {
//!         println!("{} -> {} ({:.2})", m.query_index, m.database_index, m.distance);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Threading
//!
//! Hashing and searching run row-parallel on the rayon global pool. A built
//! matcher is `Send + Sync`; `match_descriptors` takes `&self`, so one index
//! can serve several threads.

pub mod cascade;
pub mod config;
pub mod descriptor;
pub mod distance;
pub mod error;
pub mod matcher;

// Re-export commonly used types
pub use descriptor::{DescriptorMatrix, Descriptors};
pub use error::{MatchError, Result};

// Re-export matchers and the strategy seam
pub use matcher::{
    create_matcher, create_matcher_of, match_with_fallback, BruteForceMatcher,
    CascadeHashingMatcher, Correspondence, DescriptorMatcher, MatchOutput, MatchStats,
    MatcherType,
};

// Re-export configuration
pub use cascade::{CascadeConfig, CascadeHasher};
pub use config::MatchingParams;

// Re-export distance metrics
pub use distance::DistanceMetric;
