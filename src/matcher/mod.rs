// Copyright (c) 2025 SynaDB Contributors
// Licensed under the SynaDB License. See LICENSE file for details.

//! Descriptor matchers.
//!
//! Every matcher follows the same lifecycle: build an index over one
//! descriptor set (the *database*), then answer any number of match requests
//! for another set (the *query*). Match requests take `&self`, so a built
//! matcher can be shared between threads.
//!
//! | Matcher | Element type | Search | Drops sparse queries |
//! |---------|--------------|--------|----------------------|
//! | [`CascadeHashingMatcher`] | `f32` | Approximate (cascade hashing + L2) | Yes |
//! | [`BruteForceMatcher`] | `f32` (L2/L1), `u8` (Hamming) | Exact | No |
//!
//! The [`DescriptorMatcher`] trait is the strategy seam: callers select an
//! implementation at runtime with [`create_matcher`], or use
//! [`match_with_fallback`] to fall back to the exhaustive matcher when the
//! configured one cannot handle a descriptor pair.
//!
//! # Post-processing
//!
//! `match_descriptors` applies, in order:
//!
//! 1. **Ratio test**: keep the best neighbour only if `d1 < ratio * d2`.
//! 2. **Deduplication**: one correspondence per `(query, database)` pair,
//!    keeping the lowest distance; output is sorted by query index.
//! 3. **Cross-check** (optional): keep only pairs that are also found when
//!    the roles of query and database are swapped.

mod brute_force;
mod cascade;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cascade::Neighbor;
use crate::config::MatchingParams;
use crate::descriptor::Descriptors;
use crate::distance::DistanceMetric;
use crate::error::{MatchError, Result};

pub use brute_force::BruteForceMatcher;
pub use cascade::CascadeHashingMatcher;

/// A matched descriptor pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    /// Row in the query descriptor matrix
    pub query_index: usize,
    /// Row in the database descriptor matrix
    pub database_index: usize,
    /// Distance between the two descriptors
    pub distance: f32,
}

/// Counters describing one match request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    /// Query rows submitted
    pub query_rows: usize,
    /// Query rows that gathered too few candidates and were skipped
    pub dropped_queries: usize,
    /// Best neighbours rejected by the ratio test
    pub ratio_rejected: usize,
    /// Correspondences removed as duplicate `(query, database)` pairs
    pub duplicates_removed: usize,
    /// Correspondences removed by the cross-check
    pub cross_check_rejected: usize,
}

/// Correspondences returned by a match request, with its counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchOutput {
    /// Accepted correspondences, ascending by query index
    pub matches: Vec<Correspondence>,
    /// What happened to the remaining queries
    pub stats: MatchStats,
}

impl MatchOutput {
    /// Number of accepted correspondences.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// True when nothing was matched.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Take the correspondences, dropping the counters.
    pub fn into_matches(self) -> Vec<Correspondence> {
        self.matches
    }
}

/// Common interface of all matching strategies.
pub trait DescriptorMatcher: Send + Sync {
    /// Canonical matcher name.
    fn name(&self) -> &'static str;

    /// Whether this matcher can index or query `descriptors`.
    fn is_compatible(&self, descriptors: &Descriptors) -> bool;

    /// Index `database`, replacing any previous index.
    fn build_index(&mut self, database: &Descriptors) -> Result<()>;

    /// Ratio-tested, deduplicated correspondences for every query row.
    fn match_descriptors(
        &self,
        query: &Descriptors,
        ratio_threshold: f32,
        cross_check: bool,
    ) -> Result<MatchOutput>;

    /// Up to `k` raw neighbours per query row, without filtering.
    fn knn_match(&self, query: &Descriptors, k: usize) -> Result<Vec<Vec<Correspondence>>>;
}

/// Selectable matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatcherType {
    /// Cascade hashing with L2 re-ranking (float descriptors)
    #[default]
    #[serde(rename = "FASTCASCADEHASHINGL2")]
    CascadeHashingL2,
    /// Exhaustive L2 (float descriptors)
    #[serde(rename = "BF")]
    BruteForce,
    /// Exhaustive L1 (float descriptors)
    #[serde(rename = "BF_NORM_L1")]
    BruteForceL1,
    /// Exhaustive Hamming (binary descriptors)
    #[serde(rename = "BF_HAMMING")]
    BruteForceHamming,
}

impl MatcherType {
    /// All strategies.
    pub const ALL: [MatcherType; 4] = [
        MatcherType::CascadeHashingL2,
        MatcherType::BruteForce,
        MatcherType::BruteForceL1,
        MatcherType::BruteForceHamming,
    ];

    /// Canonical name, as used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherType::CascadeHashingL2 => "FASTCASCADEHASHINGL2",
            MatcherType::BruteForce => "BF",
            MatcherType::BruteForceL1 => "BF_NORM_L1",
            MatcherType::BruteForceHamming => "BF_HAMMING",
        }
    }

    /// Exhaustive strategy suited to the element type of `descriptors`.
    pub fn exhaustive_for(descriptors: &Descriptors) -> MatcherType {
        match descriptors {
            Descriptors::F32(_) => MatcherType::BruteForce,
            Descriptors::U8(_) => MatcherType::BruteForceHamming,
        }
    }
}

impl fmt::Display for MatcherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatcherType {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self> {
        MatcherType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MatchError::InvalidParameter(format!("unknown matcher type: {}", s)))
    }
}

/// Create an unindexed matcher of `kind` configured from `params`.
pub fn create_matcher_of(kind: MatcherType, params: &MatchingParams) -> Box<dyn DescriptorMatcher> {
    match kind {
        MatcherType::CascadeHashingL2 => {
            Box::new(CascadeHashingMatcher::new(params.cascade.clone()))
        }
        MatcherType::BruteForce => Box::new(BruteForceMatcher::new(DistanceMetric::L2)),
        MatcherType::BruteForceL1 => Box::new(BruteForceMatcher::new(DistanceMetric::L1)),
        MatcherType::BruteForceHamming => {
            Box::new(BruteForceMatcher::new(DistanceMetric::Hamming))
        }
    }
}

/// Create an unindexed matcher of the configured type.
pub fn create_matcher(params: &MatchingParams) -> Box<dyn DescriptorMatcher> {
    create_matcher_of(params.matcher_type, params)
}

/// Match `query` against `database` with the configured strategy.
///
/// If that strategy rejects the pair (incompatible element type, empty
/// input) the exhaustive strategy for the database element type is tried
/// instead. `max_matches`, when non-zero, keeps only the closest
/// correspondences.
///
/// ```rust
/// use syna_match::{match_with_fallback, DescriptorMatrix, Descriptors, MatchingParams};
///
/// // Binary descriptors cannot be cascade-hashed; the Hamming matcher takes over
/// let db = Descriptors::U8(DescriptorMatrix::from_rows(vec![
///     vec![0b0000_0000u8, 0],
///     vec![0b1111_1111, 0xFF],
///     vec![0b1111_0000, 0x0F],
/// ])?);
/// let query = Descriptors::U8(DescriptorMatrix::from_rows(vec![vec![0b1111_1110u8, 0xFF]])?);
///
/// let output = match_with_fallback(&query, &db, &MatchingParams::default())?;
/// assert_eq!(output.matches[0].database_index, 1);
/// # Ok::<(), syna_match::MatchError>(())
/// ```
pub fn match_with_fallback(
    query: &Descriptors,
    database: &Descriptors,
    params: &MatchingParams,
) -> Result<MatchOutput> {
    params.validate()?;

    let primary = params.matcher_type;
    let mut output = match run_matcher(primary, query, database, params) {
        Ok(output) => output,
        Err(err) => {
            let fallback = MatcherType::exhaustive_for(database);
            if fallback == primary {
                return Err(err);
            }
            warn!(
                matcher = %primary,
                fallback = %fallback,
                error = %err,
                "matcher failed, falling back"
            );
            run_matcher(fallback, query, database, params)?
        }
    };

    if params.max_matches > 0 && output.matches.len() > params.max_matches {
        output.matches.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.query_index.cmp(&b.query_index))
                .then(a.database_index.cmp(&b.database_index))
        });
        output.matches.truncate(params.max_matches);
        sort_by_indices(&mut output.matches);
    }

    Ok(output)
}

fn run_matcher(
    kind: MatcherType,
    query: &Descriptors,
    database: &Descriptors,
    params: &MatchingParams,
) -> Result<MatchOutput> {
    let mut matcher = create_matcher_of(kind, params);
    matcher.build_index(database)?;
    matcher.match_descriptors(query, params.ratio_thresh, params.cross_check)
}

/// Reject ratio thresholds outside the open interval (0, 1).
pub(crate) fn validate_ratio(ratio_threshold: f32) -> Result<()> {
    if ratio_threshold.is_finite() && ratio_threshold > 0.0 && ratio_threshold < 1.0 {
        Ok(())
    } else {
        Err(MatchError::InvalidParameter(format!(
            "ratio threshold must lie in (0, 1), got {}",
            ratio_threshold
        )))
    }
}

/// Keep the best neighbour of each query when `d1 < ratio * d2`.
///
/// Queries with fewer than two neighbours produce nothing. Returns the
/// accepted correspondences and the number of rejected queries.
pub(crate) fn ratio_test(
    neighbors: &[Vec<Neighbor>],
    ratio_threshold: f32,
) -> (Vec<Correspondence>, usize) {
    let mut accepted = Vec::new();
    let mut rejected = 0;
    for (query_index, n) in neighbors.iter().enumerate() {
        if n.len() < 2 {
            continue;
        }
        if n[0].distance < ratio_threshold * n[1].distance {
            accepted.push(Correspondence {
                query_index,
                database_index: n[0].index,
                distance: n[0].distance,
            });
        } else {
            rejected += 1;
        }
    }
    (accepted, rejected)
}

fn sort_by_indices(matches: &mut [Correspondence]) {
    matches.sort_by(|a, b| {
        a.query_index
            .cmp(&b.query_index)
            .then(a.database_index.cmp(&b.database_index))
            .then(a.distance.total_cmp(&b.distance))
    });
}

/// Collapse repeated `(query, database)` pairs, keeping the lowest distance.
///
/// Leaves `matches` sorted by query index. Returns the number removed.
pub(crate) fn remove_duplicates(matches: &mut Vec<Correspondence>) -> usize {
    let before = matches.len();
    sort_by_indices(matches);
    matches.dedup_by(|later, kept| {
        later.query_index == kept.query_index && later.database_index == kept.database_index
    });
    before - matches.len()
}

/// Keep forward pairs whose mirror appears in `reverse`.
///
/// `reverse` was computed with query and database swapped, so a forward pair
/// `(q, d)` is confirmed by a reverse pair `(d, q)`. Returns the number
/// removed.
pub(crate) fn retain_mutual(forward: &mut Vec<Correspondence>, reverse: &[Correspondence]) -> usize {
    let confirmed: HashSet<(usize, usize)> = reverse
        .iter()
        .map(|r| (r.database_index, r.query_index))
        .collect();
    let before = forward.len();
    forward.retain(|f| confirmed.contains(&(f.query_index, f.database_index)));
    before - forward.len()
}

/// Regroup flat neighbour lists into per-query correspondences.
pub(crate) fn neighbors_to_knn(neighbors: Vec<Vec<Neighbor>>) -> Vec<Vec<Correspondence>> {
    neighbors
        .into_iter()
        .enumerate()
        .map(|(query_index, n)| {
            n.into_iter()
                .map(|nb| Correspondence {
                    query_index,
                    database_index: nb.index,
                    distance: nb.distance,
                })
                .collect()
        })
        .collect()
}
