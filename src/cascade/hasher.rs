//! Cascade hasher: hashing and two-stage candidate search
//!
//! Search for every query row runs three stages:
//!
//! 1. **Bucket gathering**: union of the database buckets the query falls
//!    into, one per group, each database row counted once.
//! 2. **Hamming filter**: candidates are ranked by the Hamming distance
//!    between primary codes; only the best `top_candidates` survive.
//! 3. **Exact re-rank**: the survivors are ranked by the true L2 distance on
//!    the raw (uncentered) descriptors and the best `nn` are reported.
//!
//! A query whose deduplicated candidate count is `<= nn` is dropped: it yields
//! no neighbours and is counted in [`SearchOutcome::dropped_queries`].
//!
//! Hashing and search both run row-parallel. Each worker owns its scratch
//! buffers, so one hasher and its hashed sets may serve concurrent searches.

use rayon::prelude::*;

use crate::descriptor::DescriptorMatrix;
use crate::distance::{euclidean_distance, hamming_words};
use crate::error::{MatchError, Result};

use super::config::CascadeConfig;
use super::hashed::HashedSet;
use super::projection::ProjectionParameters;

/// One retrieved database neighbour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    /// Exact L2 distance to the query descriptor
    pub distance: f32,
    /// Row of the database descriptor
    pub index: usize,
}

/// Result of a batch search.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchOutcome {
    /// Neighbours of every query row, ascending by distance. Dropped queries
    /// have an empty list.
    pub neighbors: Vec<Vec<Neighbor>>,
    /// Queries that gathered too few candidates to report `nn` neighbours.
    pub dropped_queries: usize,
}

/// Per-worker search buffers, sized to the database.
struct SearchScratch {
    used: Vec<bool>,
    candidates: Vec<u32>,
    hamming: Vec<(u32, u32)>,
    exact: Vec<(f32, u32)>,
}

impl SearchScratch {
    fn new(database_len: usize) -> Self {
        Self {
            used: vec![false; database_len],
            candidates: Vec::new(),
            hamming: Vec::new(),
            exact: Vec::new(),
        }
    }
}

/// Owner of the projection parameters.
///
/// # Examples
///
/// ```rust
/// use syna_match::cascade::{CascadeConfig, CascadeHasher};
/// use syna_match::DescriptorMatrix;
///
/// let rows: Vec<Vec<f32>> = (0..64)
///     .map(|i| (0..16).map(|j| ((i * 16 + j) as f32 * 0.7).sin()).collect())
///     .collect();
/// let db = DescriptorMatrix::from_rows(rows).unwrap();
///
/// let hasher = CascadeHasher::new(16, CascadeConfig::small()).unwrap();
/// let mean = CascadeHasher::zero_mean(&db);
/// let hashed = hasher.hash_set(&db, &mean).unwrap();
///
/// let outcome = hasher.search(&hashed, &db, &hashed, &db, 2).unwrap();
/// assert_eq!(outcome.neighbors.len(), 64);
/// ```
#[derive(Clone, Debug)]
pub struct CascadeHasher {
    config: CascadeConfig,
    projections: ProjectionParameters,
}

impl CascadeHasher {
    /// Draw projections for `dimensions`-wide descriptors.
    ///
    /// Fails with [`MatchError::InvalidParameter`] if `dimensions` is zero or
    /// the bucket layout in `config` is out of range.
    pub fn new(dimensions: usize, config: CascadeConfig) -> Result<Self> {
        if dimensions == 0 {
            return Err(MatchError::InvalidParameter(
                "descriptor dimension must be positive".to_string(),
            ));
        }
        config.validate()?;

        let projections = ProjectionParameters::generate(
            dimensions,
            config.bucket_groups as usize,
            config.bits_per_bucket as usize,
            config.seed,
        );

        Ok(Self {
            config,
            projections,
        })
    }

    /// Configuration the projections were drawn with.
    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Descriptor dimensionality.
    pub fn dimensions(&self) -> usize {
        self.projections.dimensions()
    }

    /// The projection matrices.
    pub fn projections(&self) -> &ProjectionParameters {
        &self.projections
    }

    /// Column-wise mean of `descriptors`.
    ///
    /// Returns `cols()` zeros for a matrix without rows.
    pub fn zero_mean(descriptors: &DescriptorMatrix<f32>) -> Vec<f32> {
        let mut sums = vec![0.0f64; descriptors.cols()];
        if descriptors.is_empty() {
            return vec![0.0; descriptors.cols()];
        }
        for row in descriptors.iter_rows() {
            for (s, &x) in sums.iter_mut().zip(row) {
                *s += x as f64;
            }
        }
        let n = descriptors.rows() as f64;
        sums.into_iter().map(|s| (s / n) as f32).collect()
    }

    /// Hash every row of `descriptors`, centered by `zero_mean`.
    pub fn hash_set(
        &self,
        descriptors: &DescriptorMatrix<f32>,
        zero_mean: &[f32],
    ) -> Result<HashedSet> {
        if descriptors.is_empty() || zero_mean.is_empty() {
            return Err(MatchError::EmptyInput);
        }
        let dims = self.dimensions();
        if descriptors.cols() != dims {
            return Err(MatchError::DimensionMismatch {
                expected: dims,
                got: descriptors.cols(),
            });
        }
        if zero_mean.len() != dims {
            return Err(MatchError::DimensionMismatch {
                expected: dims,
                got: zero_mean.len(),
            });
        }

        let code_words = self.projections.code_words();
        let groups = self.projections.bucket_groups();
        let rows = descriptors.rows();

        let mut codes = vec![0u64; rows * code_words];
        let mut bucket_ids = vec![0u16; rows * groups];

        codes
            .par_chunks_mut(code_words)
            .zip(bucket_ids.par_chunks_mut(groups))
            .enumerate()
            .for_each_init(
                || vec![0.0f32; dims],
                |centered, (row, (code, ids))| {
                    for ((c, &x), &m) in centered
                        .iter_mut()
                        .zip(descriptors.row(row))
                        .zip(zero_mean)
                    {
                        *c = x - m;
                    }
                    self.projections.primary_code(centered, code);
                    for (group, id) in ids.iter_mut().enumerate() {
                        *id = self.projections.bucket_id(centered, group);
                    }
                },
            );

        Ok(HashedSet::from_parts(
            dims,
            code_words,
            groups,
            self.config.buckets_per_group(),
            codes,
            bucket_ids,
        ))
    }

    /// Find up to `nn` neighbours in the database for every query row.
    ///
    /// Both hashed sets must come from this hasher and be index-parallel to
    /// their descriptor matrices.
    pub fn search(
        &self,
        database: &HashedSet,
        database_descriptors: &DescriptorMatrix<f32>,
        query: &HashedSet,
        query_descriptors: &DescriptorMatrix<f32>,
        nn: usize,
    ) -> Result<SearchOutcome> {
        if query_descriptors.cols() != database_descriptors.cols() {
            return Err(MatchError::DimensionMismatch {
                expected: database_descriptors.cols(),
                got: query_descriptors.cols(),
            });
        }
        if nn == 0 {
            return Err(MatchError::InvalidParameter(
                "number of neighbours must be at least 1".to_string(),
            ));
        }
        if database.len() != database_descriptors.rows() || query.len() != query_descriptors.rows()
        {
            return Err(MatchError::InvalidParameter(
                "hashed set does not match its descriptor matrix".to_string(),
            ));
        }
        let groups = self.projections.bucket_groups();
        if database.bucket_groups() != groups || query.bucket_groups() != groups {
            return Err(MatchError::InvalidParameter(
                "hashed set was built with a different bucket layout".to_string(),
            ));
        }
        let buckets = self.config.buckets_per_group();
        if database.buckets_per_group() != buckets || query.buckets_per_group() != buckets {
            return Err(MatchError::InvalidParameter(format!(
                "hashed set has {} / {} buckets per group, hasher uses {}",
                database.buckets_per_group(),
                query.buckets_per_group(),
                buckets
            )));
        }
        let dims = self.dimensions();
        if database.dimensions() != dims || query.dimensions() != dims {
            return Err(MatchError::InvalidParameter(format!(
                "hashed set codes are {} / {} bits wide, hasher uses {}",
                database.dimensions(),
                query.dimensions(),
                dims
            )));
        }

        let shortlist = self.config.top_candidates.max(nn);

        let neighbors: Vec<Vec<Neighbor>> = (0..query.len())
            .into_par_iter()
            .map_init(
                || SearchScratch::new(database.len()),
                |scratch, q| {
                    search_one(
                        scratch,
                        database,
                        database_descriptors,
                        query,
                        query_descriptors.row(q),
                        q,
                        nn,
                        shortlist,
                    )
                },
            )
            .collect();

        let dropped_queries = neighbors.iter().filter(|n| n.is_empty()).count();

        Ok(SearchOutcome {
            neighbors,
            dropped_queries,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn search_one(
    scratch: &mut SearchScratch,
    database: &HashedSet,
    database_descriptors: &DescriptorMatrix<f32>,
    query: &HashedSet,
    query_row: &[f32],
    q: usize,
    nn: usize,
    shortlist: usize,
) -> Vec<Neighbor> {
    let hashed = query.get(q);

    scratch.candidates.clear();
    for (group, &bucket_id) in hashed.bucket_ids.iter().enumerate() {
        for &idx in database.bucket(group, bucket_id) {
            let seen = &mut scratch.used[idx as usize];
            if !*seen {
                *seen = true;
                scratch.candidates.push(idx);
            }
        }
    }
    for &idx in &scratch.candidates {
        scratch.used[idx as usize] = false;
    }

    if scratch.candidates.len() <= nn {
        return Vec::new();
    }

    scratch.hamming.clear();
    scratch.hamming.extend(
        scratch
            .candidates
            .iter()
            .map(|&idx| (hamming_words(hashed.code, database.code(idx as usize)), idx)),
    );
    let keep = shortlist.min(scratch.hamming.len());
    if keep < scratch.hamming.len() {
        scratch.hamming.select_nth_unstable(keep - 1);
        scratch.hamming.truncate(keep);
    }

    scratch.exact.clear();
    scratch.exact.extend(scratch.hamming.iter().map(|&(_, idx)| {
        (
            euclidean_distance(query_row, database_descriptors.row(idx as usize)),
            idx,
        )
    }));

    if scratch.exact.len() < nn {
        return Vec::new();
    }

    scratch
        .exact
        .sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    scratch.exact[..nn]
        .iter()
        .map(|&(distance, idx)| Neighbor {
            distance,
            index: idx as usize,
        })
        .collect()
}
