//! Cascade hashing matcher
//!
//! Builds a hashed index over a database descriptor set once, then answers
//! ratio-tested match requests and raw k-NN requests against it.

use tracing::debug;

use crate::cascade::{CascadeConfig, CascadeHasher, HashedSet};
use crate::descriptor::{DescriptorMatrix, Descriptors};
use crate::error::{MatchError, Result};

use super::{
    neighbors_to_knn, ratio_test, remove_duplicates, retain_mutual, validate_ratio,
    Correspondence, DescriptorMatcher, MatchOutput, MatchStats,
};

/// Neighbours retrieved per query for the ratio test.
const RATIO_NEIGHBORS: usize = 2;

/// Database state retained between match requests.
#[derive(Debug)]
struct CascadeIndex {
    hasher: CascadeHasher,
    descriptors: DescriptorMatrix<f32>,
    zero_mean: Vec<f32>,
    hashed: HashedSet,
}

/// Approximate L2 matcher for float descriptors.
///
/// # Examples
///
/// ```rust
/// use syna_match::{CascadeHashingMatcher, DescriptorMatrix, Descriptors};
/// use syna_match::cascade::CascadeConfig;
///
/// let rows: Vec<Vec<f32>> = (0..500)
///     .map(|i| (0..32).map(|j| ((i * 131 + j * 17) % 97) as f32).collect())
///     .collect();
/// let db = Descriptors::F32(DescriptorMatrix::from_rows(rows)?);
///
/// let mut matcher = CascadeHashingMatcher::new(CascadeConfig::small());
/// matcher.build_index(&db)?;
///
/// let output = matcher.match_descriptors(&db, 0.8, false)?;
/// println!("{} matches, {} dropped", output.len(), output.stats.dropped_queries);
/// # Ok::<(), syna_match::MatchError>(())
/// ```
#[derive(Debug, Default)]
pub struct CascadeHashingMatcher {
    config: CascadeConfig,
    index: Option<CascadeIndex>,
}

impl CascadeHashingMatcher {
    /// Canonical matcher name.
    pub const NAME: &'static str = "FASTCASCADEHASHINGL2";

    /// Create an unindexed matcher.
    pub fn new(config: CascadeConfig) -> Self {
        Self {
            config,
            index: None,
        }
    }

    /// Non-empty float descriptors are the only accepted input.
    pub fn is_compatible(descriptors: &Descriptors) -> bool {
        matches!(descriptors, Descriptors::F32(m) if m.rows() > 0 && m.cols() > 0)
    }

    /// Hashing configuration.
    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Whether `build_index` has succeeded.
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Number of indexed descriptors (0 when unindexed).
    pub fn len(&self) -> usize {
        self.index.as_ref().map(|i| i.descriptors.rows()).unwrap_or(0)
    }

    /// True when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Width of the indexed descriptors.
    pub fn dimensions(&self) -> Option<usize> {
        self.index.as_ref().map(|i| i.descriptors.cols())
    }

    /// Centering vector of the indexed database.
    pub fn zero_mean(&self) -> Option<&[f32]> {
        self.index.as_ref().map(|i| i.zero_mean.as_slice())
    }

    /// Hashed database.
    pub fn hashed_database(&self) -> Option<&HashedSet> {
        self.index.as_ref().map(|i| &i.hashed)
    }

    /// Hash `database` and retain it for subsequent queries.
    ///
    /// Any previous index is discarded first, so a failed rebuild leaves the
    /// matcher unindexed.
    pub fn build_index(&mut self, database: &Descriptors) -> Result<()> {
        self.index = None;

        let descriptors = match database {
            Descriptors::F32(m) if Self::is_compatible(database) => m.clone(),
            _ => {
                return Err(MatchError::Incompatible(format!(
                    "{} requires non-empty f32 descriptors, got {} {}x{}",
                    Self::NAME,
                    database.element_type(),
                    database.rows(),
                    database.cols()
                )))
            }
        };

        let hasher = CascadeHasher::new(descriptors.cols(), self.config.clone())?;
        let zero_mean = CascadeHasher::zero_mean(&descriptors);
        let hashed = hasher.hash_set(&descriptors, &zero_mean)?;

        debug!(
            rows = descriptors.rows(),
            dims = descriptors.cols(),
            bucket_groups = self.config.bucket_groups,
            bits_per_bucket = self.config.bits_per_bucket,
            "built cascade index"
        );

        self.index = Some(CascadeIndex {
            hasher,
            descriptors,
            zero_mean,
            hashed,
        });
        Ok(())
    }

    fn index(&self) -> Result<&CascadeIndex> {
        self.index.as_ref().ok_or(MatchError::NotIndexed)
    }

    fn query_matrix<'a>(
        index: &CascadeIndex,
        query: &'a Descriptors,
    ) -> Result<&'a DescriptorMatrix<f32>> {
        let m = query.as_f32().ok_or_else(|| {
            MatchError::Incompatible(format!(
                "{} requires f32 query descriptors, got {}",
                Self::NAME,
                query.element_type()
            ))
        })?;
        if m.cols() != index.descriptors.cols() {
            return Err(MatchError::DimensionMismatch {
                expected: index.descriptors.cols(),
                got: m.cols(),
            });
        }
        if m.is_empty() {
            return Err(MatchError::EmptyInput);
        }
        Ok(m)
    }

    /// Ratio-tested, deduplicated, optionally cross-checked correspondences.
    pub fn match_descriptors(
        &self,
        query: &Descriptors,
        ratio_threshold: f32,
        cross_check: bool,
    ) -> Result<MatchOutput> {
        let index = self.index()?;
        validate_ratio(ratio_threshold)?;
        let query = Self::query_matrix(index, query)?;

        // Queries are centered with the database mean, not their own
        let hashed_query = index.hasher.hash_set(query, &index.zero_mean)?;
        let outcome = index.hasher.search(
            &index.hashed,
            &index.descriptors,
            &hashed_query,
            query,
            RATIO_NEIGHBORS,
        )?;

        let (mut matches, ratio_rejected) = ratio_test(&outcome.neighbors, ratio_threshold);
        let duplicates_removed = remove_duplicates(&mut matches);

        let mut cross_check_rejected = 0;
        if cross_check && !matches.is_empty() {
            let reverse = index.hasher.search(
                &hashed_query,
                query,
                &index.hashed,
                &index.descriptors,
                RATIO_NEIGHBORS,
            )?;
            let (reverse_matches, _) = ratio_test(&reverse.neighbors, ratio_threshold);
            cross_check_rejected = retain_mutual(&mut matches, &reverse_matches);
        }

        let stats = MatchStats {
            query_rows: query.rows(),
            dropped_queries: outcome.dropped_queries,
            ratio_rejected,
            duplicates_removed,
            cross_check_rejected,
        };
        debug!(
            matcher = Self::NAME,
            query_rows = stats.query_rows,
            matches = matches.len(),
            dropped = stats.dropped_queries,
            ratio_rejected = stats.ratio_rejected,
            cross_check_rejected = stats.cross_check_rejected,
            "matched descriptors"
        );

        Ok(MatchOutput { matches, stats })
    }

    /// Up to `k` neighbours per query row, ascending by distance.
    ///
    /// The outer list is index-parallel to the query rows; dropped queries
    /// have an empty list.
    pub fn knn_match(&self, query: &Descriptors, k: usize) -> Result<Vec<Vec<Correspondence>>> {
        let index = self.index()?;
        if k == 0 {
            return Err(MatchError::InvalidParameter(
                "k must be at least 1".to_string(),
            ));
        }
        let query = Self::query_matrix(index, query)?;

        let hashed_query = index.hasher.hash_set(query, &index.zero_mean)?;
        let outcome =
            index
                .hasher
                .search(&index.hashed, &index.descriptors, &hashed_query, query, k)?;

        Ok(neighbors_to_knn(outcome.neighbors))
    }

    /// One-shot matching: index `database`, match `query` against it.
    ///
    /// The transient index is discarded on return.
    pub fn match_pair(
        query: &Descriptors,
        database: &Descriptors,
        ratio_threshold: f32,
        cross_check: bool,
        config: CascadeConfig,
    ) -> Result<MatchOutput> {
        let mut matcher = Self::new(config);
        matcher.build_index(database)?;
        matcher.match_descriptors(query, ratio_threshold, cross_check)
    }
}

impl DescriptorMatcher for CascadeHashingMatcher {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn is_compatible(&self, descriptors: &Descriptors) -> bool {
        Self::is_compatible(descriptors)
    }

    fn build_index(&mut self, database: &Descriptors) -> Result<()> {
        CascadeHashingMatcher::build_index(self, database)
    }

    fn match_descriptors(
        &self,
        query: &Descriptors,
        ratio_threshold: f32,
        cross_check: bool,
    ) -> Result<MatchOutput> {
        CascadeHashingMatcher::match_descriptors(self, query, ratio_threshold, cross_check)
    }

    fn knn_match(&self, query: &Descriptors, k: usize) -> Result<Vec<Vec<Correspondence>>> {
        CascadeHashingMatcher::knn_match(self, query, k)
    }
}
