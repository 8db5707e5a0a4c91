//! Exhaustive matcher
//!
//! Compares every query row with every database row. Exact, never drops a
//! query, and the only matcher that accepts binary descriptors.

use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::debug;

use crate::cascade::Neighbor;
use crate::descriptor::{DescriptorMatrix, Descriptors};
use crate::distance::{hamming_bytes, DistanceMetric};
use crate::error::{MatchError, Result};

use super::{
    neighbors_to_knn, ratio_test, remove_duplicates, retain_mutual, validate_ratio,
    Correspondence, DescriptorMatcher, MatchOutput, MatchStats,
};

/// Exact k-NN matcher over float (L2, L1) or binary (Hamming) descriptors.
#[derive(Debug, Clone)]
pub struct BruteForceMatcher {
    metric: DistanceMetric,
    database: Option<Descriptors>,
}

impl Default for BruteForceMatcher {
    fn default() -> Self {
        Self::new(DistanceMetric::L2)
    }
}

impl BruteForceMatcher {
    /// Create an unindexed matcher using `metric`.
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            database: None,
        }
    }

    /// Distance metric.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Canonical matcher name for the metric.
    pub fn name(&self) -> &'static str {
        match self.metric {
            DistanceMetric::L2 => "BF",
            DistanceMetric::L1 => "BF_NORM_L1",
            DistanceMetric::Hamming => "BF_HAMMING",
        }
    }

    /// Float descriptors for L2/L1, byte descriptors for Hamming; never empty.
    pub fn is_compatible(&self, descriptors: &Descriptors) -> bool {
        if descriptors.rows() == 0 || descriptors.cols() == 0 {
            return false;
        }
        match descriptors {
            Descriptors::F32(_) => self.metric.is_float(),
            Descriptors::U8(_) => !self.metric.is_float(),
        }
    }

    /// Whether a database has been stored.
    pub fn is_indexed(&self) -> bool {
        self.database.is_some()
    }

    /// Store a copy of `database`.
    pub fn build_index(&mut self, database: &Descriptors) -> Result<()> {
        self.database = None;
        if !self.is_compatible(database) {
            return Err(MatchError::Incompatible(format!(
                "{} cannot index {} {}x{}",
                self.name(),
                database.element_type(),
                database.rows(),
                database.cols()
            )));
        }
        debug!(
            matcher = self.name(),
            rows = database.rows(),
            dims = database.cols(),
            "stored exhaustive index"
        );
        self.database = Some(database.clone());
        Ok(())
    }

    fn database(&self) -> Result<&Descriptors> {
        self.database.as_ref().ok_or(MatchError::NotIndexed)
    }

    fn check_query(&self, database: &Descriptors, query: &Descriptors) -> Result<()> {
        if database.element_type() != query.element_type() {
            return Err(MatchError::Incompatible(format!(
                "{} query must be {}, got {}",
                self.name(),
                database.element_type(),
                query.element_type()
            )));
        }
        if query.cols() != database.cols() {
            return Err(MatchError::DimensionMismatch {
                expected: database.cols(),
                got: query.cols(),
            });
        }
        if query.is_empty() {
            return Err(MatchError::EmptyInput);
        }
        Ok(())
    }

    fn scan(&self, database: &Descriptors, query: &Descriptors, k: usize) -> Result<Vec<Vec<Neighbor>>> {
        let metric = self.metric;
        match (database, query) {
            (Descriptors::F32(db), Descriptors::F32(q)) => {
                Ok(exhaustive_knn(db, q, k, |a, b| metric.distance_f32(a, b)))
            }
            (Descriptors::U8(db), Descriptors::U8(q)) => {
                Ok(exhaustive_knn(db, q, k, |a, b| hamming_bytes(a, b) as f32))
            }
            _ => Err(MatchError::Incompatible(format!(
                "cannot compare {} with {} descriptors",
                database.element_type(),
                query.element_type()
            ))),
        }
    }

    /// Ratio-tested, deduplicated, optionally cross-checked correspondences.
    pub fn match_descriptors(
        &self,
        query: &Descriptors,
        ratio_threshold: f32,
        cross_check: bool,
    ) -> Result<MatchOutput> {
        let database = self.database()?;
        validate_ratio(ratio_threshold)?;
        self.check_query(database, query)?;

        let neighbors = self.scan(database, query, 2)?;
        let (mut matches, ratio_rejected) = ratio_test(&neighbors, ratio_threshold);
        let duplicates_removed = remove_duplicates(&mut matches);

        let mut cross_check_rejected = 0;
        if cross_check && !matches.is_empty() {
            let reverse = self.scan(query, database, 2)?;
            let (reverse_matches, _) = ratio_test(&reverse, ratio_threshold);
            cross_check_rejected = retain_mutual(&mut matches, &reverse_matches);
        }

        let stats = MatchStats {
            query_rows: query.rows(),
            dropped_queries: 0,
            ratio_rejected,
            duplicates_removed,
            cross_check_rejected,
        };
        debug!(
            matcher = self.name(),
            query_rows = stats.query_rows,
            matches = matches.len(),
            ratio_rejected = stats.ratio_rejected,
            cross_check_rejected = stats.cross_check_rejected,
            "matched descriptors"
        );

        Ok(MatchOutput { matches, stats })
    }

    /// The `k` closest database rows of every query row, ascending.
    ///
    /// Returns fewer than `k` only when the database is smaller than `k`.
    pub fn knn_match(&self, query: &Descriptors, k: usize) -> Result<Vec<Vec<Correspondence>>> {
        let database = self.database()?;
        if k == 0 {
            return Err(MatchError::InvalidParameter(
                "k must be at least 1".to_string(),
            ));
        }
        self.check_query(database, query)?;
        Ok(neighbors_to_knn(self.scan(database, query, k)?))
    }

    /// One-shot matching: index `database`, match `query` against it.
    pub fn match_pair(
        query: &Descriptors,
        database: &Descriptors,
        ratio_threshold: f32,
        cross_check: bool,
        metric: DistanceMetric,
    ) -> Result<MatchOutput> {
        let mut matcher = Self::new(metric);
        matcher.build_index(database)?;
        matcher.match_descriptors(query, ratio_threshold, cross_check)
    }
}

fn by_distance(a: &(f32, usize), b: &(f32, usize)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

fn exhaustive_knn<T, F>(
    database: &DescriptorMatrix<T>,
    query: &DescriptorMatrix<T>,
    k: usize,
    distance: F,
) -> Vec<Vec<Neighbor>>
where
    T: Sync,
    F: Fn(&[T], &[T]) -> f32 + Sync,
{
    (0..query.rows())
        .into_par_iter()
        .map_init(
            || Vec::with_capacity(database.rows()),
            |scored: &mut Vec<(f32, usize)>, q| {
                let row = query.row(q);
                scored.clear();
                scored.extend(
                    database
                        .iter_rows()
                        .enumerate()
                        .map(|(idx, other)| (distance(row, other), idx)),
                );

                let keep = k.min(scored.len());
                if keep == 0 {
                    return Vec::new();
                }
                if keep < scored.len() {
                    scored.select_nth_unstable_by(keep - 1, by_distance);
                    scored.truncate(keep);
                }
                scored.sort_unstable_by(by_distance);

                scored
                    .iter()
                    .map(|&(distance, index)| Neighbor { distance, index })
                    .collect()
            },
        )
        .collect()
}

impl DescriptorMatcher for BruteForceMatcher {
    fn name(&self) -> &'static str {
        BruteForceMatcher::name(self)
    }

    fn is_compatible(&self, descriptors: &Descriptors) -> bool {
        BruteForceMatcher::is_compatible(self, descriptors)
    }

    fn build_index(&mut self, database: &Descriptors) -> Result<()> {
        BruteForceMatcher::build_index(self, database)
    }

    fn match_descriptors(
        &self,
        query: &Descriptors,
        ratio_threshold: f32,
        cross_check: bool,
    ) -> Result<MatchOutput> {
        BruteForceMatcher::match_descriptors(self, query, ratio_threshold, cross_check)
    }

    fn knn_match(&self, query: &Descriptors, k: usize) -> Result<Vec<Vec<Correspondence>>> {
        BruteForceMatcher::knn_match(self, query, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(rows: Vec<Vec<f32>>) -> Descriptors {
        Descriptors::F32(DescriptorMatrix::from_rows(rows).unwrap())
    }

    fn bytes(rows: Vec<Vec<u8>>) -> Descriptors {
        Descriptors::U8(DescriptorMatrix::from_rows(rows).unwrap())
    }

    #[test]
    fn test_two_point_database() {
        let db = floats(vec![vec![0.0; 4], vec![10.0; 4]]);
        let query = floats(vec![vec![0.0, 0.0, 0.0, 0.1]]);

        let output = BruteForceMatcher::match_pair(&query, &db, 0.8, false, DistanceMetric::L2)
            .unwrap();
        assert_eq!(output.len(), 1);
        let m = output.matches[0];
        assert_eq!((m.query_index, m.database_index), (0, 0));
        assert!((m.distance - 0.1).abs() < 1e-6);
        assert_eq!(output.stats.dropped_queries, 0);
    }

    #[test]
    fn test_l1_distance() {
        let db = floats(vec![vec![0.0, 0.0], vec![5.0, 5.0], vec![-5.0, 5.0]]);
        let query = floats(vec![vec![1.0, 1.0]]);
        let mut matcher = BruteForceMatcher::new(DistanceMetric::L1);
        matcher.build_index(&db).unwrap();

        let knn = matcher.knn_match(&query, 3).unwrap();
        let distances: Vec<f32> = knn[0].iter().map(|c| c.distance).collect();
        assert_eq!(distances, vec![2.0, 8.0, 10.0]);
    }

    #[test]
    fn test_hamming_matching() {
        let db = bytes(vec![vec![0x00, 0x00], vec![0xFF, 0xFF], vec![0xF0, 0x0F]]);
        let query = bytes(vec![vec![0xFE, 0xFF]]);
        let mut matcher = BruteForceMatcher::new(DistanceMetric::Hamming);
        matcher.build_index(&db).unwrap();

        let knn = matcher.knn_match(&query, 3).unwrap();
        let order: Vec<(usize, f32)> = knn[0]
            .iter()
            .map(|c| (c.database_index, c.distance))
            .collect();
        assert_eq!(order, vec![(1, 1.0), (2, 7.0), (0, 15.0)]);

        let output = matcher.match_descriptors(&query, 0.8, false).unwrap();
        assert_eq!(output.matches[0].database_index, 1);
    }

    #[test]
    fn test_element_type_guards() {
        let mut hamming = BruteForceMatcher::new(DistanceMetric::Hamming);
        assert!(matches!(
            hamming.build_index(&floats(vec![vec![1.0; 4]])),
            Err(MatchError::Incompatible(_))
        ));

        let mut l2 = BruteForceMatcher::default();
        l2.build_index(&floats(vec![vec![1.0; 2], vec![2.0; 2]])).unwrap();
        assert!(matches!(
            l2.match_descriptors(&bytes(vec![vec![1, 2]]), 0.8, false),
            Err(MatchError::Incompatible(_))
        ));
    }

    #[test]
    fn test_query_guards() {
        let mut matcher = BruteForceMatcher::default();
        assert!(matches!(
            matcher.knn_match(&floats(vec![vec![0.0; 3]]), 1),
            Err(MatchError::NotIndexed)
        ));

        matcher.build_index(&floats(vec![vec![0.0; 3], vec![1.0; 3]])).unwrap();
        assert!(matches!(
            matcher.match_descriptors(&floats(vec![vec![0.0; 5]]), 0.8, false),
            Err(MatchError::DimensionMismatch { expected: 3, got: 5 })
        ));
        assert!(matches!(
            matcher.match_descriptors(&Descriptors::F32(DescriptorMatrix::new(0, 3)), 0.8, false),
            Err(MatchError::EmptyInput)
        ));
        assert!(matches!(
            matcher.knn_match(&floats(vec![vec![0.0; 3]]), 0),
            Err(MatchError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_small_database_knn() {
        let mut matcher = BruteForceMatcher::default();
        matcher.build_index(&floats(vec![vec![0.0; 2]])).unwrap();
        let knn = matcher.knn_match(&floats(vec![vec![1.0; 2]]), 4).unwrap();
        assert_eq!(knn[0].len(), 1);

        // One database row cannot pass the ratio test
        let output = matcher
            .match_descriptors(&floats(vec![vec![1.0; 2]]), 0.8, false)
            .unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_cross_check_removes_one_sided() {
        // Both queries are closest to database row 0; only query 0 is mutual
        let db = floats(vec![vec![0.0], vec![100.0]]);
        let query = floats(vec![vec![1.0], vec![3.0], vec![150.0]]);

        let plain = BruteForceMatcher::match_pair(&query, &db, 0.9, false, DistanceMetric::L2)
            .unwrap();
        let checked = BruteForceMatcher::match_pair(&query, &db, 0.9, true, DistanceMetric::L2)
            .unwrap();

        assert_eq!(plain.len(), 3);
        let pairs: Vec<(usize, usize)> = checked
            .matches
            .iter()
            .map(|m| (m.query_index, m.database_index))
            .collect();
        assert_eq!(pairs, vec![(0, 0), (2, 1)]);
        assert_eq!(checked.stats.cross_check_rejected, 1);
    }
}
