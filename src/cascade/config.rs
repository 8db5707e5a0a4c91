//! Configuration for the cascade hasher

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};

/// Seed used when none is configured, so that repeated runs hash identically.
pub const DEFAULT_SEED: u64 = 5489;

/// Largest supported bucket width; bucket ids are stored as `u16`.
pub const MAX_BITS_PER_BUCKET: u8 = 16;

/// Configuration for the cascade hasher
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Number of independent bucket groups (more groups = better recall, more candidates)
    pub bucket_groups: u8,

    /// Bits per bucket id (2^bits_per_bucket buckets per group)
    pub bits_per_bucket: u8,

    /// Seed for the random projections
    pub seed: u64,

    /// Candidates kept after Hamming filtering, re-ranked by exact L2 distance
    pub top_candidates: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            bucket_groups: 6,
            bits_per_bucket: 10, // 1024 buckets per group
            seed: DEFAULT_SEED,
            top_candidates: 10,
        }
    }
}

impl CascadeConfig {
    /// Create config for small descriptor sets (< 2K descriptors)
    pub fn small() -> Self {
        Self {
            bits_per_bucket: 6, // Only 64 buckets - ensures collisions
            ..Default::default()
        }
    }

    /// Create config optimized for recall over speed
    pub fn high_recall() -> Self {
        Self {
            bucket_groups: 10,
            bits_per_bucket: 8,
            top_candidates: 20,
            ..Default::default()
        }
    }

    /// Same configuration with a different seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of buckets in each group's table
    pub fn buckets_per_group(&self) -> usize {
        1usize << self.bits_per_bucket
    }

    /// Check the bucket layout.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_groups == 0 {
            return Err(MatchError::InvalidParameter(
                "bucket_groups must be at least 1".to_string(),
            ));
        }
        if self.bits_per_bucket == 0 || self.bits_per_bucket > MAX_BITS_PER_BUCKET {
            return Err(MatchError::InvalidParameter(format!(
                "bits_per_bucket must be in 1..={}, got {}",
                MAX_BITS_PER_BUCKET, self.bits_per_bucket
            )));
        }
        if self.top_candidates == 0 {
            return Err(MatchError::InvalidParameter(
                "top_candidates must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
