//! Random hyperplane projections for the cascade hasher
//!
//! Every hash bit is the sign of a dot product between a centered descriptor
//! and one random hyperplane. Two projection families are drawn:
//!
//! - the primary projection, `D × D`, giving one bit per descriptor dimension
//!   (the binary code compared by Hamming distance);
//! - `G` secondary projections, each `B × D`, giving one `B`-bit bucket id per
//!   group.
//!
//! Hyperplanes are sampled from a standard normal distribution with a seeded
//! ChaCha generator, so a given seed always reproduces the same matrices.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::distance::dot;

/// Projection matrices, immutable once drawn.
///
/// Hyperplanes are stored as contiguous row-major arrays:
/// - primary: `[bit][dimension]`, size `D * D`
/// - secondary: `[group][bit][dimension]`, size `G * B * D`
#[derive(Clone, Debug)]
pub struct ProjectionParameters {
    dimensions: usize,
    bucket_groups: usize,
    bits_per_bucket: usize,
    primary: Vec<f32>,
    secondary: Vec<f32>,
}

impl ProjectionParameters {
    /// Draw projections for `dimensions`-wide descriptors.
    ///
    /// The primary matrix is sampled first in row-major order, followed by
    /// each group's matrix in group order.
    pub fn generate(
        dimensions: usize,
        bucket_groups: usize,
        bits_per_bucket: usize,
        seed: u64,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let primary: Vec<f32> = (0..dimensions * dimensions)
            .map(|_| rng.sample(StandardNormal))
            .collect();

        let secondary: Vec<f32> = (0..bucket_groups * bits_per_bucket * dimensions)
            .map(|_| rng.sample(StandardNormal))
            .collect();

        Self {
            dimensions,
            bucket_groups,
            bits_per_bucket,
            primary,
            secondary,
        }
    }

    /// Descriptor dimensionality `D`.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of bucket groups `G`.
    pub fn bucket_groups(&self) -> usize {
        self.bucket_groups
    }

    /// Bits per bucket id `B`.
    pub fn bits_per_bucket(&self) -> usize {
        self.bits_per_bucket
    }

    /// Number of `u64` words holding one primary code.
    pub fn code_words(&self) -> usize {
        self.dimensions.div_ceil(64)
    }

    /// Primary hyperplane for code bit `bit`.
    #[inline]
    fn primary_plane(&self, bit: usize) -> &[f32] {
        let start = bit * self.dimensions;
        &self.primary[start..start + self.dimensions]
    }

    /// Secondary hyperplane for bit `bit` of group `group`.
    #[inline]
    fn secondary_plane(&self, group: usize, bit: usize) -> &[f32] {
        let plane_idx = group * self.bits_per_bucket + bit;
        let start = plane_idx * self.dimensions;
        &self.secondary[start..start + self.dimensions]
    }

    /// Write the primary code of a centered descriptor into `code`.
    ///
    /// Bit `i` of the code lands in bit `i % 64` of word `i / 64`.
    pub fn primary_code(&self, centered: &[f32], code: &mut [u64]) {
        debug_assert_eq!(code.len(), self.code_words());
        code.fill(0);
        for bit in 0..self.dimensions {
            if dot(self.primary_plane(bit), centered) > 0.0 {
                code[bit / 64] |= 1u64 << (bit % 64);
            }
        }
    }

    /// Bucket id of a centered descriptor in `group`.
    ///
    /// Sign bits are shifted in from the left, first hyperplane first.
    pub fn bucket_id(&self, centered: &[f32], group: usize) -> u16 {
        let mut id: u16 = 0;
        for bit in 0..self.bits_per_bucket {
            let positive = dot(self.secondary_plane(group, bit), centered) > 0.0;
            id = (id << 1) | positive as u16;
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_deterministic_with_seed() {
        let a = ProjectionParameters::generate(32, 4, 8, 42);
        let b = ProjectionParameters::generate(32, 4, 8, 42);

        let v: Vec<f32> = (0..32).map(|i| (i as f32 * 0.37).sin()).collect();
        let mut ca = vec![0u64; a.code_words()];
        let mut cb = vec![0u64; b.code_words()];
        a.primary_code(&v, &mut ca);
        b.primary_code(&v, &mut cb);

        assert_eq!(ca, cb);
        for g in 0..4 {
            assert_eq!(a.bucket_id(&v, g), b.bucket_id(&v, g));
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = ProjectionParameters::generate(16, 1, 4, 1);
        let b = ProjectionParameters::generate(16, 1, 4, 2);
        assert_ne!(a.primary, b.primary);
    }

    #[test]
    fn test_opposite_vectors_get_complementary_codes() {
        let p = ProjectionParameters::generate(70, 2, 10, 7);
        let v: Vec<f32> = (0..70).map(|i| (i as f32 * 0.11).cos() + 0.5).collect();
        let neg: Vec<f32> = v.iter().map(|x| -x).collect();

        let mut cv = vec![0u64; p.code_words()];
        let mut cn = vec![0u64; p.code_words()];
        p.primary_code(&v, &mut cv);
        p.primary_code(&neg, &mut cn);

        assert_eq!(crate::distance::hamming_words(&cv, &cn), 70);
        assert_eq!(p.bucket_id(&v, 0) ^ p.bucket_id(&neg, 0), 0b11_1111_1111);
    }

    #[test]
    fn test_bucket_id_fits_in_bits() {
        let p = ProjectionParameters::generate(8, 3, 5, 11);
        let v = vec![1.0f32; 8];
        for g in 0..3 {
            assert!(p.bucket_id(&v, g) < 32);
        }
    }
}
