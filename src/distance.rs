// Copyright (c) 2025 SynaDB Contributors
// Licensed under the SynaDB License. See LICENSE file for details.

//! Distance metrics for descriptor matching.
//!
//! All metrics are designed so that lower values indicate more similar
//! descriptors.
//!
//! # Supported Metrics
//!
//! | Metric | Input | Range | Best For |
//! |--------|-------|-------|----------|
//! | L2 | `f32` | [0, ∞) | SIFT, SURF, learned float descriptors |
//! | L1 | `f32` | [0, ∞) | Histogram-like descriptors |
//! | Hamming | `u8` | [0, 8·D] | ORB, BRIEF, binary descriptors |
//!
//! The cascade hasher also uses [`hamming_words`] on its packed `u64` hash
//! codes for the coarse filtering stage.
//!
//! # Examples
//!
//! ```rust
//! use syna_match::distance::{euclidean_distance, hamming_bytes};
//!
//! let a = [1.0f32, 0.0, 0.0];
//! let b = [0.0f32, 1.0, 0.0];
//! assert!((euclidean_distance(&a, &b) - std::f32::consts::SQRT_2).abs() < 1e-6);
//!
//! assert_eq!(hamming_bytes(&[0b1111_0000], &[0b0000_0000]), 4);
//! ```

use serde::{Deserialize, Serialize};

/// Distance metric used by the exhaustive matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance: `sqrt(Σ(a_i - b_i)²)`.
    L2,

    /// Manhattan (L1) distance: `Σ|a_i - b_i|`.
    L1,

    /// Bit-count of the XOR of two byte strings.
    Hamming,
}

impl DistanceMetric {
    /// Distance between two float descriptors.
    ///
    /// `Hamming` is not defined on floats; it falls back to L2 so that a
    /// misconfigured metric still yields a total order.
    pub fn distance_f32(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "Descriptor dimensions must match");
        match self {
            DistanceMetric::L1 => manhattan_distance(a, b),
            DistanceMetric::L2 | DistanceMetric::Hamming => euclidean_distance(a, b),
        }
    }

    /// Whether the metric consumes float descriptors.
    pub fn is_float(&self) -> bool {
        !matches!(self, DistanceMetric::Hamming)
    }
}

/// Euclidean (L2) distance: `sqrt(Σ(a_i - b_i)²)`.
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    squared_euclidean_distance(a, b).sqrt()
}

/// Squared Euclidean distance, without the final square root.
#[inline]
pub fn squared_euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        let diff = x - y;
        sum += diff * diff;
    }
    sum
}

/// Manhattan (L1) distance: `Σ|a_i - b_i|`.
#[inline]
pub fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Hamming distance between two byte strings.
#[inline]
pub fn hamming_bytes(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Hamming distance between two codes packed into `u64` words.
#[inline]
pub fn hamming_words(a: &[u64], b: &[u64]) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Dot product, used for projecting descriptors onto hyperplanes.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
