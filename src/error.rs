// Copyright (c) 2025 SynaDB Contributors
// Licensed under the SynaDB License. See LICENSE file for details.

//! Error types for descriptor matching.
//!
//! This module provides:
//! - [`MatchError`] - The error enum returned by every fallible operation
//! - [`Result<T>`] - A type alias for `std::result::Result<T, MatchError>`
//!
//! Structural failures (bad parameters, incompatible inputs, querying before
//! indexing) are always reported to the caller. A query row that gathers too
//! few hash candidates is *not* an error: it is counted in
//! [`MatchStats::dropped_queries`](crate::matcher::MatchStats) instead.

/// Result type alias for matching operations.
///
/// This is equivalent to `std::result::Result<T, MatchError>`.
pub type Result<T> = std::result::Result<T, MatchError>;

/// Errors that can occur while indexing or matching descriptors.
///
/// # Examples
///
/// ```rust
/// use syna_match::{CascadeHashingMatcher, DescriptorMatrix, Descriptors, MatchError};
///
/// let matcher = CascadeHashingMatcher::default();
/// let query = Descriptors::F32(DescriptorMatrix::new(4, 8));
///
/// // Querying before an index is built is rejected
/// match matcher.match_descriptors(&query, 0.8, false) {
///     Err(MatchError::NotIndexed) => {}
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// Invalid construction or call parameter (dimension, bucket layout, ratio, k).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A descriptor matrix with zero rows (or an empty centering vector).
    #[error("Empty input: descriptor matrix has no rows")]
    EmptyInput,

    /// Descriptors of the wrong element type or with inconsistent row widths.
    #[error("Incompatible descriptors: {0}")]
    Incompatible(String),

    /// A query was issued before a successful `build_index`.
    #[error("No index has been built")]
    NotIndexed,

    /// Descriptor width differs from the indexed width.
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Width of the indexed descriptors
        expected: usize,
        /// Width of the descriptors provided
        got: usize,
    },

    /// I/O error while reading configuration or descriptor files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration or descriptor file.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}
