// Copyright (c) 2025 SynaDB Contributors
// Licensed under the SynaDB License. See LICENSE file for details.

//! Dense descriptor matrices.
//!
//! A detector produces one descriptor per keypoint; this module stores them as
//! a row-major `rows × cols` matrix so that a row is a contiguous slice. The
//! [`Descriptors`] enum tags the element type, which decides which matchers
//! can consume the data.
//!
//! | Variant | Element | Typical producer | Matchers |
//! |---------|---------|------------------|----------|
//! | [`Descriptors::F32`] | `f32` | SIFT, SURF, learned | Cascade hashing, brute force L2/L1 |
//! | [`Descriptors::U8`] | `u8` | ORB, BRIEF | Brute force Hamming |
//!
//! # Examples
//!
//! ```rust
//! use syna_match::DescriptorMatrix;
//!
//! let m = DescriptorMatrix::from_rows(vec![vec![1.0f32, 2.0], vec![3.0, 4.0]]).unwrap();
//! assert_eq!(m.rows(), 2);
//! assert_eq!(m.row(1), &[3.0, 4.0]);
//! ```

use crate::error::{MatchError, Result};

/// Row-major matrix of descriptors, one descriptor per row.
#[derive(Clone, Debug, PartialEq)]
pub struct DescriptorMatrix<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T: Copy + Default> DescriptorMatrix<T> {
    /// Create a zero-filled matrix.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![T::default(); rows * cols],
            rows,
            cols,
        }
    }

    /// Wrap a flat row-major buffer.
    ///
    /// Fails with [`MatchError::Incompatible`] if `data.len()` is not a
    /// multiple of `cols`, or if `cols` is zero while `data` is not empty.
    pub fn from_flat(data: Vec<T>, cols: usize) -> Result<Self> {
        if cols == 0 {
            if !data.is_empty() {
                return Err(MatchError::Incompatible(
                    "non-empty buffer with zero columns".to_string(),
                ));
            }
            return Ok(Self {
                data,
                rows: 0,
                cols: 0,
            });
        }
        if data.len() % cols != 0 {
            return Err(MatchError::Incompatible(format!(
                "buffer length {} is not a multiple of row width {}",
                data.len(),
                cols
            )));
        }
        let rows = data.len() / cols;
        Ok(Self { data, rows, cols })
    }

    /// Build a matrix from individual rows, which must all share one width.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(MatchError::Incompatible(format!(
                    "row {} has width {}, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            rows: rows.len(),
            cols,
        })
    }
}

impl<T> DescriptorMatrix<T> {
    /// Number of descriptors.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Descriptor dimensionality.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// True when there are no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Borrow row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows()`.
    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        let start = i * self.cols;
        &self.data[start..start + self.cols]
    }

    /// Iterate over rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        // chunks_exact panics on a zero chunk size
        let cols = self.cols.max(1);
        self.data.chunks_exact(cols).take(self.rows)
    }

    /// The flat row-major buffer.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable access to the flat row-major buffer.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// Descriptor matrix tagged with its element type.
#[derive(Clone, Debug, PartialEq)]
pub enum Descriptors {
    /// Floating-point descriptors (SIFT-like).
    F32(DescriptorMatrix<f32>),
    /// Binary descriptors packed into bytes (ORB-like).
    U8(DescriptorMatrix<u8>),
}

impl Descriptors {
    /// Number of descriptors.
    pub fn rows(&self) -> usize {
        match self {
            Descriptors::F32(m) => m.rows(),
            Descriptors::U8(m) => m.rows(),
        }
    }

    /// Descriptor width in elements.
    pub fn cols(&self) -> usize {
        match self {
            Descriptors::F32(m) => m.cols(),
            Descriptors::U8(m) => m.cols(),
        }
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    /// Element type name, for diagnostics.
    pub fn element_type(&self) -> &'static str {
        match self {
            Descriptors::F32(_) => "f32",
            Descriptors::U8(_) => "u8",
        }
    }

    /// Borrow the float matrix, if this is one.
    pub fn as_f32(&self) -> Option<&DescriptorMatrix<f32>> {
        match self {
            Descriptors::F32(m) => Some(m),
            Descriptors::U8(_) => None,
        }
    }

    /// Borrow the byte matrix, if this is one.
    pub fn as_u8(&self) -> Option<&DescriptorMatrix<u8>> {
        match self {
            Descriptors::U8(m) => Some(m),
            Descriptors::F32(_) => None,
        }
    }
}

impl From<DescriptorMatrix<f32>> for Descriptors {
    fn from(m: DescriptorMatrix<f32>) -> Self {
        Descriptors::F32(m)
    }
}

impl From<DescriptorMatrix<u8>> for Descriptors {
    fn from(m: DescriptorMatrix<u8>) -> Self {
        Descriptors::U8(m)
    }
}
