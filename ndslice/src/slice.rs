/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use serde::Deserialize;
use serde::Serialize;

/// The type of error for slice operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SliceError {
    #[error("invalid dims: expected {expected}, got {got}")]
    InvalidDims { expected: usize, got: usize },

    #[error("nonrectangular shape")]
    NonrectangularShape,

    #[error("nonunique strides")]
    NonuniqueStrides,

    #[error("stride {stride} must be larger than size of previous space {space}")]
    StrideTooSmall { stride: usize, space: usize },

    #[error("stride {stride} times size {size} overflows")]
    Overflow { stride: usize, size: usize },
}

/// A layout mapping the coordinates of an n-dimensional array into a
/// flat buffer: the value for coordinate `c` lives at
/// `buffer[slice.location(c)]`, which is `offset + sum(c[i] * strides[i])`.
///
/// A dense 4x4x4 array in row-major order:
/// ```
/// # use ndslice::Slice;
/// let s = Slice::new(0, vec![4, 4, 4], vec![16, 4, 1]).unwrap();
/// assert_eq!(s, Slice::new_row_major(vec![4, 4, 4]));
/// assert_eq!(s.location(&[1, 2, 3]).unwrap(), 16 + 8 + 3);
/// ```
///
/// The same extents laid out column-major put the first dimension
/// closest together in memory:
///
/// ```
/// # use ndslice::Slice;
/// let s = Slice::new_column_major(vec![2, 3]);
/// assert_eq!(s.location(&[1, 0]).unwrap(), 1);
/// assert_eq!(s.location(&[0, 1]).unwrap(), 2);
/// assert_eq!(s.extent(), 6);
/// ```
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Slice {
    offset: usize,
    sizes: Vec<usize>,
    strides: Vec<usize>,
}

impl Slice {
    /// Create a new Slice with the provided offset, sizes, and
    /// strides. New performs validation to ensure that sizes and strides
    /// are compatible:
    ///   - They have to be the same length (i.e., same number of dimensions)
    ///   - They have to be rectangular (i.e., stride n+1 has to evenly divide into stride n)
    ///   - Strides must be nonoverlapping (each stride has to be larger than the previous space)
    ///   - The space spanned must be addressable
    pub fn new(offset: usize, sizes: Vec<usize>, strides: Vec<usize>) -> Result<Self, SliceError> {
        if sizes.len() != strides.len() {
            return Err(SliceError::InvalidDims {
                expected: sizes.len(),
                got: strides.len(),
            });
        }
        let mut combined: Vec<(usize, usize)> =
            strides.iter().cloned().zip(sizes.iter().cloned()).collect();
        combined.sort();

        let mut prev_stride: Option<usize> = None;
        let mut prev_size: Option<usize> = None;
        let mut total: usize = 1;
        for (stride, size) in combined {
            if let Some(prev_stride) = prev_stride {
                if stride % prev_stride != 0 {
                    return Err(SliceError::NonrectangularShape);
                }
                // Strides for single element dimensions can repeat, because they are unused
                if stride == prev_stride && size != 1 && prev_size.unwrap_or(1) != 1 {
                    return Err(SliceError::NonuniqueStrides);
                }
            }
            if total > stride {
                return Err(SliceError::StrideTooSmall {
                    stride,
                    space: total,
                });
            }
            total = stride
                .checked_mul(size)
                .ok_or(SliceError::Overflow { stride, size })?;
            prev_stride = Some(stride);
            prev_size = Some(size);
        }

        Ok(Slice {
            offset,
            sizes,
            strides,
        })
    }

    /// Create a new slice of the given sizes in row-major order: the
    /// last dimension varies fastest in memory.
    pub fn new_row_major(sizes: impl Into<Vec<usize>>) -> Self {
        let sizes = sizes.into();
        let mut strides = sizes.clone();
        let _ = strides.iter_mut().rev().fold(1, dense_stride);
        Self {
            offset: 0,
            sizes,
            strides,
        }
    }

    /// Create a new slice of the given sizes in column-major order:
    /// the first dimension varies fastest in memory.
    pub fn new_column_major(sizes: impl Into<Vec<usize>>) -> Self {
        let sizes = sizes.into();
        let mut strides = sizes.clone();
        let _ = strides.iter_mut().fold(1, dense_stride);
        Self {
            offset: 0,
            sizes,
            strides,
        }
    }

    /// The number of dimensions in this slice.
    pub fn num_dim(&self) -> usize {
        self.sizes.len()
    }

    /// This is the offset from which the first value in the Slice begins.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The shape of the slice; that is, the size of each dimension.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// The strides of the slice; that is, the distance between each
    /// element at a given index in the underlying array.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Return the location of the provided coordinates.
    pub fn location(&self, coord: &[usize]) -> Result<usize, SliceError> {
        if coord.len() != self.sizes.len() {
            return Err(SliceError::InvalidDims {
                expected: self.sizes.len(),
                got: coord.len(),
            });
        }
        Ok(self.offset
            + coord
                .iter()
                .zip(&self.strides)
                .map(|(pos, stride)| pos * stride)
                .sum::<usize>())
    }

    /// The number of coordinates in the slice, saturating at
    /// `usize::MAX`.
    pub fn len(&self) -> usize {
        self.sizes.iter().fold(1, |acc, &size| acc.saturating_mul(size))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The smallest buffer length that holds every location of this
    /// slice, saturating at `usize::MAX`.
    pub fn extent(&self) -> usize {
        if self.is_empty() {
            return self.offset;
        }
        self.sizes
            .iter()
            .zip(&self.strides)
            .fold(self.offset, |acc, (size, stride)| {
                acc.saturating_add((size - 1).saturating_mul(*stride))
            })
            .saturating_add(1)
    }
}

// Replace a size by the stride of its dimension in a dense layout,
// carrying the space spanned so far.
fn dense_stride(acc: usize, n: &mut usize) -> usize {
    let next = n.saturating_mul(acc);
    *n = acc;
    next
}

impl std::fmt::Display for Slice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Iterates over all coordinate tuples in an N-dimensional space.
///
/// Yields each point in row-major order for the shape defined by
/// `dims`, where each coordinate lies in `[0..dims[i])`. A
/// zero-dimensional space has exactly one point, the empty tuple.
///
/// # Example
/// ```
/// # use ndslice::CartesianIterator;
/// let iter = CartesianIterator::new(vec![2, 3]);
/// let coords: Vec<_> = iter.collect();
/// assert_eq!(coords, vec![
///     vec![0, 0], vec![0, 1], vec![0, 2],
///     vec![1, 0], vec![1, 1], vec![1, 2],
/// ]);
/// ```
#[derive(Clone, Debug)]
pub struct CartesianIterator {
    dims: Vec<usize>,
    index: usize,
    total: usize,
}

impl CartesianIterator {
    pub fn new(dims: Vec<usize>) -> Self {
        let total = dims.iter().fold(1, |acc: usize, &dim| acc.saturating_mul(dim));
        CartesianIterator {
            dims,
            index: 0,
            total,
        }
    }
}

impl Iterator for CartesianIterator {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.total {
            return None;
        }

        let mut result: Vec<usize> = vec![0; self.dims.len()];
        let mut rest = self.index;
        for (i, dim) in self.dims.iter().enumerate().rev() {
            result[i] = rest % dim;
            rest /= dim;
        }
        self.index += 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CartesianIterator {}
