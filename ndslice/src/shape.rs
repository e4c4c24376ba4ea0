/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::CartesianIterator;
use crate::Index;
use crate::Slice;
use crate::SliceError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ShapeError {
    #[error("dimension {dim} has extent 0")]
    EmptyDimension { dim: usize },

    #[error("shape {sizes:?} has more elements than fit in usize")]
    TooLarge { sizes: Vec<usize> },

    #[error("rank mismatch: expected {expected}, got {got}")]
    RankMismatch { expected: usize, got: usize },

    #[error("{index} out of range for dimension {dim} of size {size}")]
    IndexOutOfRange {
        index: usize,
        dim: usize,
        size: usize,
    },

    #[error(transparent)]
    SliceError(#[from] SliceError),
}

/// The extent of an n-dimensional array: one positive size per
/// dimension.
///
/// A shape is a dense row-major [`Slice`] with no offset. Its
/// canonical enumeration order, used wherever a whole array is
/// traversed, is row-major (the last dimension varies fastest), which
/// coincides with lexicographic order over [`Index`].
///
/// ```
/// # use ndslice::Index;
/// let s = ndslice::shape![2, 3];
/// let order: Vec<Index> = s.indices().collect();
/// assert_eq!(order.first(), Some(&Index::from([0, 0])));
/// assert_eq!(order.last(), Some(&Index::from([1, 2])));
/// assert_eq!(s.len(), 6);
/// ```
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq, Hash, Debug)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct Shape {
    slice: Slice,
}

impl Shape {
    /// Creates a new shape with the given extents. Every extent must
    /// be positive, and the number of elements must fit in a `usize`.
    pub fn new(sizes: impl Into<Vec<usize>>) -> Result<Self, ShapeError> {
        let sizes = sizes.into();
        if let Some(dim) = sizes.iter().position(|&size| size == 0) {
            return Err(ShapeError::EmptyDimension { dim });
        }
        if sizes
            .iter()
            .try_fold(1usize, |acc, &size| acc.checked_mul(size))
            .is_none()
        {
            return Err(ShapeError::TooLarge { sizes });
        }
        Ok(Self {
            slice: Slice::new_row_major(sizes),
        })
    }

    /// Return the 0-dimensional single element shape
    pub fn unity() -> Shape {
        Self {
            slice: Slice::new_row_major(Vec::<usize>::new()),
        }
    }

    /// The number of dimensions.
    pub fn rank(&self) -> usize {
        self.slice.num_dim()
    }

    /// The extent of each dimension.
    pub fn sizes(&self) -> &[usize] {
        self.slice.sizes()
    }

    /// The number of elements: the product of the extents.
    pub fn len(&self) -> usize {
        self.slice.len()
    }

    /// Always false: extents are positive, and a rank-0 shape has one
    /// element.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The dense row-major slice describing this shape.
    pub fn slice(&self) -> &Slice {
        &self.slice
    }

    /// Check that `index` addresses an element of this shape: same
    /// rank, and every coordinate strictly below its extent.
    pub fn check(&self, index: &Index) -> Result<(), ShapeError> {
        if index.rank() != self.rank() {
            return Err(ShapeError::RankMismatch {
                expected: self.rank(),
                got: index.rank(),
            });
        }
        for (dim, (&coord, &size)) in index.iter().zip(self.sizes()).enumerate() {
            if coord >= size {
                return Err(ShapeError::IndexOutOfRange {
                    index: coord,
                    dim,
                    size,
                });
            }
        }
        Ok(())
    }

    /// Whether `index` addresses an element of this shape.
    pub fn contains(&self, index: &Index) -> bool {
        self.check(index).is_ok()
    }

    /// The position of `index` in canonical (row-major) order.
    pub fn rank_of(&self, index: &Index) -> Result<usize, ShapeError> {
        self.check(index)?;
        Ok(self.slice.location(index)?)
    }

    /// Iterate over every index of this shape in canonical order.
    pub fn indices(&self) -> Indices {
        Indices {
            pos: CartesianIterator::new(self.sizes().to_vec()),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (dim, size) in self.sizes().iter().enumerate() {
            if dim > 0 {
                write!(f, "x")?;
            }
            write!(f, "{}", size)?;
        }
        write!(f, "]")
    }
}

impl TryFrom<Vec<usize>> for Shape {
    type Error = ShapeError;

    fn try_from(sizes: Vec<usize>) -> Result<Self, Self::Error> {
        Shape::new(sizes)
    }
}

impl From<Shape> for Vec<usize> {
    fn from(shape: Shape) -> Self {
        shape.sizes().to_vec()
    }
}

/// Iterator over the indices of a [`Shape`] in row-major order,
/// produced by [`Shape::indices`].
#[derive(Clone, Debug)]
pub struct Indices {
    pos: CartesianIterator,
}

impl Iterator for Indices {
    type Item = Index;

    fn next(&mut self) -> Option<Self::Item> {
        self.pos.next().map(Index::from)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pos.size_hint()
    }
}

impl ExactSizeIterator for Indices {}

/// Construct a new shape with the given extents.
///
/// ```
/// let s = ndslice::shape![2, 8];
/// assert_eq!(s.sizes(), &[2, 8]);
/// assert_eq!(s.slice().strides(), &[8, 1]);
/// ```
#[macro_export]
macro_rules! shape {
    ( $( $size:expr ),* $(,)? ) => {
        {
            let sizes: Vec<usize> = vec![$( $size ),*];
            $crate::shape::Shape::new(sizes).unwrap()
        }
    };
}
