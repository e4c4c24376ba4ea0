/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Shapes and indices for n-dimensional arrays.
//!
//! Provides [`Shape`], the extent of an array, [`Index`], a point
//! within it, and [`Slice`], a compact strided layout mapping points
//! to offsets in a flat buffer. Shapes define the canonical
//! (row-major) enumeration order used for whole-array traversal.
//!
//! The crate has no notion of element values; array crates build on
//! it for bounds checking, iteration, and storage layout.

mod index;
pub use index::Index;

mod slice;
pub use slice::CartesianIterator;
pub use slice::Slice;
pub use slice::SliceError;

/// Core types for representing multidimensional shapes.
pub mod shape;

/// Iterates the indices of a `Shape` in canonical order.
pub use shape::Indices;
/// Describes the extent of a multidimensional array.
pub use shape::Shape;
/// Errors that can occur during shape construction or index validation.
pub use shape::ShapeError;

/// Property-based generators for randomized test input.
#[cfg(any(test, feature = "strategy"))]
pub mod strategy;
