/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Property-based generators for [`Shape`] and [`Index`].
//!
//! These strategies are used in `proptest`-based tests, here and in
//! downstream array crates (through the `strategy` feature), to
//! construct randomized shapes and valid points within them.
//!
//! Example usage:
//!
//! ```ignore
//! use proptest::prelude::*;
//!
//! use ndslice::strategy::gen_shape_and_index;
//!
//! proptest! {
//!     #[test]
//!     fn test_index_in_bounds((shape, index) in gen_shape_and_index(3, 4)) {
//!         prop_assert!(shape.contains(&index));
//!     }
//! }
//! ```

use proptest::prelude::*;

use crate::Index;
use crate::Shape;

/// Generates a random [`Shape`] with between 1 and `max_dims`
/// dimensions, where each dimension has a size between 1 and
/// `max_len` (inclusive).
pub fn gen_shape(max_dims: usize, max_len: usize) -> impl Strategy<Value = Shape> {
    prop::collection::vec(1..=max_len, 1..=max_dims)
        .prop_map(|sizes| Shape::new(sizes).expect("sizes are positive"))
}

/// Generates a valid [`Index`] for `shape`.
pub fn gen_index(shape: &Shape) -> impl Strategy<Value = Index> {
    shape
        .sizes()
        .iter()
        .map(|&size| 0..size)
        .collect::<Vec<_>>()
        .prop_map(Index::from)
}

/// Generates a pair `(shape, index)` where `index` is valid for
/// `shape`.
pub fn gen_shape_and_index(
    max_dims: usize,
    max_len: usize,
) -> impl Strategy<Value = (Shape, Index)> {
    gen_shape(max_dims, max_len).prop_flat_map(|shape| {
        let index = gen_index(&shape);
        (Just(shape), index)
    })
}
