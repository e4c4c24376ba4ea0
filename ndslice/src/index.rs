/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fmt;
use std::ops::Deref;

use serde::Deserialize;
use serde::Serialize;

/// A point in an n-dimensional array: one coordinate per dimension.
///
/// Equality and hashing are component-wise, so two indices built
/// independently from the same coordinates are interchangeable as
/// map keys:
///
/// ```
/// # use std::collections::HashMap;
/// # use ndslice::Index;
/// let mut seen = HashMap::new();
/// seen.insert(Index::from(vec![1, 2]), "a");
/// assert_eq!(seen.get(&Index::from([1, 2])), Some(&"a"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Index(Vec<usize>);

impl Index {
    /// Create an index from its coordinates.
    pub fn new(coords: Vec<usize>) -> Self {
        Self(coords)
    }

    /// The zero-dimensional index.
    pub fn scalar() -> Self {
        Self(Vec::new())
    }

    /// The number of coordinates.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// The coordinates of this index.
    pub fn coords(&self) -> &[usize] {
        &self.0
    }

    /// Deconstruct the index into its coordinates.
    pub fn into_inner(self) -> Vec<usize> {
        self.0
    }
}

impl Deref for Index {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

impl AsRef<[usize]> for Index {
    fn as_ref(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for Index {
    fn from(coords: Vec<usize>) -> Self {
        Self(coords)
    }
}

impl From<&[usize]> for Index {
    fn from(coords: &[usize]) -> Self {
        Self(coords.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Index {
    fn from(coords: [usize; N]) -> Self {
        Self(coords.to_vec())
    }
}

impl FromIterator<usize> for Index {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, coord) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", coord)?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index{}", self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::Hash;
    use std::hash::Hasher;

    use super::*;

    fn hash_of(index: &Index) -> u64 {
        let mut hasher = DefaultHasher::new();
        index.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_structural_equality() {
        let a = Index::from(vec![3, 1, 4]);
        let b: Index = [3, 1, 4].into();
        let c: Index = vec![3, 1, 4].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, Index::from([3, 1]));
    }

    #[test]
    fn test_display() {
        assert_eq!(Index::from([0, 12]).to_string(), "[0, 12]");
        assert_eq!(Index::scalar().to_string(), "[]");
        assert_eq!(format!("{:?}", Index::from([1])), "Index[1]");
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let mut indices = vec![
            Index::from([1, 0]),
            Index::from([0, 2]),
            Index::from([0, 1]),
        ];
        indices.sort();
        assert_eq!(
            indices,
            vec![
                Index::from([0, 1]),
                Index::from([0, 2]),
                Index::from([1, 0])
            ]
        );
    }

    #[test]
    fn test_deref() {
        let index = Index::from([5, 6]);
        assert_eq!(index[1], 6);
        assert_eq!(index.rank(), 2);
        assert_eq!(index.into_inner(), vec![5, 6]);
    }
}
