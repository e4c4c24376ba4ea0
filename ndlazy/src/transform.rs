/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Elementwise transformations of lazy structures.

use std::sync::Arc;

use algebra::Field;
use ndslice::Index;

use crate::LazyStructure;

/// A new structure on `structure`'s context whose element at `i` is
/// `f(field, structure[i])`.
pub fn transform<T, F, G>(structure: &LazyStructure<T, F>, f: G) -> LazyStructure<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Field<T>,
    G: Fn(&F, T) -> anyhow::Result<T> + Send + Sync + 'static,
{
    transform_indexed(structure, move |field, _, value| f(field, value))
}

/// A new structure on `structure`'s context whose element at `i` is
/// `f(field, i, structure[i])`.
///
/// The source is read through its own cache, so each of its elements
/// is still computed at most once. The result has a cache of its own.
pub fn transform_indexed<T, F, G>(structure: &LazyStructure<T, F>, f: G) -> LazyStructure<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Field<T>,
    G: Fn(&F, &Index, T) -> anyhow::Result<T> + Send + Sync + 'static,
{
    let source = structure.clone();
    let f = Arc::new(f);
    structure.context().produce_async(move |field, index| {
        let source = source.clone();
        let f = Arc::clone(&f);
        async move {
            let value = source.value_at(&index).await?;
            f(&*field, &index, value)
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use algebra::PrimeField;
    use ndslice::shape;

    use super::*;
    use crate::ExecScope;
    use crate::LazyConfig;
    use crate::LazyContext;
    use crate::NdStructure;

    fn context() -> LazyContext<u64, PrimeField> {
        let mut config = LazyConfig::new();
        config.set_worker_threads(2);
        LazyContext::new(
            shape![2, 2],
            PrimeField::new(7).unwrap(),
            ExecScope::new(&config).unwrap(),
        )
    }

    #[test]
    fn test_transform() {
        let context = context();
        let calls = Arc::new(AtomicUsize::new(0));
        let source = {
            let calls = Arc::clone(&calls);
            context.produce(move |_, index| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok((index[0] * 2 + index[1]) as u64)
            })
        };
        let squared = source.transform(|field, x| Ok(field.multiply(&x, &x)?));
        let values: Vec<u64> = squared.elements().map(|(_, v)| v.unwrap()).collect();
        assert_eq!(values, vec![0, 1, 4, 2]);

        // The source's own cache serves both the transform and direct reads.
        assert_eq!(source.get(&Index::from([1, 1])).unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(!squared.ptr_eq(&source));
        assert!(squared.context().field().modulus() == 7);
    }

    #[test]
    fn test_transform_indexed() {
        let context = context();
        let ones = context.one();
        let shifted = transform_indexed(&ones, |field, index, x| {
            Ok(field.add(&x, &(index[1] as u64))?)
        });
        assert_eq!(shifted.get(&Index::from([0, 1])).unwrap(), 2);
        assert_eq!(shifted.get(&Index::from([1, 0])).unwrap(), 1);
        assert_eq!(ones.scheduled_count(), 2);
    }

    #[test]
    fn test_transform_failure_propagates() {
        let context = context();
        let source = context.produce(|_, index| Ok(index[1] as u64));
        let inverted = source.transform(|field, x| Ok(field.divide(&field.one(), &x)?));
        assert!(inverted.get(&Index::from([0, 0])).is_err());
        // 1 / 1 in Z/7Z.
        assert_eq!(inverted.get(&Index::from([0, 1])).unwrap(), 1);
    }
}
