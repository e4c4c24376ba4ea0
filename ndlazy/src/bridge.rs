/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Uniform access to lazy and eager structures.
//!
//! Composition only needs handles. Lazy structures hand out their own;
//! for eager ones the value is read right away and wrapped in a handle
//! that is already complete.

use std::sync::Arc;

use algebra::Field;
use ndslice::Index;

use crate::ExecScope;
use crate::Handle;
use crate::LazyContext;
use crate::LazyError;
use crate::LazyStructure;
use crate::NdElement;
use crate::NdStructure;

/// A handle for the element of `structure` at `index`.
///
/// For a lazy structure this is its own memoized handle. For an eager
/// one, `get` is called now and its outcome wrapped in a completed
/// handle. Invalid indices are reported here, not through the handle.
pub fn handle_for<T, S>(structure: &S, index: &Index) -> Result<Handle<T>, LazyError>
where
    T: Clone + Send + Sync + 'static,
    S: NdStructure<T> + ?Sized,
{
    match structure.as_lazy() {
        Some(lazy) => lazy.handle_for(index),
        None => {
            structure.shape().check(index)?;
            Ok(Handle::from_outcome(index.clone(), structure.get(index)))
        }
    }
}

/// The element of `structure` at `index`, suspending the calling task
/// if it is still being computed.
pub async fn value_at<T, S>(structure: &S, index: &Index) -> Result<T, LazyError>
where
    T: Clone + Send + Sync + 'static,
    S: NdStructure<T> + ?Sized,
{
    match structure.as_lazy() {
        Some(lazy) => lazy.handle_for(index)?.wait().await,
        None => structure.get(index),
    }
}

/// `structure` as a lazy structure on `scope`.
///
/// A [`LazyStructure`] of the same element and field types comes back
/// as itself, sharing its cache (and keeping its own scope). Anything
/// else is wrapped in a new structure of the same shape and field
/// whose elements are read through [`NdStructure::get`], each at most
/// once.
pub fn to_lazy<T, F, S>(structure: S, scope: &ExecScope) -> LazyStructure<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Field<T>,
    S: NdElement<T, F> + 'static,
{
    if let Some(lazy) = structure
        .as_lazy()
        .and_then(|deferred| deferred.as_any().downcast_ref::<LazyStructure<T, F>>())
    {
        return lazy.clone();
    }
    tracing::debug!(shape = %structure.shape(), "wrapping eager structure");
    let context = LazyContext::new(
        structure.shape().clone(),
        Arc::clone(structure.field()),
        scope.clone(),
    );
    context.produce(move |_, index| Ok(structure.get(index)?))
}

#[cfg(test)]
mod tests {
    use algebra::RealField;
    use ndslice::shape;

    use super::*;
    use crate::BufferStructure;
    use crate::LazyConfig;

    fn scope() -> ExecScope {
        let mut config = LazyConfig::new();
        config.set_worker_threads(2);
        ExecScope::new(&config).unwrap()
    }

    #[test]
    fn test_eager_handles_are_complete() {
        let buffer =
            BufferStructure::new(shape![2], RealField::<f64>::new(), vec![1.5, 2.5]).unwrap();
        let handle = handle_for(&buffer, &Index::from([1])).unwrap();
        assert_eq!(handle.peek().unwrap().unwrap(), 2.5);
        assert!(matches!(
            handle_for(&buffer, &Index::from([2])),
            Err(LazyError::Shape(_))
        ));
        assert_eq!(
            futures::executor::block_on(value_at(&buffer, &Index::from([0]))).unwrap(),
            1.5
        );
    }

    #[test]
    fn test_lazy_handles_are_memoized() {
        let context = LazyContext::new(shape![2], RealField::<f64>::new(), scope());
        let lazy = context.produce(|_, index| Ok(index[0] as f64));
        let a = handle_for(&lazy, &Index::from([1])).unwrap();
        let b = lazy.handle_for(&Index::from([1])).unwrap();
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_to_lazy_preserves_identity() {
        let context = LazyContext::new(shape![2], RealField::<f64>::new(), scope());
        let lazy = context.produce(|_, _| Ok(0.0));
        let again = to_lazy(lazy.clone(), &scope());
        assert!(again.ptr_eq(&lazy));
        let shared = to_lazy(Arc::new(lazy.clone()), &scope());
        assert!(shared.ptr_eq(&lazy));
    }

    #[test]
    fn test_to_lazy_wraps_eager() {
        let buffer =
            BufferStructure::new(shape![3], RealField::<f64>::new(), vec![4.0, 5.0, 6.0]).unwrap();
        let lazy = to_lazy(buffer.clone(), &scope());
        assert_eq!(lazy.scheduled_count(), 0);
        for (index, value) in buffer.elements() {
            assert_eq!(lazy.get(&index).unwrap(), value.unwrap());
        }
        assert_eq!(lazy.shape(), buffer.shape());
        assert_eq!(lazy.scheduled_count(), 3);
    }
}
