/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Lazy structures: per-index memoized computations.
//!
//! A [`LazyStructure`] pairs a [`LazyContext`] with a generating
//! function and a private cache from [`Index`] to [`Handle`]. The
//! first request for an index schedules its computation on the
//! context's scope; every later request, from any thread, gets the
//! same handle back.
//!
//! ```
//! # use algebra::RealField;
//! # use ndlazy::{ExecScope, LazyConfig, LazyContext, NdStructure};
//! # use ndslice::{shape, Index};
//! let scope = ExecScope::new(&LazyConfig::new()).unwrap();
//! let context = LazyContext::new(shape![3], RealField::<f64>::new(), scope);
//! let squares = context.produce(|_, index| Ok((index[0] * index[0]) as f64));
//! assert_eq!(squares.scheduled_count(), 0);
//! assert_eq!(squares.get(&Index::from([2])).unwrap(), 4.0);
//! assert_eq!(squares.scheduled_count(), 1);
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use algebra::Field;
use dashmap::DashMap;
use futures::future::BoxFuture;
use ndslice::Index;
use ndslice::Shape;

use crate::BufferStructure;
use crate::Deferred;
use crate::Handle;
use crate::LazyContext;
use crate::LazyError;
use crate::NdElement;
use crate::NdStructure;

/// A generating function in the form the engine stores it.
pub(crate) type GeneratingFn<T, F> =
    dyn Fn(Arc<F>, Index) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync;

struct Inner<T, F> {
    context: LazyContext<T, F>,
    function: Box<GeneratingFn<T, F>>,
    cache: DashMap<Index, Handle<T>>,
}

/// An n-dimensional array whose elements are computed on first
/// request, at most once each.
///
/// Clones share the cache. Structures minted separately never do,
/// even when they come from the same context.
pub struct LazyStructure<T, F> {
    inner: Arc<Inner<T, F>>,
}

impl<T, F> Clone for LazyStructure<T, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, F> LazyStructure<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Field<T>,
{
    pub(crate) fn new(context: LazyContext<T, F>, function: Box<GeneratingFn<T, F>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                context,
                function,
                cache: DashMap::new(),
            }),
        }
    }

    /// The handle computing the element at `index`, scheduling the
    /// computation if this is the first request for it. Never blocks.
    pub fn handle_for(&self, index: &Index) -> Result<Handle<T>, LazyError> {
        self.shape().check(index)?;
        if let Some(handle) = self.inner.cache.get(index) {
            tracing::trace!(%index, "cache hit");
            return Ok(handle.clone());
        }
        // The entry guard holds the shard lock across check-then-insert,
        // so racing first requests schedule once. Scheduling only spawns.
        let handle = self
            .inner
            .cache
            .entry(index.clone())
            .or_insert_with(|| {
                tracing::debug!(%index, shape = %self.shape(), "scheduling element");
                let field = Arc::clone(self.inner.context.field());
                let work = (self.inner.function)(field, index.clone());
                self.inner.context.scope().schedule(index.clone(), work)
            })
            .clone();
        Ok(handle)
    }

    /// The element at `index`, suspending the calling task (not its
    /// worker) until it is available.
    pub async fn value_at(&self, index: &Index) -> Result<T, LazyError> {
        self.handle_for(index)?.wait().await
    }

    /// Like [`NdStructure::get`], but gives up waiting after `timeout`.
    /// The computation itself keeps running.
    pub fn get_timeout(&self, index: &Index, timeout: Duration) -> Result<T, LazyError> {
        let handle = self.handle_for(index)?;
        self.inner.context.scope().block_timeout(&handle, timeout)
    }

    /// Schedule every element, then wait for all of them. Results are
    /// in row-major order.
    #[tracing::instrument(level = "debug", skip_all, fields(shape = %self.shape()))]
    pub async fn evaluate(&self) -> Vec<(Index, Result<T, LazyError>)> {
        let pending: Vec<_> = self
            .shape()
            .indices()
            .map(|index| {
                let handle = self.handle_for(&index);
                (index, handle)
            })
            .collect();
        futures::future::join_all(pending.into_iter().map(|(index, handle)| async move {
            let value = match handle {
                Ok(handle) => handle.wait().await,
                Err(err) => Err(err),
            };
            (index, value)
        }))
        .await
    }

    /// Force every element and copy the results into an eager buffer.
    /// All elements are scheduled before the first one is waited for.
    /// Fails with the first failure in row-major order.
    #[tracing::instrument(level = "debug", skip_all, fields(shape = %self.shape()))]
    pub fn materialize(&self) -> Result<BufferStructure<T, F>, LazyError> {
        let handles = self
            .shape()
            .indices()
            .map(|index| self.handle_for(&index))
            .collect::<Result<Vec<_>, _>>()?;
        let scope = self.inner.context.scope();
        let data = handles
            .iter()
            .map(|handle| scope.block(handle))
            .collect::<Result<Vec<_>, _>>()?;
        BufferStructure::new(
            self.shape().clone(),
            Arc::clone(self.inner.context.field()),
            data,
        )
    }

    /// A new structure on the same context whose elements are
    /// `f(field, value)`. See [`crate::transform::transform`].
    pub fn transform<G>(&self, f: G) -> LazyStructure<T, F>
    where
        G: Fn(&F, T) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        crate::transform::transform(self, f)
    }

    /// A new structure on the same context whose elements are
    /// `f(field, index, value)`. See
    /// [`crate::transform::transform_indexed`].
    pub fn transform_indexed<G>(&self, f: G) -> LazyStructure<T, F>
    where
        G: Fn(&F, &Index, T) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        crate::transform::transform_indexed(self, f)
    }
}

impl<T, F> LazyStructure<T, F> {
    /// The context this structure was minted by.
    pub fn context(&self) -> &LazyContext<T, F> {
        &self.inner.context
    }

    /// Whether the element at `index` has been scheduled.
    pub fn is_scheduled(&self, index: &Index) -> bool {
        self.inner.cache.contains_key(index)
    }

    /// The number of distinct elements scheduled so far.
    pub fn scheduled_count(&self) -> usize {
        self.inner.cache.len()
    }

    /// True if both refer to the same structure (and cache).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T, F> NdStructure<T> for LazyStructure<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Field<T>,
{
    fn shape(&self) -> &Shape {
        self.inner.context.shape()
    }

    /// Blocks the calling thread; see [`Handle::block`] for how this
    /// behaves on runtime threads. Honors the scope's blocking timeout.
    fn get(&self, index: &Index) -> Result<T, LazyError> {
        let handle = self.handle_for(index)?;
        self.inner.context.scope().block(&handle)
    }

    fn as_lazy(&self) -> Option<&dyn Deferred<T>> {
        Some(self)
    }
}

impl<T, F> Deferred<T> for LazyStructure<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Field<T>,
{
    fn handle_for(&self, index: &Index) -> Result<Handle<T>, LazyError> {
        LazyStructure::handle_for(self, index)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T, F> NdElement<T, F> for LazyStructure<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Field<T>,
{
    fn field(&self) -> &Arc<F> {
        self.inner.context.field()
    }
}

impl<T, F> fmt::Debug for LazyStructure<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyStructure")
            .field("shape", self.inner.context.shape())
            .field("scheduled", &self.inner.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use algebra::RealField;
    use ndslice::shape;

    use super::*;
    use crate::ExecScope;
    use crate::LazyConfig;

    fn context(shape: Shape) -> LazyContext<f64, RealField<f64>> {
        let mut config = LazyConfig::new();
        config.set_worker_threads(4);
        LazyContext::new(shape, RealField::new(), ExecScope::new(&config).unwrap())
    }

    fn counted(
        context: &LazyContext<f64, RealField<f64>>,
        calls: &Arc<AtomicUsize>,
    ) -> LazyStructure<f64, RealField<f64>> {
        let calls = Arc::clone(calls);
        context.produce(move |_, index| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(index.iter().sum::<usize>() as f64)
        })
    }

    #[test]
    fn test_nothing_computed_until_requested() {
        let context = context(shape![4]);
        let calls = Arc::new(AtomicUsize::new(0));
        let structure = counted(&context, &calls);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!structure.is_scheduled(&Index::from([0])));

        let handle = structure.handle_for(&Index::from([3])).unwrap();
        assert!(structure.is_scheduled(&Index::from([3])));
        assert_eq!(handle.block().unwrap(), 3.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_same_handle_for_equal_indices() {
        let context = context(shape![2, 2]);
        let calls = Arc::new(AtomicUsize::new(0));
        let structure = counted(&context, &calls);
        let a = structure.handle_for(&Index::from(vec![1, 0])).unwrap();
        let b = structure.handle_for(&Index::from([1, 0])).unwrap();
        assert!(a.ptr_eq(&b));
        for _ in 0..10 {
            assert_eq!(structure.get(&Index::from([1, 0])).unwrap(), 1.0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(structure.scheduled_count(), 1);
    }

    #[test]
    fn test_concurrent_first_requests_schedule_once() {
        let context = context(shape![8]);
        let calls = Arc::new(AtomicUsize::new(0));
        let structure = counted(&context, &calls);
        let barrier = Arc::new(Barrier::new(16));
        let threads: Vec<_> = (0..16)
            .map(|_| {
                let structure = structure.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    structure.get(&Index::from([5])).unwrap()
                })
            })
            .collect();
        for thread in threads {
            assert_eq!(thread.join().unwrap(), 5.0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_out_of_bounds_reported_immediately() {
        let context = context(shape![2, 3]);
        let structure = context.produce(|_, _| Ok(0.0));
        assert!(matches!(
            structure.handle_for(&Index::from([2, 0])),
            Err(LazyError::Shape(_))
        ));
        assert!(matches!(
            structure.get(&Index::from([0])),
            Err(LazyError::Shape(_))
        ));
        assert_eq!(structure.scheduled_count(), 0);
    }

    #[test]
    fn test_failure_replayed_and_isolated() {
        let context = context(shape![3]);
        let calls = Arc::new(AtomicUsize::new(0));
        let structure = {
            let calls = Arc::clone(&calls);
            context.produce(move |_, index| {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::ensure!(index[0] != 1, "bad index {}", index);
                Ok(index[0] as f64)
            })
        };
        let first = structure.get(&Index::from([1])).unwrap_err();
        let second = structure.get(&Index::from([1])).unwrap_err();
        match (first, second) {
            (
                LazyError::Computation { error: a, .. },
                LazyError::Computation { error: b, .. },
            ) => {
                assert!(Arc::ptr_eq(&a, &b));
                assert_eq!(a.to_string(), "bad index [1]");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(structure.get(&Index::from([2])).unwrap(), 2.0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_elements_reuses_cache() {
        let context = context(shape![2, 3]);
        let calls = Arc::new(AtomicUsize::new(0));
        let structure = counted(&context, &calls);
        let first: Vec<Index> = structure.elements().map(|(index, _)| index).collect();
        let second: Vec<f64> = structure.elements().map(|(_, v)| v.unwrap()).collect();
        assert_eq!(first, shape![2, 3].indices().collect::<Vec<_>>());
        assert_eq!(second, vec![0.0, 1.0, 2.0, 1.0, 2.0, 3.0]);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_materialize() {
        let context = context(shape![2, 2]);
        let calls = Arc::new(AtomicUsize::new(0));
        let structure = counted(&context, &calls);
        let buffer = structure.materialize().unwrap();
        assert_eq!(buffer.data(), &[0.0, 1.0, 1.0, 2.0]);
        assert_eq!(buffer.shape(), structure.shape());
        // Materializing again is served from the cache.
        structure.materialize().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_get_timeout_abandons_only_the_wait() {
        let context = context(shape![1]);
        let structure = context.produce_async(|_, _| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(1.0)
        });
        let index = Index::from([0]);
        assert!(matches!(
            structure.get_timeout(&index, Duration::from_millis(10)),
            Err(LazyError::Timeout { .. })
        ));
        assert_eq!(structure.get(&index).unwrap(), 1.0);
        assert_eq!(structure.scheduled_count(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_from_async_code() {
        let context = LazyContext::new(
            shape![3],
            RealField::<f64>::new(),
            ExecScope::from_handle(tokio::runtime::Handle::current()),
        );
        let structure = context.produce(|_, index| Ok(index[0] as f64 * 0.5));
        assert_eq!(structure.value_at(&Index::from([2])).await.unwrap(), 1.0);
        let values: Vec<f64> = structure
            .evaluate()
            .await
            .into_iter()
            .map(|(_, v)| v.unwrap())
            .collect();
        assert_eq!(values, vec![0.0, 0.5, 1.0]);
        // Completed elements can be read anywhere.
        assert_eq!(structure.get(&Index::from([0])).unwrap(), 0.0);

        // Blocking on a pending element from this (current-thread)
        // runtime would deadlock.
        let pending = context.produce_async(|_, _| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(0.0)
        });
        assert!(matches!(
            pending.get(&Index::from([0])),
            Err(LazyError::BlockingInAsyncContext)
        ));
    }

    #[tokio::test]
    async fn test_get_from_blocking_thread_of_current_thread_runtime() {
        let context = context(shape![2]);
        let slow = context.produce_async(|_, index| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(index[0] as f64 + 1.0)
        });
        let reader = slow.clone();
        let value = tokio::task::spawn_blocking(move || reader.get(&Index::from([1])))
            .await
            .unwrap();
        assert_eq!(value.unwrap(), 2.0);

        // The scope runs on its own runtime, so this thread may park too.
        let timed = slow.get_timeout(&Index::from([0]), Duration::from_secs(5));
        assert_eq!(timed.unwrap(), 1.0);
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_scheduling_is_logged() {
        let context = context(shape![2]);
        let structure = context.produce(|_, _| Ok(1.0));
        structure.handle_for(&Index::from([1])).unwrap();
        assert!(logs_contain("scheduling element"));
        assert!(logs_contain("index=[1]"));
    }
}
