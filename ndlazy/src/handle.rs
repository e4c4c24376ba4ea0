/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Handles to the eventual value of one element.
//!
//! A [`Handle`] is a cloneable reference to a single computation. All
//! clones observe the same outcome: the value, or the same failure.
//! There are two ways to wait, and they are kept apart on purpose:
//!
//! - [`Handle::wait`] (or `.await` on the handle) suspends the calling
//!   *task*. Use it from inside a scheduled computation.
//! - [`Handle::block`] suspends the calling *thread*. Use it from
//!   ordinary code that needs the value now.
//!
//! ```
//! # use ndlazy::Handle;
//! # use ndslice::Index;
//! let handle = Handle::ready(Index::from([0]), 7);
//! assert_eq!(handle.block().unwrap(), 7);
//! assert_eq!(futures::executor::block_on(handle.wait()).unwrap(), 7);
//! ```

use std::fmt;
use std::future::IntoFuture;

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::Shared;
use ndslice::Index;
use tokio::runtime::Id as RuntimeId;
use tokio::runtime::RuntimeFlavor;

use crate::LazyError;

/// The outcome of one element's computation.
pub type Outcome<T> = Result<T, LazyError>;

/// A reference to the (possibly pending) outcome of computing the
/// element at one index.
pub struct Handle<T> {
    index: Index,
    inner: Shared<BoxFuture<'static, Outcome<T>>>,
    // The runtime driving the computation, when known.
    runtime: Option<RuntimeId>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            index: self.index.clone(),
            inner: self.inner.clone(),
            runtime: self.runtime,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Handle<T> {
    /// Wrap a future producing the outcome for `index`. The future is
    /// driven by whoever waits first; it should therefore be cheap,
    /// typically a join handle for work already running elsewhere.
    pub(crate) fn new(index: Index, outcome: BoxFuture<'static, Outcome<T>>) -> Self {
        Self {
            index,
            inner: outcome.shared(),
            runtime: None,
        }
    }

    /// Record that the computation is driven by the runtime `id`.
    pub(crate) fn driven_by(mut self, id: RuntimeId) -> Self {
        self.runtime = Some(id);
        self
    }

    pub(crate) fn runtime(&self) -> Option<&RuntimeId> {
        self.runtime.as_ref()
    }

    /// A handle that is already complete with `value`.
    pub fn ready(index: Index, value: T) -> Self {
        Self::from_outcome(index, Ok(value))
    }

    /// A handle that is already complete with `outcome`.
    pub fn from_outcome(index: Index, outcome: Outcome<T>) -> Self {
        Self::new(index, futures::future::ready(outcome).boxed())
    }

    /// The index this handle computes.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// The outcome, if the computation has completed. Never blocks.
    pub fn peek(&self) -> Option<Outcome<T>> {
        self.inner
            .peek()
            .cloned()
            .or_else(|| self.inner.clone().now_or_never())
    }

    /// Suspend the calling task until the outcome is available.
    pub async fn wait(&self) -> Outcome<T> {
        self.inner.clone().await
    }

    /// Block the calling thread until the outcome is available.
    ///
    /// Off-runtime threads simply park. On a worker of a
    /// multi-threaded tokio runtime the wait is wrapped in
    /// [`tokio::task::block_in_place`] so the worker's other tasks
    /// move elsewhere. A thread attached to a current-thread runtime
    /// parks if the computation runs on some other runtime, and fails
    /// with [`LazyError::BlockingInAsyncContext`] if it may need this
    /// one, which would deadlock.
    pub fn block(&self) -> Outcome<T> {
        if let Some(outcome) = self.peek() {
            return outcome;
        }
        let inner = self.inner.clone();
        blocking(self.runtime(), move || futures::executor::block_on(inner))?
    }

    /// True if both handles refer to the same computation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Shared::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone + Send + Sync + 'static> IntoFuture for Handle<T> {
    type Output = Outcome<T>;
    type IntoFuture = Shared<BoxFuture<'static, Outcome<T>>>;

    fn into_future(self) -> Self::IntoFuture {
        self.inner
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Run `f`, which blocks the current thread until work on `driver`
/// completes, in a way that is safe for the runtime (if any) this
/// thread belongs to. An unknown `driver` is assumed to be the
/// current runtime.
pub(crate) fn blocking<R>(
    driver: Option<&RuntimeId>,
    f: impl FnOnce() -> R,
) -> Result<R, LazyError> {
    match tokio::runtime::Handle::try_current() {
        Err(_) => Ok(f()),
        Ok(current) => match current.runtime_flavor() {
            RuntimeFlavor::CurrentThread => match driver {
                Some(driver) if *driver != current.id() => Ok(f()),
                _ => Err(LazyError::BlockingInAsyncContext),
            },
            _ => Ok(tokio::task::block_in_place(f)),
        },
    }
}
