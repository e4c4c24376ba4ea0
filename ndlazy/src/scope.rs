/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Execution scopes: where element computations run.
//!
//! There is no global default scope. Whoever creates a
//! [`crate::LazyContext`] decides where its computations run, either
//! on a runtime the scope owns ([`ExecScope::new`]) or on an existing
//! one ([`ExecScope::from_handle`]).

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;
use std::time::Duration;

use futures::FutureExt;
use ndslice::Index;
use tokio::runtime::Runtime;

use crate::Handle;
use crate::LazyConfig;
use crate::LazyError;
use crate::handle::Outcome;
use crate::handle::blocking;

/// Owns a runtime and shuts it down, without waiting, when the last
/// scope referring to it goes away. Dropping a tokio runtime outright
/// panics when it happens on one of its own workers, which is where
/// the last reference to a scope is often released.
struct OwnedRuntime(Mutex<Option<Runtime>>);

impl OwnedRuntime {
    fn shutdown(&self) -> bool {
        let runtime = match self.0.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match runtime {
            Some(runtime) => {
                runtime.shutdown_background();
                true
            }
            None => false,
        }
    }
}

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A handle to the pool on which element computations are scheduled.
/// Cloning is cheap; all clones schedule onto the same runtime.
#[derive(Clone)]
pub struct ExecScope {
    handle: tokio::runtime::Handle,
    owned: Option<Arc<OwnedRuntime>>,
    blocking_timeout: Option<Duration>,
}

impl ExecScope {
    /// Build a multi-threaded runtime sized by `config` and return a
    /// scope that owns it.
    pub fn new(config: &LazyConfig) -> Result<Self, std::io::Error> {
        let worker_threads = config.worker_threads();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name(config.thread_name())
            .enable_all()
            .build()?;
        tracing::info!(
            worker_threads,
            thread_name = %config.thread_name(),
            "built execution scope"
        );
        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Some(Arc::new(OwnedRuntime(Mutex::new(Some(runtime))))),
            blocking_timeout: config.blocking_timeout(),
        })
    }

    /// A scope that schedules onto an existing runtime. The scope does
    /// not own the runtime; [`ExecScope::shutdown`] is a no-op.
    pub fn from_handle(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle,
            owned: None,
            blocking_timeout: None,
        }
    }

    /// Bound every blocking access made through structures on this
    /// scope by `timeout`.
    pub fn with_blocking_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.blocking_timeout = timeout;
        self
    }

    /// The timeout applied to blocking accesses, if any.
    pub fn blocking_timeout(&self) -> Option<Duration> {
        self.blocking_timeout
    }

    /// The runtime handle computations are spawned on.
    pub fn handle(&self) -> &tokio::runtime::Handle {
        &self.handle
    }

    /// Submit the computation of the element at `index`. The work
    /// starts immediately, whether or not anyone waits for it. Errors
    /// and panics are captured in the returned handle.
    pub fn schedule<T, Fut>(&self, index: Index, work: Fut) -> Handle<T>
    where
        T: Clone + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let task_index = index.clone();
        let task = async move {
            match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => {
                    tracing::warn!(
                        index = %task_index,
                        error = format!("{:#}", error),
                        "computation failed"
                    );
                    Err(LazyError::Computation {
                        index: task_index,
                        error: Arc::new(error),
                    })
                }
                Err(payload) => {
                    let message = panic_message(payload);
                    tracing::warn!(index = %task_index, %message, "computation panicked");
                    Err(LazyError::Panicked {
                        index: task_index,
                        message,
                    })
                }
            }
        };
        let join = self.handle.spawn(task);
        let join_index = index.clone();
        Handle::new(
            index,
            async move {
                join.await
                    .unwrap_or_else(|_| Err(LazyError::Cancelled { index: join_index }))
            }
            .boxed(),
        )
        .driven_by(self.handle.id())
    }

    /// Block the calling thread until `handle` completes or `timeout`
    /// elapses. Timing out abandons the wait, not the computation.
    pub fn block_timeout<T>(&self, handle: &Handle<T>, timeout: Duration) -> Outcome<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        if let Some(outcome) = handle.peek() {
            return outcome;
        }
        let (tx, rx) = mpsc::channel();
        let waiter = handle.clone();
        self.handle.spawn(async move {
            let _ = tx.send(waiter.wait().await);
        });
        blocking(Some(&self.handle.id()), || match rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(LazyError::Timeout {
                index: handle.index().clone(),
                timeout,
            }),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(LazyError::Cancelled {
                index: handle.index().clone(),
            }),
        })?
    }

    /// Block on `handle`, honoring this scope's blocking timeout.
    pub fn block<T>(&self, handle: &Handle<T>) -> Outcome<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        match self.blocking_timeout {
            Some(timeout) => self.block_timeout(handle, timeout),
            None => handle.block(),
        }
    }

    /// Shut down the owned runtime without waiting for running
    /// computations. Pending handles resolve to
    /// [`LazyError::Cancelled`]. Returns false if this scope does not
    /// own its runtime or it was already shut down.
    pub fn shutdown(&self) -> bool {
        let shut_down = self
            .owned
            .as_ref()
            .is_some_and(|owned| owned.shutdown());
        if shut_down {
            tracing::info!("shut down execution scope");
        }
        shut_down
    }
}

impl fmt::Debug for ExecScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecScope")
            .field("owned", &self.owned.is_some())
            .field("blocking_timeout", &self.blocking_timeout)
            .finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
