/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Lazily evaluated n-dimensional arrays over a field.
//!
//! Elements of a [`LazyStructure`] are described by a generating
//! function of their [`Index`] and computed on first request, on an
//! [`ExecScope`]. Each element is computed at most once, however many
//! times and from however many threads it is asked for. Elementwise
//! arithmetic between structures ([`LazyContext::add`] and friends)
//! builds new lazy structures without computing anything.
//!
//! ```
//! use algebra::RealField;
//! use ndlazy::ExecScope;
//! use ndlazy::LazyConfig;
//! use ndlazy::LazyContext;
//! use ndlazy::NdStructure;
//! use ndslice::Index;
//! use ndslice::shape;
//!
//! let scope = ExecScope::new(&LazyConfig::from_env()).unwrap();
//! let context = LazyContext::new(shape![2], RealField::<f64>::new(), scope);
//! let a = context.produce(|_, index| Ok(index[0] as f64 + 1.0));
//! let b = context.produce(|_, index| Ok(index[0] as f64 + 2.0));
//!
//! let sum = context.add(&a, &b).unwrap();
//! assert_eq!(sum.get(&Index::from([0])).unwrap(), 3.0);
//! assert_eq!(sum.get(&Index::from([1])).unwrap(), 5.0);
//!
//! let doubled = context.multiply_scalar(&a, 2.0).unwrap();
//! assert_eq!(doubled.get(&Index::from([1])).unwrap(), 4.0);
//! ```
//!
//! Blocking accessors ([`NdStructure::get`], [`NdStructure::elements`])
//! are for ordinary threads. Code running on the scope, such as a
//! generating function passed to [`LazyContext::produce_async`],
//! should await [`LazyStructure::value_at`] instead.

pub mod bridge;
mod config;
mod context;
mod error;
mod handle;
mod lazy;
mod scope;
mod structure;
pub mod transform;

pub use config::BLOCKING_TIMEOUT_MS_ENV;
pub use config::LazyConfig;
pub use config::THREAD_NAME_ENV;
pub use config::WORKER_THREADS_ENV;
pub use context::LazyContext;
pub use error::LazyError;
pub use handle::Handle;
pub use handle::Outcome;
pub use lazy::LazyStructure;
pub use ndslice::Index;
pub use ndslice::Shape;
pub use scope::ExecScope;
pub use structure::BufferStructure;
pub use structure::Deferred;
pub use structure::Elements;
pub use structure::NdElement;
pub use structure::NdStructure;
