/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Lazy contexts: factories for lazy structures of one shape over one
//! field, and the elementwise arithmetic between them.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use algebra::Field;
use algebra::FieldError;
use futures::FutureExt;
use ndslice::Index;
use ndslice::Shape;

use crate::ExecScope;
use crate::LazyError;
use crate::LazyStructure;
use crate::NdStructure;
use crate::bridge;

/// The shape, field and execution scope shared by a family of lazy
/// structures.
///
/// A context owns no cache. It mints structures with
/// [`LazyContext::produce`] and combines them elementwise; each result
/// is a new lazy structure whose elements are computed on demand from
/// the operands' elements at the same index.
///
/// Operands may be lazy or eager (anything implementing
/// [`NdStructure`]). Lazy operands are consulted through their
/// handles, so composing never forces elements nobody asked for.
pub struct LazyContext<T, F> {
    shape: Shape,
    field: Arc<F>,
    scope: ExecScope,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> Clone for LazyContext<T, F> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            field: Arc::clone(&self.field),
            scope: self.scope.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, F> LazyContext<T, F> {
    /// The shape of every structure minted by this context.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The field elements are combined with.
    pub fn field(&self) -> &Arc<F> {
        &self.field
    }

    /// Where computations run.
    pub fn scope(&self) -> &ExecScope {
        &self.scope
    }
}

impl<T, F> LazyContext<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Field<T>,
{
    /// Create a context for structures of `shape` over `field` whose
    /// computations run on `scope`.
    pub fn new(shape: Shape, field: impl Into<Arc<F>>, scope: ExecScope) -> Self {
        Self {
            shape,
            field: field.into(),
            scope,
            _marker: PhantomData,
        }
    }

    /// A lazy structure whose element at `i` is `f(field, i)`. Nothing
    /// is computed until an element is requested.
    pub fn produce<G>(&self, f: G) -> LazyStructure<T, F>
    where
        G: Fn(&F, &Index) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.produce_async(move |field, index| {
            let f = Arc::clone(&f);
            async move { f(&*field, &index) }
        })
    }

    /// Like [`LazyContext::produce`], for generating functions that
    /// await other elements. They should use
    /// [`LazyStructure::value_at`] or [`crate::bridge::value_at`],
    /// never a blocking accessor.
    pub fn produce_async<G, Fut>(&self, f: G) -> LazyStructure<T, F>
    where
        G: Fn(Arc<F>, Index) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        LazyStructure::new(
            self.clone(),
            Box::new(move |field: Arc<F>, index: Index| f(field, index).boxed()),
        )
    }

    /// `a + b`, elementwise.
    pub fn add<A, B>(&self, a: &A, b: &B) -> Result<LazyStructure<T, F>, LazyError>
    where
        A: NdStructure<T> + Clone + 'static,
        B: NdStructure<T> + Clone + 'static,
    {
        self.combine(a, b, |field, x, y| field.add(x, y))
    }

    /// `a - b`, elementwise.
    pub fn subtract<A, B>(&self, a: &A, b: &B) -> Result<LazyStructure<T, F>, LazyError>
    where
        A: NdStructure<T> + Clone + 'static,
        B: NdStructure<T> + Clone + 'static,
    {
        self.combine(a, b, |field, x, y| field.subtract(x, y))
    }

    /// `a * b`, elementwise.
    pub fn multiply<A, B>(&self, a: &A, b: &B) -> Result<LazyStructure<T, F>, LazyError>
    where
        A: NdStructure<T> + Clone + 'static,
        B: NdStructure<T> + Clone + 'static,
    {
        self.combine(a, b, |field, x, y| field.multiply(x, y))
    }

    /// `a / b`, elementwise. A failing division (such as division by
    /// zero) fails that element only, with the field's error as cause.
    pub fn divide<A, B>(&self, a: &A, b: &B) -> Result<LazyStructure<T, F>, LazyError>
    where
        A: NdStructure<T> + Clone + 'static,
        B: NdStructure<T> + Clone + 'static,
    {
        self.combine(a, b, |field, x, y| field.divide(x, y))
    }

    /// `a * k` for a real scalar `k`, elementwise.
    pub fn multiply_scalar<A>(&self, a: &A, k: f64) -> Result<LazyStructure<T, F>, LazyError>
    where
        A: NdStructure<T> + Clone + 'static,
    {
        self.map(a, move |field, x| field.multiply_by_scalar(x, k))
    }

    /// `-a`, elementwise.
    pub fn negate<A>(&self, a: &A) -> Result<LazyStructure<T, F>, LazyError>
    where
        A: NdStructure<T> + Clone + 'static,
    {
        self.map(a, |field, x| field.negate(x))
    }

    /// The structure whose every element is the field's zero.
    pub fn zero(&self) -> LazyStructure<T, F> {
        self.produce(|field, _| Ok(field.zero()))
    }

    /// The structure whose every element is the field's one.
    pub fn one(&self) -> LazyStructure<T, F> {
        self.produce(|field, _| Ok(field.one()))
    }

    fn check_shape(&self, operand: &Shape) -> Result<(), LazyError> {
        if operand != &self.shape {
            return Err(LazyError::ShapeMismatch {
                expected: self.shape.clone(),
                got: operand.clone(),
            });
        }
        Ok(())
    }

    fn map<A, Op>(&self, a: &A, op: Op) -> Result<LazyStructure<T, F>, LazyError>
    where
        A: NdStructure<T> + Clone + 'static,
        Op: Fn(&F, &T) -> Result<T, FieldError> + Send + Sync + 'static,
    {
        self.check_shape(a.shape())?;
        let a = Arc::new(a.clone());
        let op = Arc::new(op);
        Ok(self.produce_async(move |field, index| {
            let a = Arc::clone(&a);
            let op = Arc::clone(&op);
            async move {
                let x = bridge::value_at(&*a, &index).await?;
                anyhow::Ok(op(&*field, &x)?)
            }
        }))
    }

    fn combine<A, B, Op>(&self, a: &A, b: &B, op: Op) -> Result<LazyStructure<T, F>, LazyError>
    where
        A: NdStructure<T> + Clone + 'static,
        B: NdStructure<T> + Clone + 'static,
        Op: Fn(&F, &T, &T) -> Result<T, FieldError> + Send + Sync + 'static,
    {
        self.check_shape(a.shape())?;
        self.check_shape(b.shape())?;
        let a = Arc::new(a.clone());
        let b = Arc::new(b.clone());
        let op = Arc::new(op);
        Ok(self.produce_async(move |field, index| {
            let a = Arc::clone(&a);
            let b = Arc::clone(&b);
            let op = Arc::clone(&op);
            async move {
                // Request both operands before waiting on either.
                let left = bridge::handle_for(&*a, &index)?;
                let right = bridge::handle_for(&*b, &index)?;
                let (x, y) = futures::try_join!(left.wait(), right.wait())?;
                anyhow::Ok(op(&*field, &x, &y)?)
            }
        }))
    }
}

impl<T, F> fmt::Debug for LazyContext<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyContext")
            .field("shape", &self.shape)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
