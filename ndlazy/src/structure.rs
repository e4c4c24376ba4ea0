/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The structure contract shared by eager and lazy arrays, and the
//! buffer-backed eager structure.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use algebra::Field;
use ndslice::Index;
use ndslice::Indices;
use ndslice::Shape;
use ndslice::Slice;

use crate::ExecScope;
use crate::Handle;
use crate::LazyError;
use crate::LazyStructure;

/// An n-dimensional array whose elements can be read by index.
///
/// This is the eager contract: [`NdStructure::get`] returns the value
/// now, blocking if it has to. Lazy structures implement it too, so
/// code that only knows this trait can consume either kind.
pub trait NdStructure<T>: Send + Sync {
    /// The shape of the structure.
    fn shape(&self) -> &Shape;

    /// The element at `index`. Fails with [`LazyError::Shape`] if
    /// `index` is not valid for [`NdStructure::shape`].
    fn get(&self, index: &Index) -> Result<T, LazyError>;

    /// Every element, in row-major order, each read through
    /// [`NdStructure::get`]. The iterator is finite and can be
    /// recreated at will.
    fn elements(&self) -> Elements<'_, T, Self>
    where
        Self: Sized,
    {
        Elements {
            structure: self,
            indices: self.shape().indices(),
            _marker: PhantomData,
        }
    }

    /// Non-blocking access, for structures that defer their
    /// computations. Eager structures keep the default.
    fn as_lazy(&self) -> Option<&dyn Deferred<T>> {
        None
    }
}

/// Access to the in-flight computations of a deferred structure.
pub trait Deferred<T>: Send + Sync {
    /// The handle computing the element at `index`, scheduling it if
    /// nobody has asked before. Never blocks.
    fn handle_for(&self, index: &Index) -> Result<Handle<T>, LazyError>;

    /// The concrete structure, for identity-preserving conversions.
    fn as_any(&self) -> &dyn Any;
}

/// A structure that also knows the field its elements live in.
pub trait NdElement<T, F>: NdStructure<T> {
    /// The field elements are combined with.
    fn field(&self) -> &Arc<F>;
}

impl<T, S> NdStructure<T> for Arc<S>
where
    S: NdStructure<T> + ?Sized,
{
    fn shape(&self) -> &Shape {
        (**self).shape()
    }

    fn get(&self, index: &Index) -> Result<T, LazyError> {
        (**self).get(index)
    }

    fn as_lazy(&self) -> Option<&dyn Deferred<T>> {
        (**self).as_lazy()
    }
}

impl<T, F, S> NdElement<T, F> for Arc<S>
where
    S: NdElement<T, F> + ?Sized,
{
    fn field(&self) -> &Arc<F> {
        (**self).field()
    }
}

/// Iterator over `(index, element)` pairs, returned by
/// [`NdStructure::elements`].
pub struct Elements<'a, T, S: ?Sized> {
    structure: &'a S,
    indices: Indices,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T, S> Iterator for Elements<'a, T, S>
where
    S: NdStructure<T> + ?Sized,
{
    type Item = (Index, Result<T, LazyError>);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.indices.next()?;
        let value = self.structure.get(&index);
        Some((index, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.indices.size_hint()
    }
}

impl<'a, T, S> ExactSizeIterator for Elements<'a, T, S> where S: NdStructure<T> + ?Sized {}

/// An eager structure: every element is stored in a flat buffer and
/// addressed through a [`Slice`] layout.
///
/// ```
/// # use std::sync::Arc;
/// # use algebra::RealField;
/// # use ndlazy::{BufferStructure, NdStructure};
/// # use ndslice::{shape, Index, Slice};
/// // Column-major storage of [[1, 2, 3], [4, 5, 6]].
/// let buffer = BufferStructure::with_layout(
///     shape![2, 3],
///     Slice::new_column_major(vec![2, 3]),
///     RealField::<f64>::new(),
///     vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0],
/// )
/// .unwrap();
/// assert_eq!(buffer.get(&Index::from([0, 2])).unwrap(), 3.0);
/// assert_eq!(buffer.get(&Index::from([1, 0])).unwrap(), 4.0);
/// ```
pub struct BufferStructure<T, F> {
    shape: Shape,
    layout: Slice,
    data: Arc<[T]>,
    field: Arc<F>,
}

impl<T, F> Clone for BufferStructure<T, F> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            layout: self.layout.clone(),
            data: Arc::clone(&self.data),
            field: Arc::clone(&self.field),
        }
    }
}

impl<T, F> BufferStructure<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Field<T>,
{
    /// A structure over `data`, stored in row-major order.
    pub fn new(shape: Shape, field: impl Into<Arc<F>>, data: Vec<T>) -> Result<Self, LazyError> {
        let layout = shape.slice().clone();
        Self::with_layout(shape, layout, field, data)
    }

    /// A structure over `data`, stored according to `layout`. The
    /// layout must have the shape's extents and fit inside the buffer.
    pub fn with_layout(
        shape: Shape,
        layout: Slice,
        field: impl Into<Arc<F>>,
        data: Vec<T>,
    ) -> Result<Self, LazyError> {
        if layout.sizes() != shape.sizes() {
            return Err(LazyError::Layout {
                reason: format!("layout {} does not have shape {}", layout, shape),
            });
        }
        if layout.extent() > data.len() {
            return Err(LazyError::BufferSize {
                expected: layout.extent(),
                got: data.len(),
            });
        }
        Ok(Self {
            shape,
            layout,
            data: data.into(),
            field: field.into(),
        })
    }

    /// Compute every element now, in row-major order. The first
    /// failure aborts construction.
    pub fn produce(
        shape: Shape,
        field: impl Into<Arc<F>>,
        f: impl Fn(&F, &Index) -> anyhow::Result<T>,
    ) -> Result<Self, LazyError> {
        let field = field.into();
        let data = shape
            .indices()
            .map(|index| {
                f(&field, &index).map_err(|error| LazyError::Computation {
                    index,
                    error: Arc::new(error),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(shape, field, data)
    }

    /// The same elements as a lazy structure on `scope`. Every element
    /// is read from this buffer at most once.
    pub fn lazy(&self, scope: &ExecScope) -> LazyStructure<T, F> {
        crate::bridge::to_lazy(self.clone(), scope)
    }
}

impl<T, F> BufferStructure<T, F> {
    /// The storage layout.
    pub fn layout(&self) -> &Slice {
        &self.layout
    }

    /// The underlying buffer.
    pub fn data(&self) -> &[T] {
        &self.data
    }
}

impl<T, F> NdStructure<T> for BufferStructure<T, F>
where
    T: Clone + Send + Sync,
    F: Send + Sync,
{
    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn get(&self, index: &Index) -> Result<T, LazyError> {
        self.shape.check(index)?;
        let location = self.layout.location(index).map_err(|err| LazyError::Layout {
            reason: err.to_string(),
        })?;
        self.data
            .get(location)
            .cloned()
            .ok_or_else(|| LazyError::BufferSize {
                expected: location + 1,
                got: self.data.len(),
            })
    }
}

impl<T, F> NdElement<T, F> for BufferStructure<T, F>
where
    T: Clone + Send + Sync,
    F: Send + Sync,
{
    fn field(&self) -> &Arc<F> {
        &self.field
    }
}

impl<T, F> fmt::Debug for BufferStructure<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferStructure")
            .field("shape", &self.shape)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
