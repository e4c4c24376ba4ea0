/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::sync::Arc;
use std::time::Duration;

use ndslice::Index;
use ndslice::Shape;
use ndslice::ShapeError;

/// The type of error for lazy structure operations.
///
/// Errors fall in two groups. Precondition violations
/// ([`LazyError::ShapeMismatch`], [`LazyError::Shape`],
/// [`LazyError::BufferSize`], [`LazyError::Layout`]) are reported by
/// the call that detects them and never stored. Computation failures
/// ([`LazyError::Computation`], [`LazyError::Panicked`],
/// [`LazyError::Cancelled`]) are stored in the handle of the index
/// that failed and replayed, unchanged, to everyone who observes that
/// index.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum LazyError {
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Shape, got: Shape },

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("buffer holds {got} elements, layout needs {expected}")]
    BufferSize { expected: usize, got: usize },

    #[error("invalid layout: {reason}")]
    Layout { reason: String },

    #[error("computation failed at {index}: {error:#}")]
    Computation {
        index: Index,
        error: Arc<anyhow::Error>,
    },

    #[error("computation panicked at {index}: {message}")]
    Panicked { index: Index, message: String },

    #[error("computation at {index} was cancelled: its execution scope shut down")]
    Cancelled { index: Index },

    #[error("timed out after {timeout:?} waiting for {index}")]
    Timeout { index: Index, timeout: Duration },

    #[error("cannot block on a current-thread runtime; await the value instead")]
    BlockingInAsyncContext,
}

impl LazyError {
    /// True for errors detected at the call site, before any
    /// computation was scheduled.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            LazyError::ShapeMismatch { .. }
                | LazyError::Shape(_)
                | LazyError::BufferSize { .. }
                | LazyError::Layout { .. }
        )
    }

    /// True for failures that belong to a computation and are replayed
    /// to every observer of its index.
    pub fn is_computation_failure(&self) -> bool {
        matches!(
            self,
            LazyError::Computation { .. } | LazyError::Panicked { .. } | LazyError::Cancelled { .. }
        )
    }

    /// The index whose computation failed, if any.
    pub fn index(&self) -> Option<&Index> {
        match self {
            LazyError::Computation { index, .. }
            | LazyError::Panicked { index, .. }
            | LazyError::Cancelled { index }
            | LazyError::Timeout { index, .. } => Some(index),
            _ => None,
        }
    }

    /// Walk the failure chain looking for an error of type `E`; this
    /// finds, say, the [`algebra::FieldError`] behind a failed element
    /// even when it surfaced through several composed structures.
    pub fn find_cause<E>(&self) -> Option<&E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match self {
            LazyError::Computation { error, .. } => error.chain().find_map(|cause| {
                cause.downcast_ref::<E>().or_else(|| {
                    cause
                        .downcast_ref::<LazyError>()
                        .and_then(|inner| inner.find_cause::<E>())
                })
            }),
            _ => None,
        }
    }
}
