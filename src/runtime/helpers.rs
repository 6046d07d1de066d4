//! Precondition checks shared by every execution engine
//!
//! Each helper maps one failed precondition to its error variant, so that
//! engines can apply them in their documented order with `?`.

use super::Queue;
use crate::error::{Error, Result};
use crate::tensor::ArrayView;

/// Returns true if memory allocated through any of `alloc_queues` may be
/// used by `exec_queue`
///
/// Queues are compatible when they share both context and device.
pub fn queues_are_compatible(exec_queue: &Queue, alloc_queues: &[&Queue]) -> bool {
    alloc_queues
        .iter()
        .all(|q| q.context() == exec_queue.context() && q.device().is_same(exec_queue.device()))
}

/// Fail with [`Error::NotWritable`] unless `dst` may be written
#[inline]
pub fn ensure_writable(dst: &ArrayView) -> Result<()> {
    if dst.is_writable() {
        Ok(())
    } else {
        Err(Error::NotWritable)
    }
}

/// Fail with [`Error::IncompatibleQueue`] unless every view lives on a
/// queue compatible with `exec_queue`
pub fn ensure_queue_compatible(exec_queue: &Queue, views: &[&ArrayView]) -> Result<()> {
    let queues: Vec<&Queue> = views.iter().map(|v| v.queue()).collect();
    if queues_are_compatible(exec_queue, &queues) {
        Ok(())
    } else {
        Err(Error::IncompatibleQueue)
    }
}

/// Fail with [`Error::ShapeMismatch`] unless `view` has `ndim` dimensions
#[inline]
pub fn ensure_ndim(view: &ArrayView, ndim: usize) -> Result<()> {
    if view.ndim() == ndim {
        Ok(())
    } else {
        // Report the expected rank as a shape of unit extents
        Err(Error::shape_mismatch(&vec![1; ndim], view.shape()))
    }
}

/// Fail with [`Error::ShapeMismatch`] unless both views have equal extents
#[inline]
pub fn ensure_same_shape(expected: &ArrayView, got: &ArrayView) -> Result<()> {
    if expected.shape() == got.shape() {
        Ok(())
    } else {
        Err(Error::shape_mismatch(expected.shape(), got.shape()))
    }
}

/// Fail with [`Error::MemoryOverlap`] if `src` and `dst` overlap without
/// being the very same view
///
/// Exact aliasing is allowed: elementwise kernels read each element before
/// writing it.
pub fn ensure_no_partial_overlap(src: &ArrayView, dst: &ArrayView) -> Result<()> {
    if src.overlaps(dst) && !src.same_memory(dst) {
        Err(Error::MemoryOverlap)
    } else {
        Ok(())
    }
}
