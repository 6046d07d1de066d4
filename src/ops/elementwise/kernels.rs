//! Generic elementwise kernel bodies
//!
//! Every kernel has the slot signature `(queue, pointers, count or indexer,
//! depends) -> Event`: it submits one task to the queue and returns its
//! event without waiting. Element access goes through raw pointers rather
//! than slices because the output may alias an input exactly.

use super::{BinaryFunctor, UnaryFunctor};
use crate::ops::indexer::{ThreeOffsetsIndexer, TwoOffsetsIndexer};
use crate::runtime::{Event, Queue};
use bytemuck::Pod;
use rayon::prelude::*;

/// Below this many elements a kernel runs on a single worker
const PARALLEL_THRESHOLD: usize = 4096;

#[inline]
fn at<T>(base: u64, offset: isize) -> *mut T {
    (base as *mut T).wrapping_offset(offset)
}

fn for_each_index(nelems: usize, body: impl Fn(usize) + Send + Sync) {
    if nelems < PARALLEL_THRESHOLD {
        (0..nelems).for_each(body);
    } else {
        (0..nelems).into_par_iter().for_each(body);
    }
}

/// Unary kernel over contiguous memory
pub fn unary_contig<T: Pod + Send + Sync, F: UnaryFunctor<T>>(
    queue: &Queue,
    nelems: usize,
    src: u64,
    dst: u64,
    depends: &[Event],
) -> Event {
    queue.submit(depends, move || {
        for_each_index(nelems, |i| {
            // SAFETY: the engine checked both views cover `nelems` dense elements
            unsafe {
                let x = at::<T>(src, i as isize).read();
                at::<F::Out>(dst, i as isize).write(F::call(x));
            }
        });
        Ok(())
    })
}

/// Unary kernel over arbitrary strides
pub fn unary_strided<T: Pod + Send + Sync, F: UnaryFunctor<T>>(
    queue: &Queue,
    nelems: usize,
    indexer: &TwoOffsetsIndexer,
    src: u64,
    dst: u64,
    depends: &[Event],
) -> Event {
    let indexer = indexer.clone();
    queue.submit(depends, move || {
        for_each_index(nelems, |i| {
            let [s, d] = indexer.offsets(i);
            // SAFETY: offsets stay within each view's checked extent
            unsafe {
                let x = at::<T>(src, s).read();
                at::<F::Out>(dst, d).write(F::call(x));
            }
        });
        Ok(())
    })
}

/// Binary kernel over contiguous memory
pub fn binary_contig<T: Pod + Send + Sync, F: BinaryFunctor<T>>(
    queue: &Queue,
    nelems: usize,
    src1: u64,
    src2: u64,
    dst: u64,
    depends: &[Event],
) -> Event {
    queue.submit(depends, move || {
        for_each_index(nelems, |i| {
            // SAFETY: the engine checked all views cover `nelems` dense elements
            unsafe {
                let a = at::<T>(src1, i as isize).read();
                let b = at::<T>(src2, i as isize).read();
                at::<F::Out>(dst, i as isize).write(F::call(a, b));
            }
        });
        Ok(())
    })
}

/// Binary kernel over arbitrary strides
pub fn binary_strided<T: Pod + Send + Sync, F: BinaryFunctor<T>>(
    queue: &Queue,
    nelems: usize,
    indexer: &ThreeOffsetsIndexer,
    src1: u64,
    src2: u64,
    dst: u64,
    depends: &[Event],
) -> Event {
    let indexer = indexer.clone();
    queue.submit(depends, move || {
        for_each_index(nelems, |i| {
            let [s1, s2, d] = indexer.offsets(i);
            // SAFETY: offsets stay within each view's checked extent
            unsafe {
                let a = at::<T>(src1, s1).read();
                let b = at::<T>(src2, s2).read();
                at::<F::Out>(dst, d).write(F::call(a, b));
            }
        });
        Ok(())
    })
}
