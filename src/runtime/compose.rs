//! Dependency composition: lifetime guards for asynchronous kernels
//!
//! Every scheduling call returns `(guard, kernel)`. The guard is a no-op
//! task that depends on the kernel and holds clones of the argument views,
//! so the caller's buffers stay allocated until the kernel has finished
//! touching them.

use super::{Event, Queue};
use crate::tensor::ArrayView;

/// Schedule a task that keeps `owners` alive until `depends` complete
///
/// The task performs no computation. It completes successfully even when a
/// dependency failed: the guard reports lifetime, not outcome.
pub fn keep_args_alive(queue: &Queue, owners: &[&ArrayView], depends: &[Event]) -> Event {
    let held: Vec<ArrayView> = owners.iter().map(|v| (*v).clone()).collect();
    queue.submit(depends, move || {
        drop(held);
        Ok(())
    })
}

/// Guard for `op`: completes after `op` and every handle in `depends`
pub fn chain(queue: &Queue, depends: &[Event], owners: &[&ArrayView], op: &Event) -> Event {
    let mut waits = Vec::with_capacity(depends.len() + 1);
    waits.extend_from_slice(depends);
    waits.push(op.clone());
    keep_args_alive(queue, owners, &waits)
}

/// The `(guard, kernel)` pair for an operation that had nothing to do
pub fn completed_pair() -> (Event, Event) {
    (Event::completed(), Event::completed())
}
