//! # kdispatch
//!
//! **Runtime type dispatch and asynchronous execution of numerical kernels.**
//!
//! kdispatch lets a dynamically typed array layer call specialized kernels
//! without knowing, at compile time, the element type or memory layout of
//! its arrays. A call resolves the array's runtime type identifier to a
//! [`TypeIndex`](dtype::TypeIndex), picks a compiled kernel from a dispatch
//! table, schedules it on an out-of-order [`Queue`](runtime::Queue) after
//! its prerequisite events, and returns two events:
//!
//! - the **kernel** event, which completes when the result is written and
//!   carries any numerical failure
//! - the **guard** event, which completes after the kernel and keeps the
//!   argument buffers alive until then
//!
//! ## Operations
//!
//! - **Elementwise**: `i0`, `fmax`, `fmin` with contiguous and strided kernels
//! - **Windows**: `hamming`, `hanning`, `blackman`
//! - **Linear algebra**: in-place Cholesky and LU solves of one matrix or a
//!   batch, with per-item failure reporting
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kdispatch::prelude::*;
//!
//! kdispatch::init();
//! let queue = Queue::host(QueueOptions::from_env())?;
//! let x = ArrayView::from_slice(&[0.0f32, 1.0, 2.0], &[3], &queue)?;
//! let y = ArrayView::zeros(&[3], DType::F32, &queue)?;
//!
//! let (guard, kernel) = kdispatch::ops::i0(&queue, &x, &y, &[])?;
//! kernel.wait()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `f16` (default): half precision elements via the `half` crate

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod dtype;
pub mod error;
pub mod linalg;
pub mod ops;
pub mod runtime;
pub mod tensor;

pub use error::{BatchFailure, Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::{DType, TypeIndex};
    pub use crate::error::{BatchFailure, Error, Result};
    pub use crate::linalg::{Uplo, factorize_batch, factorize_one, solve_batch, solve_one};
    pub use crate::runtime::{Context, Device, Event, OrderManager, Queue, QueueOptions};
    pub use crate::tensor::{ArrayView, Layout, Storage};
}

/// Build the type registry and every dispatch table
///
/// Idempotent and safe to call from several threads; later calls return
/// immediately. Tables are otherwise built lazily on first use, so calling
/// this only moves that cost to a predictable point.
pub fn init() {
    dtype::registry();
    ops::init_tables();
    linalg::init_tables();
}
