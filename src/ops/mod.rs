//! Kernel operations
//!
//! Every operation follows the same shape: validate the call, resolve the
//! kernel from a dispatch table by type index, schedule it after the given
//! dependencies and return `(guard, kernel)`.
//!
//! ```text
//! i0(queue, src, dst, depends)
//!   └── UnaryUfunc::execute
//!         ├── checks (writable, shape, queue, size, type, overlap)
//!         ├── contig table  ─┐
//!         │   or strided    ─┴─► kernel fn ─► Queue::submit ─► kernel event
//!         └── keep_args_alive(views, [kernel]) ─► guard event
//! ```
//!
//! # Adding an operation
//!
//! 1. Write a scalar functor implementing [`UnaryFunctor`] or
//!    [`BinaryFunctor`] for the element types it supports.
//! 2. Declare one [`KernelFactory`] per strategy, overriding only the
//!    categories that have a kernel.
//! 3. Build the tables in a `OnceLock` and expose a `UnaryUfunc`,
//!    `BinaryUfunc` or `WindowOp`.

pub mod dispatch;
pub mod elementwise;
pub mod indexer;
pub mod ufunc;
pub mod window;

pub use dispatch::{DispatchTable, DispatchTable2D, KernelFactory};
pub use elementwise::{BinaryFunctor, BinaryUfunc, UnaryFunctor, UnaryUfunc};
pub use ufunc::{fmax, fmin, i0, i0_result_type};
pub use window::{WindowOp, blackman, hamming, hanning};

/// Build every elementwise and window table
pub(crate) fn init_tables() {
    ufunc::I0_UFUNC.tables();
    ufunc::FMAX_UFUNC.tables();
    ufunc::FMIN_UFUNC.tables();
    window::HAMMING.table();
    window::HANNING.table();
    window::BLACKMAN.table();
}
