//! Window functions written into a caller-provided 1-D array
//!
//! With `M` the length of the output array and `n` in `[0, M)`:
//!
//! | window   | w(n)                                                   |
//! |----------|--------------------------------------------------------|
//! | hamming  | 0.54 - 0.46 cos(2πn/(M-1))                             |
//! | hanning  | 0.5 - 0.5 cos(2πn/(M-1))                               |
//! | blackman | 0.42 - 0.5 cos(2πn/(M-1)) + 0.08 cos(4πn/(M-1))        |
//!
//! A window of length 1 is `[1.0]`. Only half, single and double precision
//! outputs have kernels, and the output must be C-contiguous.

use crate::dtype::{Element, RealElement};
use crate::error::{Error, Result};
use crate::ops::dispatch::{DispatchTable, KernelFactory};
use crate::runtime::compose::{completed_pair, keep_args_alive};
use crate::runtime::helpers::{ensure_ndim, ensure_queue_compatible, ensure_writable};
use crate::runtime::{Event, Queue};
use crate::tensor::ArrayView;
use rayon::prelude::*;
use std::f64::consts::PI;
use std::sync::OnceLock;

/// Window kernel: `(queue, dst, nelems, depends)`
pub type WindowFn = fn(&Queue, u64, usize, &[Event]) -> Event;

/// Window shape as a function of `n` and `M - 1`
pub trait WindowShape: Send + Sync + 'static {
    /// Operation name
    const NAME: &'static str;

    /// Value at position `n` of a window of length `m1 + 1`, with `m1 > 0`
    fn value(n: f64, m1: f64) -> f64;
}

/// Hamming window
pub struct Hamming;

impl WindowShape for Hamming {
    const NAME: &'static str = "hamming";

    #[inline]
    fn value(n: f64, m1: f64) -> f64 {
        0.54 - 0.46 * (2.0 * PI * n / m1).cos()
    }
}

/// Hann window
pub struct Hanning;

impl WindowShape for Hanning {
    const NAME: &'static str = "hanning";

    #[inline]
    fn value(n: f64, m1: f64) -> f64 {
        0.5 - 0.5 * (2.0 * PI * n / m1).cos()
    }
}

/// Blackman window
pub struct Blackman;

impl WindowShape for Blackman {
    const NAME: &'static str = "blackman";

    #[inline]
    fn value(n: f64, m1: f64) -> f64 {
        let x = PI * n / m1;
        0.42 - 0.5 * (2.0 * x).cos() + 0.08 * (4.0 * x).cos()
    }
}

/// Generic window kernel over a dense output
pub fn window_kernel<T: Element, W: WindowShape>(
    queue: &Queue,
    dst: u64,
    nelems: usize,
    depends: &[Event],
) -> Event {
    queue.submit(depends, move || {
        if nelems == 1 {
            // SAFETY: the engine checked the output holds one element
            unsafe { (dst as *mut T).write(T::one()) };
            return Ok(());
        }
        let m1 = (nelems - 1) as f64;
        (0..nelems).into_par_iter().for_each(|i| {
            let w = T::from_f64(W::value(i as f64, m1));
            // SAFETY: the engine checked the output is dense with `nelems` elements
            unsafe { (dst as *mut T).add(i).write(w) };
        });
        Ok(())
    })
}

struct WindowFactory<W>(std::marker::PhantomData<W>);

impl<W: WindowShape> KernelFactory for WindowFactory<W> {
    type Kernel = WindowFn;
    const NAME: &'static str = W::NAME;

    #[cfg(feature = "f16")]
    fn half() -> Option<WindowFn> {
        Some(window_kernel::<half::f16, W>)
    }

    fn real<T: RealElement>() -> Option<WindowFn> {
        Some(window_kernel::<T, W>)
    }
}

/// A window operation and its dispatch table
pub struct WindowOp {
    name: &'static str,
    table: &'static OnceLock<DispatchTable<WindowFn>>,
    build: fn() -> DispatchTable<WindowFn>,
}

impl WindowOp {
    /// Operation name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The operation's table, built on first call
    pub fn table(&self) -> &'static DispatchTable<WindowFn> {
        self.table.get_or_init(self.build)
    }

    /// Fill `result` with the window after `depends`; returns `(guard, kernel)`
    ///
    /// Checks, in order: writable, 1-D, queue compatibility, C-contiguity,
    /// then the element type once the array is known to be non-empty.
    pub fn execute(&self, queue: &Queue, result: &ArrayView, depends: &[Event]) -> Result<(Event, Event)> {
        ensure_writable(result)?;
        ensure_ndim(result, 1)?;
        ensure_queue_compatible(queue, &[result])?;
        if !result.is_c_contiguous() {
            return Err(Error::layout_unsupported(self.name, "output must be C-contiguous"));
        }

        let nelems = result.size();
        if nelems == 0 {
            log::trace!("{}: zero-length window, nothing scheduled", self.name);
            return Ok(completed_pair());
        }

        let kernel_fn = self
            .table()
            .get(result.type_index())
            .ok_or_else(|| Error::unsupported_type(result.typenum(), self.name))?;
        let kernel = kernel_fn(queue, result.data_ptr(), nelems, depends);
        let guard = keep_args_alive(queue, &[result], std::slice::from_ref(&kernel));
        Ok((guard, kernel))
    }
}

fn build_table<W: WindowShape>() -> DispatchTable<WindowFn> {
    DispatchTable::build::<WindowFactory<W>>()
}

static HAMMING_TABLE: OnceLock<DispatchTable<WindowFn>> = OnceLock::new();
static HANNING_TABLE: OnceLock<DispatchTable<WindowFn>> = OnceLock::new();
static BLACKMAN_TABLE: OnceLock<DispatchTable<WindowFn>> = OnceLock::new();

/// The Hamming window operation
pub static HAMMING: WindowOp = WindowOp {
    name: Hamming::NAME,
    table: &HAMMING_TABLE,
    build: build_table::<Hamming>,
};

/// The Hann window operation
pub static HANNING: WindowOp = WindowOp {
    name: Hanning::NAME,
    table: &HANNING_TABLE,
    build: build_table::<Hanning>,
};

/// The Blackman window operation
pub static BLACKMAN: WindowOp = WindowOp {
    name: Blackman::NAME,
    table: &BLACKMAN_TABLE,
    build: build_table::<Blackman>,
};

/// Fill `result` with a Hamming window
pub fn hamming(queue: &Queue, result: &ArrayView, depends: &[Event]) -> Result<(Event, Event)> {
    HAMMING.execute(queue, result, depends)
}

/// Fill `result` with a Hann window
pub fn hanning(queue: &Queue, result: &ArrayView, depends: &[Event]) -> Result<(Event, Event)> {
    HANNING.execute(queue, result, depends)
}

/// Fill `result` with a Blackman window
pub fn blackman(queue: &Queue, result: &ArrayView, depends: &[Event]) -> Result<(Event, Event)> {
    BLACKMAN.execute(queue, result, depends)
}
