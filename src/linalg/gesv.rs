//! Solving dense linear systems `A X = B` by LU factorization
//!
//! Both operands are column-major (F-contiguous), the layout the native
//! routine works in, so no triangle or transpose bookkeeping is needed.
//! `A` is overwritten with its LU factors and `B` with the solution.
//!
//! Batched operands carry the batch on the last axis: `A` is
//! `(n, n, batch)` and `B` is `(n, batch)` or `(n, nrhs, batch)`.

use super::lapack;
use super::workspace::Workspace;
use crate::dtype::{ComplexElement, DType, FieldElement, RealElement};
use crate::error::{BatchFailure, Error, Result};
use crate::ops::dispatch::{DispatchTable, KernelFactory};
use crate::runtime::compose::{completed_pair, keep_args_alive};
use crate::runtime::helpers::{ensure_queue_compatible, ensure_writable};
use crate::runtime::{Event, Queue};
use crate::tensor::ArrayView;
use std::sync::OnceLock;

/// Single-system kernel: `(queue, n, nrhs, a, lda, b, ldb, depends)`
///
/// Fails synchronously only when the pivot workspace cannot be allocated.
pub type GesvFn = fn(&Queue, usize, usize, u64, usize, u64, usize, &[Event]) -> Result<Event>;

/// Batched kernel: `(queue, n, nrhs, a, lda, stride_a, b, ldb, stride_b, batch_size, depends)`
pub type GesvBatchFn =
    fn(&Queue, usize, usize, u64, usize, usize, u64, usize, usize, usize, &[Event]) -> Result<Event>;

/// Elements spanned by `count` column-major `rows x cols` blocks spaced
/// `stride` apart, or `None` on overflow
fn span(rows: usize, cols: usize, ld: usize, stride: usize, count: usize) -> Option<usize> {
    if rows == 0 || cols == 0 || count == 0 {
        return Some(0);
    }
    let last_start = (count - 1).checked_mul(stride)?;
    let block = ld.checked_mul(cols - 1)?.checked_add(rows)?;
    last_start.checked_add(block)
}

/// # Safety
///
/// `ptr` must address `len` initialised elements of `T` that nothing else
/// accesses for the returned lifetime.
unsafe fn device_slice<'a, T>(ptr: u64, len: usize) -> &'a mut [T] {
    if len == 0 {
        return Default::default();
    }
    // SAFETY: upheld by the caller
    unsafe { std::slice::from_raw_parts_mut(ptr as *mut T, len) }
}

#[allow(clippy::too_many_arguments)]
fn gesv_impl<T: FieldElement>(
    queue: &Queue,
    n: usize,
    nrhs: usize,
    a: u64,
    lda: usize,
    b: u64,
    ldb: usize,
    depends: &[Event],
) -> Result<Event> {
    let a_len = span(n, n, lda, 0, 1)
        .ok_or_else(|| Error::invalid_argument("lda", "matrix span overflows the address space"))?;
    let b_len = span(n, nrhs, ldb, 0, 1)
        .ok_or_else(|| Error::invalid_argument("ldb", "right-hand side span overflows the address space"))?;
    let mut pivots = Workspace::<usize>::try_new(lapack::gesv_scratchpad_size(n))?;

    Ok(queue.submit(depends, move || {
        if a_len == 0 {
            return Ok(());
        }
        // SAFETY: the executor checked both operands are dense, distinct and
        // hold at least these spans
        let (matrix, rhs) = unsafe { (device_slice::<T>(a, a_len), device_slice::<T>(b, b_len)) };
        let info = lapack::gesv(n, nrhs, matrix, lda, pivots.as_mut_slice(), rhs, ldb);
        drop(pivots);
        match info {
            0 => Ok(()),
            info if info > 0 => {
                log::warn!("gesv: U[{info}, {info}] is exactly zero, matrix is singular");
                Err(Error::Singular { index: info as usize })
            }
            info => Err(Error::Internal(format!("gesv: argument {} had an illegal value", -info))),
        }
    }))
}

#[allow(clippy::too_many_arguments)]
fn gesv_batch_impl<T: FieldElement>(
    queue: &Queue,
    n: usize,
    nrhs: usize,
    a: u64,
    lda: usize,
    stride_a: usize,
    b: u64,
    ldb: usize,
    stride_b: usize,
    batch_size: usize,
    depends: &[Event],
) -> Result<Event> {
    let a_len = span(n, n, lda, stride_a, batch_size)
        .ok_or_else(|| Error::invalid_argument("stride_a", "batch span overflows the address space"))?;
    let b_len = span(n, nrhs, ldb, stride_b, batch_size)
        .ok_or_else(|| Error::invalid_argument("stride_b", "batch span overflows the address space"))?;
    let mut pivots = Workspace::<usize>::try_new(lapack::gesv_batch_scratchpad_size(n, batch_size))?;

    Ok(queue.submit(depends, move || {
        if a_len == 0 {
            return Ok(());
        }
        // SAFETY: the executor validated both batches against their arrays
        let (matrices, rhs) = unsafe { (device_slice::<T>(a, a_len), device_slice::<T>(b, b_len)) };
        let info = lapack::gesv_batch(
            n,
            nrhs,
            matrices,
            lda,
            stride_a,
            rhs,
            ldb,
            stride_b,
            batch_size,
            pivots.as_mut_slice(),
        );
        drop(pivots);
        batch_status(&info)
    }))
}

/// Translate per-item statuses into one outcome
fn batch_status(info: &[i64]) -> Result<()> {
    if let Some(&bad) = info.iter().find(|&&i| i < 0) {
        return Err(Error::Internal(format!(
            "gesv_batch: argument {} had an illegal value",
            -bad
        )));
    }
    let failures: Vec<BatchFailure> = info
        .iter()
        .enumerate()
        .filter(|&(_, &i)| i > 0)
        .map(|(batch_index, &i)| BatchFailure {
            batch_index,
            info: i as usize,
        })
        .collect();
    if failures.is_empty() {
        return Ok(());
    }
    log::warn!("gesv_batch: {} of {} systems are singular", failures.len(), info.len());
    Err(Error::SingularBatch { failures })
}

struct GesvFactory;

impl KernelFactory for GesvFactory {
    type Kernel = GesvFn;
    const NAME: &'static str = "gesv";

    fn real<T: RealElement>() -> Option<GesvFn> {
        Some(gesv_impl::<T>)
    }

    fn complex<T: ComplexElement>() -> Option<GesvFn> {
        Some(gesv_impl::<T>)
    }
}

struct GesvBatchFactory;

impl KernelFactory for GesvBatchFactory {
    type Kernel = GesvBatchFn;
    const NAME: &'static str = "gesv_batch";

    fn real<T: RealElement>() -> Option<GesvBatchFn> {
        Some(gesv_batch_impl::<T>)
    }

    fn complex<T: ComplexElement>() -> Option<GesvBatchFn> {
        Some(gesv_batch_impl::<T>)
    }
}

static GESV_TABLE: OnceLock<DispatchTable<GesvFn>> = OnceLock::new();
static GESV_BATCH_TABLE: OnceLock<DispatchTable<GesvBatchFn>> = OnceLock::new();

/// Single-system kernels by element type
pub fn gesv_table() -> &'static DispatchTable<GesvFn> {
    GESV_TABLE.get_or_init(DispatchTable::build::<GesvFactory>)
}

/// Batched kernels by element type
pub fn gesv_batch_table() -> &'static DispatchTable<GesvBatchFn> {
    GESV_BATCH_TABLE.get_or_init(DispatchTable::build::<GesvBatchFactory>)
}

/// Checks shared by the single and batched solvers
///
/// `a_ndim` is the exact rank of the coefficient array and `b_ndims` the
/// accepted ranks of the right-hand sides. Returns `n`.
fn common_checks(
    queue: &Queue,
    a: &ArrayView,
    b: &ArrayView,
    a_ndim: usize,
    b_ndims: [usize; 2],
    op: &'static str,
) -> Result<usize> {
    ensure_writable(a)?;
    ensure_writable(b)?;

    let a_shape = a.shape();
    if a.ndim() != a_ndim || a_shape[0] != a_shape[1] {
        let mut expected = a_shape.to_vec();
        expected.resize(a_ndim, 1);
        expected[1] = expected[0];
        return Err(Error::shape_mismatch(&expected, a_shape));
    }
    let n = a_shape[0];
    let b_shape = b.shape();
    if !b_ndims.contains(&b.ndim()) || b_shape[0] != n {
        let mut expected = b_shape.to_vec();
        if expected.is_empty() {
            expected.push(n);
        }
        expected[0] = n;
        return Err(Error::shape_mismatch(&expected, b_shape));
    }

    ensure_queue_compatible(queue, &[a, b])?;
    if a.overlaps(b) {
        return Err(Error::MemoryOverlap);
    }
    if !a.is_f_contiguous() {
        return Err(Error::layout_unsupported(op, "coefficient matrix must be F-contiguous"));
    }
    if !b.is_f_contiguous() {
        return Err(Error::layout_unsupported(op, "right-hand sides must be F-contiguous"));
    }
    Ok(n)
}

/// Element type shared by both operands
fn common_dtype(a: &ArrayView, b: &ArrayView, op: &'static str) -> Result<DType> {
    let a_dtype = a.dtype().ok_or_else(|| Error::unsupported_type(a.typenum(), op))?;
    match b.dtype() {
        Some(b_dtype) if b_dtype == a_dtype => Ok(a_dtype),
        Some(b_dtype) => Err(Error::DTypeMismatch {
            expected: a_dtype,
            got: b_dtype,
        }),
        None => Err(Error::unsupported_type(b.typenum(), op)),
    }
}

/// Solve `a x = b` in place after `depends`
///
/// `a` is an F-contiguous `(n, n)` matrix and `b` an F-contiguous `(n,)` or
/// `(n, nrhs)` array of the same element type. On completion `a` holds the
/// LU factors and `b` the solution. A singular matrix completes the kernel
/// event with [`Error::Singular`] and leaves `b` unchanged. Returns
/// `(guard, kernel)`.
pub fn solve_one(queue: &Queue, a: &ArrayView, b: &ArrayView, depends: &[Event]) -> Result<(Event, Event)> {
    let n = common_checks(queue, a, b, 2, [1, 2], "gesv")?;
    let nrhs = if b.ndim() == 2 { b.shape()[1] } else { 1 };

    if n == 0 || nrhs == 0 {
        log::trace!("gesv: empty system, nothing scheduled");
        return Ok(completed_pair());
    }

    let dtype = common_dtype(a, b, "gesv")?;
    let kernel_fn = gesv_table()
        .get_dtype(dtype)
        .ok_or_else(|| Error::unsupported_type(a.typenum(), "gesv"))?;
    let kernel = kernel_fn(queue, n, nrhs, a.data_ptr(), n, b.data_ptr(), n, depends)?;
    let guard = keep_args_alive(queue, &[a, b], std::slice::from_ref(&kernel));
    Ok((guard, kernel))
}

/// Solve `batch` independent systems in place after `depends`
///
/// `a` is an F-contiguous `(n, n, batch)` array and `b` an F-contiguous
/// `(n, batch)` or `(n, nrhs, batch)` array. Singular systems complete the
/// kernel event with [`Error::SingularBatch`] listing them; every other
/// system is solved. Returns `(guard, kernel)`.
pub fn solve_batch(queue: &Queue, a: &ArrayView, b: &ArrayView, depends: &[Event]) -> Result<(Event, Event)> {
    let n = common_checks(queue, a, b, 3, [2, 3], "gesv_batch")?;
    let batch_size = a.shape()[2];
    let b_shape = b.shape();
    if b_shape[b_shape.len() - 1] != batch_size {
        let mut expected = b_shape.to_vec();
        let last = expected.len() - 1;
        expected[last] = batch_size;
        return Err(Error::shape_mismatch(&expected, b_shape));
    }
    let nrhs = if b.ndim() == 3 { b_shape[1] } else { 1 };

    if n == 0 || nrhs == 0 || batch_size == 0 {
        log::trace!("gesv_batch: empty batch, nothing scheduled");
        return Ok(completed_pair());
    }

    let dtype = common_dtype(a, b, "gesv_batch")?;
    let kernel_fn = gesv_batch_table()
        .get_dtype(dtype)
        .ok_or_else(|| Error::unsupported_type(a.typenum(), "gesv_batch"))?;
    let kernel = kernel_fn(
        queue,
        n,
        nrhs,
        a.data_ptr(),
        n,
        n * n,
        b.data_ptr(),
        n,
        n * nrhs,
        batch_size,
        depends,
    )?;
    let guard = keep_args_alive(queue, &[a, b], std::slice::from_ref(&kernel));
    Ok((guard, kernel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DTypeSet;

    #[test]
    fn test_span() {
        assert_eq!(span(3, 3, 3, 9, 2), Some(18));
        assert_eq!(span(3, 1, 3, 3, 4), Some(12));
        assert_eq!(span(3, 0, 3, 0, 4), Some(0));
        assert_eq!(span(2, 2, 2, usize::MAX, 3), None);
    }

    #[test]
    fn test_batch_status() {
        assert_eq!(batch_status(&[0, 0, 0]), Ok(()));
        assert_eq!(
            batch_status(&[0, 2, 0]),
            Err(Error::SingularBatch {
                failures: vec![BatchFailure { batch_index: 1, info: 2 }]
            })
        );
        assert!(matches!(batch_status(&[-6, -6]), Err(Error::Internal(_))));
    }

    #[test]
    fn test_tables_cover_linalg_types() {
        assert_eq!(gesv_table().supported(), DTypeSet::LINALG);
        assert_eq!(gesv_batch_table().supported(), DTypeSet::LINALG);
    }
}
