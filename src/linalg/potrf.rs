//! In-place Cholesky factorization of one matrix or a strided batch
//!
//! Arrays are row-major while the native routines follow the column-major
//! LAPACK convention. A row-major buffer read column-major is the
//! transpose, so the requested triangle is swapped before the call: a
//! row-major lower factor is the column-major upper one.
//!
//! Scratch memory is sized per call and moved into the scheduled task. It
//! is released on the worker once the routine returns, never on the
//! scheduling thread.

use super::lapack;
use super::workspace::Workspace;
use crate::dtype::{ComplexElement, FieldElement, RealElement};
use crate::error::{BatchFailure, Error, Result};
use crate::ops::dispatch::{DispatchTable, KernelFactory};
use crate::runtime::compose::{completed_pair, keep_args_alive};
use crate::runtime::helpers::{ensure_ndim, ensure_queue_compatible, ensure_writable};
use crate::runtime::{Event, Queue};
use crate::tensor::ArrayView;
use std::sync::OnceLock;

/// Triangle holding the factor
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Uplo {
    /// `A = Uᴴ U`, factor in the upper triangle
    Upper,
    /// `A = L Lᴴ`, factor in the lower triangle
    Lower,
}

impl Uplo {
    /// The same triangle seen through a transposed layout
    #[inline]
    pub fn swapped(self) -> Self {
        match self {
            Uplo::Upper => Uplo::Lower,
            Uplo::Lower => Uplo::Upper,
        }
    }

    /// Integer code used by LAPACK-style interfaces (upper = 0, lower = 1)
    #[inline]
    pub fn code(self) -> i8 {
        match self {
            Uplo::Upper => 0,
            Uplo::Lower => 1,
        }
    }
}

impl TryFrom<i8> for Uplo {
    type Error = Error;

    fn try_from(code: i8) -> Result<Self> {
        match code {
            0 => Ok(Uplo::Upper),
            1 => Ok(Uplo::Lower),
            _ => Err(Error::invalid_argument(
                "uplo",
                format!("expected 0 (upper) or 1 (lower), got {code}"),
            )),
        }
    }
}

/// Layout of a strided batch of square matrices sharing one buffer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BatchDescriptor {
    /// Order of each matrix
    pub n: usize,
    /// Leading dimension of each matrix
    pub lda: usize,
    /// Elements between the starts of consecutive matrices
    pub stride_a: usize,
    /// Number of matrices
    pub batch_size: usize,
}

impl BatchDescriptor {
    /// Validate a batch layout against a buffer of `available` elements
    pub fn new(n: usize, lda: usize, stride_a: usize, batch_size: usize, available: usize) -> Result<Self> {
        if lda < n.max(1) {
            return Err(Error::invalid_argument(
                "lda",
                format!("leading dimension {lda} is smaller than n = {n}"),
            ));
        }
        let matrix_len = n
            .checked_mul(lda)
            .ok_or_else(|| Error::invalid_argument("lda", format!("n * lda overflows for n = {n}, lda = {lda}")))?;
        if batch_size > 1 && stride_a < matrix_len {
            return Err(Error::invalid_argument(
                "stride_a",
                format!("stride {stride_a} is smaller than n * lda = {matrix_len}"),
            ));
        }
        let desc = Self {
            n,
            lda,
            stride_a,
            batch_size,
        };
        let required = desc.required_len().ok_or_else(|| {
            Error::invalid_argument(
                "stride_a",
                format!("{batch_size} matrices spaced {stride_a} elements apart overflow the address space"),
            )
        })?;
        if required > available {
            return Err(Error::invalid_argument(
                "batch_size",
                format!("batch needs {required} elements but the array holds {available}"),
            ));
        }
        Ok(desc)
    }

    /// Elements the batch touches, from the first matrix to the end of the last
    ///
    /// `None` when the span does not fit in `usize`.
    pub fn required_len(&self) -> Option<usize> {
        if self.n == 0 || self.batch_size == 0 {
            return Some(0);
        }
        let last_start = (self.batch_size - 1).checked_mul(self.stride_a)?;
        let matrix_span = self.lda.checked_mul(self.n - 1)?.checked_add(self.n)?;
        last_start.checked_add(matrix_span)
    }
}

/// Single-matrix kernel: `(queue, n, a, lda, uplo, depends)`
///
/// Fails synchronously only when the workspace cannot be allocated.
pub type PotrfFn = fn(&Queue, usize, u64, usize, Uplo, &[Event]) -> Result<Event>;

/// Batched kernel: `(queue, n, a, lda, stride_a, batch_size, uplo, depends)`
pub type PotrfBatchFn = fn(&Queue, usize, u64, usize, usize, usize, Uplo, &[Event]) -> Result<Event>;

fn potrf_impl<T: FieldElement>(
    queue: &Queue,
    n: usize,
    a: u64,
    lda: usize,
    uplo: Uplo,
    depends: &[Event],
) -> Result<Event> {
    let len = BatchDescriptor { n, lda, stride_a: 0, batch_size: 1 }
        .required_len()
        .ok_or_else(|| Error::invalid_argument("lda", "matrix span overflows the address space"))?;
    let mut workspace = Workspace::<T>::try_new(lapack::potrf_scratchpad_size(n, lda))?;

    Ok(queue.submit(depends, move || {
        if len == 0 {
            return Ok(());
        }
        // SAFETY: the executor checked the matrix is dense with `len` elements
        let matrix = unsafe { std::slice::from_raw_parts_mut(a as *mut T, len) };
        let info = lapack::potrf(uplo, n, matrix, lda, workspace.as_mut_slice());
        drop(workspace);
        match info {
            0 => Ok(()),
            info if info > 0 => {
                log::warn!("potrf: leading minor of order {info} is not positive definite");
                Err(Error::NotPositiveDefinite { minor: info as usize })
            }
            info => Err(Error::Internal(format!("potrf: argument {} had an illegal value", -info))),
        }
    }))
}

#[allow(clippy::too_many_arguments)]
fn potrf_batch_impl<T: FieldElement>(
    queue: &Queue,
    n: usize,
    a: u64,
    lda: usize,
    stride_a: usize,
    batch_size: usize,
    uplo: Uplo,
    depends: &[Event],
) -> Result<Event> {
    let len = BatchDescriptor { n, lda, stride_a, batch_size }
        .required_len()
        .ok_or_else(|| Error::invalid_argument("stride_a", "batch span overflows the address space"))?;
    let scratch_len = lapack::potrf_batch_scratchpad_size(n, lda, batch_size);
    let mut workspace = Workspace::<T>::try_new(scratch_len)?;

    Ok(queue.submit(depends, move || {
        if len == 0 {
            return Ok(());
        }
        // SAFETY: the executor validated the batch descriptor against the array
        let batch = unsafe { std::slice::from_raw_parts_mut(a as *mut T, len) };
        let info = lapack::potrf_batch(uplo, n, batch, lda, stride_a, batch_size, workspace.as_mut_slice());
        drop(workspace);
        batch_status(&info)
    }))
}

/// Translate per-item statuses into one outcome
fn batch_status(info: &[i64]) -> Result<()> {
    if let Some(&bad) = info.iter().find(|&&i| i < 0) {
        return Err(Error::Internal(format!(
            "potrf_batch: argument {} had an illegal value",
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
    log::warn!(
        "potrf_batch: {} of {} matrices are not positive definite",
        failures.len(),
        info.len()
    );
    Err(Error::NotPositiveDefiniteBatch { failures })
}

struct PotrfFactory;

impl KernelFactory for PotrfFactory {
    type Kernel = PotrfFn;
    const NAME: &'static str = "potrf";

    fn real<T: RealElement>() -> Option<PotrfFn> {
        Some(potrf_impl::<T>)
    }

    fn complex<T: ComplexElement>() -> Option<PotrfFn> {
        Some(potrf_impl::<T>)
    }
}

struct PotrfBatchFactory;

impl KernelFactory for PotrfBatchFactory {
    type Kernel = PotrfBatchFn;
    const NAME: &'static str = "potrf_batch";

    fn real<T: RealElement>() -> Option<PotrfBatchFn> {
        Some(potrf_batch_impl::<T>)
    }

    fn complex<T: ComplexElement>() -> Option<PotrfBatchFn> {
        Some(potrf_batch_impl::<T>)
    }
}

static POTRF_TABLE: OnceLock<DispatchTable<PotrfFn>> = OnceLock::new();
static POTRF_BATCH_TABLE: OnceLock<DispatchTable<PotrfBatchFn>> = OnceLock::new();

/// Single-matrix kernels by element type
pub fn potrf_table() -> &'static DispatchTable<PotrfFn> {
    POTRF_TABLE.get_or_init(DispatchTable::build::<PotrfFactory>)
}

/// Batched kernels by element type
pub fn potrf_batch_table() -> &'static DispatchTable<PotrfBatchFn> {
    POTRF_BATCH_TABLE.get_or_init(DispatchTable::build::<PotrfBatchFactory>)
}

fn ensure_square(a: &ArrayView, n: usize) -> Result<()> {
    let shape = a.shape();
    let tail = &shape[shape.len() - 2..];
    if tail[0] == n && tail[1] == n {
        Ok(())
    } else {
        let mut expected = shape.to_vec();
        let len = expected.len();
        expected[len - 2] = n;
        expected[len - 1] = n;
        Err(Error::shape_mismatch(&expected, shape))
    }
}

/// Factorize the 2-D matrix `a` in place after `depends`
///
/// `fill` names the triangle of the row-major array that receives the
/// factor; the other triangle is left unspecified. Returns
/// `(guard, kernel)`. A matrix that is not positive definite completes the
/// kernel event with [`Error::NotPositiveDefinite`].
pub fn factorize_one(queue: &Queue, a: &ArrayView, fill: Uplo, depends: &[Event]) -> Result<(Event, Event)> {
    ensure_writable(a)?;
    ensure_ndim(a, 2)?;
    let n = a.shape()[0];
    ensure_square(a, n)?;
    ensure_queue_compatible(queue, &[a])?;
    if !a.is_c_contiguous() {
        return Err(Error::layout_unsupported("potrf", "matrix must be C-contiguous"));
    }

    if n == 0 {
        log::trace!("potrf: empty matrix, nothing scheduled");
        return Ok(completed_pair());
    }

    let kernel_fn = potrf_table()
        .get(a.type_index())
        .ok_or_else(|| Error::unsupported_type(a.typenum(), "potrf"))?;
    let kernel = kernel_fn(queue, n, a.data_ptr(), n, fill.swapped(), depends)?;
    let guard = keep_args_alive(queue, &[a], std::slice::from_ref(&kernel));
    Ok((guard, kernel))
}

/// Factorize `batch_size` matrices of order `n`, spaced `stride_a` elements
/// apart in `a`, in place after `depends`
///
/// Every matrix is factorized independently. When some are not positive
/// definite the kernel event completes with
/// [`Error::NotPositiveDefiniteBatch`] listing them, and every other
/// matrix holds a valid factor. Returns `(guard, kernel)`.
#[allow(clippy::too_many_arguments)]
pub fn factorize_batch(
    queue: &Queue,
    a: &ArrayView,
    fill: Uplo,
    n: usize,
    stride_a: usize,
    batch_size: usize,
    depends: &[Event],
) -> Result<(Event, Event)> {
    ensure_writable(a)?;
    if a.ndim() < 2 {
        return Err(Error::shape_mismatch(&[n, n], a.shape()));
    }
    ensure_square(a, n)?;
    ensure_queue_compatible(queue, &[a])?;
    if !a.is_c_contiguous() {
        return Err(Error::layout_unsupported("potrf_batch", "matrices must be C-contiguous"));
    }

    if n == 0 || batch_size == 0 {
        log::trace!("potrf_batch: empty batch, nothing scheduled");
        return Ok(completed_pair());
    }

    let desc = BatchDescriptor::new(n, n, stride_a, batch_size, a.size())?;
    let kernel_fn = potrf_batch_table()
        .get(a.type_index())
        .ok_or_else(|| Error::unsupported_type(a.typenum(), "potrf_batch"))?;
    let kernel = kernel_fn(
        queue,
        desc.n,
        a.data_ptr(),
        desc.lda,
        desc.stride_a,
        desc.batch_size,
        fill.swapped(),
        depends,
    )?;
    let guard = keep_args_alive(queue, &[a], std::slice::from_ref(&kernel));
    Ok((guard, kernel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::{DType, DTypeSet};

    #[test]
    fn test_uplo_codes() {
        assert_eq!(Uplo::try_from(0).unwrap(), Uplo::Upper);
        assert_eq!(Uplo::try_from(1).unwrap(), Uplo::Lower);
        assert!(Uplo::try_from(2).is_err());
        assert_eq!(Uplo::Lower.swapped().code(), 0);
    }

    #[test]
    fn test_batch_descriptor() {
        let d = BatchDescriptor::new(4, 4, 16, 3, 48).unwrap();
        assert_eq!(d.required_len(), Some(48));
        // A single matrix may use any stride
        assert!(BatchDescriptor::new(4, 4, 0, 1, 16).is_ok());
        assert!(matches!(
            BatchDescriptor::new(4, 4, 8, 2, 48),
            Err(Error::InvalidArgument { arg: "stride_a", .. })
        ));
        assert!(matches!(
            BatchDescriptor::new(4, 4, 16, 4, 48),
            Err(Error::InvalidArgument { arg: "batch_size", .. })
        ));
        assert!(BatchDescriptor::new(4, 2, 16, 1, 16).is_err());
    }

    #[test]
    fn test_batch_descriptor_overflow() {
        assert!(matches!(
            BatchDescriptor::new(4, 4, 1 << 63, 3, 48),
            Err(Error::InvalidArgument { arg: "stride_a", .. })
        ));
        assert!(matches!(
            BatchDescriptor::new(4, usize::MAX, usize::MAX, 2, 48),
            Err(Error::InvalidArgument { arg: "lda", .. })
        ));
        let wide = BatchDescriptor {
            n: 2,
            lda: 2,
            stride_a: usize::MAX / 2,
            batch_size: 4,
        };
        assert_eq!(wide.required_len(), None);
    }

    #[test]
    fn test_batch_status() {
        assert_eq!(batch_status(&[0, 0]), Ok(()));
        assert_eq!(
            batch_status(&[0, 3, 0, 1]),
            Err(Error::NotPositiveDefiniteBatch {
                failures: vec![
                    BatchFailure { batch_index: 1, info: 3 },
                    BatchFailure { batch_index: 3, info: 1 },
                ]
            })
        );
        assert!(matches!(batch_status(&[0, -4]), Err(Error::Internal(_))));
    }

    #[test]
    fn test_tables_cover_linalg_types() {
        let supported = potrf_table().supported();
        assert_eq!(supported, potrf_batch_table().supported());
        assert_eq!(supported, DTypeSet::LINALG);
        assert!(!supported.contains(DType::F16));
        assert!(!supported.contains(DType::I32));
    }
}
