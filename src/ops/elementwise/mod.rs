//! Execution engine for elementwise unary and binary operations
//!
//! An operation is described by its dispatch tables: one per execution
//! strategy (contiguous, strided) plus an output-type table. The engine
//! validates the call, picks the strategy from the operands' layouts, looks
//! the kernel up by the input type index and returns `(guard, kernel)`.
//!
//! Validation order, each a distinct error:
//!
//! 1. output writable: [`Error::NotWritable`]
//! 2. equal shapes: [`Error::ShapeMismatch`]
//! 3. compatible queues: [`Error::IncompatibleQueue`]
//! 4. zero elements: two completed events, nothing scheduled
//! 5. kernel registered for the input type: [`Error::UnsupportedType`]
//! 6. destination type equals the output type: [`Error::DTypeMismatch`]
//! 7. no partial input/output overlap: [`Error::MemoryOverlap`]

mod kernels;

pub use kernels::{binary_contig, binary_strided, unary_contig, unary_strided};

use crate::dtype::{DType, TypeIndex};
use crate::error::{Error, Result};
use crate::ops::dispatch::{DispatchTable, DispatchTable2D};
use crate::ops::indexer::{ThreeOffsetsIndexer, TwoOffsetsIndexer};
use crate::runtime::compose::{completed_pair, keep_args_alive};
use crate::runtime::helpers::{
    ensure_no_partial_overlap, ensure_queue_compatible, ensure_same_shape, ensure_writable,
};
use crate::runtime::{Event, Queue};
use crate::tensor::ArrayView;
use bytemuck::Pod;
use std::sync::OnceLock;

/// Scalar function applied by a unary kernel
pub trait UnaryFunctor<T>: Send + Sync + 'static {
    /// Output element type
    type Out: Pod + Send + Sync;

    /// Apply to one element
    fn call(x: T) -> Self::Out;
}

/// Scalar function applied by a binary kernel
pub trait BinaryFunctor<T>: Send + Sync + 'static {
    /// Output element type
    type Out: Pod + Send + Sync;

    /// Apply to one pair of elements
    fn call(a: T, b: T) -> Self::Out;
}

/// Unary kernel over dense memory: `(queue, nelems, src, dst, depends)`
pub type UnaryContigFn = fn(&Queue, usize, u64, u64, &[Event]) -> Event;

/// Unary kernel over strided memory: `(queue, nelems, indexer, src, dst, depends)`
pub type UnaryStridedFn = fn(&Queue, usize, &TwoOffsetsIndexer, u64, u64, &[Event]) -> Event;

/// Binary kernel over dense memory: `(queue, nelems, src1, src2, dst, depends)`
pub type BinaryContigFn = fn(&Queue, usize, u64, u64, u64, &[Event]) -> Event;

/// Binary kernel over strided memory: `(queue, nelems, indexer, src1, src2, dst, depends)`
pub type BinaryStridedFn =
    fn(&Queue, usize, &ThreeOffsetsIndexer, u64, u64, u64, &[Event]) -> Event;

// ============================================================================
// Unary
// ============================================================================

/// Dispatch tables of one unary operation
#[derive(Debug)]
pub struct UnaryTables {
    /// Contiguous kernels
    pub contig: DispatchTable<UnaryContigFn>,
    /// Strided kernels
    pub strided: DispatchTable<UnaryStridedFn>,
    /// Output type per input type
    pub output: DispatchTable<DType>,
}

/// A unary elementwise operation
pub struct UnaryUfunc {
    name: &'static str,
    tables: &'static OnceLock<UnaryTables>,
    build: fn() -> UnaryTables,
}

impl UnaryUfunc {
    /// Describe an operation whose tables are built by `build` on first use
    pub const fn new(
        name: &'static str,
        tables: &'static OnceLock<UnaryTables>,
        build: fn() -> UnaryTables,
    ) -> Self {
        Self {
            name,
            tables,
            build,
        }
    }

    /// Operation name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The operation's tables, built on first call
    pub fn tables(&self) -> &'static UnaryTables {
        self.tables.get_or_init(self.build)
    }

    /// Output dtype for an input dtype, or `None` if unsupported
    pub fn result_type(&self, input: DType) -> Option<DType> {
        self.tables().output.get_dtype(input)
    }

    /// Schedule `dst = op(src)` after `depends`; returns `(guard, kernel)`
    pub fn execute(
        &self,
        queue: &Queue,
        src: &ArrayView,
        dst: &ArrayView,
        depends: &[Event],
    ) -> Result<(Event, Event)> {
        ensure_writable(dst)?;
        ensure_same_shape(src, dst)?;
        ensure_queue_compatible(queue, &[src, dst])?;

        let nelems = src.size();
        if nelems == 0 {
            log::trace!("{}: zero-size input, nothing scheduled", self.name);
            return Ok(completed_pair());
        }

        let tables = self.tables();
        let src_index = src.type_index();
        let out_dtype = tables
            .output
            .get(src_index)
            .ok_or_else(|| Error::unsupported_type(src.typenum(), self.name))?;
        ensure_output_dtype(dst, out_dtype, self.name)?;
        ensure_no_partial_overlap(src, dst)?;

        let both_c = src.is_c_contiguous() && dst.is_c_contiguous();
        let both_f = src.is_f_contiguous() && dst.is_f_contiguous();
        let kernel = if both_c || both_f {
            let f = lookup(&tables.contig, src_index, src, self.name)?;
            f(queue, nelems, src.data_ptr(), dst.data_ptr(), depends)
        } else {
            let f = lookup(&tables.strided, src_index, src, self.name)?;
            let indexer = TwoOffsetsIndexer::new(src.shape(), [src.strides(), dst.strides()]);
            f(queue, nelems, &indexer, src.data_ptr(), dst.data_ptr(), depends)
        };

        let guard = keep_args_alive(queue, &[src, dst], std::slice::from_ref(&kernel));
        Ok((guard, kernel))
    }
}

// ============================================================================
// Binary
// ============================================================================

/// Dispatch tables of one binary operation
#[derive(Debug)]
pub struct BinaryTables {
    /// Contiguous kernels
    pub contig: DispatchTable2D<BinaryContigFn>,
    /// Strided kernels
    pub strided: DispatchTable2D<BinaryStridedFn>,
    /// Output type per input type pair
    pub output: DispatchTable2D<DType>,
}

/// A binary elementwise operation
pub struct BinaryUfunc {
    name: &'static str,
    tables: &'static OnceLock<BinaryTables>,
    build: fn() -> BinaryTables,
}

impl BinaryUfunc {
    /// Describe an operation whose tables are built by `build` on first use
    pub const fn new(
        name: &'static str,
        tables: &'static OnceLock<BinaryTables>,
        build: fn() -> BinaryTables,
    ) -> Self {
        Self {
            name,
            tables,
            build,
        }
    }

    /// Operation name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The operation's tables, built on first call
    pub fn tables(&self) -> &'static BinaryTables {
        self.tables.get_or_init(self.build)
    }

    /// Output dtype for a pair of input dtypes, or `None` if unsupported
    pub fn result_type(&self, lhs: DType, rhs: DType) -> Option<DType> {
        self.tables().output.get(lhs.index(), rhs.index())
    }

    /// Schedule `dst = op(src1, src2)` after `depends`; returns `(guard, kernel)`
    pub fn execute(
        &self,
        queue: &Queue,
        src1: &ArrayView,
        src2: &ArrayView,
        dst: &ArrayView,
        depends: &[Event],
    ) -> Result<(Event, Event)> {
        ensure_writable(dst)?;
        ensure_same_shape(src1, src2)?;
        ensure_same_shape(src1, dst)?;
        ensure_queue_compatible(queue, &[src1, src2, dst])?;

        let nelems = src1.size();
        if nelems == 0 {
            log::trace!("{}: zero-size input, nothing scheduled", self.name);
            return Ok(completed_pair());
        }

        let tables = self.tables();
        let (i1, i2) = (src1.type_index(), src2.type_index());
        let unsupported = || {
            let culprit = if i1.is_unknown() || !i2.is_unknown() { src1 } else { src2 };
            Error::unsupported_type(culprit.typenum(), self.name)
        };
        let out_dtype = tables.output.get(i1, i2).ok_or_else(unsupported)?;
        ensure_output_dtype(dst, out_dtype, self.name)?;
        ensure_no_partial_overlap(src1, dst)?;
        ensure_no_partial_overlap(src2, dst)?;

        let views = [src1, src2, dst];
        let all_c = views.iter().all(|v| v.is_c_contiguous());
        let all_f = views.iter().all(|v| v.is_f_contiguous());
        let kernel = if all_c || all_f {
            let f = tables.contig.get(i1, i2).ok_or_else(unsupported)?;
            f(queue, nelems, src1.data_ptr(), src2.data_ptr(), dst.data_ptr(), depends)
        } else {
            let f = tables.strided.get(i1, i2).ok_or_else(unsupported)?;
            let indexer = ThreeOffsetsIndexer::new(
                src1.shape(),
                [src1.strides(), src2.strides(), dst.strides()],
            );
            f(
                queue,
                nelems,
                &indexer,
                src1.data_ptr(),
                src2.data_ptr(),
                dst.data_ptr(),
                depends,
            )
        };

        let guard = keep_args_alive(queue, &views, std::slice::from_ref(&kernel));
        Ok((guard, kernel))
    }
}

// ============================================================================
// Shared checks
// ============================================================================

fn lookup<K: Copy + Send + Sync + 'static>(
    table: &DispatchTable<K>,
    index: TypeIndex,
    src: &ArrayView,
    op: &'static str,
) -> Result<K> {
    table
        .get(index)
        .ok_or_else(|| Error::unsupported_type(src.typenum(), op))
}

fn ensure_output_dtype(dst: &ArrayView, expected: DType, op: &'static str) -> Result<()> {
    match dst.dtype() {
        Some(got) if got == expected => Ok(()),
        Some(got) => Err(Error::DTypeMismatch { expected, got }),
        None => Err(Error::unsupported_type(dst.typenum(), op)),
    }
}
