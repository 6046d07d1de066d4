//! NaN-ignoring elementwise maximum and minimum (`fmax`, `fmin`)
//!
//! Same-type pairs of every real type are supported: bool, all integers,
//! and half, single and double precision. Complex pairs and mixed types
//! have no kernel.

use crate::dtype::{IntElement, NanMinMax, RealElement};
use crate::error::Result;
use crate::ops::dispatch::{DispatchTable2D, KernelFactory, SameRealType};
use crate::ops::elementwise::{
    BinaryContigFn, BinaryFunctor, BinaryStridedFn, BinaryTables, BinaryUfunc, binary_contig,
    binary_strided,
};
use crate::runtime::{Event, Queue};
use crate::tensor::ArrayView;
use bytemuck::Pod;
use std::sync::OnceLock;

/// Larger operand; NaN only if both are NaN
pub struct Fmax;

impl<T: NanMinMax + Pod + Send + Sync> BinaryFunctor<T> for Fmax {
    type Out = T;

    #[inline]
    fn call(a: T, b: T) -> T {
        a.fmax(b)
    }
}

/// Smaller operand; NaN only if both are NaN
pub struct Fmin;

impl<T: NanMinMax + Pod + Send + Sync> BinaryFunctor<T> for Fmin {
    type Out = T;

    #[inline]
    fn call(a: T, b: T) -> T {
        a.fmin(b)
    }
}

/// Declares the contiguous and strided factories of one functor
///
/// Booleans are stored as bytes holding 0 or 1, so the `u8` kernel serves
/// them unchanged.
macro_rules! minmax_factories {
    ($functor:ty, $contig:ident, $strided:ident, $name:literal) => {
        struct $contig;

        impl KernelFactory for $contig {
            type Kernel = BinaryContigFn;
            const NAME: &'static str = concat!($name, "_contig");

            fn boolean() -> Option<BinaryContigFn> {
                Some(binary_contig::<u8, $functor>)
            }

            fn integer<T: IntElement>() -> Option<BinaryContigFn> {
                Some(binary_contig::<T, $functor>)
            }

            #[cfg(feature = "f16")]
            fn half() -> Option<BinaryContigFn> {
                Some(binary_contig::<half::f16, $functor>)
            }

            fn real<T: RealElement>() -> Option<BinaryContigFn> {
                Some(binary_contig::<T, $functor>)
            }
        }

        struct $strided;

        impl KernelFactory for $strided {
            type Kernel = BinaryStridedFn;
            const NAME: &'static str = concat!($name, "_strided");

            fn boolean() -> Option<BinaryStridedFn> {
                Some(binary_strided::<u8, $functor>)
            }

            fn integer<T: IntElement>() -> Option<BinaryStridedFn> {
                Some(binary_strided::<T, $functor>)
            }

            #[cfg(feature = "f16")]
            fn half() -> Option<BinaryStridedFn> {
                Some(binary_strided::<half::f16, $functor>)
            }

            fn real<T: RealElement>() -> Option<BinaryStridedFn> {
                Some(binary_strided::<T, $functor>)
            }
        }
    };
}

minmax_factories!(Fmax, FmaxContig, FmaxStrided, "fmax");
minmax_factories!(Fmin, FminContig, FminStrided, "fmin");

fn build_fmax_tables() -> BinaryTables {
    BinaryTables {
        contig: DispatchTable2D::build_diagonal::<FmaxContig>(),
        strided: DispatchTable2D::build_diagonal::<FmaxStrided>(),
        output: DispatchTable2D::build_diagonal::<SameRealType>(),
    }
}

fn build_fmin_tables() -> BinaryTables {
    BinaryTables {
        contig: DispatchTable2D::build_diagonal::<FminContig>(),
        strided: DispatchTable2D::build_diagonal::<FminStrided>(),
        output: DispatchTable2D::build_diagonal::<SameRealType>(),
    }
}

static FMAX_TABLES: OnceLock<BinaryTables> = OnceLock::new();
static FMIN_TABLES: OnceLock<BinaryTables> = OnceLock::new();

/// The `fmax` operation
pub static FMAX_UFUNC: BinaryUfunc = BinaryUfunc::new("fmax", &FMAX_TABLES, build_fmax_tables);

/// The `fmin` operation
pub static FMIN_UFUNC: BinaryUfunc = BinaryUfunc::new("fmin", &FMIN_TABLES, build_fmin_tables);

/// Schedule `dst = fmax(src1, src2)`; returns `(guard, kernel)`
pub fn fmax(
    queue: &Queue,
    src1: &ArrayView,
    src2: &ArrayView,
    dst: &ArrayView,
    depends: &[Event],
) -> Result<(Event, Event)> {
    FMAX_UFUNC.execute(queue, src1, src2, dst, depends)
}

/// Schedule `dst = fmin(src1, src2)`; returns `(guard, kernel)`
pub fn fmin(
    queue: &Queue,
    src1: &ArrayView,
    src2: &ArrayView,
    dst: &ArrayView,
    depends: &[Event],
) -> Result<(Event, Event)> {
    FMIN_UFUNC.execute(queue, src1, src2, dst, depends)
}
