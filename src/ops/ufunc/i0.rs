//! Modified Bessel function of the first kind, order 0

use crate::dtype::{DType, Element, RealElement};
use crate::error::Result;
use crate::ops::dispatch::{DispatchTable, KernelFactory, SameFloatType};
use crate::ops::elementwise::{
    UnaryContigFn, UnaryFunctor, UnaryStridedFn, UnaryTables, UnaryUfunc, unary_contig,
    unary_strided,
};
use crate::runtime::{Event, Queue};
use crate::tensor::ArrayView;
use std::sync::OnceLock;

/// Asymptotic expansion coefficients for I₀(x) at large |x|
const I0_ASYMP: [f64; 7] = [
    1.0,
    1.25e-01,
    7.03125e-02,
    7.324_218_75e-2,
    1.121_520_996_093_75e-1,
    2.271_080_017_089_844e-1,
    5.725_014_209_747_314e-1,
];

/// Compute I₀(x)
///
/// Power series for |x| <= 15, asymptotic expansion above.
/// I₀ is even and always positive.
pub fn bessel_i0(x: f64) -> f64 {
    let ax = x.abs();
    if ax.is_infinite() {
        return f64::INFINITY;
    }

    if ax <= 15.0 {
        // I0(x) = sum_{k=0}^∞ (x/2)^{2k} / (k!)^2
        let z = ax * ax / 4.0;
        let mut sum = 1.0;
        let mut term = 1.0;
        for k in 1..60 {
            let k = k as f64;
            term *= z / (k * k);
            sum += term;
            if term < sum * 1e-17 {
                break;
            }
        }
        sum
    } else {
        let z = 1.0 / ax;
        let poly = I0_ASYMP.iter().rev().fold(0.0, |acc, &c| acc * z + c);
        ax.exp() / (2.0 * std::f64::consts::PI * ax).sqrt() * poly
    }
}

/// `i0` as an elementwise functor; computes in f64 and rounds back
pub struct I0;

impl<T: Element> UnaryFunctor<T> for I0 {
    type Out = T;

    #[inline]
    fn call(x: T) -> T {
        T::from_f64(bessel_i0(x.to_f64()))
    }
}

struct I0Contig;

impl KernelFactory for I0Contig {
    type Kernel = UnaryContigFn;
    const NAME: &'static str = "i0_contig";

    #[cfg(feature = "f16")]
    fn half() -> Option<UnaryContigFn> {
        Some(unary_contig::<half::f16, I0>)
    }

    fn real<T: RealElement>() -> Option<UnaryContigFn> {
        Some(unary_contig::<T, I0>)
    }
}

struct I0Strided;

impl KernelFactory for I0Strided {
    type Kernel = UnaryStridedFn;
    const NAME: &'static str = "i0_strided";

    #[cfg(feature = "f16")]
    fn half() -> Option<UnaryStridedFn> {
        Some(unary_strided::<half::f16, I0>)
    }

    fn real<T: RealElement>() -> Option<UnaryStridedFn> {
        Some(unary_strided::<T, I0>)
    }
}

fn build_tables() -> UnaryTables {
    UnaryTables {
        contig: DispatchTable::build::<I0Contig>(),
        strided: DispatchTable::build::<I0Strided>(),
        output: DispatchTable::build::<SameFloatType>(),
    }
}

static TABLES: OnceLock<UnaryTables> = OnceLock::new();

/// The `i0` operation
pub static I0_UFUNC: UnaryUfunc = UnaryUfunc::new("i0", &TABLES, build_tables);

/// Schedule `dst = i0(src)`; returns `(guard, kernel)`
pub fn i0(queue: &Queue, src: &ArrayView, dst: &ArrayView, depends: &[Event]) -> Result<(Event, Event)> {
    I0_UFUNC.execute(queue, src, dst, depends)
}

/// Output dtype of `i0` for an input dtype
///
/// Half, single and double precision map to themselves. Every other type
/// has no kernel; callers promote integer input to a floating type first.
pub fn i0_result_type(input: DType) -> Option<DType> {
    I0_UFUNC.result_type(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bessel_i0_values() {
        assert_eq!(bessel_i0(0.0), 1.0);
        assert!((bessel_i0(1.0) - 1.266_065_877_752_008_4).abs() < 1e-14);
        assert!((bessel_i0(-2.5) - 3.289_839_144_050_123).abs() < 1e-13);
        let rel = (bessel_i0(20.0) - 4.355_828_255_955_353e7).abs() / 4.355_828_255_955_353e7;
        assert!(rel < 1e-8, "rel={rel}");
        assert_eq!(bessel_i0(f64::NEG_INFINITY), f64::INFINITY);
        assert!(bessel_i0(f64::NAN).is_nan());
    }

    #[test]
    fn test_result_type() {
        assert_eq!(i0_result_type(DType::F32), Some(DType::F32));
        assert_eq!(i0_result_type(DType::F64), Some(DType::F64));
        assert_eq!(i0_result_type(DType::I64), None);
        assert_eq!(i0_result_type(DType::Complex64), None);
        #[cfg(feature = "f16")]
        assert_eq!(i0_result_type(DType::F16), Some(DType::F16));
    }

    #[test]
    fn test_tables_cover_floats_only() {
        let tables = I0_UFUNC.tables();
        assert_eq!(tables.contig.supported(), tables.output.supported());
        assert_eq!(tables.strided.supported(), tables.output.supported());
        assert!(tables.contig.get_dtype(DType::Bool).is_none());
    }
}
