//! Element traits for mapping Rust types to DType
//!
//! Kernel factories are generic over these traits, one per type category,
//! so that a single generic kernel body is instantiated for every dtype of
//! the category and the compiler rejects categories the kernel cannot serve.

use super::{Complex64, Complex128, DType};
use bytemuck::Pod;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Trait for types that can be elements of an array
///
/// # Bounds
/// - `Copy + Send + Sync + 'static` - kernels move values across worker threads
/// - `Pod` - raw device pointers are reinterpreted as element pointers
/// - `Add + Sub + Mul + Div` - arithmetic operations (Output = Self)
///
/// `bool` is not an `Element`; boolean kernels operate on its byte
/// representation directly.
pub trait Element:
    Copy
    + Send
    + Sync
    + Pod
    + PartialEq
    + std::fmt::Debug
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert to f64
    ///
    /// For complex types this returns the real part.
    fn to_f64(self) -> f64;

    /// Convert from f64; complex types get a zero imaginary part
    fn from_f64(v: f64) -> Self;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;
}

/// Integer elements
pub trait IntElement: Element + Ord + NanMinMax {}

/// Maximum and minimum that propagate the non-NaN operand
///
/// Integer types have no NaN and use plain `Ord` semantics.
pub trait NanMinMax: Copy {
    /// Larger operand; if exactly one is NaN the other is returned
    fn fmax(self, other: Self) -> Self;
    /// Smaller operand; if exactly one is NaN the other is returned
    fn fmin(self, other: Self) -> Self;
}

/// Element types with a field structure usable by factorization routines
pub trait FieldElement: Element + Neg<Output = Self> {
    /// Underlying real type (Self for real types)
    type Real: RealElement;

    /// Complex conjugate (identity for real types)
    fn conj(self) -> Self;

    /// Real part
    fn re(self) -> Self::Real;

    /// Embed a real value
    fn from_real(r: Self::Real) -> Self;

    /// Squared magnitude as a real value
    fn abs_sq(self) -> Self::Real;
}

/// Real floating point types with full arithmetic (f32, f64)
pub trait RealElement: FieldElement<Real = Self> + PartialOrd + NanMinMax {
    /// Square root
    fn sqrt(self) -> Self;

    /// Returns true for NaN
    fn is_nan(self) -> bool;

    /// Machine epsilon
    fn epsilon() -> Self;
}

/// Complex types built on a real component type
pub trait ComplexElement: FieldElement {
    /// Construct from real and imaginary parts
    fn from_parts(re: Self::Real, im: Self::Real) -> Self;

    /// Imaginary part
    fn im(self) -> Self::Real;
}

// ============================================================================
// Integer types
// ============================================================================

macro_rules! impl_int_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(v: f64) -> Self {
                    v as $ty
                }

                #[inline]
                fn zero() -> Self {
                    0
                }

                #[inline]
                fn one() -> Self {
                    1
                }
            }

            impl NanMinMax for $ty {
                #[inline]
                fn fmax(self, other: Self) -> Self {
                    Ord::max(self, other)
                }

                #[inline]
                fn fmin(self, other: Self) -> Self {
                    Ord::min(self, other)
                }
            }

            impl IntElement for $ty {}
        )*
    };
}

impl_int_element!(
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
);

// ============================================================================
// Real floating point types
// ============================================================================

macro_rules! impl_real_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn from_f64(v: f64) -> Self {
                    v as $ty
                }

                #[inline]
                fn zero() -> Self {
                    0.0
                }

                #[inline]
                fn one() -> Self {
                    1.0
                }
            }

            impl NanMinMax for $ty {
                // std's max/min already return the non-NaN operand
                #[inline]
                fn fmax(self, other: Self) -> Self {
                    <$ty>::max(self, other)
                }

                #[inline]
                fn fmin(self, other: Self) -> Self {
                    <$ty>::min(self, other)
                }
            }

            impl FieldElement for $ty {
                type Real = $ty;

                #[inline]
                fn conj(self) -> Self {
                    self
                }

                #[inline]
                fn re(self) -> Self {
                    self
                }

                #[inline]
                fn from_real(r: Self) -> Self {
                    r
                }

                #[inline]
                fn abs_sq(self) -> Self {
                    self * self
                }
            }

            impl RealElement for $ty {
                #[inline]
                fn sqrt(self) -> Self {
                    <$ty>::sqrt(self)
                }

                #[inline]
                fn is_nan(self) -> bool {
                    <$ty>::is_nan(self)
                }

                #[inline]
                fn epsilon() -> Self {
                    <$ty>::EPSILON
                }
            }
        )*
    };
}

impl_real_element!(f32 => F32, f64 => F64);

// ============================================================================
// Half-precision floating point (requires "f16" feature)
// ============================================================================

#[cfg(feature = "f16")]
impl Element for half::f16 {
    const DTYPE: DType = DType::F16;

    #[inline]
    fn to_f64(self) -> f64 {
        half::f16::to_f64(self)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        half::f16::from_f64(v)
    }

    #[inline]
    fn zero() -> Self {
        half::f16::ZERO
    }

    #[inline]
    fn one() -> Self {
        half::f16::ONE
    }
}

#[cfg(feature = "f16")]
impl NanMinMax for half::f16 {
    // Widening to f32 is exact, and narrowing back returns one of the operands.
    #[inline]
    fn fmax(self, other: Self) -> Self {
        half::f16::from_f32(self.to_f32().max(other.to_f32()))
    }

    #[inline]
    fn fmin(self, other: Self) -> Self {
        half::f16::from_f32(self.to_f32().min(other.to_f32()))
    }
}

// ============================================================================
// Complex types
// ============================================================================

macro_rules! impl_complex_element {
    ($($ty:ident: $real:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;

                #[inline]
                fn to_f64(self) -> f64 {
                    self.re as f64
                }

                #[inline]
                fn from_f64(v: f64) -> Self {
                    $ty::new(v as $real, 0.0)
                }

                #[inline]
                fn zero() -> Self {
                    $ty::ZERO
                }

                #[inline]
                fn one() -> Self {
                    $ty::ONE
                }
            }

            impl FieldElement for $ty {
                type Real = $real;

                #[inline]
                fn conj(self) -> Self {
                    $ty::conj(self)
                }

                #[inline]
                fn re(self) -> $real {
                    self.re
                }

                #[inline]
                fn from_real(r: $real) -> Self {
                    $ty::new(r, 0.0)
                }

                #[inline]
                fn abs_sq(self) -> $real {
                    self.norm_sqr()
                }
            }

            impl ComplexElement for $ty {
                #[inline]
                fn from_parts(re: $real, im: $real) -> Self {
                    $ty::new(re, im)
                }

                #[inline]
                fn im(self) -> $real {
                    self.im
                }
            }
        )*
    };
}

impl_complex_element!(Complex64: f32 => Complex64, Complex128: f64 => Complex128);
