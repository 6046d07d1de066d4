//! Elementwise mathematical functions
//!
//! Each operation owns its dispatch tables and exposes a scheduling
//! function returning `(guard, kernel)`.

mod i0;
mod minmax;

pub use i0::{I0, I0_UFUNC, bessel_i0, i0, i0_result_type};
pub use minmax::{FMAX_UFUNC, FMIN_UFUNC, Fmax, Fmin, fmax, fmin};
