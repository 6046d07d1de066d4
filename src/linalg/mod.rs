//! Dense linear algebra: Cholesky factorization and LU solves
//!
//! [`factorize_one`], [`factorize_batch`], [`solve_one`] and [`solve_batch`]
//! validate their arrays, dispatch on the element type and schedule the
//! native routine from [`lapack`] on the queue. Single, double, complex64
//! and complex128 matrices are supported.

mod gesv;
pub mod lapack;
mod potrf;
mod workspace;

pub use gesv::{GesvBatchFn, GesvFn, gesv_batch_table, gesv_table, solve_batch, solve_one};
pub use potrf::{
    BatchDescriptor, PotrfBatchFn, PotrfFn, Uplo, factorize_batch, factorize_one, potrf_batch_table,
    potrf_table,
};
pub use workspace::Workspace;

/// Build the factorization tables
pub(crate) fn init_tables() {
    potrf_table();
    potrf_batch_table();
    gesv_table();
    gesv_batch_table();
}
