//! Common test utilities
#![allow(dead_code)]

use kdispatch::runtime::{Queue, QueueOptions};

/// Install a test logger once; output shows with `RUST_LOG=debug`
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Create a host queue with a small worker pool for testing
pub fn create_queue() -> Queue {
    init_logging();
    kdispatch::init();
    Queue::host(QueueOptions::new().num_threads(4).thread_name_prefix("kdispatch-test"))
        .expect("host queue")
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert two f32 slices are close within tolerance
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Row-major `A = Bᵀ B + n I` for a random `B`, symmetric positive definite
pub fn random_spd(n: usize, seed: u64) -> Vec<f64> {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let b: Vec<f64> = (0..n * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let mut a = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            let mut s = 0.0;
            for k in 0..n {
                s += b[k * n + i] * b[k * n + j];
            }
            a[i * n + j] = s + if i == j { n as f64 } else { 0.0 };
        }
    }
    a
}

/// Row-major `L Lᵀ` from the lower triangle of `l`, ignoring the upper one
pub fn lower_times_transpose(l: &[f64], n: usize) -> Vec<f64> {
    let mut a = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            let mut s = 0.0;
            for k in 0..=i.min(j) {
                s += l[i * n + k] * l[j * n + k];
            }
            a[i * n + j] = s;
        }
    }
    a
}

/// Row-major `Uᵀ U` from the upper triangle of `u`, ignoring the lower one
pub fn transpose_times_upper(u: &[f64], n: usize) -> Vec<f64> {
    let mut a = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            let mut s = 0.0;
            for k in 0..=i.min(j) {
                s += u[k * n + i] * u[k * n + j];
            }
            a[i * n + j] = s;
        }
    }
    a
}

/// Column-major `n x n` matrix with entries in `[-1, 1)` plus `n` on the
/// diagonal, so it is well conditioned and nonsingular
pub fn random_nonsingular(n: usize, seed: u64) -> Vec<f64> {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut a: Vec<f64> = (0..n * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    for i in 0..n {
        a[i + i * n] += n as f64;
    }
    a
}

/// Column-major product of an `n x n` matrix and an `n x k` matrix
pub fn col_major_matmul(a: &[f64], x: &[f64], n: usize, k: usize) -> Vec<f64> {
    let mut out = vec![0.0; n * k];
    for c in 0..k {
        for j in 0..n {
            for i in 0..n {
                out[i + c * n] += a[i + j * n] * x[j + c * n];
            }
        }
    }
    out
}
