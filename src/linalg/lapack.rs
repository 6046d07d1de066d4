//! Native LAPACK-style Cholesky and LU routines
//!
//! These follow LAPACK conventions exactly: matrices are column-major with
//! leading dimension `lda`, `uplo` names the triangle in column-major terms,
//! and the outcome is an `info` status:
//!
//! - `0`: success
//! - `k > 0`: a numerical failure at position `k`. For Cholesky the
//!   leading minor of order `k` is not positive definite; for LU the
//!   pivot `U[k, k]` is exactly zero
//! - `-k < 0`: argument `k` had an illegal value
//!
//! The caller supplies scratch memory sized by the matching
//! `*_scratchpad_size` query.

use super::Uplo;
use crate::dtype::{Element, FieldElement, RealElement};
use rayon::prelude::*;

/// Scratch elements required by [`potrf`]
pub fn potrf_scratchpad_size(n: usize, lda: usize) -> usize {
    if lda < n.max(1) { 0 } else { n.max(1) }
}

/// Scratch elements required by [`potrf_batch`] for the whole batch
///
/// Saturates at `usize::MAX`, which no allocation can satisfy.
pub fn potrf_batch_scratchpad_size(n: usize, lda: usize, batch_size: usize) -> usize {
    potrf_scratchpad_size(n, lda).saturating_mul(batch_size)
}

/// Elements spanned by one column-major matrix of order `n`
fn matrix_span(n: usize, lda: usize) -> Option<usize> {
    lda.checked_mul(n.checked_sub(1)?)?.checked_add(n)
}

/// Cholesky factorization of one Hermitian positive-definite matrix
///
/// On exit the `uplo` triangle of `a` holds the factor: `U` with
/// `A = Uᴴ U` for [`Uplo::Upper`], `L` with `A = L Lᴴ` for [`Uplo::Lower`].
/// The opposite triangle is not referenced.
pub fn potrf<T: FieldElement>(uplo: Uplo, n: usize, a: &mut [T], lda: usize, scratchpad: &mut [T]) -> i64 {
    if lda < n.max(1) {
        return -4;
    }
    if n == 0 {
        return 0;
    }
    match matrix_span(n, lda) {
        Some(span) if a.len() >= span => {}
        _ => return -3,
    }
    if scratchpad.len() < potrf_scratchpad_size(n, lda) {
        return -5;
    }
    match uplo {
        Uplo::Lower => potrf_lower(n, a, lda, scratchpad),
        Uplo::Upper => potrf_upper(n, a, lda, scratchpad),
    }
}

/// Cholesky factorization of `batch_size` matrices spaced `stride_a`
/// elements apart
///
/// Items are factorized concurrently and independently. Returns one
/// `info` per item; a failed item does not affect the others.
pub fn potrf_batch<T: FieldElement>(
    uplo: Uplo,
    n: usize,
    a: &mut [T],
    lda: usize,
    stride_a: usize,
    batch_size: usize,
    scratchpad: &mut [T],
) -> Vec<i64> {
    let bad = |code: i64| vec![code; batch_size];
    if lda < n.max(1) {
        return bad(-4);
    }
    if batch_size > 1 && lda.checked_mul(n).is_none_or(|len| stride_a < len) {
        return bad(-5);
    }
    if n == 0 || batch_size == 0 {
        return vec![0; batch_size];
    }
    let Some(required) = (batch_size - 1)
        .checked_mul(stride_a)
        .zip(matrix_span(n, lda))
        .and_then(|(last_start, span)| last_start.checked_add(span))
    else {
        return bad(-5);
    };
    if a.len() < required {
        return bad(-3);
    }
    let scratch_per = potrf_scratchpad_size(n, lda);
    if scratch_per.checked_mul(batch_size).is_none_or(|len| scratchpad.len() < len) {
        return bad(-7);
    }

    let chunk = if batch_size == 1 { a.len() } else { stride_a };
    a.par_chunks_mut(chunk)
        .zip(scratchpad.par_chunks_mut(scratch_per))
        .take(batch_size)
        .map(|(matrix, scratch)| potrf(uplo, n, matrix, lda, scratch))
        .collect()
}

/// Scratch elements (row pivots) required by [`gesv`]
pub fn gesv_scratchpad_size(n: usize) -> usize {
    n
}

/// Row pivots required by [`gesv_batch`] for the whole batch
pub fn gesv_batch_scratchpad_size(n: usize, batch_size: usize) -> usize {
    n.saturating_mul(batch_size)
}

/// Solve `A X = B` by LU factorization with partial pivoting
///
/// `a` (`n x n`, leading dimension `lda`) is overwritten by the factors
/// `P A = L U` and `b` (`n x nrhs`, leading dimension `ldb`) by the
/// solution. `ipiv[i]` receives the 0-based row swapped with row `i`. When
/// a pivot is exactly zero the factorization still completes, `info` names
/// the first such pivot and `b` is left untouched.
#[allow(clippy::too_many_arguments)]
pub fn gesv<T: FieldElement>(
    n: usize,
    nrhs: usize,
    a: &mut [T],
    lda: usize,
    ipiv: &mut [usize],
    b: &mut [T],
    ldb: usize,
) -> i64 {
    if lda < n.max(1) {
        return -4;
    }
    if ldb < n.max(1) {
        return -7;
    }
    if n == 0 {
        return 0;
    }
    match matrix_span(n, lda) {
        Some(span) if a.len() >= span => {}
        _ => return -3,
    }
    if ipiv.len() < n {
        return -5;
    }
    let b_span = match nrhs {
        0 => Some(0),
        _ => ldb.checked_mul(nrhs - 1).and_then(|x| x.checked_add(n)),
    };
    match b_span {
        Some(span) if b.len() >= span => {}
        _ => return -6,
    }

    let info = getrf(n, a, lda, ipiv);
    if info == 0 {
        getrs(n, nrhs, a, lda, ipiv, b, ldb);
    }
    info
}

/// Solve `batch_size` independent systems
///
/// Coefficient matrices are spaced `stride_a` elements apart and
/// right-hand sides `stride_b` apart; `ipiv` holds `n` pivots per item.
/// Returns one `info` per item; a singular item does not affect the others.
#[allow(clippy::too_many_arguments)]
pub fn gesv_batch<T: FieldElement>(
    n: usize,
    nrhs: usize,
    a: &mut [T],
    lda: usize,
    stride_a: usize,
    b: &mut [T],
    ldb: usize,
    stride_b: usize,
    batch_size: usize,
    ipiv: &mut [usize],
) -> Vec<i64> {
    let bad = |code: i64| vec![code; batch_size];
    if lda < n.max(1) {
        return bad(-4);
    }
    if ldb < n.max(1) {
        return bad(-7);
    }
    if batch_size > 1 && lda.checked_mul(n).is_none_or(|len| stride_a < len) {
        return bad(-5);
    }
    if batch_size > 1 && ldb.checked_mul(nrhs).is_none_or(|len| stride_b < len) {
        return bad(-8);
    }
    if n == 0 || batch_size == 0 {
        return vec![0; batch_size];
    }
    let Some(a_required) = (batch_size - 1)
        .checked_mul(stride_a)
        .zip(matrix_span(n, lda))
        .and_then(|(last_start, span)| last_start.checked_add(span))
    else {
        return bad(-5);
    };
    if a.len() < a_required {
        return bad(-3);
    }
    if ipiv.len() < gesv_batch_scratchpad_size(n, batch_size) {
        return bad(-10);
    }

    let chunk_a = if batch_size == 1 { a.len() } else { stride_a };
    if nrhs == 0 {
        return a
            .par_chunks_mut(chunk_a)
            .zip(ipiv.par_chunks_mut(n))
            .take(batch_size)
            .map(|(matrix, pivots)| gesv(n, 0, matrix, lda, pivots, &mut [], ldb))
            .collect();
    }

    let Some(b_required) = (batch_size - 1)
        .checked_mul(stride_b)
        .zip(ldb.checked_mul(nrhs - 1).and_then(|x| x.checked_add(n)))
        .and_then(|(last_start, span)| last_start.checked_add(span))
    else {
        return bad(-8);
    };
    if b.len() < b_required {
        return bad(-6);
    }

    let chunk_b = if batch_size == 1 { b.len() } else { stride_b };
    a.par_chunks_mut(chunk_a)
        .zip(b.par_chunks_mut(chunk_b))
        .zip(ipiv.par_chunks_mut(n))
        .take(batch_size)
        .map(|((matrix, rhs), pivots)| gesv(n, nrhs, matrix, lda, pivots, rhs, ldb))
        .collect()
}

/// Right-looking LU with partial pivoting on the largest magnitude
fn getrf<T: FieldElement>(n: usize, a: &mut [T], lda: usize, ipiv: &mut [usize]) -> i64 {
    let zero = <T::Real as Element>::zero();
    let mut info = 0;
    for j in 0..n {
        let mut p = j;
        let mut best = a[j + j * lda].abs_sq();
        for i in (j + 1)..n {
            let mag = a[i + j * lda].abs_sq();
            if mag > best {
                best = mag;
                p = i;
            }
        }
        ipiv[j] = p;

        if best == zero {
            // Nothing below the diagonal to eliminate
            if info == 0 {
                info = (j + 1) as i64;
            }
            continue;
        }
        if p != j {
            for k in 0..n {
                a.swap(j + k * lda, p + k * lda);
            }
        }

        let pivot = a[j + j * lda];
        for i in (j + 1)..n {
            a[i + j * lda] = a[i + j * lda] / pivot;
        }
        for k in (j + 1)..n {
            let ujk = a[j + k * lda];
            for i in (j + 1)..n {
                a[i + k * lda] = a[i + k * lda] - a[i + j * lda] * ujk;
            }
        }
    }
    info
}

/// Solve with the factors from [`getrf`]
fn getrs<T: FieldElement>(n: usize, nrhs: usize, lu: &[T], lda: usize, ipiv: &[usize], b: &mut [T], ldb: usize) {
    for c in 0..nrhs {
        let col = &mut b[c * ldb..c * ldb + n];
        for (j, &p) in ipiv.iter().enumerate().take(n) {
            col.swap(j, p);
        }
        // L y = P b, unit diagonal
        for j in 0..n {
            let yj = col[j];
            for i in (j + 1)..n {
                col[i] = col[i] - lu[i + j * lda] * yj;
            }
        }
        // U x = y
        for j in (0..n).rev() {
            col[j] = col[j] / lu[j + j * lda];
            let xj = col[j];
            for i in 0..j {
                col[i] = col[i] - lu[i + j * lda] * xj;
            }
        }
    }
}

/// Left-looking `A = L Lᴴ`, column by column
fn potrf_lower<T: FieldElement>(n: usize, a: &mut [T], lda: usize, row: &mut [T]) -> i64 {
    for j in 0..n {
        // row[k] = conj(L[j, k]) for k < j
        for k in 0..j {
            row[k] = a[j + k * lda].conj();
        }

        let mut d = a[j + j * lda].re();
        for k in 0..j {
            d = d - row[k].abs_sq();
        }
        if d.is_nan() || d <= <T::Real as Element>::zero() {
            a[j + j * lda] = T::from_real(d);
            return (j + 1) as i64;
        }
        let ljj = d.sqrt();
        a[j + j * lda] = T::from_real(ljj);

        let inv = T::from_real(<T::Real as Element>::one() / ljj);
        for i in (j + 1)..n {
            let mut s = a[i + j * lda];
            for k in 0..j {
                s = s - a[i + k * lda] * row[k];
            }
            a[i + j * lda] = s * inv;
        }
    }
    0
}

/// Left-looking `A = Uᴴ U`, column by column
fn potrf_upper<T: FieldElement>(n: usize, a: &mut [T], lda: usize, col: &mut [T]) -> i64 {
    for j in 0..n {
        // col[k] = conj(U[k, j]) for k < j
        for k in 0..j {
            col[k] = a[k + j * lda].conj();
        }

        let mut d = a[j + j * lda].re();
        for k in 0..j {
            d = d - col[k].abs_sq();
        }
        if d.is_nan() || d <= <T::Real as Element>::zero() {
            a[j + j * lda] = T::from_real(d);
            return (j + 1) as i64;
        }
        let ujj = d.sqrt();
        a[j + j * lda] = T::from_real(ujj);

        let inv = T::from_real(<T::Real as Element>::one() / ujj);
        for i in (j + 1)..n {
            let mut s = a[j + i * lda];
            for k in 0..j {
                s = s - col[k] * a[k + i * lda];
            }
            a[j + i * lda] = s * inv;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Complex128;

    // Column-major SPD matrix [[4, 2], [2, 3]]
    fn spd2() -> Vec<f64> {
        vec![4.0, 2.0, 2.0, 3.0]
    }

    #[test]
    fn test_potrf_lower() {
        let mut a = spd2();
        let mut ws = vec![0.0; potrf_scratchpad_size(2, 2)];
        assert_eq!(potrf(Uplo::Lower, 2, &mut a, 2, &mut ws), 0);
        assert_eq!(a[0], 2.0);
        assert_eq!(a[1], 1.0);
        assert!((a[3] - 2f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    fn test_potrf_upper() {
        let mut a = spd2();
        let mut ws = vec![0.0; 2];
        assert_eq!(potrf(Uplo::Upper, 2, &mut a, 2, &mut ws), 0);
        assert_eq!(a[0], 2.0);
        assert_eq!(a[2], 1.0);
        assert!((a[3] - 2f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    fn test_potrf_reports_failing_minor() {
        // Leading 2x2 minor [[1, 2], [2, 1]] is indefinite
        let mut a = vec![1.0, 2.0, 0.0, 2.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let mut ws = vec![0.0; 3];
        assert_eq!(potrf(Uplo::Lower, 3, &mut a, 3, &mut ws), 2);
    }

    #[test]
    fn test_potrf_nan_fails() {
        let mut a = vec![f64::NAN];
        let mut ws = vec![0.0; 1];
        assert_eq!(potrf(Uplo::Upper, 1, &mut a, 1, &mut ws), 1);
    }

    #[test]
    fn test_potrf_complex_hermitian() {
        // A = [[2, i], [-i, 2]] column-major
        let mut a = vec![
            Complex128::new(2.0, 0.0),
            Complex128::new(0.0, -1.0),
            Complex128::new(0.0, 1.0),
            Complex128::new(2.0, 0.0),
        ];
        let mut ws = vec![Complex128::ZERO; 2];
        assert_eq!(potrf(Uplo::Lower, 2, &mut a, 2, &mut ws), 0);
        let l00 = a[0].re;
        let l10 = a[1];
        let l11 = a[3].re;
        // A[1][1] = |l10|² + l11²
        assert!((l10.norm_sqr() + l11 * l11 - 2.0).abs() < 1e-14);
        // A[1][0] = l10 * l00
        assert!((l10.im * l00 + 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_argument_checks() {
        let mut a = vec![1.0f32; 4];
        let mut ws = vec![0.0f32; 2];
        assert_eq!(potrf(Uplo::Lower, 2, &mut a, 1, &mut ws), -4);
        assert_eq!(potrf(Uplo::Lower, 2, &mut a[..3], 2, &mut ws), -3);
        assert_eq!(potrf(Uplo::Lower, 2, &mut a, 2, &mut ws[..1]), -5);
        assert_eq!(potrf(Uplo::Lower, 0, &mut a, 1, &mut ws), 0);
    }

    #[test]
    fn test_batch_independent_items() {
        // Three 2x2 matrices; the middle one is not positive definite
        let mut a = vec![4.0, 2.0, 2.0, 3.0, 1.0, 3.0, 3.0, 1.0, 9.0, 0.0, 0.0, 16.0];
        let mut ws = vec![0.0; potrf_batch_scratchpad_size(2, 2, 3)];
        let info = potrf_batch(Uplo::Lower, 2, &mut a, 2, 4, 3, &mut ws);
        assert_eq!(info, vec![0, 2, 0]);
        assert_eq!(a[8], 3.0);
        assert_eq!(a[11], 4.0);
        assert_eq!(a[0], 2.0);
    }

    #[test]
    fn test_batch_stride_check() {
        let mut a = vec![1.0; 8];
        let mut ws = vec![0.0; 4];
        assert_eq!(potrf_batch(Uplo::Lower, 2, &mut a, 2, 3, 2, &mut ws), vec![-5, -5]);
        assert_eq!(potrf_batch(Uplo::Lower, 2, &mut a, 2, 4, 0, &mut ws), Vec::<i64>::new());
    }

    #[test]
    fn test_gesv_needs_pivoting() {
        // A = [[0, 1], [2, 3]] column-major, b = A [1, 2]
        let mut a: Vec<f64> = vec![0.0, 2.0, 1.0, 3.0];
        let mut b: Vec<f64> = vec![2.0, 8.0];
        let mut ipiv = vec![0; gesv_scratchpad_size(2)];
        assert_eq!(gesv(2, 1, &mut a, 2, &mut ipiv, &mut b, 2), 0);
        assert_eq!(ipiv, vec![1, 1]);
        assert!((b[0] - 1.0).abs() < 1e-15);
        assert!((b[1] - 2.0).abs() < 1e-15);
    }

    #[test]
    fn test_gesv_multiple_rhs() {
        // A = [[4, 1, 0], [1, 3, 1], [0, 1, 2]], X = [[1, 0], [2, -1], [3, 1]]
        let mut a: Vec<f64> = vec![4.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 2.0];
        let mut b: Vec<f64> = vec![6.0, 10.0, 8.0, -1.0, -2.0, 1.0];
        let mut ipiv = vec![0; 3];
        assert_eq!(gesv(3, 2, &mut a, 3, &mut ipiv, &mut b, 3), 0);
        let expected = [1.0, 2.0, 3.0, 0.0, -1.0, 1.0];
        for (x, e) in b.iter().zip(expected) {
            assert!((x - e).abs() < 1e-12, "{x} vs {e}");
        }
    }

    #[test]
    fn test_gesv_complex() {
        // A = [[1, i], [0, 2]] column-major, x = [1, i]: b = [1 - 1, 2i]
        let mut a = vec![
            Complex128::new(1.0, 0.0),
            Complex128::ZERO,
            Complex128::new(0.0, 1.0),
            Complex128::new(2.0, 0.0),
        ];
        let mut b = vec![Complex128::ZERO, Complex128::new(0.0, 2.0)];
        let mut ipiv = vec![0; 2];
        assert_eq!(gesv(2, 1, &mut a, 2, &mut ipiv, &mut b, 2), 0);
        assert!((b[0] - Complex128::ONE).norm() < 1e-15);
        assert!((b[1] - Complex128::new(0.0, 1.0)).norm() < 1e-15);
    }

    #[test]
    fn test_gesv_singular_leaves_rhs() {
        // Second column is twice the first
        let mut a = vec![1.0, 2.0, 2.0, 4.0];
        let mut b = vec![1.0, 1.0];
        let mut ipiv = vec![0; 2];
        assert_eq!(gesv(2, 1, &mut a, 2, &mut ipiv, &mut b, 2), 2);
        assert_eq!(b, vec![1.0, 1.0]);

        let mut zero = vec![0.0; 4];
        assert_eq!(gesv(2, 1, &mut zero, 2, &mut ipiv, &mut b, 2), 1);
    }

    #[test]
    fn test_gesv_argument_checks() {
        let mut a = vec![1.0f32; 4];
        let mut b = vec![1.0f32; 2];
        let mut ipiv = vec![0; 2];
        assert_eq!(gesv(2, 1, &mut a, 1, &mut ipiv, &mut b, 2), -4);
        assert_eq!(gesv(2, 1, &mut a, 2, &mut ipiv, &mut b, 1), -7);
        assert_eq!(gesv(2, 1, &mut a[..3], 2, &mut ipiv, &mut b, 2), -3);
        assert_eq!(gesv(2, 1, &mut a, 2, &mut ipiv[..1], &mut b, 2), -5);
        assert_eq!(gesv(2, 2, &mut a, 2, &mut ipiv, &mut b, 2), -6);
    }

    #[test]
    fn test_gesv_batch_independent_items() {
        // Three 2x2 systems; the middle matrix is singular
        let mut a = vec![2.0, 0.0, 0.0, 4.0, 1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0];
        let mut b = vec![2.0, 8.0, 5.0, 5.0, 3.0, 7.0];
        let mut ipiv = vec![0; gesv_batch_scratchpad_size(2, 3)];
        let info = gesv_batch(2, 1, &mut a, 2, 4, &mut b, 2, 2, 3, &mut ipiv);
        assert_eq!(info, vec![0, 2, 0]);
        assert_eq!(&b[0..2], &[1.0, 2.0]);
        assert_eq!(&b[2..4], &[5.0, 5.0]);
        assert_eq!(&b[4..6], &[7.0, 3.0]);
    }

    #[test]
    fn test_gesv_batch_stride_checks() {
        let mut a = vec![1.0; 8];
        let mut b = vec![1.0; 4];
        let mut ipiv = vec![0; 4];
        assert_eq!(gesv_batch(2, 1, &mut a, 2, 3, &mut b, 2, 2, 2, &mut ipiv), vec![-5, -5]);
        assert_eq!(gesv_batch(2, 1, &mut a, 2, 4, &mut b, 2, 1, 2, &mut ipiv), vec![-8, -8]);
        assert_eq!(gesv_batch(2, 1, &mut a, 2, 1 << 63, &mut b, 2, 2, 3, &mut ipiv), vec![-5; 3]);
        assert_eq!(gesv_batch(2, 1, &mut a, 2, 4, &mut b, 2, usize::MAX, 2, &mut ipiv), vec![-8; 2]);
    }

    #[test]
    fn test_batch_stride_overflow() {
        let mut a = vec![1.0; 8];
        let mut ws = vec![0.0; 6];
        assert_eq!(potrf_batch(Uplo::Lower, 2, &mut a, 2, 1 << 63, 3, &mut ws), vec![-5; 3]);
        assert_eq!(potrf_batch(Uplo::Lower, 2, &mut a, usize::MAX, usize::MAX, 2, &mut ws), vec![-5; 2]);
        assert_eq!(potrf(Uplo::Lower, 2, &mut a, usize::MAX, &mut ws), -3);
    }
}
