//! Symmetric eigenvalue computations.
//!
//! Two primitives back the solver's step-length rule: a full symmetric
//! eigenvalue solve (Householder tridiagonalization followed by
//! implicit-QL iteration, ascending eigenvalues) used for small blocks,
//! and a Lanczos probe that returns a certified lower bound on the
//! minimum eigenvalue of L·X·Lᵀ for large blocks.

use rug::ops::NegAssign;
use rug::Assign;

use super::{
    dot_product, fill_vector, lower_triangular_times_vector,
    lower_triangular_transpose_times_vector, vector_scale_matrix_multiply_add,
    vector_scale_multiply_add, zero_vector, Matrix, Vector,
};
use crate::real::{self, epsilon, one, real, zero, Real};

/// Scratch vectors for the dense symmetric eigenvalue solve, sized to
/// the largest dimension they will see.
#[derive(Debug)]
pub struct EigenScratch {
    off_diag: Vector,
    householder_v: Vector,
    householder_u: Vector,
}

impl EigenScratch {
    pub fn new(max_dim: usize) -> Self {
        EigenScratch {
            off_diag: zero_vector(max_dim),
            householder_v: zero_vector(max_dim),
            householder_u: zero_vector(max_dim),
        }
    }
}

/// Reduce symmetric `a` to tridiagonal form by Householder similarity
/// transformations, overwriting `a`. On return `d` holds the diagonal
/// and `e[i]` the coupling between rows i and i+1 (`e[dim-1]` is zero).
fn householder_tridiagonalize(a: &mut Matrix, d: &mut [Real], e: &mut [Real], v: &mut [Real], u: &mut [Real]) {
    let n = a.rows;
    assert_eq!(a.cols, n);
    assert!(d.len() >= n && e.len() >= n && v.len() >= n && u.len() >= n);

    for k in 0..n.saturating_sub(2) {
        let mut norm2 = zero();
        for i in k + 1..n {
            norm2 += &a[(i, k)] * &a[(i, k)];
        }
        if norm2.is_zero() {
            e[k].assign(0);
            continue;
        }

        // alpha = -sign(a[k+1,k])·‖a[k+1.., k]‖ avoids cancellation in v.
        let mut alpha = norm2.sqrt();
        if a[(k + 1, k)] >= 0 {
            alpha.neg_assign();
        }

        for i in k + 1..n {
            v[i].assign(&a[(i, k)]);
        }
        v[k + 1] -= &alpha;

        let mut vnorm2 = zero();
        for i in k + 1..n {
            vnorm2 += &v[i] * &v[i];
        }
        let mut beta = real(2);
        beta /= &vnorm2;

        // u = beta·A₂₂·v, gamma = vᵀ·A₂₂·v·beta²/2; then the similarity
        // update is A₂₂ ← A₂₂ − v·wᵀ − w·vᵀ with w = u − gamma·v.
        for i in k + 1..n {
            let mut s = zero();
            for j in k + 1..n {
                s += &a[(i, j)] * &v[j];
            }
            s *= &beta;
            u[i] = s;
        }
        let mut gamma = zero();
        for i in k + 1..n {
            gamma += &v[i] * &u[i];
        }
        gamma *= &beta;
        gamma /= 2;
        for i in k + 1..n {
            u[i] -= &gamma * &v[i];
        }

        let mut t = zero();
        for i in k + 1..n {
            for j in k + 1..=i {
                t.assign(&v[i] * &u[j]);
                t += &u[i] * &v[j];
                a[(i, j)] -= &t;
                if i != j {
                    a[(j, i)] -= &t;
                }
            }
        }

        e[k].assign(&alpha);
        a[(k + 1, k)].assign(&alpha);
        a[(k, k + 1)].assign(&alpha);
        for i in k + 2..n {
            a[(i, k)].assign(0);
            a[(k, i)].assign(0);
        }
    }

    if n >= 2 {
        e[n - 2].assign(&a[(n - 1, n - 2)]);
    }
    for i in 0..n {
        d[i].assign(&a[(i, i)]);
    }
    if n >= 1 {
        e[n - 1].assign(0);
    }
}

/// Implicit-QL iteration with Wilkinson shifts on a symmetric
/// tridiagonal matrix (diagonal `d`, subdiagonal `e`). Eigenvalues land
/// in `d` in ascending order; `e` is destroyed. When `q` is supplied
/// (identity on entry, dimension `d.len()`), its columns accumulate the
/// corresponding eigenvectors.
pub fn tridiagonal_ql(d: &mut [Real], e: &mut [Real], mut q: Option<&mut Matrix>) {
    let n = d.len();
    if n == 0 {
        return;
    }
    assert!(e.len() >= n);
    if let Some(qm) = q.as_deref() {
        assert_eq!(qm.rows, n);
        assert_eq!(qm.cols, n);
    }

    let prec = real::precision();
    let eps = epsilon();
    let mut dd = zero();
    let mut abs_e = zero();

    for l in 0..n {
        let mut iter = 0;
        loop {
            // Locate the first negligible subdiagonal at or beyond l.
            let mut m = l;
            while m + 1 < n {
                dd.assign(d[m].abs_ref());
                abs_e.assign(d[m + 1].abs_ref());
                dd += &abs_e;
                dd *= &eps;
                abs_e.assign(e[m].abs_ref());
                if abs_e <= dd {
                    break;
                }
                m += 1;
            }
            if m == l {
                break;
            }
            iter += 1;
            assert!(iter <= 200, "tridiagonal QL iteration failed to converge");

            // Wilkinson shift.
            let mut g = Real::with_val(prec, &d[l + 1] - &d[l]);
            g /= &e[l];
            g /= 2;
            let r = g.clone().hypot(&one());
            let mut denom = g;
            if denom >= 0 {
                denom += &r;
            } else {
                denom -= &r;
            }
            let mut g = Real::with_val(prec, &d[m] - &d[l]);
            let mut t = e[l].clone();
            t /= &denom;
            g += &t;

            let mut s = one();
            let mut c = one();
            let mut p = zero();
            let mut underflow = false;
            let mut i = m;
            while i > l {
                let ii = i - 1;
                let f = Real::with_val(prec, &s * &e[ii]);
                let b = Real::with_val(prec, &c * &e[ii]);
                let r = f.clone().hypot(&g);
                e[ii + 1].assign(&r);
                if r.is_zero() {
                    d[ii + 1] -= &p;
                    e[m].assign(0);
                    underflow = true;
                    break;
                }
                s = f / &r;
                c = g.clone() / &r;
                g = d[ii + 1].clone();
                g -= &p;
                let mut r2 = Real::with_val(prec, &d[ii] - &g);
                r2 *= &s;
                let mut cb = Real::with_val(prec, &c * &b);
                cb *= 2;
                r2 += &cb;
                p.assign(&s * &r2);
                d[ii + 1].assign(&g + &p);
                g = c.clone() * &r2;
                g -= &b;

                if let Some(qm) = q.as_deref_mut() {
                    for k in 0..n {
                        let f2 = qm[(k, ii + 1)].clone();
                        let mut t1 = Real::with_val(prec, &s * &qm[(k, ii)]);
                        t1 += &c * &f2;
                        let mut t2 = Real::with_val(prec, &c * &qm[(k, ii)]);
                        t2 -= &s * &f2;
                        qm[(k, ii + 1)] = t1;
                        qm[(k, ii)] = t2;
                    }
                }
                i = ii;
            }
            if underflow {
                continue;
            }
            d[l] -= &p;
            e[l].assign(&g);
            e[m].assign(0);
        }
    }

    // Ascending order, carrying eigenvector columns along.
    for i in 0..n {
        let mut min_idx = i;
        for j in i + 1..n {
            if d[j] < d[min_idx] {
                min_idx = j;
            }
        }
        if min_idx != i {
            d.swap(i, min_idx);
            if let Some(qm) = q.as_deref_mut() {
                qm.swap_columns(i, min_idx);
            }
        }
    }
}

/// Eigenvalues of symmetric `a` in ascending order into
/// `eigenvalues[..a.rows]`; `a` is overwritten.
pub fn symmetric_eigenvalues(a: &mut Matrix, eigenvalues: &mut [Real], scratch: &mut EigenScratch) {
    let n = a.rows;
    householder_tridiagonalize(
        a,
        &mut eigenvalues[..n],
        &mut scratch.off_diag[..n],
        &mut scratch.householder_v[..n],
        &mut scratch.householder_u[..n],
    );
    tridiagonal_ql(&mut eigenvalues[..n], &mut scratch.off_diag[..n], None);
}

/// Minimum eigenvalue of symmetric `a` (overwritten).
pub fn min_eigenvalue_via_qr(a: &mut Matrix, eigenvalues: &mut [Real], scratch: &mut EigenScratch) -> Real {
    assert!(eigenvalues.len() >= a.rows);
    symmetric_eigenvalues(a, eigenvalues, scratch);
    eigenvalues[0].clone()
}

/// out := L·A·Lᵀ with L lower triangular.
pub fn lower_triangular_congruence(l: &Matrix, a: &Matrix, work: &mut Matrix, out: &mut Matrix) {
    let n = l.rows;
    assert_eq!(l.cols, n);
    assert_eq!(a.rows, n);
    assert_eq!(a.cols, n);
    assert_eq!(work.rows, n);
    assert_eq!(work.cols, n);
    assert_eq!(out.rows, n);
    assert_eq!(out.cols, n);

    // work = L·A
    for c in 0..n {
        for r in 0..n {
            let mut acc = zero();
            for k in 0..=r {
                acc += &l[(r, k)] * &a[(k, c)];
            }
            work[(r, c)] = acc;
        }
    }
    // out = work·Lᵀ
    for c in 0..n {
        for r in 0..n {
            let mut acc = zero();
            for k in 0..=c {
                acc += &work[(r, k)] * &l[(c, k)];
            }
            out[(r, c)] = acc;
        }
    }
}

/// Scratch vectors for the Lanczos probe, sized to the largest block
/// dimension.
#[derive(Debug)]
pub struct LanczosWorkspace {
    out: Vector,
    out_off: Vector,
    r: Vector,
    q: Vector,
    q_old: Vector,
    w: Vector,
    tmp: Vector,
    diag: Vector,
    off_diag: Vector,
}

impl LanczosWorkspace {
    pub fn new(max_dim: usize) -> Self {
        LanczosWorkspace {
            out: zero_vector(max_dim),
            out_off: zero_vector(max_dim),
            r: zero_vector(max_dim),
            q: zero_vector(max_dim),
            q_old: zero_vector(max_dim),
            w: zero_vector(max_dim),
            tmp: zero_vector(max_dim),
            diag: zero_vector(max_dim),
            off_diag: zero_vector(max_dim),
        }
    }
}

/// Lower bound on the minimum eigenvalue of L·X·Lᵀ via the Lanczos
/// method with restarted tridiagonal eigen-solves. The returned value
/// underestimates the true minimum by at most
/// max(10⁻²·|λ_min|, 10⁻⁴).
pub fn min_eigenvalue_via_lanczos(l: &Matrix, x: &Matrix, ws: &mut LanczosWorkspace) -> Real {
    let dim = x.rows;
    assert_eq!(x.cols, dim);
    assert_eq!(l.rows, dim);
    assert_eq!(l.cols, dim);
    assert!(ws.diag.len() >= dim);

    let prec = real::precision();
    let mut min = real(1e51);
    let mut min_old = real(1e52);
    let min_min = real(1e50);
    let mut error = real(1e10);

    let mut k = 0usize;
    let mut kk = 0usize;
    let max_k = (dim as f64).sqrt() as usize + 10;

    fill_vector(&mut ws.diag[..dim], &min_min);
    fill_vector(&mut ws.off_diag[..dim], &zero());
    fill_vector(&mut ws.q[..dim], &zero());
    fill_vector(&mut ws.r[..dim], &one());

    let mut beta = real(dim as u32);
    beta.sqrt_mut();

    loop {
        if k >= dim || k >= max_k || !(beta > 1e-16) {
            break;
        }
        // Converged once both the eigenvalue estimate and its residual
        // bound have settled.
        let mut diff = Real::with_val(prec, &min - &min_old);
        diff.abs_mut();
        let mut tol1 = Real::with_val(prec, min.abs_ref());
        tol1 *= 1e-5;
        tol1 += 1e-8;
        let mut err_term = Real::with_val(prec, &error * &beta);
        err_term.abs_mut();
        let mut tol2 = Real::with_val(prec, min.abs_ref());
        tol2 *= 1e-2;
        tol2 += 1e-4;
        if !(diff > tol1 || err_term > tol2) {
            break;
        }

        for i in 0..dim {
            ws.q_old[i].assign(&ws.q[i]);
            ws.q[i].assign(&ws.r[i] / &beta);
        }

        // w = L·X·Lᵀ·q
        for i in 0..dim {
            ws.w[i].assign(&ws.q[i]);
        }
        lower_triangular_transpose_times_vector(l, &mut ws.w[..dim]);
        vector_scale_matrix_multiply_add(&one(), x, &ws.w[..dim], &zero(), &mut ws.tmp[..dim]);
        for i in 0..dim {
            ws.w[i].assign(&ws.tmp[i]);
        }
        lower_triangular_times_vector(l, &mut ws.w[..dim]);

        let alpha = dot_product(&ws.q[..dim], &ws.w[..dim]);
        ws.diag[k].assign(&alpha);

        // r = w - alpha·q - beta·q_old
        for i in 0..dim {
            ws.r[i].assign(&ws.w[i]);
        }
        let mut neg_alpha = alpha;
        neg_alpha.neg_assign();
        vector_scale_multiply_add(&neg_alpha, &ws.q[..dim], &one(), &mut ws.r[..dim]);
        let mut neg_beta = beta.clone();
        neg_beta.neg_assign();
        vector_scale_multiply_add(&neg_beta, &ws.q_old[..dim], &one(), &mut ws.r[..dim]);

        if kk * kk >= k || k == dim - 1 || k * k > dim + 9 {
            kk = 0;
            let kp1 = k + 1;
            for i in 0..kp1 {
                ws.out[i].assign(&ws.diag[i]);
                ws.out_off[i].assign(&ws.off_diag[i]);
            }
            ws.out_off[kp1 - 1].assign(0);

            let mut q_mat = Matrix::identity(kp1);
            tridiagonal_ql(&mut ws.out[..kp1], &mut ws.out_off[..kp1], Some(&mut q_mat));

            min_old.assign(&min);
            min.assign(&ws.out[0]);
            // Residual weight: bottom entry of the eigenvector of the
            // smallest Ritz value.
            error.assign(&q_mat[(kp1 - 1, 0)]);
        }

        beta = dot_product(&ws.r[..dim], &ws.r[..dim]);
        beta.sqrt_mut();
        ws.off_diag[k].assign(&beta);
        k += 1;
        kk += 1;
    }

    let mut bound = Real::with_val(prec, &error * &beta);
    bound.abs_mut();
    min - bound
}
