//! Cholesky factorization and triangular solves for dense matrices.

use rug::Assign;

use super::Matrix;
use crate::error::{Error, Result};
use crate::real::{self, Real};

/// result := L with L·Lᵀ = a and L lower triangular; the upper triangle
/// of `result` is explicitly zeroed.
pub fn cholesky_decomposition(a: &Matrix, result: &mut Matrix) -> Result<()> {
    let dim = a.rows;
    assert_eq!(a.cols, dim);
    assert_eq!(result.rows, dim);
    assert_eq!(result.cols, dim);

    for j in 0..dim {
        let mut d = a[(j, j)].clone();
        for k in 0..j {
            d -= &result[(j, k)] * &result[(j, k)];
        }
        if !(d > 0) {
            return Err(Error::NotPositiveDefinite("matrix"));
        }
        let pivot = d.sqrt();

        for i in j + 1..dim {
            let mut s = a[(i, j)].clone();
            for k in 0..j {
                s -= &result[(i, k)] * &result[(j, k)];
            }
            s /= &pivot;
            result[(i, j)] = s;
        }
        for i in 0..j {
            result[(i, j)].assign(0);
        }
        result[(j, j)] = pivot;
    }
    Ok(())
}

/// B := L⁻¹·B (forward substitution, every column).
pub fn solve_lower_triangular_in_place(l: &Matrix, b: &mut Matrix) {
    let dim = l.rows;
    assert_eq!(l.cols, dim);
    assert_eq!(b.rows, dim);

    for c in 0..b.cols {
        for r in 0..dim {
            let mut s = b[(r, c)].clone();
            for k in 0..r {
                s -= &l[(r, k)] * &b[(k, c)];
            }
            s /= &l[(r, r)];
            b[(r, c)] = s;
        }
    }
}

/// B := L⁻ᵀ·B (back substitution, every column).
pub fn solve_lower_triangular_transpose_in_place(l: &Matrix, b: &mut Matrix) {
    let dim = l.rows;
    assert_eq!(l.cols, dim);
    assert_eq!(b.rows, dim);

    for c in 0..b.cols {
        for r in (0..dim).rev() {
            let mut s = b[(r, c)].clone();
            for k in r + 1..dim {
                s -= &l[(k, r)] * &b[(k, c)];
            }
            s /= &l[(r, r)];
            b[(r, c)] = s;
        }
    }
}

/// result := a⁻¹ with a lower triangular.
pub fn inverse_lower_triangular(a: &Matrix, result: &mut Matrix) {
    result.set_identity();
    solve_lower_triangular_in_place(a, result);
}

/// result := L⁻¹ with L·Lᵀ = a; `work` receives the factor itself.
pub fn inverse_cholesky(a: &Matrix, work: &mut Matrix, result: &mut Matrix) -> Result<()> {
    cholesky_decomposition(a, work)?;
    inverse_lower_triangular(work, result);
    Ok(())
}

/// X := L·X with L lower triangular.
pub fn lower_triangular_times_matrix(l: &Matrix, x: &mut Matrix) {
    let dim = l.rows;
    assert_eq!(l.cols, dim);
    assert_eq!(x.rows, dim);

    for c in 0..x.cols {
        for r in (0..dim).rev() {
            let mut acc = real::zero();
            for k in 0..=r {
                acc += &l[(r, k)] * &x[(k, c)];
            }
            x[(r, c)] = acc;
        }
    }
}

/// X := Lᵀ·X with L lower triangular.
pub fn lower_triangular_transpose_times_matrix(l: &Matrix, x: &mut Matrix) {
    let dim = l.rows;
    assert_eq!(l.cols, dim);
    assert_eq!(x.rows, dim);

    for c in 0..x.cols {
        for r in 0..dim {
            let mut acc = real::zero();
            for k in r..dim {
                acc += &l[(k, r)] * &x[(k, c)];
            }
            x[(r, c)] = acc;
        }
    }
}

/// inv_cholesky := L⁻¹ (with L·Lᵀ = a) and inverse := a⁻¹ = L⁻ᵀ·L⁻¹.
pub fn inverse_cholesky_and_inverse(
    a: &Matrix,
    work: &mut Matrix,
    inv_cholesky: &mut Matrix,
    inverse: &mut Matrix,
) -> Result<()> {
    inverse_cholesky(a, work, inv_cholesky)?;
    inverse.copy_from(inv_cholesky);
    lower_triangular_transpose_times_matrix(inv_cholesky, inverse);
    Ok(())
}

/// b := A⁻¹·b given the Cholesky factor L of A.
pub fn solve_in_place_with_cholesky(l: &Matrix, b: &mut [Real]) {
    let dim = l.rows;
    assert_eq!(l.cols, dim);
    assert_eq!(b.len(), dim);

    for r in 0..dim {
        let mut s = b[r].clone();
        for k in 0..r {
            s -= &l[(r, k)] * &b[k];
        }
        s /= &l[(r, r)];
        b[r] = s;
    }
    for r in (0..dim).rev() {
        let mut s = b[r].clone();
        for k in r + 1..dim {
            s -= &l[(k, r)] * &b[k];
        }
        s /= &l[(r, r)];
        b[r] = s;
    }
}

/// X := A⁻¹·X = L⁻ᵀ·L⁻¹·X given the *inverse* Cholesky factor L⁻¹ of A.
pub fn matrix_solve_with_inverse_cholesky(a_inv_cholesky: &Matrix, x: &mut Matrix) {
    lower_triangular_times_matrix(a_inv_cholesky, x);
    lower_triangular_transpose_times_matrix(a_inv_cholesky, x);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{matrix_multiply, max_abs_vector_element};
    use crate::real::{epsilon, real};

    fn spd_3x3() -> Matrix {
        let mut a = Matrix::new(3, 3);
        let vals = [[14.0, 3.0, 8.0], [3.0, 10.0, 9.0], [8.0, 9.0, 14.0]];
        for r in 0..3 {
            for c in 0..3 {
                a[(r, c)].assign(vals[r][c]);
            }
        }
        a
    }

    #[test]
    fn test_identity_cholesky() {
        let id = Matrix::identity(3);
        let mut l = Matrix::new(3, 3);
        cholesky_decomposition(&id, &mut l).unwrap();
        assert_eq!(l, id);

        let mut l_inv = Matrix::new(3, 3);
        inverse_lower_triangular(&l, &mut l_inv);
        assert_eq!(l_inv, id);

        let mut work = Matrix::new(3, 3);
        let mut inv_chol = Matrix::new(3, 3);
        let mut inv = Matrix::new(3, 3);
        inverse_cholesky_and_inverse(&id, &mut work, &mut inv_chol, &mut inv).unwrap();
        assert_eq!(inv_chol, id);
        assert_eq!(inv, id);
    }

    #[test]
    fn test_not_positive_definite() {
        let mut a = Matrix::identity(2);
        a[(1, 1)].assign(-1);
        let mut l = Matrix::new(2, 2);
        assert!(matches!(
            cholesky_decomposition(&a, &mut l),
            Err(Error::NotPositiveDefinite(_))
        ));
    }

    #[test]
    fn test_inverse_roundtrip() {
        let a = spd_3x3();
        let mut work = Matrix::new(3, 3);
        let mut l_inv = Matrix::new(3, 3);
        let mut a_inv = Matrix::new(3, 3);
        inverse_cholesky_and_inverse(&a, &mut work, &mut l_inv, &mut a_inv).unwrap();

        // L⁻ᵀ·L⁻¹ agrees with the returned inverse
        let mut lt_l = l_inv.clone();
        lower_triangular_transpose_times_matrix(&l_inv, &mut lt_l);
        let mut diff = lt_l;
        diff -= &a_inv;
        assert!(diff.max_abs_element() < epsilon());

        // A·A⁻¹ = I
        let mut prod = Matrix::new(3, 3);
        matrix_multiply(&a, &a_inv, &mut prod);
        prod -= &Matrix::identity(3);
        assert!(prod.max_abs_element() < real(1e-60));
    }

    #[test]
    fn test_triangular_solves_build_the_inverse() {
        let a = spd_3x3();
        let mut l = Matrix::new(3, 3);
        cholesky_decomposition(&a, &mut l).unwrap();

        // L⁻¹ by forward substitution, L⁻ᵀ by back substitution.
        let mut l_inv = Matrix::identity(3);
        solve_lower_triangular_in_place(&l, &mut l_inv);
        let mut l_inv_t = Matrix::identity(3);
        solve_lower_triangular_transpose_in_place(&l, &mut l_inv_t);

        // L⁻ᵀ·L⁻¹ is A⁻¹.
        let mut prod = Matrix::new(3, 3);
        matrix_multiply(&l_inv_t, &l_inv, &mut prod);
        let mut check = Matrix::new(3, 3);
        matrix_multiply(&a, &prod, &mut check);
        check -= &Matrix::identity(3);
        assert!(check.max_abs_element() < real(1e-60));
    }

    #[test]
    fn test_solve_with_cholesky() {
        let a = spd_3x3();
        let mut l = Matrix::new(3, 3);
        cholesky_decomposition(&a, &mut l).unwrap();

        // Solve A·x = b and verify the residual.
        let b = [real(1), real(2), real(3)];
        let mut x = b.to_vec();
        solve_in_place_with_cholesky(&l, &mut x);
        let mut residual = vec![real(-1), real(-2), real(-3)];
        crate::linalg::vector_scale_matrix_multiply_add(
            &real(1),
            &a,
            &x,
            &real(1),
            &mut residual,
        );
        assert!(max_abs_vector_element(&residual) < real(1e-60));
    }
}
