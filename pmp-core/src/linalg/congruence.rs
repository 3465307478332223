//! Bilinear congruences with Kronecker-structured bases.
//!
//! The positivity blocks of the problem have dimension `l·m` with an
//! `l × n` sampled basis `b` acting on each of the `m` sub-blocks. The
//! congruence `(b ⊗ 1_m)ᵀ·A·(b ⊗ 1_m)` is computed without ever
//! materializing the Kronecker product.

use rug::Assign;

use super::Matrix;
use crate::real::{zero, Real};

/// result := b′ᵀ·a·b′ with b′ = b ⊗ 1_m, where m = a.rows / b.rows.
///
/// `work` must be a.rows × result.cols. Only the upper triangle of the
/// result is computed; the lower triangle is mirrored, never
/// recomputed.
pub fn tensor_matrix_congruence(a: &Matrix, b: &Matrix, work: &mut Matrix, result: &mut Matrix) {
    assert_eq!(a.rows, a.cols);
    assert_eq!(a.rows % b.rows, 0);
    let m = a.rows / b.rows;
    assert_eq!(result.rows, b.cols * m);
    assert_eq!(result.cols, b.cols * m);
    assert_eq!(work.rows, a.rows);
    assert_eq!(work.cols, result.cols);

    // work = a·b′, one sparse column of b′ at a time
    for c in 0..work.cols {
        let b_col = c % b.cols;
        let a_col_offset = (c / b.cols) * b.rows;
        for r in 0..work.rows {
            let mut tmp = zero();
            for k in 0..b.rows {
                tmp += &a[(r, a_col_offset + k)] * &b[(k, b_col)];
            }
            work[(r, c)] = tmp;
        }
    }

    // result = b′ᵀ·work
    for c in 0..result.cols {
        for r in 0..=c {
            let b_col = r % b.cols;
            let work_row_offset = (r / b.cols) * b.rows;
            let mut tmp = zero();
            for k in 0..b.rows {
                tmp += &b[(k, b_col)] * &work[(work_row_offset + k, c)];
            }
            if r != c {
                result[(c, r)].assign(&tmp);
            }
            result[(r, c)] = tmp;
        }
    }
}

/// Writes V·diag(d)·Vᵀ into the (block_row, block_col) block of
/// `result` (blocks of size V.rows), mirroring the transposed block.
///
/// result[R·V.rows + p, C·V.rows + q] = Σ_n d[n]·V[p,n]·V[q,n]
pub fn diagonal_congruence_transpose(
    d: &[Real],
    v: &Matrix,
    block_row: usize,
    block_col: usize,
    result: &mut Matrix,
) {
    assert!(d.len() >= v.cols);
    assert!(result.rows >= (block_row + 1) * v.rows);
    assert!(result.cols >= (block_col + 1) * v.rows);

    let mut prod = zero();
    for p in 0..v.rows {
        for q in 0..=p {
            let mut tmp = zero();
            for n in 0..v.cols {
                prod.assign(&v[(p, n)] * &v[(q, n)]);
                tmp += &d[n] * &prod;
            }
            if p != q {
                result[(block_row * v.rows + q, block_col * v.rows + p)].assign(&tmp);
            }
            result[(block_row * v.rows + p, block_col * v.rows + q)] = tmp;
        }
    }
}

/// vᵀ·A′·v where A′ is the (block_row, block_col) dim×dim block of `a`.
pub fn bilinear_block_pairing(
    v: &[Real],
    dim: usize,
    a: &Matrix,
    block_row: usize,
    block_col: usize,
) -> Real {
    assert!(v.len() >= dim);
    let mut result = zero();
    for r in 0..dim {
        let mut tmp = zero();
        for c in 0..dim {
            tmp += &v[c] * &a[(block_row * dim + r, block_col * dim + c)];
        }
        result += &v[r] * &tmp;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{matrix_multiply, Matrix};
    use crate::real::real;

    /// b ⊗ 1_m materialized densely.
    fn kronecker_with_identity(b: &Matrix, m: usize) -> Matrix {
        let mut out = Matrix::new(b.rows * m, b.cols * m);
        for r in 0..b.rows {
            for c in 0..b.cols {
                for i in 0..m {
                    out[(r * m + i, c * m + i)].assign(&b[(r, c)]);
                }
            }
        }
        out
    }

    #[test]
    fn test_congruence_of_identity() {
        // a = 1₄, b = [[2,4,6],[3,5,7]] gives a 6×6 result equal to
        // (b ⊗ 1₂)ᵀ·(b ⊗ 1₂).
        let a = Matrix::identity(4);
        let mut b = Matrix::new(2, 3);
        let vals = [[2.0, 4.0, 6.0], [3.0, 5.0, 7.0]];
        for r in 0..2 {
            for c in 0..3 {
                b[(r, c)].assign(vals[r][c]);
            }
        }

        let mut work = Matrix::new(4, 6);
        let mut result = Matrix::new(6, 6);
        tensor_matrix_congruence(&a, &b, &mut work, &mut result);

        let bk = kronecker_with_identity(&b, 2);
        let mut bkt = Matrix::new(6, 4);
        for r in 0..4 {
            for c in 0..6 {
                bkt[(c, r)].assign(&bk[(r, c)]);
            }
        }
        let mut expected = Matrix::new(6, 6);
        matrix_multiply(&bkt, &bk, &mut expected);

        let mut diff = expected;
        diff -= &result;
        assert!(diff.max_abs_element().is_zero());
    }

    #[test]
    fn test_congruence_general_symmetric() {
        // Symmetric non-identity a, checked against the dense product.
        let mut a = Matrix::new(4, 4);
        for r in 0..4 {
            for c in 0..4 {
                a[(r, c)].assign((1 + r.min(c) + r.max(c)) as u32);
            }
        }
        let mut b = Matrix::new(2, 2);
        b[(0, 0)].assign(1);
        b[(0, 1)].assign(2);
        b[(1, 0)].assign(3);
        b[(1, 1)].assign(4);

        let mut work = Matrix::new(4, 4);
        let mut result = Matrix::new(4, 4);
        tensor_matrix_congruence(&a, &b, &mut work, &mut result);

        let bk = kronecker_with_identity(&b, 2);
        let mut bkt = bk.clone();
        bkt.transpose();
        let mut abk = Matrix::new(4, 4);
        matrix_multiply(&a, &bk, &mut abk);
        let mut expected = Matrix::new(4, 4);
        matrix_multiply(&bkt, &abk, &mut expected);

        let mut diff = expected;
        diff -= &result;
        assert!(diff.max_abs_element().is_zero());

        // Exact symmetry of the mirrored triangle.
        for r in 0..4 {
            for c in 0..r {
                assert_eq!(result[(r, c)], result[(c, r)]);
            }
        }
    }

    #[test]
    fn test_diagonal_congruence_transpose() {
        // V·diag(d)·Vᵀ written into block (0,1) of a 4×4 result.
        let mut v = Matrix::new(2, 3);
        let vals = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        for r in 0..2 {
            for c in 0..3 {
                v[(r, c)].assign(vals[r][c]);
            }
        }
        let d = vec![real(2), real(1), real(3)];
        let mut result = Matrix::new(4, 4);
        diagonal_congruence_transpose(&d, &v, 0, 1, &mut result);

        // Entry (p,q) = Σ_n d_n V[p,n] V[q,n]
        assert_eq!(result[(0, 2)], real(2 * 1 + 1 * 4 + 3 * 9));
        assert_eq!(result[(0, 3)], real(2 * 4 + 1 * 10 + 3 * 18));
        assert_eq!(result[(1, 2)], result[(0, 3)]);
        assert_eq!(result[(1, 3)], real(2 * 16 + 1 * 25 + 3 * 36));
    }

    #[test]
    fn test_bilinear_block_pairing() {
        // a is 4×4 made of 2×2 blocks; pair v against block (1,0).
        let mut a = Matrix::new(4, 4);
        for r in 0..4 {
            for c in 0..4 {
                a[(r, c)].assign((r * 4 + c + 1) as u32);
            }
        }
        let v = vec![real(1), real(2)];
        let got = bilinear_block_pairing(&v, 2, &a, 1, 0);
        // block(1,0) = [[9,10],[13,14]]; vᵀ·M·v = 9 + 2·10 + 2·13 + 4·14
        assert_eq!(got, real(9 + 20 + 26 + 56));
    }
}
