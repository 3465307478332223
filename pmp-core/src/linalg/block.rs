//! Symmetric block-diagonal matrices.
//!
//! A [`BlockDiagonalMatrix`] is a purely diagonal prefix followed by an
//! ordered list of square dense blocks. Operations act element-wise on
//! the prefix and block-wise on the blocks; there is no virtual
//! dispatch anywhere, just iteration over the parts.

use std::ops::{AddAssign, SubAssign};

use rug::Assign;

use super::cholesky;
use super::{
    dot_product, fill_vector, frobenius_product_of_sums as matrix_frobenius_product_of_sums,
    frobenius_product_symmetric as matrix_frobenius_product_symmetric, matrix_scale_multiply_add,
    max_abs_vector_element, zero_vector, Matrix, Vector,
};
use crate::error::{Error, Result};
use crate::real::{self, real, Real};

#[derive(Clone, Debug, PartialEq)]
pub struct BlockDiagonalMatrix {
    /// Total dimension: diagonal prefix plus all blocks.
    pub dim: usize,
    pub diagonal_part: Vector,
    pub blocks: Vec<Matrix>,
}

impl BlockDiagonalMatrix {
    pub fn new(diagonal_size: usize, block_sizes: &[usize]) -> Self {
        let mut dim = diagonal_size;
        let mut blocks = Vec::with_capacity(block_sizes.len());
        for &size in block_sizes {
            blocks.push(Matrix::new(size, size));
            dim += size;
        }
        BlockDiagonalMatrix {
            dim,
            diagonal_part: zero_vector(diagonal_size),
            blocks,
        }
    }

    pub fn set_zero(&mut self) {
        let zero = real::zero();
        fill_vector(&mut self.diagonal_part, &zero);
        for b in self.blocks.iter_mut() {
            b.set_zero();
        }
    }

    pub fn add_diagonal(&mut self, c: &Real) {
        for d in self.diagonal_part.iter_mut() {
            *d += c;
        }
        for b in self.blocks.iter_mut() {
            b.add_diagonal(c);
        }
    }

    pub fn set_identity(&mut self) {
        self.set_zero();
        self.add_diagonal(&real::one());
    }

    /// diagonal_part += alpha·v
    pub fn add_diagonal_part(&mut self, v: &[Real], alpha: &Real) {
        assert_eq!(v.len(), self.diagonal_part.len());
        for (d, src) in self.diagonal_part.iter_mut().zip(v.iter()) {
            *d += alpha * src;
        }
    }

    pub fn scale(&mut self, c: &Real) {
        for d in self.diagonal_part.iter_mut() {
            *d *= c;
        }
        for b in self.blocks.iter_mut() {
            b.scale(c);
        }
    }

    pub fn copy_from(&mut self, a: &BlockDiagonalMatrix) {
        assert_eq!(self.dim, a.dim);
        for (d, src) in self.diagonal_part.iter_mut().zip(a.diagonal_part.iter()) {
            d.assign(src);
        }
        for (b, src) in self.blocks.iter_mut().zip(a.blocks.iter()) {
            b.copy_from(src);
        }
    }

    /// Symmetrize every block; the diagonal prefix is untouched.
    pub fn symmetrize(&mut self) {
        for b in self.blocks.iter_mut() {
            b.symmetrize();
        }
    }

    pub fn max_abs_element(&self) -> Real {
        let mut max = max_abs_vector_element(&self.diagonal_part);
        for b in &self.blocks {
            let tmp = b.max_abs_element();
            if tmp > max {
                max = tmp;
            }
        }
        max
    }
}

impl AddAssign<&BlockDiagonalMatrix> for BlockDiagonalMatrix {
    fn add_assign(&mut self, a: &BlockDiagonalMatrix) {
        self.add_diagonal_part(&a.diagonal_part, &real::one());
        for (b, src) in self.blocks.iter_mut().zip(a.blocks.iter()) {
            *b += src;
        }
    }
}

impl SubAssign<&BlockDiagonalMatrix> for BlockDiagonalMatrix {
    fn sub_assign(&mut self, a: &BlockDiagonalMatrix) {
        assert_eq!(self.diagonal_part.len(), a.diagonal_part.len());
        for (d, src) in self.diagonal_part.iter_mut().zip(a.diagonal_part.iter()) {
            *d -= src;
        }
        for (b, src) in self.blocks.iter_mut().zip(a.blocks.iter()) {
            *b -= src;
        }
    }
}

/// ⟨A, B⟩ for symmetric block-diagonal matrices.
pub fn frobenius_product_symmetric(a: &BlockDiagonalMatrix, b: &BlockDiagonalMatrix) -> Real {
    let mut result = dot_product(&a.diagonal_part, &b.diagonal_part);
    for (ab, bb) in a.blocks.iter().zip(b.blocks.iter()) {
        result += matrix_frobenius_product_symmetric(ab, bb);
    }
    result
}

/// ⟨X + dX, Y + dY⟩ for symmetric block-diagonal matrices.
pub fn frobenius_product_of_sums(
    x: &BlockDiagonalMatrix,
    dx: &BlockDiagonalMatrix,
    y: &BlockDiagonalMatrix,
    dy: &BlockDiagonalMatrix,
) -> Real {
    let prec = real::precision();
    let mut result = real::zero();
    let mut u = real::zero();
    for i in 0..x.diagonal_part.len() {
        u.assign(&x.diagonal_part[i] + &dx.diagonal_part[i]);
        let v = Real::with_val(prec, &y.diagonal_part[i] + &dy.diagonal_part[i]);
        result += &u * &v;
    }
    for b in 0..x.blocks.len() {
        result += matrix_frobenius_product_of_sums(&x.blocks[b], &dx.blocks[b], &y.blocks[b], &dy.blocks[b]);
    }
    result
}

/// C := alpha·A·B + beta·C, acting entry-wise on the diagonal prefix
/// and by GEMM on the blocks. The result is in general *not* symmetric
/// even for symmetric A and B; callers that need symmetry must
/// symmetrize explicitly.
pub fn block_diagonal_scale_multiply_add(
    alpha: &Real,
    a: &BlockDiagonalMatrix,
    b: &BlockDiagonalMatrix,
    beta: &Real,
    c: &mut BlockDiagonalMatrix,
) {
    assert_eq!(a.dim, c.dim);
    assert_eq!(b.dim, c.dim);

    let mut t = real::zero();
    for i in 0..c.diagonal_part.len() {
        t.assign(&a.diagonal_part[i] * &b.diagonal_part[i]);
        t *= alpha;
        let dst = &mut c.diagonal_part[i];
        if beta.is_zero() {
            dst.assign(&t);
        } else {
            *dst *= beta;
            *dst += &t;
        }
    }
    for i in 0..c.blocks.len() {
        matrix_scale_multiply_add(alpha, &a.blocks[i], &b.blocks[i], beta, &mut c.blocks[i]);
    }
}

/// C := A·B
pub fn block_diagonal_multiply(
    a: &BlockDiagonalMatrix,
    b: &BlockDiagonalMatrix,
    c: &mut BlockDiagonalMatrix,
) {
    block_diagonal_scale_multiply_add(&real::one(), a, b, &real::zero(), c);
}

/// a_inv_cholesky := L⁻¹ with L·Lᵀ = A, block by block; for a diagonal
/// entry d the factor entry is 1/√d.
pub fn inverse_cholesky(
    a: &BlockDiagonalMatrix,
    work: &mut BlockDiagonalMatrix,
    a_inv_cholesky: &mut BlockDiagonalMatrix,
) -> Result<()> {
    for i in 0..a.diagonal_part.len() {
        let d = &a.diagonal_part[i];
        if !(*d > 0) {
            return Err(Error::NotPositiveDefinite("matrix"));
        }
        let mut inv_sqrt = real(d.sqrt_ref());
        inv_sqrt.recip_mut();
        a_inv_cholesky.diagonal_part[i] = inv_sqrt;
    }
    for b in 0..a.blocks.len() {
        cholesky::inverse_cholesky(&a.blocks[b], &mut work.blocks[b], &mut a_inv_cholesky.blocks[b])?;
    }
    Ok(())
}

/// a_inv_cholesky := L⁻¹ (so that L⁻ᵀ·L⁻¹ = A⁻¹) and a_inv := A⁻¹,
/// block by block; diagonal entries become 1/√d and 1/d.
pub fn inverse_cholesky_and_inverse(
    a: &BlockDiagonalMatrix,
    work: &mut BlockDiagonalMatrix,
    a_inv_cholesky: &mut BlockDiagonalMatrix,
    a_inv: &mut BlockDiagonalMatrix,
) -> Result<()> {
    for i in 0..a.diagonal_part.len() {
        let d = &a.diagonal_part[i];
        if !(*d > 0) {
            return Err(Error::NotPositiveDefinite("matrix"));
        }
        let mut inv_sqrt = real(d.sqrt_ref());
        inv_sqrt.recip_mut();
        a_inv_cholesky.diagonal_part[i] = inv_sqrt;
        let mut inv = real(d);
        inv.recip_mut();
        a_inv.diagonal_part[i] = inv;
    }
    for b in 0..a.blocks.len() {
        cholesky::cholesky_decomposition(&a.blocks[b], &mut work.blocks[b])?;
        cholesky::inverse_lower_triangular(&work.blocks[b], &mut a_inv_cholesky.blocks[b]);
        a_inv.blocks[b].copy_from(&a_inv_cholesky.blocks[b]);
        cholesky::lower_triangular_transpose_times_matrix(
            &a_inv_cholesky.blocks[b],
            &mut a_inv.blocks[b],
        );
    }
    Ok(())
}

/// X := A⁻¹·X given the inverse Cholesky factor of A (diagonal entries
/// of the factor hold 1/√d).
pub fn block_matrix_solve_with_inverse_cholesky(
    a_inv_cholesky: &BlockDiagonalMatrix,
    x: &mut BlockDiagonalMatrix,
) {
    for i in 0..x.diagonal_part.len() {
        let l = &a_inv_cholesky.diagonal_part[i];
        x.diagonal_part[i] *= l;
        x.diagonal_part[i] *= l;
    }
    for b in 0..x.blocks.len() {
        cholesky::matrix_solve_with_inverse_cholesky(&a_inv_cholesky.blocks[b], &mut x.blocks[b]);
    }
}
