//! Schur-complement assembly and the residues that feed it.
//!
//! Eliminating the matrix variables from the Newton system leaves a
//! dense symmetric system in x whose entries are quadratic forms over
//! the bilinear pairing tensors of X⁻¹ and Y. The pairing tensors are
//! congruences of the iterate's blocks with the sampled bilinear
//! bases, so the whole assembly works on pairing-block dimensions
//! instead of the full matrix dimension.

use super::Solver;
use crate::error::{Error, Result};
use crate::linalg::block::BlockDiagonalMatrix;
use crate::linalg::cholesky::cholesky_decomposition;
use crate::linalg::congruence::{
    bilinear_block_pairing, diagonal_congruence_transpose, tensor_matrix_congruence,
};
use crate::linalg::{component_product, max_abs_vector_element};
use crate::problem::Sdp;
use crate::real::{zero, Real};

/// M := Σ_p x_p·F_p. The diagonal prefix collects the free-variable
/// couplings, M.diag[n] = Σ_p x_p·B[p,n]; each positivity block
/// collects the diagonal congruences of the per-group slices of x with
/// the group's bilinear bases. The result is symmetrized.
pub fn constraint_matrix_weighted_sum(sdp: &Sdp, x: &[Real], result: &mut BlockDiagonalMatrix) {
    for n in 0..result.diagonal_part.len() {
        let mut acc = zero();
        for p in 0..x.len() {
            acc += &x[p] * &sdp.free_var_matrix[(p, n)];
        }
        result.diagonal_part[n] = acc;
    }

    let mut p = 0;
    for j in 0..sdp.dimensions.len() {
        let dj = sdp.degrees[j];
        for s in 0..sdp.dimensions[j] {
            for r in 0..=s {
                for &b in &sdp.blocks[j] {
                    diagonal_congruence_transpose(
                        &x[p..],
                        &sdp.bilinear_bases[b],
                        r,
                        s,
                        &mut result.blocks[b],
                    );
                }
                p += dj + 1;
            }
        }
    }
    assert_eq!(p, x.len());

    result.symmetrize();
}

impl<'a> Solver<'a> {
    /// Congruences of X⁻¹ and Y with every bilinear basis.
    pub(crate) fn compute_bilinear_pairings(&mut self) {
        for b in 0..self.sdp.bilinear_bases.len() {
            tensor_matrix_congruence(
                &self.X_inv.blocks[b],
                &self.sdp.bilinear_bases[b],
                &mut self.workspace.bilinear_pairings_work[b],
                &mut self.bilinear_pairings_X_inv.blocks[b],
            );
            tensor_matrix_congruence(
                &self.Y.blocks[b],
                &self.sdp.bilinear_bases[b],
                &mut self.workspace.bilinear_pairings_work[b],
                &mut self.bilinear_pairings_Y.blocks[b],
            );
        }
    }

    /// dual_residues[p] = c_p − Tr(F_p·Y), with the trace split into
    /// the symmetrized pairing part and the free-variable part.
    pub(crate) fn compute_dual_residues(&mut self) {
        for j in 0..self.sdp.dimensions.len() {
            let ej = self.sdp.degrees[j] + 1;
            for t in &self.sdp.constraint_indices[j] {
                let ej_r = t.r * ej;
                let ej_s = t.s * ej;

                let mut res = zero();
                for &b in &self.sdp.blocks[j] {
                    let pairing = &self.bilinear_pairings_Y.blocks[b];
                    res -= &pairing[(ej_r + t.k, ej_s + t.k)];
                    res -= &pairing[(ej_s + t.k, ej_r + t.k)];
                }
                res /= 2;

                for n in 0..self.sdp.dual_dimension() {
                    res -= &self.sdp.free_var_matrix[(t.p, n)] * &self.Y.diagonal_part[n];
                }
                res += &self.sdp.primal_objective_c[t.p];
                self.dual_residues[t.p] = res;
            }
        }
        self.dual_error = max_abs_vector_element(&self.dual_residues);
    }

    /// primal_residues = Σ_p x_p·F_p − X − F_0, where F_0 carries the
    /// free-variable objective on the diagonal prefix.
    pub(crate) fn compute_primal_residues(&mut self) {
        constraint_matrix_weighted_sum(self.sdp, &self.x, &mut self.primal_residues);
        self.primal_residues -= &self.X;
        let minus_one = crate::real::real(-1);
        self.primal_residues
            .add_diagonal_part(&self.sdp.dual_objective_b, &minus_one);
        self.primal_error = self.primal_residues.max_abs_element();
    }

    /// Assemble the Schur complement S and factor it in place.
    ///
    /// The free-variable correction S[p,q] = Σ_n (X⁻¹⊙Y).diag[n]·
    /// B[p,n]·B[q,n] is written first (it covers every entry), then
    /// each group adds its pairing quadratic forms on its own index
    /// range.
    pub(crate) fn compute_schur_complement_cholesky(&mut self) -> Result<()> {
        component_product(
            &self.X_inv.diagonal_part,
            &self.Y.diagonal_part,
            &mut self.x_inv_y_diag,
        );
        diagonal_congruence_transpose(
            &self.x_inv_y_diag,
            &self.sdp.free_var_matrix,
            0,
            0,
            &mut self.schur_complement,
        );
        self.add_schur_blocks();

        cholesky_decomposition(&self.schur_complement, &mut self.schur_complement_cholesky)
            .map_err(|_| Error::NotPositiveDefinite("Schur complement"))
    }

    fn add_schur_blocks(&mut self) {
        for j in 0..self.sdp.dimensions.len() {
            let ej = self.sdp.degrees[j] + 1;
            for t1 in &self.sdp.constraint_indices[j] {
                let p1 = t1.p;
                let ej_r1 = t1.r * ej;
                let ej_s1 = t1.s * ej;
                let k1 = t1.k;

                for t2 in self.sdp.constraint_indices[j]
                    .iter()
                    .take_while(|t2| t2.p <= p1)
                {
                    let p2 = t2.p;
                    let ej_r2 = t2.r * ej;
                    let ej_s2 = t2.s * ej;
                    let k2 = t2.k;

                    let mut tmp = zero();
                    for &b in &self.sdp.blocks[j] {
                        let t_x = &self.bilinear_pairings_X_inv.blocks[b];
                        let t_y = &self.bilinear_pairings_Y.blocks[b];
                        tmp += &t_x[(ej_s1 + k1, ej_r2 + k2)] * &t_y[(ej_s2 + k2, ej_r1 + k1)];
                        tmp += &t_x[(ej_r1 + k1, ej_r2 + k2)] * &t_y[(ej_s2 + k2, ej_s1 + k1)];
                        tmp += &t_x[(ej_s1 + k1, ej_s2 + k2)] * &t_y[(ej_r2 + k2, ej_r1 + k1)];
                        tmp += &t_x[(ej_r1 + k1, ej_s2 + k2)] * &t_y[(ej_r2 + k2, ej_s1 + k1)];
                    }
                    tmp /= 4;

                    self.schur_complement[(p1, p2)] += &tmp;
                    if p2 != p1 {
                        self.schur_complement[(p2, p1)] += &tmp;
                    }
                }
            }
        }
    }

    /// RHS of the Schur system into dx:
    /// r[p] = −dual_residues[p] − Bᵀ-coupling of Z.diag − pairings of
    /// the k-th basis column against Z's blocks.
    pub(crate) fn compute_schur_rhs(&mut self) {
        for p in 0..self.dx.len() {
            let mut r = zero();
            r -= &self.dual_residues[p];
            for n in 0..self.sdp.dual_dimension() {
                r -= &self.sdp.free_var_matrix[(p, n)] * &self.Z.diagonal_part[n];
            }
            self.dx[p] = r;
        }

        for j in 0..self.sdp.dimensions.len() {
            for t in &self.sdp.constraint_indices[j] {
                for &b in &self.sdp.blocks[j] {
                    let basis = &self.sdp.bilinear_bases[b];
                    let delta = basis.rows;
                    // k-th sampled column of the basis
                    let q = &basis.elements[t.k * delta..(t.k + 1) * delta];
                    let pairing = bilinear_block_pairing(q, delta, &self.Z.blocks[b], t.r, t.s);
                    self.dx[t.p] -= pairing;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::Matrix;
    use crate::real::{one, real};
    use rug::Assign;

    /// A two-constraint problem: one group of dimension 1, degree 1,
    /// with a 2×2-sampled monomial basis.
    fn small_sdp() -> Sdp {
        let mut basis = Matrix::new(1, 2);
        basis[(0, 0)].assign(1);
        basis[(0, 1)].assign(1);
        let mut free_var = Matrix::new(2, 1);
        free_var[(0, 0)].assign(1);
        free_var[(1, 0)].assign(2);
        let mut sdp = Sdp {
            bilinear_bases: vec![basis],
            free_var_matrix: free_var,
            primal_objective_c: vec![one(), one()],
            dual_objective_b: vec![one()],
            objective_const: crate::real::zero(),
            dimensions: vec![1],
            degrees: vec![1],
            blocks: vec![vec![0]],
            constraint_indices: Vec::new(),
        };
        sdp.initialize_constraint_indices();
        sdp.validate().unwrap();
        sdp
    }

    /// Applying the weighted sum to a unit vector must reproduce the
    /// corresponding constraint matrix F_p.
    #[test]
    fn test_weighted_sum_of_unit_vector_is_constraint_matrix() {
        let sdp = small_sdp();
        let dims = sdp.psd_matrix_block_dims();

        for p in 0..sdp.num_constraints() {
            let mut e_p = vec![crate::real::zero(), crate::real::zero()];
            e_p[p].assign(1);
            let mut result = BlockDiagonalMatrix::new(1, &dims);
            constraint_matrix_weighted_sum(&sdp, &e_p, &mut result);

            // Diagonal prefix is row p of the free-variable matrix.
            assert_eq!(result.diagonal_part[0], sdp.free_var_matrix[(p, 0)]);

            // The block entry is q_k(x)·q_k(x) at the sampled points:
            // with the constant basis both samples give 1, so F_p's
            // block is the rank-one matrix with a single 1 at (k, k)
            // spread through the basis columns.
            let mut expected = Matrix::new(1, 1);
            let basis = &sdp.bilinear_bases[0];
            let k = sdp.constraint_indices[0][p].k;
            expected[(0, 0)].assign(&basis[(0, k)] * &basis[(0, k)]);
            assert_eq!(result.blocks[0], expected);
        }
    }

    #[test]
    fn test_schur_complement_is_exactly_symmetric_and_factors() {
        let sdp = small_sdp();
        let parameters = crate::problem::SolverParameters {
            precision_bits: crate::real::DEFAULT_PRECISION,
            ..Default::default()
        };
        let mut solver = Solver::new(&sdp, parameters).unwrap();
        solver.initialize();

        crate::linalg::block::inverse_cholesky_and_inverse(
            &solver.X,
            &mut solver.workspace.block_cholesky_work,
            &mut solver.X_inv_cholesky,
            &mut solver.X_inv,
        )
        .unwrap();
        solver.compute_bilinear_pairings();
        solver.compute_schur_complement_cholesky().unwrap();

        let n = sdp.num_constraints();
        for r in 0..n {
            for c in 0..n {
                assert_eq!(
                    solver.schur_complement[(r, c)],
                    solver.schur_complement[(c, r)]
                );
            }
        }
    }

    #[test]
    fn test_weighted_sum_diagonal_prefix_is_linear() {
        let sdp = small_sdp();
        let dims = sdp.psd_matrix_block_dims();
        let x = vec![real(2), real(3)];
        let mut result = BlockDiagonalMatrix::new(1, &dims);
        constraint_matrix_weighted_sum(&sdp, &x, &mut result);
        // 2·B[0,0] + 3·B[1,0] = 2 + 6
        assert_eq!(result.diagonal_part[0], 8);
        // block: Σ_p x_p·q(x_k)² summed over the slice = 2 + 3
        assert_eq!(result.blocks[0][(0, 0)], 5);
    }
}
