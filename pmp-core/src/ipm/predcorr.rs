//! Predictor and corrector directions, centering parameters, and step
//! lengths.
//!
//! Each iteration takes two Newton-type steps: an affine predictor
//! whose outcome chooses the corrector's centering parameter, then the
//! corrector itself. Both reduce to a Schur solve with a different
//! right-hand-side matrix R.

use rug::Assign;

use super::workspace::SolverWorkspace;
use super::Solver;
use crate::linalg::block::{
    block_diagonal_multiply, block_diagonal_scale_multiply_add,
    block_matrix_solve_with_inverse_cholesky, frobenius_product_of_sums, BlockDiagonalMatrix,
};
use crate::linalg::cholesky::solve_in_place_with_cholesky;
use crate::linalg::eigen::{
    lower_triangular_congruence, min_eigenvalue_via_lanczos, min_eigenvalue_via_qr,
};
use crate::ipm::schur::constraint_matrix_weighted_sum;
use crate::real::{max_real, min_real, one, real, zero, Real};

/// Blocks up to this dimension use the dense eigenvalue solve for the
/// step length; larger ones use the Lanczos lower bound.
const QL_STEP_LENGTH_LIMIT: usize = 32;

impl<'a> Solver<'a> {
    /// β_p: zero once feasible (pure Newton step), otherwise the
    /// infeasible centering parameter.
    pub(crate) fn predictor_centering_parameter(&self, is_primal_dual_feasible: bool) -> Real {
        if is_primal_dual_feasible {
            zero()
        } else {
            self.infeasible_centering_parameter.clone()
        }
    }

    /// β_c from the predictor outcome: with
    /// r = ⟨X+dX, Y+dY⟩/(μ·dim), take β = r² below 1 and β = r above,
    /// clamped into the feasible/infeasible centering windows.
    pub(crate) fn corrector_centering_parameter(&self, is_primal_dual_feasible: bool) -> Real {
        let mut r = frobenius_product_of_sums(&self.X, &self.dX, &self.Y, &self.dY);
        let mut denom = self.mu.clone();
        denom *= self.X.dim as u32;
        r /= &denom;

        let beta = if r < 1 {
            let mut b = r.clone();
            b *= &r;
            b
        } else {
            r
        };

        if is_primal_dual_feasible {
            min_real(
                max_real(self.feasible_centering_parameter.clone(), beta),
                one(),
            )
        } else {
            max_real(self.infeasible_centering_parameter.clone(), beta)
        }
    }

    /// R = β·μ·1 − X·Y
    pub(crate) fn compute_predictor_r_matrix(&mut self, beta: &Real) {
        block_diagonal_multiply(&self.X, &self.Y, &mut self.R);
        self.R.scale(&real(-1));
        let mut shift = beta.clone();
        shift *= &self.mu;
        self.R.add_diagonal(&shift);
    }

    /// R = β·μ·1 − X·Y − dX·dY
    pub(crate) fn compute_corrector_r_matrix(&mut self, beta: &Real) {
        let minus_one = real(-1);
        block_diagonal_scale_multiply_add(&minus_one, &self.X, &self.Y, &zero(), &mut self.R);
        block_diagonal_scale_multiply_add(&minus_one, &self.dX, &self.dY, &one(), &mut self.R);
        let mut shift = beta.clone();
        shift *= &self.mu;
        self.R.add_diagonal(&shift);
    }

    /// Solve for (dx, dX, dY) given the current R:
    ///   Z  = Symmetrize(X⁻¹·(primal_residues·Y − R))
    ///   dx = S⁻¹·(−dual_residues − couplings of Z)
    ///   dX = primal_residues + Σ_p dx_p·F_p
    ///   dY = Symmetrize(X⁻¹·(R − dX·Y))
    pub(crate) fn compute_search_direction_with_r_matrix(&mut self) {
        block_diagonal_multiply(&self.primal_residues, &self.Y, &mut self.Z);
        self.Z -= &self.R;
        block_matrix_solve_with_inverse_cholesky(&self.X_inv_cholesky, &mut self.Z);
        self.Z.symmetrize();

        self.compute_schur_rhs();
        solve_in_place_with_cholesky(&self.schur_complement_cholesky, &mut self.dx);

        constraint_matrix_weighted_sum(self.sdp, &self.dx, &mut self.dX);
        self.dX += &self.primal_residues;

        block_diagonal_multiply(&self.dX, &self.Y, &mut self.dY);
        self.dY -= &self.R;
        block_matrix_solve_with_inverse_cholesky(&self.X_inv_cholesky, &mut self.dY);
        self.dY.symmetrize();
        self.dY.scale(&real(-1));
    }
}

/// Largest α ≤ 1 keeping M + α·dM positive definite, up to the safety
/// factor γ: with λ the minimum eigenvalue of L⁻¹·dM·L⁻ᵀ (L the
/// Cholesky factor of M), α = min(γ/|λ|, 1) when λ < 0 and 1
/// otherwise. `inv_cholesky` holds L⁻¹; its diagonal prefix entries
/// are 1/√m, so prefix eigenvalues are dm·(1/√m)² in closed form.
pub(crate) fn step_length(
    inv_cholesky: &BlockDiagonalMatrix,
    direction: &BlockDiagonalMatrix,
    gamma: &Real,
    ws: &mut SolverWorkspace,
) -> Real {
    let mut lambda_min = real(f64::INFINITY);
    let mut lam = zero();
    for i in 0..direction.diagonal_part.len() {
        lam.assign(&direction.diagonal_part[i]);
        lam *= &inv_cholesky.diagonal_part[i];
        lam *= &inv_cholesky.diagonal_part[i];
        if lam < lambda_min {
            std::mem::swap(&mut lambda_min, &mut lam);
        }
    }

    for b in 0..direction.blocks.len() {
        let n = direction.blocks[b].rows;
        if n == 0 {
            continue;
        }
        let block_min = if n <= QL_STEP_LENGTH_LIMIT {
            lower_triangular_congruence(
                &inv_cholesky.blocks[b],
                &direction.blocks[b],
                &mut ws.step_congruence_work[b],
                &mut ws.step_congruence_out[b],
            );
            min_eigenvalue_via_qr(
                &mut ws.step_congruence_out[b],
                &mut ws.eigenvalues,
                &mut ws.eigen_scratch,
            )
        } else {
            min_eigenvalue_via_lanczos(&inv_cholesky.blocks[b], &direction.blocks[b], &mut ws.lanczos)
        };
        if block_min < lambda_min {
            lambda_min = block_min;
        }
    }

    if !(lambda_min < 0) {
        return one();
    }
    lambda_min.abs_mut();
    let mut alpha = gamma.clone();
    alpha /= &lambda_min;
    if alpha > 1 {
        one()
    } else {
        alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Sdp;

    fn unit_sdp() -> Sdp {
        let mut basis = crate::linalg::Matrix::new(1, 1);
        basis[(0, 0)].assign(1);
        let mut free_var = crate::linalg::Matrix::new(1, 1);
        free_var[(0, 0)].assign(1);
        let mut sdp = Sdp {
            bilinear_bases: vec![basis],
            free_var_matrix: free_var,
            primal_objective_c: vec![one()],
            dual_objective_b: vec![one()],
            objective_const: zero(),
            dimensions: vec![1],
            degrees: vec![0],
            blocks: vec![vec![0]],
            constraint_indices: Vec::new(),
        };
        sdp.initialize_constraint_indices();
        sdp
    }

    fn test_parameters() -> crate::problem::SolverParameters {
        crate::problem::SolverParameters {
            precision_bits: crate::real::DEFAULT_PRECISION,
            ..Default::default()
        }
    }

    #[test]
    fn test_corrector_centering_parameter_windows() {
        let sdp = unit_sdp();
        let mut solver = Solver::new(&sdp, test_parameters()).unwrap();
        solver.initialize();
        solver.mu = one();
        // Zero directions: r = ⟨X, Y⟩/dim, with X = H+2·1 on a 1×1
        // block and prefix 2: ⟨X,Y⟩ = 2 + 3 = 5, dim 2, so r = 2.5,
        // β = r. Infeasible keeps it, feasible clamps to 1.
        let beta = solver.corrector_centering_parameter(false);
        assert_eq!(beta, 2.5);
        let beta = solver.corrector_centering_parameter(true);
        assert_eq!(beta, 1);
    }

    #[test]
    fn test_predictor_centering_parameter() {
        let sdp = unit_sdp();
        let solver = Solver::new(&sdp, test_parameters()).unwrap();
        assert!(solver.predictor_centering_parameter(true).is_zero());
        let beta = solver.predictor_centering_parameter(false);
        assert_eq!(beta, 0.3);
    }

    #[test]
    fn test_step_length_full_step_for_positive_direction() {
        // M = 1, dM = 1: any step keeps positive-definiteness.
        let mut inv_cholesky = BlockDiagonalMatrix::new(1, &[2]);
        inv_cholesky.set_identity();
        let mut direction = BlockDiagonalMatrix::new(1, &[2]);
        direction.set_identity();
        let sdp = unit_sdp();
        let mut ws = SolverWorkspace::new(&sdp);
        // workspace blocks are 1×1; rebuild for the 2×2 test block
        ws.step_congruence_work = vec![crate::linalg::Matrix::new(2, 2)];
        ws.step_congruence_out = vec![crate::linalg::Matrix::new(2, 2)];
        ws.eigenvalues = crate::linalg::zero_vector(2);
        ws.eigen_scratch = crate::linalg::eigen::EigenScratch::new(2);
        let alpha = step_length(&inv_cholesky, &direction, &real(0.7), &mut ws);
        assert_eq!(alpha, 1);
    }

    #[test]
    fn test_step_length_limited_by_negative_eigenvalue() {
        // M = 1, dM = diag(-2, -1) on the prefix: λ_min = -2 so
        // α = γ/2.
        let mut inv_cholesky = BlockDiagonalMatrix::new(2, &[]);
        inv_cholesky.set_identity();
        let mut direction = BlockDiagonalMatrix::new(2, &[]);
        direction.diagonal_part[0].assign(-2);
        direction.diagonal_part[1].assign(-1);
        let sdp = unit_sdp();
        let mut ws = SolverWorkspace::new(&sdp);
        let alpha = step_length(&inv_cholesky, &direction, &real(0.7), &mut ws);
        assert_eq!(alpha, 0.35);
    }
}
