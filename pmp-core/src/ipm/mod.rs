//! Predictor-corrector interior-point iteration.
//!
//! The solver state is allocated once from the problem's
//! block-dimension vectors and mutated in place; each iteration runs
//! the fixed sequence X⁻¹ → bilinear pairings → residues → termination
//! tests → Schur factorization → predictor direction → corrector
//! direction → step lengths → update. X and Y stay symmetric positive
//! definite after every accepted step.

pub mod predcorr;
pub mod schur;
pub mod termination;
pub mod workspace;

use std::sync::OnceLock;
use std::time::Instant;

use rug::Assign;

use crate::error::{Error, Result};
use crate::linalg::block::{self, frobenius_product_symmetric, BlockDiagonalMatrix};
use crate::linalg::{vector_scale_multiply_add, zero_vector, Matrix};
use crate::problem::{Sdp, SolveResult, SolverParameters, TerminateReason};
use crate::real::{self, min_real, one, real, Real};
use self::workspace::SolverWorkspace;

fn diagnostics_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var("PMP_CORE_DIAGNOSTICS")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(false)
    })
}

/// Interior-point solver state. Holds the problem by shared read-only
/// reference; everything else is owned and reused across iterations.
#[allow(non_snake_case)]
pub struct Solver<'a> {
    pub(crate) sdp: &'a Sdp,
    pub(crate) parameters: SolverParameters,

    // Tolerances lifted to `Real` once, at construction.
    pub(crate) duality_gap_threshold: Real,
    pub(crate) primal_error_threshold: Real,
    pub(crate) dual_error_threshold: Real,
    pub(crate) max_complementarity: Real,
    pub(crate) feasible_centering_parameter: Real,
    pub(crate) infeasible_centering_parameter: Real,
    pub(crate) step_length_reduction: Real,

    pub(crate) x: Vec<Real>,
    pub(crate) dx: Vec<Real>,
    pub(crate) dual_residues: Vec<Real>,
    pub(crate) x_inv_y_diag: Vec<Real>,

    pub(crate) X: BlockDiagonalMatrix,
    pub(crate) X_inv: BlockDiagonalMatrix,
    pub(crate) X_inv_cholesky: BlockDiagonalMatrix,
    pub(crate) Y: BlockDiagonalMatrix,
    pub(crate) Y_inv_cholesky: BlockDiagonalMatrix,
    pub(crate) Z: BlockDiagonalMatrix,
    pub(crate) dX: BlockDiagonalMatrix,
    pub(crate) dY: BlockDiagonalMatrix,
    pub(crate) R: BlockDiagonalMatrix,
    pub(crate) primal_residues: BlockDiagonalMatrix,
    pub(crate) bilinear_pairings_X_inv: BlockDiagonalMatrix,
    pub(crate) bilinear_pairings_Y: BlockDiagonalMatrix,

    pub(crate) schur_complement: Matrix,
    pub(crate) schur_complement_cholesky: Matrix,

    pub(crate) workspace: SolverWorkspace,

    pub(crate) iteration: usize,
    pub(crate) primal_objective: Real,
    pub(crate) dual_objective: Real,
    pub(crate) duality_gap: Real,
    pub(crate) primal_error: Real,
    pub(crate) dual_error: Real,
    pub(crate) mu: Real,
}

impl<'a> Solver<'a> {
    /// Build a solver for a validated problem. Installs the working
    /// precision before allocating any state.
    pub fn new(sdp: &'a Sdp, parameters: SolverParameters) -> Result<Self> {
        real::set_precision(parameters.precision_bits);
        sdp.validate()?;

        let num_constraints = sdp.num_constraints();
        let dual_dimension = sdp.dual_dimension();
        let psd_dims = sdp.psd_matrix_block_dims();
        let pairing_dims = sdp.bilinear_pairing_block_dims();

        let x_shape = BlockDiagonalMatrix::new(dual_dimension, &psd_dims);
        let pairing_shape = BlockDiagonalMatrix::new(0, &pairing_dims);
        let workspace = SolverWorkspace::new(sdp);

        Ok(Solver {
            duality_gap_threshold: real(parameters.duality_gap_threshold),
            primal_error_threshold: real(parameters.primal_error_threshold),
            dual_error_threshold: real(parameters.dual_error_threshold),
            max_complementarity: real(parameters.max_complementarity),
            feasible_centering_parameter: real(parameters.feasible_centering_parameter),
            infeasible_centering_parameter: real(parameters.infeasible_centering_parameter),
            step_length_reduction: real(parameters.step_length_reduction),

            x: zero_vector(num_constraints),
            dx: zero_vector(num_constraints),
            dual_residues: zero_vector(num_constraints),
            x_inv_y_diag: zero_vector(dual_dimension),

            X_inv: x_shape.clone(),
            X_inv_cholesky: x_shape.clone(),
            Y: x_shape.clone(),
            Y_inv_cholesky: x_shape.clone(),
            Z: x_shape.clone(),
            dX: x_shape.clone(),
            dY: x_shape.clone(),
            R: x_shape.clone(),
            primal_residues: x_shape.clone(),
            X: x_shape,

            bilinear_pairings_Y: pairing_shape.clone(),
            bilinear_pairings_X_inv: pairing_shape,

            schur_complement: Matrix::new(num_constraints, num_constraints),
            schur_complement_cholesky: Matrix::new(num_constraints, num_constraints),

            workspace,

            iteration: 0,
            primal_objective: real::zero(),
            dual_objective: real::zero(),
            duality_gap: real(f64::INFINITY),
            primal_error: real(f64::INFINITY),
            dual_error: real(f64::INFINITY),
            mu: real::zero(),

            sdp,
            parameters,
        })
    }

    /// Reference starting point: x = 1, X = H + 2·1 per block with
    /// H[i,j] = 1/(1+i+j), Y = 1.
    pub fn initialize(&mut self) {
        let one = one();
        crate::linalg::fill_vector(&mut self.x, &one);

        self.X.set_zero();
        for block in self.X.blocks.iter_mut() {
            for c in 0..block.cols {
                for r in 0..=c {
                    let mut elt = real(1 + r as u32 + c as u32);
                    elt.recip_mut();
                    block[(c, r)].assign(&elt);
                    block[(r, c)] = elt;
                }
            }
        }
        self.X.add_diagonal(&real(2));
        self.Y.set_identity();
    }

    /// Number of completed iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Read access to the checkpointable state (x, X, Y).
    pub fn state(&self) -> (&[Real], &BlockDiagonalMatrix, &BlockDiagonalMatrix) {
        (&self.x, &self.X, &self.Y)
    }

    /// Restore checkpointed state; shapes must match the problem.
    pub fn restore_state(
        &mut self,
        x: &[Real],
        x_matrix: &BlockDiagonalMatrix,
        y_matrix: &BlockDiagonalMatrix,
        iteration: usize,
    ) -> Result<()> {
        if x.len() != self.x.len() || x_matrix.dim != self.X.dim || y_matrix.dim != self.Y.dim {
            return Err(Error::InvalidProblem(
                "checkpoint shape does not match the problem".into(),
            ));
        }
        for (dst, src) in self.x.iter_mut().zip(x.iter()) {
            dst.assign(src);
        }
        self.X.copy_from(x_matrix);
        self.Y.copy_from(y_matrix);
        self.iteration = iteration;
        Ok(())
    }

    /// Run the iteration from the current state until termination.
    pub fn run(&mut self) -> Result<TerminateReason> {
        let start = Instant::now();
        if self.iteration == 0 {
            self.initialize();
        }
        if self.parameters.verbose {
            self.print_header();
        }

        let reason = loop {
            self.iteration += 1;
            if self.iteration > self.parameters.max_iterations {
                break TerminateReason::MaxIterationsExceeded;
            }
            if start.elapsed().as_secs() >= self.parameters.max_runtime_seconds {
                break TerminateReason::MaxRuntimeExceeded;
            }

            // X⁻¹ with its Cholesky factor, and the factor for Y; a
            // non-PD iterate here is fatal unless the solve is already
            // at its numerical floor.
            match block::inverse_cholesky_and_inverse(
                &self.X,
                &mut self.workspace.block_cholesky_work,
                &mut self.X_inv_cholesky,
                &mut self.X_inv,
            )
            .map_err(|_| Error::NotPositiveDefinite("X"))
            {
                Ok(()) => {}
                Err(e) => break self.fail_or_complementarity(e)?,
            }
            match block::inverse_cholesky(
                &self.Y,
                &mut self.workspace.block_cholesky_work,
                &mut self.Y_inv_cholesky,
            )
            .map_err(|_| Error::NotPositiveDefinite("Y"))
            {
                Ok(()) => {}
                Err(e) => break self.fail_or_complementarity(e)?,
            }

            self.compute_bilinear_pairings();
            self.compute_dual_residues();
            self.compute_primal_residues();
            self.compute_objectives();

            if let Some(reason) = termination::check_termination(self) {
                break reason;
            }

            self.mu = frobenius_product_symmetric(&self.X, &self.Y);
            self.mu /= self.X.dim as u32;
            if self.mu > self.max_complementarity {
                break TerminateReason::MaxComplementarityExceeded;
            }

            match self.compute_schur_complement_cholesky() {
                Ok(()) => {}
                Err(e) => break self.fail_or_complementarity(e)?,
            }

            let is_feasible = self.is_primal_feasible() && self.is_dual_feasible();

            // Predictor direction.
            let beta_predictor = self.predictor_centering_parameter(is_feasible);
            self.compute_predictor_r_matrix(&beta_predictor);
            self.compute_search_direction_with_r_matrix();

            // Corrector direction, centered by the predictor's outcome.
            let beta_corrector = self.corrector_centering_parameter(is_feasible);
            self.compute_corrector_r_matrix(&beta_corrector);
            self.compute_search_direction_with_r_matrix();

            let mut primal_step_length = predcorr::step_length(
                &self.X_inv_cholesky,
                &self.dX,
                &self.step_length_reduction,
                &mut self.workspace,
            );
            let mut dual_step_length = predcorr::step_length(
                &self.Y_inv_cholesky,
                &self.dY,
                &self.step_length_reduction,
                &mut self.workspace,
            );

            if self.parameters.detect_primal_feasible_jump
                && !self.is_primal_feasible()
                && primal_step_length == 1
            {
                break TerminateReason::PrimalFeasibleJumpDetected;
            }
            if self.parameters.detect_dual_feasible_jump
                && !self.is_dual_feasible()
                && dual_step_length == 1
            {
                break TerminateReason::DualFeasibleJumpDetected;
            }

            // Once feasible on both sides, keep the iterate feasible by
            // stepping the same amount in both variables.
            if is_feasible {
                let common = min_real(primal_step_length.clone(), dual_step_length);
                dual_step_length = common.clone();
                primal_step_length = common;
            }

            if diagnostics_enabled() {
                eprintln!(
                    "iter {:4} mu={:.3e} alphaP={:.4} alphaD={:.4} betaC={:.4}",
                    self.iteration,
                    self.mu.to_f64(),
                    primal_step_length.to_f64(),
                    dual_step_length.to_f64(),
                    beta_corrector.to_f64()
                );
            }
            if self.parameters.verbose {
                self.print_iteration(&primal_step_length, &dual_step_length, &beta_corrector);
            }

            // Accepted step: x += αP·dx, X += αP·dX, Y += αD·dY.
            vector_scale_multiply_add(&primal_step_length, &self.dx, &one(), &mut self.x);
            self.dX.scale(&primal_step_length);
            self.X += &self.dX;
            self.X.symmetrize();
            self.dY.scale(&dual_step_length);
            self.Y += &self.dY;
            self.Y.symmetrize();
        };

        if self.parameters.verbose {
            println!("{}", "-".repeat(108));
            println!("Status: {}", reason);
            println!("Iterations: {}", self.iteration);
        }
        Ok(reason)
    }

    /// Package the final state.
    pub fn result(&self, terminate_reason: TerminateReason) -> SolveResult {
        SolveResult {
            terminate_reason,
            iterations: self.iteration,
            primal_objective: self.primal_objective.clone(),
            dual_objective: self.dual_objective.clone(),
            duality_gap: self.duality_gap.clone(),
            primal_error: self.primal_error.clone(),
            dual_error: self.dual_error.clone(),
            x: self.x.clone(),
            x_diagonal: self.X.diagonal_part.clone(),
            y_diagonal: self.Y.diagonal_part.clone(),
        }
    }

    /// Objectives and duality gap of the current iterate.
    fn compute_objectives(&mut self) {
        self.primal_objective
            .assign(&self.sdp.objective_const);
        self.primal_objective += crate::linalg::dot_product(&self.sdp.primal_objective_c, &self.x);

        self.dual_objective.assign(&self.sdp.objective_const);
        self.dual_objective +=
            crate::linalg::dot_product(&self.sdp.dual_objective_b, &self.Y.diagonal_part);

        self.duality_gap =
            termination::duality_gap(&self.primal_objective, &self.dual_objective);
    }

    /// A positive-definiteness failure after both residues have hit
    /// their thresholds means the iterate sits at the complementarity
    /// floor of the working precision; earlier it is a solver error.
    fn fail_or_complementarity(&self, e: Error) -> Result<TerminateReason> {
        if self.is_primal_feasible() && self.is_dual_feasible() {
            Ok(TerminateReason::MaxComplementarityExceeded)
        } else {
            Err(e)
        }
    }

    fn print_header(&self) {
        println!(
            "{:>4}  {:>10}  {:>14} {:>14} {:>10}  {:>10} {:>10}  {:>8} {:>8}  {:>6}",
            "iter", "mu", "P-obj", "D-obj", "gap", "P-err", "D-err", "alphaP", "alphaD", "beta"
        );
        println!("{}", "-".repeat(108));
    }

    fn print_iteration(&self, alpha_p: &Real, alpha_d: &Real, beta: &Real) {
        println!(
            "{:>4}  {:>10.3e}  {:>14.7e} {:>14.7e} {:>10.3e}  {:>10.3e} {:>10.3e}  {:>8.5} {:>8.5}  {:>6.3}",
            self.iteration,
            self.mu.to_f64(),
            self.primal_objective.to_f64(),
            self.dual_objective.to_f64(),
            self.duality_gap.to_f64(),
            self.primal_error.to_f64(),
            self.dual_error.to_f64(),
            alpha_p.to_f64(),
            alpha_d.to_f64(),
            beta.to_f64()
        );
    }
}
