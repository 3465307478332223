//! Problem data structures, solver configuration and results.

use std::fmt;

use crate::error::{Error, Result};
use crate::linalg::Matrix;
use crate::real::Real;

/// One scalar constraint of the semidefinite program.
///
/// `p` is the global constraint index; `(r, s)` pick an entry of the
/// j-th positivity matrix (0 ≤ r ≤ s < dimensions[j]) and `k` a sample
/// index (0 ≤ k ≤ degrees[j]). Within a group, `p` increases
/// lexicographically in (s, r, k).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexTuple {
    pub p: usize,
    pub r: usize,
    pub s: usize,
    pub k: usize,
}

/// A polynomial-matrix program reduced to semidefinite form.
///
/// The solver maximizes `primal_objective_c·x + objective_const`
/// subject to `Σ_p x_p F_p − X = F_0` with `X ⪰ 0`, where the F_p are
/// block-diagonal matrices determined by `bilinear_bases` on the
/// positivity blocks and by `free_var_matrix` on the diagonal
/// (free-variable) prefix. The dual variables are read off the
/// diagonal prefix of the dual matrix Y.
#[derive(Debug, Clone)]
pub struct Sdp {
    /// Sampled bilinear bases, one matrix per positivity block; entry
    /// (n, k) is the n-th basis polynomial at the k-th sample point.
    pub bilinear_bases: Vec<Matrix>,

    /// Coupling of the constraints to the free variables:
    /// rows = number of constraints (x-dimension),
    /// cols = number of free variables (y-dimension).
    pub free_var_matrix: Matrix,

    /// Objective coefficients of x (length = x-dimension).
    pub primal_objective_c: Vec<Real>,

    /// Objective coefficients of the free variables
    /// (length = y-dimension).
    pub dual_objective_b: Vec<Real>,

    /// Constant added to both objective values.
    pub objective_const: Real,

    /// Size of the j-th positivity matrix.
    pub dimensions: Vec<usize>,

    /// Polynomial degree of the j-th group.
    pub degrees: Vec<usize>,

    /// Indices into `bilinear_bases` belonging to the j-th group.
    pub blocks: Vec<Vec<usize>>,

    /// Constraint tuples of the j-th group, in increasing p order.
    pub constraint_indices: Vec<Vec<IndexTuple>>,
}

impl Sdp {
    /// Number of constraints (the dimension of x).
    pub fn num_constraints(&self) -> usize {
        self.primal_objective_c.len()
    }

    /// Number of free variables (the dimension of y).
    pub fn dual_dimension(&self) -> usize {
        self.dual_objective_b.len()
    }

    /// Dimensions of the positivity blocks of X and Y:
    /// rows(basis_b) · dimensions[j] for each block b of each group j.
    pub fn psd_matrix_block_dims(&self) -> Vec<usize> {
        let mut dims = Vec::new();
        for j in 0..self.dimensions.len() {
            for &b in &self.blocks[j] {
                dims.push(self.bilinear_bases[b].rows * self.dimensions[j]);
            }
        }
        dims
    }

    /// Dimensions of the bilinear pairing blocks:
    /// cols(basis_b) · dimensions[j] for each block b of each group j.
    pub fn bilinear_pairing_block_dims(&self) -> Vec<usize> {
        let mut dims = Vec::new();
        for j in 0..self.dimensions.len() {
            for &b in &self.blocks[j] {
                dims.push(self.bilinear_bases[b].cols * self.dimensions[j]);
            }
        }
        dims
    }

    /// Number of constraints per group.
    pub fn schur_block_dims(&self) -> Vec<usize> {
        self.constraint_indices.iter().map(|v| v.len()).collect()
    }

    /// Rebuild `constraint_indices` from `dimensions` and `degrees`.
    pub fn initialize_constraint_indices(&mut self) {
        self.constraint_indices.clear();
        let mut p = 0;
        for j in 0..self.dimensions.len() {
            let mut tuples = Vec::new();
            for s in 0..self.dimensions[j] {
                for r in 0..=s {
                    for k in 0..=self.degrees[j] {
                        tuples.push(IndexTuple { p, r, s, k });
                        p += 1;
                    }
                }
            }
            self.constraint_indices.push(tuples);
        }
        assert_eq!(p, self.primal_objective_c.len());
    }

    /// Check internal consistency; rejected problems never reach the
    /// iteration.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions.is_empty() {
            return Err(Error::InvalidProblem("no constraint groups".into()));
        }
        if self.num_constraints() == 0 {
            return Err(Error::InvalidProblem("empty constraint set".into()));
        }
        let groups = self.dimensions.len();
        if self.degrees.len() != groups
            || self.blocks.len() != groups
            || self.constraint_indices.len() != groups
        {
            return Err(Error::InvalidProblem(format!(
                "inconsistent group counts: {} dimensions, {} degrees, {} blocks, {} index lists",
                groups,
                self.degrees.len(),
                self.blocks.len(),
                self.constraint_indices.len()
            )));
        }

        let mut expected_constraints = 0;
        for j in 0..groups {
            let dim = self.dimensions[j];
            if dim == 0 {
                return Err(Error::InvalidProblem(format!("group {} has dimension 0", j)));
            }
            expected_constraints += (self.degrees[j] + 1) * dim * (dim + 1) / 2;
            for &b in &self.blocks[j] {
                let basis = self
                    .bilinear_bases
                    .get(b)
                    .ok_or_else(|| Error::InvalidProblem(format!("block index {} out of range", b)))?;
                if basis.cols != self.degrees[j] + 1 {
                    return Err(Error::InvalidProblem(format!(
                        "bilinear basis {} has {} sample columns, group {} needs {}",
                        b,
                        basis.cols,
                        j,
                        self.degrees[j] + 1
                    )));
                }
            }
        }
        if expected_constraints != self.num_constraints() {
            return Err(Error::InvalidProblem(format!(
                "objective has {} entries, groups define {} constraints",
                self.num_constraints(),
                expected_constraints
            )));
        }

        if self.free_var_matrix.rows != self.num_constraints()
            || self.free_var_matrix.cols != self.dual_dimension()
        {
            return Err(Error::InvalidProblem(format!(
                "free-variable matrix is {}×{}, expected {}×{}",
                self.free_var_matrix.rows,
                self.free_var_matrix.cols,
                self.num_constraints(),
                self.dual_dimension()
            )));
        }

        let mut p = 0;
        for tuples in &self.constraint_indices {
            for t in tuples {
                if t.p != p {
                    return Err(Error::InvalidProblem(format!(
                        "constraint index {} found where {} was expected",
                        t.p, p
                    )));
                }
                if t.r > t.s {
                    return Err(Error::InvalidProblem(format!(
                        "constraint {} has r = {} > s = {}",
                        t.p, t.r, t.s
                    )));
                }
                p += 1;
            }
        }
        if p != self.num_constraints() {
            return Err(Error::InvalidProblem(format!(
                "index tuples cover {} constraints, expected {}",
                p,
                self.num_constraints()
            )));
        }
        Ok(())
    }
}

/// Solver settings and tolerances.
///
/// Thresholds are given as machine floats and lifted to `Real` when a
/// solver is constructed.
#[derive(Debug, Clone)]
pub struct SolverParameters {
    /// Maximum number of interior-point iterations.
    pub max_iterations: usize,

    /// Wall-clock limit in seconds, checked at iteration boundaries.
    pub max_runtime_seconds: u64,

    /// Mantissa bits for every `Real` of the solve.
    pub precision_bits: u32,

    /// Relative duality-gap threshold for optimality.
    pub duality_gap_threshold: f64,

    /// Primal feasibility threshold (max-abs of the primal residues).
    pub primal_error_threshold: f64,

    /// Dual feasibility threshold (max-abs of the dual residues).
    pub dual_error_threshold: f64,

    /// Terminate once ⟨X, Y⟩/dim exceeds this value.
    pub max_complementarity: f64,

    /// Centering parameter β★ used once primal-dual feasible.
    pub feasible_centering_parameter: f64,

    /// Centering parameter β̄ used while infeasible.
    pub infeasible_centering_parameter: f64,

    /// Step-length safety factor γ ∈ (0, 1).
    pub step_length_reduction: f64,

    /// Stop as soon as the iterate is primal feasible.
    pub find_primal_feasible: bool,

    /// Stop as soon as the iterate is dual feasible.
    pub find_dual_feasible: bool,

    /// Report when a full primal step is about to be taken while still
    /// primal infeasible.
    pub detect_primal_feasible_jump: bool,

    /// Report when a full dual step is about to be taken while still
    /// dual infeasible.
    pub detect_dual_feasible_jump: bool,

    /// Print a per-iteration table.
    pub verbose: bool,
}

impl Default for SolverParameters {
    fn default() -> Self {
        SolverParameters {
            max_iterations: 500,
            max_runtime_seconds: 86400,
            precision_bits: 400,
            duality_gap_threshold: 1e-30,
            primal_error_threshold: 1e-30,
            dual_error_threshold: 1e-30,
            max_complementarity: 1e100,
            feasible_centering_parameter: 0.1,
            infeasible_centering_parameter: 0.3,
            step_length_reduction: 0.7,
            find_primal_feasible: false,
            find_dual_feasible: false,
            detect_primal_feasible_jump: false,
            detect_dual_feasible_jump: false,
            verbose: false,
        }
    }
}

/// Why the iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateReason {
    PrimalDualOptimal,
    PrimalFeasible,
    DualFeasible,
    PrimalFeasibleJumpDetected,
    DualFeasibleJumpDetected,
    MaxIterationsExceeded,
    MaxRuntimeExceeded,
    MaxComplementarityExceeded,
}

impl fmt::Display for TerminateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminateReason::PrimalDualOptimal => "found primal-dual optimal solution",
            TerminateReason::PrimalFeasible => "found primal feasible solution",
            TerminateReason::DualFeasible => "found dual feasible solution",
            TerminateReason::PrimalFeasibleJumpDetected => "primal feasible jump detected",
            TerminateReason::DualFeasibleJumpDetected => "dual feasible jump detected",
            TerminateReason::MaxIterationsExceeded => "maxIterations exceeded",
            TerminateReason::MaxRuntimeExceeded => "maxRuntime exceeded",
            TerminateReason::MaxComplementarityExceeded => "maxComplementarity exceeded",
        };
        write!(f, "{}", s)
    }
}

/// Final state of a solve.
#[derive(Debug, Clone)]
pub struct SolveResult {
    pub terminate_reason: TerminateReason,

    /// Iterations completed before stopping.
    pub iterations: usize,

    pub primal_objective: Real,
    pub dual_objective: Real,
    pub duality_gap: Real,
    pub primal_error: Real,
    pub dual_error: Real,

    /// Final primal vector x.
    pub x: Vec<Real>,

    /// Diagonal (free-variable) prefix of the final X.
    pub x_diagonal: Vec<Real>,

    /// Diagonal (free-variable) prefix of the final Y; these are the
    /// dual variables y.
    pub y_diagonal: Vec<Real>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::Matrix;
    use crate::real::{real, zero};
    use rug::Assign;

    /// Minimal one-group, one-block problem.
    fn trivial_sdp() -> Sdp {
        let mut basis = Matrix::new(1, 1);
        basis[(0, 0)].assign(1);
        let mut b = Matrix::new(1, 1);
        b[(0, 0)].assign(1);
        let mut sdp = Sdp {
            bilinear_bases: vec![basis],
            free_var_matrix: b,
            primal_objective_c: vec![real(1)],
            dual_objective_b: vec![real(1)],
            objective_const: zero(),
            dimensions: vec![1],
            degrees: vec![0],
            blocks: vec![vec![0]],
            constraint_indices: Vec::new(),
        };
        sdp.initialize_constraint_indices();
        sdp
    }

    #[test]
    fn test_validate_accepts_trivial() {
        let sdp = trivial_sdp();
        sdp.validate().unwrap();
        assert_eq!(sdp.num_constraints(), 1);
        assert_eq!(sdp.dual_dimension(), 1);
        assert_eq!(sdp.psd_matrix_block_dims(), vec![1]);
        assert_eq!(sdp.bilinear_pairing_block_dims(), vec![1]);
        assert_eq!(sdp.schur_block_dims(), vec![1]);
    }

    #[test]
    fn test_validate_rejects_empty() {
        let mut sdp = trivial_sdp();
        sdp.dimensions.clear();
        assert!(matches!(sdp.validate(), Err(crate::error::Error::InvalidProblem(_))));
    }

    #[test]
    fn test_validate_rejects_wrong_free_var_shape() {
        let mut sdp = trivial_sdp();
        sdp.free_var_matrix = Matrix::new(2, 1);
        assert!(sdp.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_basis_sample_mismatch() {
        let mut sdp = trivial_sdp();
        sdp.bilinear_bases[0] = Matrix::new(1, 3);
        assert!(sdp.validate().is_err());
    }

    #[test]
    fn test_index_tuple_ordering() {
        let mut sdp = trivial_sdp();
        sdp.dimensions = vec![2];
        sdp.degrees = vec![1];
        // dim 2, degree 1: 2·3·(1+1)/2 = 6 constraints
        sdp.primal_objective_c = (0..6).map(|_| zero()).collect();
        sdp.free_var_matrix = Matrix::new(6, 1);
        sdp.bilinear_bases[0] = Matrix::new(1, 2);
        sdp.initialize_constraint_indices();
        sdp.validate().unwrap();

        let tuples = &sdp.constraint_indices[0];
        assert_eq!(tuples.len(), 6);
        assert_eq!(tuples[0], IndexTuple { p: 0, r: 0, s: 0, k: 0 });
        assert_eq!(tuples[2], IndexTuple { p: 2, r: 0, s: 1, k: 0 });
        assert_eq!(tuples[5], IndexTuple { p: 5, r: 1, s: 1, k: 1 });
    }
}
