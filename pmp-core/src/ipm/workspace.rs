//! Pre-allocated scratch buffers for the interior-point iteration.
//!
//! Everything the per-iteration path scribbles on is allocated once
//! when the solver is built, sized from the problem's block-dimension
//! vectors, and reused across iterations.

use crate::linalg::block::BlockDiagonalMatrix;
use crate::linalg::eigen::{EigenScratch, LanczosWorkspace};
use crate::linalg::{zero_vector, Matrix, Vector};
use crate::problem::Sdp;

pub struct SolverWorkspace {
    /// Block-wise scratch for Cholesky factorizations of X and Y.
    pub block_cholesky_work: BlockDiagonalMatrix,

    /// Per-basis workspace for the bilinear pairing congruences:
    /// psd-block rows × pairing-block cols.
    pub bilinear_pairings_work: Vec<Matrix>,

    /// Per-block operand and result of the step-length congruence
    /// L·dX·Lᵀ.
    pub step_congruence_work: Vec<Matrix>,
    pub step_congruence_out: Vec<Matrix>,

    /// Eigenvalue output sized to the largest positivity block.
    pub eigenvalues: Vector,
    pub eigen_scratch: EigenScratch,
    pub lanczos: LanczosWorkspace,
}

impl SolverWorkspace {
    pub fn new(sdp: &Sdp) -> Self {
        let psd_dims = sdp.psd_matrix_block_dims();
        let pairing_dims = sdp.bilinear_pairing_block_dims();
        let max_block = psd_dims.iter().copied().max().unwrap_or(0);

        let bilinear_pairings_work = psd_dims
            .iter()
            .zip(pairing_dims.iter())
            .map(|(&rows, &cols)| Matrix::new(rows, cols))
            .collect();
        let step_congruence_work = psd_dims.iter().map(|&n| Matrix::new(n, n)).collect();
        let step_congruence_out = psd_dims.iter().map(|&n| Matrix::new(n, n)).collect();

        SolverWorkspace {
            block_cholesky_work: BlockDiagonalMatrix::new(sdp.dual_dimension(), &psd_dims),
            bilinear_pairings_work,
            step_congruence_work,
            step_congruence_out,
            eigenvalues: zero_vector(max_block),
            eigen_scratch: EigenScratch::new(max_block),
            lanczos: LanczosWorkspace::new(max_block),
        }
    }
}
