//! Arbitrary-precision interior-point solver for polynomial matrix
//! programs.
//!
//! The crate solves semidefinite programs of the form
//!
//! ```text
//! maximize    c·x + const
//! subject to  Σ_p x_p·F_p − X = F_0,   X ⪰ 0
//! ```
//!
//! where the constraint matrices F_p arise from sampling
//! matrix-polynomial positivity conditions with bilinear bases, and
//! free variables couple in through a diagonal prefix. Every scalar is
//! an MPFR float at a user-selected precision; there is no
//! machine-float arithmetic anywhere in the iteration.
//!
//! The pieces:
//!
//! - [`real`]: the arbitrary-precision scalar layer.
//! - [`linalg`]: dense kernels (GEMM, Cholesky, symmetric
//!   eigenvalues, bilinear congruences) and block-diagonal algebra.
//! - [`pmp`]: reduction of polynomial matrix programs to the
//!   semidefinite data model.
//! - [`ipm`]: the Mehrotra-style predictor-corrector iteration with
//!   Schur-complement solves.
//!
//! # Example
//!
//! ```ignore
//! use pmp_core::{solve, SolverParameters};
//! use pmp_core::pmp::{bootstrap_polynomial_sdp, monomial_basis};
//!
//! let params = SolverParameters { precision_bits: 200, ..Default::default() };
//! pmp_core::real::set_precision(params.precision_bits);
//! let sdp = bootstrap_polynomial_sdp(&objective, &matrices, &basis, &points, &scalings)?;
//! let result = solve(&sdp, &params)?;
//! println!("{}: {}", result.terminate_reason, result.primal_objective);
//! ```

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod error;
pub mod ipm;
pub mod linalg;
pub mod pmp;
pub mod problem;
pub mod real;

pub use error::{Error, Result};
pub use ipm::Solver;
pub use problem::{IndexTuple, Sdp, SolveResult, SolverParameters, TerminateReason};
pub use real::Real;

/// Solve an assembled problem with the given parameters.
///
/// Installs the working precision from `parameters.precision_bits`;
/// the problem itself must have been built under the same precision.
pub fn solve(sdp: &Sdp, parameters: &SolverParameters) -> Result<SolveResult> {
    let mut solver = Solver::new(sdp, parameters.clone())?;
    let reason = solver.run()?;
    Ok(solver.result(reason))
}
