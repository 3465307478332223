//! Error types surfaced by the solver core.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the solver core.
///
/// Dimension mismatches inside the dense kernels are programming errors
/// and panic via `assert!` rather than appearing here; they must be
/// impossible for a validated problem.
#[derive(Debug, Error)]
pub enum Error {
    /// A Cholesky factorization hit a non-positive pivot. The payload
    /// names the matrix so iteration failures can be attributed.
    #[error("matrix `{0}` is not positive definite")]
    NotPositiveDefinite(&'static str),

    /// The problem data failed validation at assembly time.
    #[error("invalid problem: {0}")]
    InvalidProblem(String),
}
