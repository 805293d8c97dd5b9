//! Sparse linear algebra for the optimizer's inner step.
//!
//! Linearization produces a [`LinearSystem`] holding both the whitened Jacobian
//! and the normal equations it induces. A [`LinearSolver`] then solves the damped
//! step equation
//!
//! ```text
//! (H + diag(d)) δ = -g,    H = JᵀJ,  g = Jᵀr
//! ```
//!
//! Two backends are provided, both on top of faer's sparse module:
//! - [`SparseCholeskySolver`]: LLᵀ on the damped normal equations, with the
//!   symbolic analysis reused while the sparsity pattern stays the same
//! - [`SparseQRSolver`]: QR on the augmented least-squares problem
//!   `[J; √D] δ ≈ [-r; 0]`, which never squares the condition number

use faer::sparse::Triplet;
use nalgebra::DVector;
use std::fmt;
use thiserror::Error;

pub mod cholesky;
pub mod qr;

pub use cholesky::SparseCholeskySolver;
pub use qr::SparseQRSolver;

/// Type alias for sparse matrices using faer
pub type SparseMatrix = faer::sparse::SparseColMat<usize, f64>;

/// Errors raised by the linear solvers.
#[derive(Debug, Clone, Error)]
pub enum LinAlgError {
    /// Symbolic or numeric factorization failed
    #[error("Matrix factorization failed: {0}")]
    FactorizationFailed(String),
    /// The damped system is not positive definite or is rank deficient
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),
    /// Inputs have inconsistent shapes
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Triplets could not be assembled into a sparse matrix
    #[error("Matrix conversion failed: {0}")]
    MatrixConversion(String),
}

pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// A linearized problem: `rows` whitened residuals over `dim` tangent columns.
#[derive(Debug, Clone)]
pub struct LinearSystem {
    pub dim: usize,
    pub rows: usize,
    /// Error at the linearization point, `½‖r‖²`
    pub error: f64,
    /// Whitened residual `r`
    pub residual: DVector<f64>,
    /// Whitened Jacobian `J` as triplets
    pub jacobian: Vec<Triplet<usize, usize, f64>>,
    /// `JᵀJ` as triplets, both triangles; duplicates are summed on assembly
    pub hessian: Vec<Triplet<usize, usize, f64>>,
    /// `Jᵀr`
    pub gradient: DVector<f64>,
    /// Diagonal of `JᵀJ`
    pub hessian_diagonal: DVector<f64>,
}

/// Solver for the damped step equation.
pub trait LinearSolver: Send {
    /// Solve `(H + diag(damping)) δ = -g` for `δ`.
    fn solve(&mut self, system: &LinearSystem, damping: &DVector<f64>)
    -> LinAlgResult<DVector<f64>>;
}

/// Available linear solver backends.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinearSolverType {
    #[default]
    SparseCholesky,
    SparseQR,
}

impl LinearSolverType {
    pub fn create(self) -> Box<dyn LinearSolver> {
        match self {
            LinearSolverType::SparseCholesky => Box::new(SparseCholeskySolver::new()),
            LinearSolverType::SparseQR => Box::new(SparseQRSolver::new()),
        }
    }
}

impl fmt::Display for LinearSolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinearSolverType::SparseCholesky => write!(f, "Sparse Cholesky"),
            LinearSolverType::SparseQR => write!(f, "Sparse QR"),
        }
    }
}

pub(crate) fn check_damping(system: &LinearSystem, damping: &DVector<f64>) -> LinAlgResult<()> {
    if damping.len() != system.dim {
        return Err(LinAlgError::InvalidInput(format!(
            "damping has length {}, system has {} unknowns",
            damping.len(),
            system.dim
        )));
    }
    Ok(())
}

/// Copy a faer column into an nalgebra vector, rejecting non-finite entries.
pub(crate) fn finite_solution(solution: &faer::Mat<f64>, n: usize) -> LinAlgResult<DVector<f64>> {
    let delta = DVector::from_fn(n, |i, _| solution[(i, 0)]);
    if delta.iter().all(|v| v.is_finite()) {
        Ok(delta)
    } else {
        Err(LinAlgError::SingularMatrix(
            "solution has non-finite entries".to_string(),
        ))
    }
}
