//! Optimization solvers for nonlinear least squares problems.
//!
//! The only algorithm is Levenberg-Marquardt, exposed both as a one-shot
//! [`LevenbergMarquardt::optimize`](levenberg_marquardt::LevenbergMarquardt::optimize)
//! and as a step-by-step [`LevenbergMarquardtState`](levenberg_marquardt::LevenbergMarquardtState).

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub mod levenberg_marquardt;

pub use levenberg_marquardt::LevenbergMarquardt;

/// Errors raised before or around the optimization loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// The ordering does not cover exactly the variables being optimized
    #[error("Ordering mismatch: {0}")]
    OrderingMismatch(String),
}

/// Optimizer state machine.
///
/// ```text
/// Initial → Iterating → { Converged, StoppedNoProgress, ExceededMaxIterations }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerState {
    Initial,
    Iterating,
    /// Error decrease or step size fell below tolerance
    Converged,
    /// No acceptable step within the retry budget (or λ hit its upper bound)
    StoppedNoProgress,
    /// Iteration cap reached
    ExceededMaxIterations,
}

impl OptimizerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OptimizerState::Converged
                | OptimizerState::StoppedNoProgress
                | OptimizerState::ExceededMaxIterations
        )
    }
}

impl fmt::Display for OptimizerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerState::Initial => write!(f, "Initial"),
            OptimizerState::Iterating => write!(f, "Iterating"),
            OptimizerState::Converged => write!(f, "Converged"),
            OptimizerState::StoppedNoProgress => write!(f, "Stopped without progress"),
            OptimizerState::ExceededMaxIterations => write!(f, "Maximum iterations reached"),
        }
    }
}

/// Detailed convergence information.
#[derive(Debug, Clone)]
pub struct ConvergenceInfo {
    /// Gradient norm at the last linearization point
    pub final_gradient_norm: f64,
    /// Norm of the last computed step
    pub final_parameter_update_norm: f64,
    /// Cost function evaluation count
    pub cost_evaluations: usize,
    /// Jacobian evaluation count
    pub jacobian_evaluations: usize,
}

impl fmt::Display for ConvergenceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Final gradient norm: {:.2e}, Final parameter update norm: {:.2e}, Cost evaluations: {}, Jacobian evaluations: {}",
            self.final_gradient_norm,
            self.final_parameter_update_norm,
            self.cost_evaluations,
            self.jacobian_evaluations
        )
    }
}

/// Result of a solver execution.
#[derive(Debug, Clone)]
pub struct SolverResult<T> {
    /// Final parameters
    pub parameters: T,
    /// Terminal optimizer state
    pub status: OptimizerState,
    /// Initial cost value
    pub init_cost: f64,
    /// Final cost value
    pub final_cost: f64,
    /// Number of accepted iterations
    pub iterations: usize,
    /// Total time elapsed
    pub elapsed_time: Duration,
    /// Convergence statistics
    pub convergence_info: Option<ConvergenceInfo>,
}
