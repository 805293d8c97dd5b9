//! Levenberg-Marquardt algorithm implementation.
//!
//! The Levenberg-Marquardt algorithm interpolates between Gauss-Newton and
//! gradient descent by damping the normal equations:
//!
//! ```text
//! (JᵀJ + λD) δ = -Jᵀr
//! ```
//!
//! with `D = I` or `D = diag(JᵀJ)`. Each outer iteration linearizes once and then
//! tries increasing values of λ until a step lowers the error. The step is applied
//! through every variable's own retraction, so manifold variables stay on their
//! manifold.
//!
//! This implementation includes:
//! - Identity or Jacobian-diagonal damping
//! - A bounded number of λ trials per iteration
//! - Absolute, relative and total error convergence tests plus a step-size test
//! - Sparse Cholesky and sparse QR linear solvers
//! - A step-by-step state machine ([`LevenbergMarquardtState`]) under the
//!   one-shot [`LevenbergMarquardt::optimize`]

use crate::core::graph::FactorGraph;
use crate::core::linearization::{VariableLayout, linearize};
use crate::core::ordering::Ordering;
use crate::core::values::Values;
use crate::error::LieOptResult;
use crate::linalg::{LinearSolver, LinearSolverType, LinearSystem};
use crate::optimizer::{ConvergenceInfo, OptimizerError, OptimizerState, SolverResult};
use nalgebra::DVector;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Shape of the damping term added to the Gram matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DampingMode {
    /// λ·I
    #[default]
    Identity,
    /// λ·diag(JᵀJ), each entry clamped to `[min_diagonal, max_diagonal]`
    Diagonal,
}

/// How much the optimizer logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LmVerbosity {
    #[default]
    Silent,
    /// Error after every accepted iteration and the termination reason
    Error,
    /// Additionally every λ trial
    TryLambda,
}

/// Configuration for [`LevenbergMarquardt`].
#[derive(Debug, Clone)]
pub struct LevenbergMarquardtConfig {
    pub max_iterations: usize,
    pub initial_lambda: f64,
    /// λ is multiplied by this after a rejected step
    pub lambda_increase_factor: f64,
    /// λ is divided by this after an accepted step
    pub lambda_decrease_factor: f64,
    pub lambda_lower_bound: f64,
    pub lambda_upper_bound: f64,
    /// λ trials per iteration
    pub max_tries: usize,
    pub absolute_error_tolerance: f64,
    pub relative_error_tolerance: f64,
    /// Stop once the total error is at or below this
    pub error_tolerance: f64,
    /// Stop once ‖δ‖ falls below this
    pub step_tolerance: f64,
    pub damping_mode: DampingMode,
    pub min_diagonal: f64,
    pub max_diagonal: f64,
    pub linear_solver_type: LinearSolverType,
    pub verbosity: LmVerbosity,
}

impl Default for LevenbergMarquardtConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            initial_lambda: 1e-5,
            lambda_increase_factor: 10.0,
            lambda_decrease_factor: 10.0,
            lambda_lower_bound: 0.0,
            lambda_upper_bound: 1e5,
            max_tries: 10,
            absolute_error_tolerance: 1e-5,
            relative_error_tolerance: 1e-5,
            error_tolerance: 0.0,
            step_tolerance: 1e-12,
            damping_mode: DampingMode::Identity,
            min_diagonal: 1e-6,
            max_diagonal: 1e32,
            linear_solver_type: LinearSolverType::SparseCholesky,
            verbosity: LmVerbosity::Silent,
        }
    }
}

impl LevenbergMarquardtConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_initial_lambda(mut self, lambda: f64) -> Self {
        self.initial_lambda = lambda;
        self
    }

    pub fn with_lambda_factors(mut self, increase: f64, decrease: f64) -> Self {
        self.lambda_increase_factor = increase;
        self.lambda_decrease_factor = decrease;
        self
    }

    pub fn with_lambda_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lambda_lower_bound = lower;
        self.lambda_upper_bound = upper;
        self
    }

    pub fn with_max_tries(mut self, max_tries: usize) -> Self {
        self.max_tries = max_tries;
        self
    }

    pub fn with_absolute_error_tolerance(mut self, tolerance: f64) -> Self {
        self.absolute_error_tolerance = tolerance;
        self
    }

    pub fn with_relative_error_tolerance(mut self, tolerance: f64) -> Self {
        self.relative_error_tolerance = tolerance;
        self
    }

    pub fn with_error_tolerance(mut self, tolerance: f64) -> Self {
        self.error_tolerance = tolerance;
        self
    }

    pub fn with_step_tolerance(mut self, tolerance: f64) -> Self {
        self.step_tolerance = tolerance;
        self
    }

    pub fn with_damping_mode(mut self, mode: DampingMode) -> Self {
        self.damping_mode = mode;
        self
    }

    pub fn with_diagonal_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_diagonal = min;
        self.max_diagonal = max;
        self
    }

    pub fn with_linear_solver_type(mut self, solver: LinearSolverType) -> Self {
        self.linear_solver_type = solver;
        self
    }

    pub fn with_verbosity(mut self, verbosity: LmVerbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Reject settings under which the loop could not make progress or terminate.
    pub fn validate(&self) -> Result<(), OptimizerError> {
        let invalid = |msg: String| Err(OptimizerError::InvalidConfiguration(msg));
        if !(self.initial_lambda > 0.0 && self.initial_lambda.is_finite()) {
            return invalid(format!(
                "initial_lambda must be positive, got {}",
                self.initial_lambda
            ));
        }
        if !(self.lambda_increase_factor > 1.0) {
            return invalid(format!(
                "lambda_increase_factor must exceed 1, got {}",
                self.lambda_increase_factor
            ));
        }
        if !(self.lambda_decrease_factor >= 1.0) {
            return invalid(format!(
                "lambda_decrease_factor must be at least 1, got {}",
                self.lambda_decrease_factor
            ));
        }
        if !(self.lambda_lower_bound >= 0.0 && self.lambda_lower_bound <= self.lambda_upper_bound)
        {
            return invalid(format!(
                "lambda bounds [{}, {}] are inverted or negative",
                self.lambda_lower_bound, self.lambda_upper_bound
            ));
        }
        if self.max_tries == 0 {
            return invalid("max_tries must be positive".to_string());
        }
        if self.absolute_error_tolerance < 0.0
            || self.relative_error_tolerance < 0.0
            || self.step_tolerance < 0.0
        {
            return invalid("tolerances must be non-negative".to_string());
        }
        if !(self.min_diagonal > 0.0 && self.min_diagonal <= self.max_diagonal) {
            return invalid(format!(
                "diagonal bounds [{}, {}] are invalid",
                self.min_diagonal, self.max_diagonal
            ));
        }
        Ok(())
    }
}

/// Summary statistics for the Levenberg-Marquardt optimization process.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardtSummary {
    pub status: OptimizerState,
    pub initial_cost: f64,
    pub final_cost: f64,
    /// Accepted iterations
    pub iterations: usize,
    /// λ trials that lowered the error
    pub successful_steps: usize,
    /// λ trials that were rejected or whose linear solve failed
    pub unsuccessful_steps: usize,
    pub final_damping: f64,
    pub max_gradient_norm: f64,
    pub final_gradient_norm: f64,
    pub max_parameter_update_norm: f64,
    pub final_parameter_update_norm: f64,
    pub total_time: Duration,
}

impl fmt::Display for LevenbergMarquardtSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trials = (self.successful_steps + self.unsuccessful_steps).max(1) as f64;
        writeln!(f, "=== Levenberg-Marquardt Optimization Summary ===")?;
        writeln!(f, "Status:                    {}", self.status)?;
        writeln!(f, "Initial cost:              {:.6e}", self.initial_cost)?;
        writeln!(f, "Final cost:                {:.6e}", self.final_cost)?;
        writeln!(
            f,
            "Cost reduction:            {:.6e} ({:.2}%)",
            self.initial_cost - self.final_cost,
            100.0 * (self.initial_cost - self.final_cost) / self.initial_cost.max(1e-12)
        )?;
        writeln!(f, "Total iterations:          {}", self.iterations)?;
        writeln!(
            f,
            "Successful steps:          {} ({:.1}%)",
            self.successful_steps,
            100.0 * self.successful_steps as f64 / trials
        )?;
        writeln!(
            f,
            "Unsuccessful steps:        {} ({:.1}%)",
            self.unsuccessful_steps,
            100.0 * self.unsuccessful_steps as f64 / trials
        )?;
        writeln!(f, "Final damping parameter:   {:.6e}", self.final_damping)?;
        writeln!(f, "Max gradient norm:         {:.6e}", self.max_gradient_norm)?;
        writeln!(f, "Final gradient norm:       {:.6e}", self.final_gradient_norm)?;
        writeln!(
            f,
            "Max parameter update norm: {:.6e}",
            self.max_parameter_update_norm
        )?;
        writeln!(
            f,
            "Final param update norm:   {:.6e}",
            self.final_parameter_update_norm
        )?;
        writeln!(f, "Total time:                {:?}", self.total_time)
    }
}

#[derive(Debug, Clone, Default)]
struct Statistics {
    successful_steps: usize,
    unsuccessful_steps: usize,
    cost_evaluations: usize,
    jacobian_evaluations: usize,
    max_gradient_norm: f64,
    final_gradient_norm: f64,
    max_step_norm: f64,
    final_step_norm: f64,
}

/// The optimizer state machine, advanced one outer iteration at a time.
///
/// Holds the current values, their error, the damping λ and the count of
/// accepted iterations. The graph is borrowed and never modified.
pub struct LevenbergMarquardtState<'a> {
    graph: &'a FactorGraph,
    config: LevenbergMarquardtConfig,
    layout: VariableLayout,
    solver: Box<dyn LinearSolver>,
    values: Values,
    initial_error: f64,
    error: f64,
    lambda: f64,
    iterations: usize,
    state: OptimizerState,
    stats: Statistics,
}

impl<'a> LevenbergMarquardtState<'a> {
    /// Validate the inputs and evaluate the initial error.
    pub fn new(
        graph: &'a FactorGraph,
        initial: Values,
        ordering: &Ordering,
        config: LevenbergMarquardtConfig,
    ) -> LieOptResult<Self> {
        config.validate()?;
        let layout = VariableLayout::new(ordering, &initial)?;
        let error = graph.error(&initial)?;
        let solver = config.linear_solver_type.create();

        if config.verbosity >= LmVerbosity::Error {
            info!(
                "Levenberg-Marquardt: {} factors, {} variables ({} dof), initial error {:.6e}",
                graph.len(),
                initial.len(),
                layout.dim(),
                error
            );
        }

        Ok(Self {
            graph,
            lambda: config.initial_lambda,
            config,
            layout,
            solver,
            values: initial,
            initial_error: error,
            error,
            iterations: 0,
            state: OptimizerState::Initial,
            stats: Statistics {
                cost_evaluations: 1,
                ..Statistics::default()
            },
        })
    }

    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn initial_error(&self) -> f64 {
        self.initial_error
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn into_values(self) -> Values {
        self.values
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    /// Run one outer iteration: linearize, then try λ values until a step is
    /// accepted or the retry budget runs out.
    ///
    /// Terminal states are sticky. Manifold and factor errors abort with `Err`;
    /// linear solve failures only raise λ.
    pub fn iterate(&mut self) -> LieOptResult<OptimizerState> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }
        if self.iterations >= self.config.max_iterations {
            return Ok(self.finish(OptimizerState::ExceededMaxIterations));
        }
        self.state = OptimizerState::Iterating;

        let system = linearize(self.graph, &self.values, &self.layout)?;
        self.stats.jacobian_evaluations += 1;
        let gradient_norm = system.gradient.norm();
        self.stats.final_gradient_norm = gradient_norm;
        self.stats.max_gradient_norm = self.stats.max_gradient_norm.max(gradient_norm);

        for _ in 0..self.config.max_tries {
            let damping = self.damping(&system);
            let delta = match self.solver.solve(&system, &damping) {
                Ok(delta) => delta,
                Err(e) => {
                    debug!("linear solve failed at lambda {:.3e}: {}", self.lambda, e);
                    if self.config.verbosity >= LmVerbosity::TryLambda {
                        info!("  lambda = {:.6e}: linear solve failed ({})", self.lambda, e);
                    }
                    self.stats.unsuccessful_steps += 1;
                    if !self.increase_lambda() {
                        break;
                    }
                    continue;
                }
            };

            let step_norm = delta.norm();
            self.stats.final_step_norm = step_norm;
            self.stats.max_step_norm = self.stats.max_step_norm.max(step_norm);
            if step_norm < self.config.step_tolerance {
                return Ok(self.finish(OptimizerState::Converged));
            }

            let candidate = self.values.retract(&self.layout.split(&delta))?;
            let new_error = self.graph.error(&candidate)?;
            self.stats.cost_evaluations += 1;
            let accepted = new_error <= self.error;

            if self.config.verbosity >= LmVerbosity::TryLambda {
                info!(
                    "  lambda = {:.6e}, candidate error = {:.6e} [{}]",
                    self.lambda,
                    new_error,
                    if accepted { "ACCEPTED" } else { "REJECTED" }
                );
            }

            if accepted {
                let old_error = self.error;
                self.values = candidate;
                self.error = new_error;
                self.lambda = (self.lambda / self.config.lambda_decrease_factor)
                    .max(self.config.lambda_lower_bound);
                self.iterations += 1;
                self.stats.successful_steps += 1;

                if self.config.verbosity >= LmVerbosity::Error {
                    info!(
                        "iteration {}: error = {:.6e}, lambda = {:.6e}, step = {:.3e}",
                        self.iterations, self.error, self.lambda, step_norm
                    );
                }

                let next = if self.converged(old_error, new_error) {
                    OptimizerState::Converged
                } else if self.iterations >= self.config.max_iterations {
                    OptimizerState::ExceededMaxIterations
                } else {
                    OptimizerState::Iterating
                };
                return Ok(if next.is_terminal() {
                    self.finish(next)
                } else {
                    next
                });
            }

            self.stats.unsuccessful_steps += 1;
            if !self.increase_lambda() {
                break;
            }
        }

        Ok(self.finish(OptimizerState::StoppedNoProgress))
    }

    /// Damping vector for the current λ.
    fn damping(&self, system: &LinearSystem) -> DVector<f64> {
        match self.config.damping_mode {
            DampingMode::Identity => DVector::from_element(system.dim, self.lambda),
            DampingMode::Diagonal => system.hessian_diagonal.map(|d| {
                self.lambda * d.clamp(self.config.min_diagonal, self.config.max_diagonal)
            }),
        }
    }

    /// Raise λ. Returns false once it has passed the upper bound.
    fn increase_lambda(&mut self) -> bool {
        self.lambda *= self.config.lambda_increase_factor;
        self.lambda <= self.config.lambda_upper_bound
    }

    fn converged(&self, old_error: f64, new_error: f64) -> bool {
        if new_error <= self.config.error_tolerance {
            return true;
        }
        let absolute_decrease = old_error - new_error;
        if absolute_decrease <= self.config.absolute_error_tolerance {
            return true;
        }
        old_error > 0.0 && absolute_decrease / old_error <= self.config.relative_error_tolerance
    }

    fn finish(&mut self, state: OptimizerState) -> OptimizerState {
        self.state = state;
        match state {
            OptimizerState::StoppedNoProgress => warn!(
                "Levenberg-Marquardt stopped without progress after {} iterations (lambda {:.3e})",
                self.iterations, self.lambda
            ),
            _ if self.config.verbosity >= LmVerbosity::Error => info!(
                "Levenberg-Marquardt finished: {} after {} iterations, error {:.6e}",
                state, self.iterations, self.error
            ),
            _ => {}
        }
        state
    }

    pub fn convergence_info(&self) -> ConvergenceInfo {
        ConvergenceInfo {
            final_gradient_norm: self.stats.final_gradient_norm,
            final_parameter_update_norm: self.stats.final_step_norm,
            cost_evaluations: self.stats.cost_evaluations,
            jacobian_evaluations: self.stats.jacobian_evaluations,
        }
    }

    pub fn summary(&self, total_time: Duration) -> LevenbergMarquardtSummary {
        LevenbergMarquardtSummary {
            status: self.state,
            initial_cost: self.initial_error,
            final_cost: self.error,
            iterations: self.iterations,
            successful_steps: self.stats.successful_steps,
            unsuccessful_steps: self.stats.unsuccessful_steps,
            final_damping: self.lambda,
            max_gradient_norm: self.stats.max_gradient_norm,
            final_gradient_norm: self.stats.final_gradient_norm,
            max_parameter_update_norm: self.stats.max_step_norm,
            final_parameter_update_norm: self.stats.final_step_norm,
            total_time,
        }
    }
}

/// Levenberg-Marquardt solver for nonlinear least squares optimization.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: LevenbergMarquardtConfig,
    last_summary: Option<LevenbergMarquardtSummary>,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt solver with default configuration.
    pub fn new() -> Self {
        Self::with_config(LevenbergMarquardtConfig::default())
    }

    pub fn with_config(config: LevenbergMarquardtConfig) -> Self {
        Self {
            config,
            last_summary: None,
        }
    }

    pub fn config(&self) -> &LevenbergMarquardtConfig {
        &self.config
    }

    /// Summary of the most recent [`LevenbergMarquardt::optimize`] call.
    pub fn last_summary(&self) -> Option<&LevenbergMarquardtSummary> {
        self.last_summary.as_ref()
    }

    /// Run the state machine from `initial` until it reaches a terminal state.
    ///
    /// `ordering` must list every key of `initial` exactly once; it fixes the
    /// column layout of the linear system.
    pub fn optimize(
        &mut self,
        graph: &FactorGraph,
        initial: &Values,
        ordering: &Ordering,
    ) -> LieOptResult<SolverResult<Values>> {
        let start_time = Instant::now();
        let mut state =
            LevenbergMarquardtState::new(graph, initial.clone(), ordering, self.config.clone())?;

        while !state.state().is_terminal() {
            state.iterate()?;
        }

        let elapsed = start_time.elapsed();
        let summary = state.summary(elapsed);
        if self.config.verbosity >= LmVerbosity::Error {
            info!("{}", summary);
        }
        self.last_summary = Some(summary);

        let convergence_info = state.convergence_info();
        Ok(SolverResult {
            status: state.state(),
            init_cost: state.initial_error(),
            final_cost: state.error(),
            iterations: state.iterations(),
            elapsed_time: elapsed,
            convergence_info: Some(convergence_info),
            parameters: state.into_values(),
        })
    }
}
