//! # lieopt
//!
//! Nonlinear least-squares optimization over Lie-group manifolds, built around a
//! factor graph and a Levenberg-Marquardt loop.
//!
//! ## Features
//!
//! - **Manifolds**: SO(4) with closed-form exponential map and a Cayley chart,
//!   SE(2) planar poses and Euclidean Rⁿ variables
//! - **Factor graph**: heterogeneous key-indexed values, noise models and
//!   prior/between/observation/Frobenius factors
//! - **Optimizer**: Levenberg-Marquardt with identity or diagonal damping and an
//!   externally supplied variable ordering
//! - **Linear algebra**: sparse Cholesky and sparse QR backends built on faer

pub mod core;
pub mod error;
pub mod factors;
pub mod linalg;
pub mod logger;
pub mod manifold;
pub mod optimizer;

pub use core::{
    factor::Factor,
    graph::FactorGraph,
    key::Key,
    noise_model::NoiseModel,
    ordering::Ordering,
    values::{ValueType, Values, VariableEnum, VectorValues},
};
pub use error::{LieOptError, LieOptResult};
pub use factors::{
    BetweenFactor, FrobeniusBetweenFactor, FrobeniusPriorFactor, LandmarkObservationFactor,
    PriorFactor,
};
pub use linalg::{LinearSolverType, SparseCholeskySolver, SparseQRSolver};
pub use logger::{init_logger, init_logger_with_level};
pub use manifold::{LieGroup, Manifold, ManifoldType, rn::Rn, se2::SE2, so4::SO4};
pub use optimizer::{
    OptimizerState, SolverResult,
    levenberg_marquardt::{
        DampingMode, LevenbergMarquardt, LevenbergMarquardtConfig, LevenbergMarquardtState,
        LmVerbosity,
    },
};
