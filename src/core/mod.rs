//! Core factor-graph components for the lieopt library
//!
//! This module contains the building blocks of a nonlinear least-squares problem:
//! - Keys naming variables and the externally supplied elimination ordering
//! - The heterogeneous values container and tangent-space increments
//! - Noise models, the factor trait and the factor graph
//! - Linearization of a graph into a sparse linear system

use crate::core::key::Key;
use crate::manifold::ManifoldType;
use thiserror::Error;

pub mod factor;
pub mod graph;
pub mod key;
pub mod linearization;
pub mod noise_model;
pub mod ordering;
pub mod values;

/// Errors raised by values, factors and noise models.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A key was looked up but is not present
    #[error("Variable {0} not found")]
    MissingVariable(Key),
    /// A key was inserted twice
    #[error("Variable {0} already exists")]
    DuplicateKey(Key),
    /// A variable was accessed as the wrong manifold type
    #[error("Variable {key} is {actual}, expected {expected}")]
    TypeMismatch {
        key: Key,
        expected: ManifoldType,
        actual: ManifoldType,
    },
    /// Sigmas must be positive and match the factor dimension
    #[error("Invalid noise model: {0}")]
    InvalidNoiseModel(String),
    /// Residual or Jacobian shape does not match what the factor declared
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}
