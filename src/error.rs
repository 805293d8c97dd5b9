//! Error types for the lieopt library
//!
//! Every module owns a `thiserror` enum describing its own failures. This module
//! ties them together into [`LieOptError`], the error carried by the public API.

use crate::{
    core::CoreError, linalg::LinAlgError, manifold::ManifoldError, optimizer::OptimizerError,
};
use thiserror::Error;

/// Main result type used throughout the lieopt library
pub type LieOptResult<T> = Result<T, LieOptError>;

/// Main error type for the lieopt library
#[derive(Debug, Clone, Error)]
pub enum LieOptError {
    /// Manifold operation errors (unimplemented maps, bad eigenstructure, ...)
    #[error("Manifold error: {0}")]
    Manifold(#[from] ManifoldError),

    /// Values, factor and noise model errors
    #[error("Factor graph error: {0}")]
    Core(#[from] CoreError),

    /// Linear algebra related errors
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(#[from] LinAlgError),

    /// Optimizer configuration and setup errors
    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),
}

impl LieOptError {
    /// True when the error reports an operation that has no implementation.
    pub fn is_unimplemented(&self) -> bool {
        matches!(
            self,
            LieOptError::Manifold(ManifoldError::UnimplementedOperation(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = LieOptError::from(LinAlgError::SingularMatrix("pivot 3".to_string()));
        assert_eq!(
            error.to_string(),
            "Linear algebra error: Singular matrix: pivot 3"
        );
    }

    #[test]
    fn test_from_manifold_error() {
        let error: LieOptError =
            ManifoldError::UnimplementedOperation("SO4::logmap".to_string()).into();
        assert!(error.is_unimplemented());
        assert!(error.to_string().contains("SO4::logmap"));
    }

    #[test]
    fn test_result_err() {
        let result: LieOptResult<i32> = Err(OptimizerError::InvalidConfiguration(
            "max_tries must be positive".to_string(),
        )
        .into());
        match result {
            Err(LieOptError::Optimizer(OptimizerError::InvalidConfiguration(msg))) => {
                assert!(msg.contains("max_tries"))
            }
            _ => panic!("Expected optimizer error"),
        }
    }
}
