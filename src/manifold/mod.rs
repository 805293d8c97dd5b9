//! Manifold representations for optimization on non-Euclidean spaces.
//!
//! This module provides the manifolds variables can live on:
//! - **SO(4)**: rotations in 4D, closed-form exponential and a Cayley chart
//! - **SE(2)**: rigid transformations in 2D
//! - **Rⁿ**: plain Euclidean vectors
//!
//! Lie group M,° | size | dim | X ∈ M             | Constraint | T_X M      | Exp(T)        | Comp.
//! ------------- | ---- | --- | ----------------- | ---------- | ---------- | ------------- | -----
//! n-D vector    | Rⁿ,+ | n   | v ∈ Rⁿ            | none       | v ∈ Rⁿ     | v = exp(v)    | v₁+v₂
//! Rigid motion  | SE(2)| 3   | M = [R t; 0 1]    | RᵀR = I    | [v̂] ∈ R³   | Exp([v̂])      | M₁M₂
//! Rotation      | SO(4)| 6   | Q ∈ R⁴ˣ⁴          | QᵀQ = I    | ξ ∈ R⁶     | Q = exp(ξ^)   | Q₁Q₂
//!
//! Two traits split the capabilities:
//! - [`Manifold`]: what the optimizer needs, a dimension and a chart
//!   (`retract` / `local_coordinates`) around any element.
//! - [`LieGroup`]: group structure, exponential and logarithm maps and the
//!   adjoint, with Jacobians under the right-perturbation convention
//!   `X ⊕ τ = X ∘ Exp(τ)`.
//!
//! The traits are used through generics only, so factors and the values container
//! dispatch statically. Jacobians are passed as `Option<&mut DMatrix<f64>>` and
//! are only written when the caller asks for them.

use nalgebra::{DMatrix, DVector};
use std::fmt::{self, Debug};
use thiserror::Error;

pub mod rn;
pub mod se2;
pub mod so4;

/// Errors that can occur during manifold operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManifoldError {
    /// The operation (or the requested Jacobian) has no implementation
    #[error("Unimplemented operation: {0}")]
    UnimplementedOperation(String),
    /// Eigenvalues of a skew-symmetric matrix did not come in conjugate imaginary pairs
    #[error("Invalid eigenstructure: {0}")]
    InvalidEigenstructure(String),
    /// Invalid tangent vector dimension
    #[error("Invalid tangent dimension: expected {expected}, got {actual}")]
    InvalidTangentDimension { expected: usize, actual: usize },
    /// Numerical instability in computation
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),
    /// Invalid manifold element
    #[error("Invalid manifold element: {0}")]
    InvalidElement(String),
}

/// Result type for manifold operations.
pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Tag for the manifold a variable lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifoldType {
    RN,
    SE2,
    SO4,
}

impl fmt::Display for ManifoldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifoldType::RN => write!(f, "Rn"),
            ManifoldType::SE2 => write!(f, "SE2"),
            ManifoldType::SO4 => write!(f, "SO4"),
        }
    }
}

/// Checks that a tangent vector has the expected length.
pub(crate) fn check_tangent_dim(expected: usize, actual: usize) -> ManifoldResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ManifoldError::InvalidTangentDimension { expected, actual })
    }
}

/// A smooth space with a chart around every element.
///
/// This is the capability the optimizer relies on: it perturbs each variable by a
/// tangent increment with [`Manifold::retract`] and never touches the underlying
/// representation directly.
pub trait Manifold: Clone + Debug + Send + Sync + 'static {
    /// Tangent space dimension (degrees of freedom).
    fn dim(&self) -> usize;

    /// Move away from `self` along the tangent increment `delta`.
    fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<Self>;

    /// Tangent increment that takes `self` to `other`, inverse of [`Manifold::retract`].
    fn local_coordinates(&self, other: &Self) -> ManifoldResult<DVector<f64>>;

    /// Approximate equality with an absolute tolerance.
    fn equals(&self, other: &Self, tolerance: f64) -> bool;
}

/// Group structure on top of a [`Manifold`].
///
/// Jacobians follow the right-perturbation convention: the derivative of `f(X)`
/// is taken with respect to `τ` in `f(X ∘ Exp(τ))`.
pub trait LieGroup: Manifold {
    /// Group composition `self ∘ other`.
    ///
    /// # Arguments
    /// * `jacobian_self` - Optional Jacobian with respect to `self`
    /// * `jacobian_other` - Optional Jacobian with respect to `other`
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut DMatrix<f64>>,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> Self;

    /// Group inverse, with optional Jacobian `-Ad(self)`.
    fn inverse(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self;

    /// Relative element `self⁻¹ ∘ other`.
    ///
    /// Jacobians are chained from [`LieGroup::inverse`] and [`LieGroup::compose`].
    fn between(
        &self,
        other: &Self,
        jacobian_self: Option<&mut DMatrix<f64>>,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> Self {
        match jacobian_self {
            Some(jacobian_self) => {
                let mut j_inverse = DMatrix::zeros(0, 0);
                let mut j_compose = DMatrix::zeros(0, 0);
                let inverse = self.inverse(Some(&mut j_inverse));
                let result = inverse.compose(other, Some(&mut j_compose), jacobian_other);
                *jacobian_self = j_compose * j_inverse;
                result
            }
            None => self.inverse(None).compose(other, None, jacobian_other),
        }
    }

    /// Exponential map at the identity.
    ///
    /// The Jacobian, when requested, is the right Jacobian of the group.
    fn expmap(tangent: &DVector<f64>, jacobian: Option<&mut DMatrix<f64>>) -> ManifoldResult<Self>;

    /// Logarithm map, inverse of [`LieGroup::expmap`].
    ///
    /// The Jacobian, when requested, is the inverse right Jacobian at the result.
    fn logmap(&self, jacobian: Option<&mut DMatrix<f64>>) -> ManifoldResult<DVector<f64>>;

    /// Adjoint matrix `Ad(self)`, transporting tangent vectors at the identity to `self`.
    fn adjoint_map(&self) -> DMatrix<f64>;
}
