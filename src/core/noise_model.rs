//! Gaussian noise models.
//!
//! A noise model turns a raw residual into a whitened one, `r̃ = Σ^{-1/2} r`,
//! so that every factor contributes `½‖r̃‖²` to the total error. The same
//! scaling is applied row-wise to the factor's Jacobian.

use crate::core::CoreError;
use nalgebra::{DMatrix, DVector};

/// Measurement noise attached to a factor.
#[derive(Debug, Clone, PartialEq)]
pub enum NoiseModel {
    /// Identity covariance
    Unit(usize),
    /// Same standard deviation on every component
    Isotropic { dim: usize, sigma: f64 },
    /// One standard deviation per component
    Diagonal(DVector<f64>),
}

impl NoiseModel {
    pub fn unit(dim: usize) -> Self {
        NoiseModel::Unit(dim)
    }

    pub fn isotropic(dim: usize, sigma: f64) -> Result<Self, CoreError> {
        if !(sigma > 0.0 && sigma.is_finite()) {
            return Err(CoreError::InvalidNoiseModel(format!(
                "sigma must be positive, got {sigma}"
            )));
        }
        Ok(NoiseModel::Isotropic { dim, sigma })
    }

    /// Diagonal model from standard deviations.
    pub fn diagonal(sigmas: &[f64]) -> Result<Self, CoreError> {
        if let Some(bad) = sigmas.iter().find(|s| !(**s > 0.0 && s.is_finite())) {
            return Err(CoreError::InvalidNoiseModel(format!(
                "sigmas must be positive, got {bad}"
            )));
        }
        Ok(NoiseModel::Diagonal(DVector::from_column_slice(sigmas)))
    }

    pub fn dim(&self) -> usize {
        match self {
            NoiseModel::Unit(dim) => *dim,
            NoiseModel::Isotropic { dim, .. } => *dim,
            NoiseModel::Diagonal(sigmas) => sigmas.len(),
        }
    }

    /// Inverse standard deviation of row `i`.
    fn precision_sqrt(&self, i: usize) -> f64 {
        match self {
            NoiseModel::Unit(_) => 1.0,
            NoiseModel::Isotropic { sigma, .. } => 1.0 / sigma,
            NoiseModel::Diagonal(sigmas) => 1.0 / sigmas[i],
        }
    }

    fn check_rows(&self, rows: usize) -> Result<(), CoreError> {
        if rows == self.dim() {
            Ok(())
        } else {
            Err(CoreError::DimensionMismatch(format!(
                "noise model has dimension {}, residual has {rows} rows",
                self.dim()
            )))
        }
    }

    pub fn whiten(&self, residual: &DVector<f64>) -> Result<DVector<f64>, CoreError> {
        self.check_rows(residual.len())?;
        Ok(DVector::from_fn(residual.len(), |i, _| {
            residual[i] * self.precision_sqrt(i)
        }))
    }

    pub fn whiten_jacobian(&self, jacobian: &DMatrix<f64>) -> Result<DMatrix<f64>, CoreError> {
        self.check_rows(jacobian.nrows())?;
        let mut whitened = jacobian.clone();
        for (i, mut row) in whitened.row_iter_mut().enumerate() {
            row *= self.precision_sqrt(i);
        }
        Ok(whitened)
    }

    /// Squared Mahalanobis distance `rᵀ Σ⁻¹ r`.
    pub fn squared_mahalanobis(&self, residual: &DVector<f64>) -> Result<f64, CoreError> {
        Ok(self.whiten(residual)?.norm_squared())
    }
}
