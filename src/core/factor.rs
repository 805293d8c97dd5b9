//! The factor interface.
//!
//! A factor is a measurement constraint over a small set of variables. It
//! computes a raw residual and, on request, the Jacobian of that residual with
//! respect to the tangent spaces of its variables. Whitening by the noise model
//! happens outside the factor.

use crate::core::key::Key;
use crate::core::noise_model::NoiseModel;
use crate::core::values::Values;
use crate::error::LieOptResult;
use nalgebra::{DMatrix, DVector};

/// A residual term of the least-squares objective.
///
/// Implementors only provide [`Factor::linearize`]; error evaluation is derived.
pub trait Factor: Send + Sync {
    /// Keys of the variables this factor touches, in Jacobian column order.
    fn keys(&self) -> &[Key];

    /// Residual dimension.
    fn dim(&self) -> usize {
        self.noise_model().dim()
    }

    fn noise_model(&self) -> &NoiseModel;

    /// Raw (unwhitened) residual and optionally its Jacobian.
    ///
    /// The Jacobian has `dim()` rows and one column block per key, in the order
    /// of [`Factor::keys`], each as wide as that variable's tangent dimension.
    fn linearize(
        &self,
        values: &Values,
        compute_jacobian: bool,
    ) -> LieOptResult<(DVector<f64>, Option<DMatrix<f64>>)>;

    fn whitened_residual(&self, values: &Values) -> LieOptResult<DVector<f64>> {
        let (residual, _) = self.linearize(values, false)?;
        Ok(self.noise_model().whiten(&residual)?)
    }

    /// Contribution `½‖r̃‖²` to the total error.
    fn error(&self, values: &Values) -> LieOptResult<f64> {
        Ok(0.5 * self.whitened_residual(values)?.norm_squared())
    }
}
