use crate::core::factor::Factor;
use crate::core::key::Key;
use crate::core::noise_model::NoiseModel;
use crate::core::values::{ValueType, Values};
use crate::error::LieOptResult;
use nalgebra::{DMatrix, DVector};

/// Unary constraint pulling a variable towards a known value.
///
/// ```text
/// r = Log(prior⁻¹ ∘ x)
/// ```
///
/// The Jacobian is `J_log · J_between`, i.e. the inverse right Jacobian of the
/// group at `r`. Requires a logarithm, so it is not usable on SO(4).
#[derive(Debug, Clone)]
pub struct PriorFactor<T: ValueType> {
    keys: [Key; 1],
    prior: T,
    noise_model: NoiseModel,
}

impl<T: ValueType> PriorFactor<T> {
    pub fn new(key: Key, prior: T, noise_model: NoiseModel) -> Self {
        PriorFactor {
            keys: [key],
            prior,
            noise_model,
        }
    }

    pub fn prior(&self) -> &T {
        &self.prior
    }
}

impl<T: ValueType> Factor for PriorFactor<T> {
    fn keys(&self) -> &[Key] {
        &self.keys
    }

    fn noise_model(&self) -> &NoiseModel {
        &self.noise_model
    }

    fn linearize(
        &self,
        values: &Values,
        compute_jacobian: bool,
    ) -> LieOptResult<(DVector<f64>, Option<DMatrix<f64>>)> {
        let x: &T = values.at(self.keys[0])?;

        if !compute_jacobian {
            let residual = self.prior.between(x, None, None).logmap(None)?;
            return Ok((residual, None));
        }

        let mut j_between = DMatrix::zeros(0, 0);
        let mut j_log = DMatrix::zeros(0, 0);
        let difference = self.prior.between(x, None, Some(&mut j_between));
        let residual = difference.logmap(Some(&mut j_log))?;
        Ok((residual, Some(j_log * j_between)))
    }
}
