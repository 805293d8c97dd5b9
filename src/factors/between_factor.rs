use super::hstack;
use crate::core::factor::Factor;
use crate::core::key::Key;
use crate::core::noise_model::NoiseModel;
use crate::core::values::{ValueType, Values};
use crate::error::LieOptResult;
use nalgebra::{DMatrix, DVector};

/// Generic between factor for Lie group relative constraints.
///
/// Represents a relative measurement `z` between two variables `xᵢ` and `xⱼ` of
/// the same group (odometry between SE(2) poses, a difference between two Rⁿ
/// vectors, ...). The residual is
///
/// ```text
/// r = Log(z⁻¹ ∘ xᵢ⁻¹ ∘ xⱼ)
/// ```
///
/// # Jacobian Computation
///
/// The Jacobian is obtained by chaining the group derivatives:
/// 1. **Between**: `e = xᵢ⁻¹ ∘ xⱼ` with `∂e/∂xᵢ` and `∂e/∂xⱼ`
/// 2. **Between again**: `d = z⁻¹ ∘ e` with `∂d/∂e`
/// 3. **Logarithm**: `r = Log(d)` with `∂r/∂d`
///
/// ```text
/// J = [ ∂r/∂d · ∂d/∂e · ∂e/∂xᵢ  |  ∂r/∂d · ∂d/∂e · ∂e/∂xⱼ ]
/// ```
///
/// The residual dimension equals the group's degrees of freedom. Groups without
/// a logarithm (SO(4)) report `UnimplementedOperation`; use
/// [`FrobeniusBetweenFactor`](super::FrobeniusBetweenFactor) there.
///
/// # Example
///
/// ```
/// use lieopt::{BetweenFactor, Key, NoiseModel, SE2};
///
/// // robot moved 1m forward
/// let odometry = BetweenFactor::new(
///     Key::symbol('x', 1),
///     Key::symbol('x', 2),
///     SE2::from_xy_angle(1.0, 0.0, 0.0),
///     NoiseModel::diagonal(&[0.01, 0.01, 1f64.to_radians()]).unwrap(),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct BetweenFactor<T: ValueType> {
    keys: [Key; 2],
    measured: T,
    noise_model: NoiseModel,
}

impl<T: ValueType> BetweenFactor<T> {
    pub fn new(key_i: Key, key_j: Key, measured: T, noise_model: NoiseModel) -> Self {
        BetweenFactor {
            keys: [key_i, key_j],
            measured,
            noise_model,
        }
    }

    /// The measured relative value `z`.
    pub fn measured(&self) -> &T {
        &self.measured
    }
}

impl<T: ValueType> Factor for BetweenFactor<T> {
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
        let x_i: &T = values.at(self.keys[0])?;
        let x_j: &T = values.at(self.keys[1])?;

        if !compute_jacobian {
            let relative = x_i.between(x_j, None, None);
            let residual = self.measured.between(&relative, None, None).logmap(None)?;
            return Ok((residual, None));
        }

        let mut j_e_i = DMatrix::zeros(0, 0);
        let mut j_e_j = DMatrix::zeros(0, 0);
        let relative = x_i.between(x_j, Some(&mut j_e_i), Some(&mut j_e_j));

        let mut j_d_e = DMatrix::zeros(0, 0);
        let difference = self.measured.between(&relative, None, Some(&mut j_d_e));

        let mut j_log = DMatrix::zeros(0, 0);
        let residual = difference.logmap(Some(&mut j_log))?;

        let j_chain = j_log * j_d_e;
        let jacobian = hstack(&[&(&j_chain * j_e_i), &(&j_chain * j_e_j)]);
        Ok((residual, Some(jacobian)))
    }
}
