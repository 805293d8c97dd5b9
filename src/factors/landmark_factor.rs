use crate::core::CoreError;
use crate::core::factor::Factor;
use crate::core::key::Key;
use crate::core::noise_model::NoiseModel;
use crate::core::values::Values;
use crate::error::LieOptResult;
use crate::manifold::{rn::Rn, se2::SE2};
use nalgebra::{DMatrix, DVector, Vector2};

/// A 2D landmark observed from a planar pose, measured in the robot frame.
///
/// With pose `(R, t)` and landmark `l` the prediction is `h = Rᵀ(l - t)` and the
/// residual `r = h - z`. Jacobian columns are `[pose (3) | landmark (2)]`:
///
/// ```text
/// ∂h/∂ρ = -I₂,   ∂h/∂θ = (h_y, -h_x),   ∂h/∂l = Rᵀ
/// ```
#[derive(Debug, Clone)]
pub struct LandmarkObservationFactor {
    keys: [Key; 2],
    measured: Vector2<f64>,
    noise_model: NoiseModel,
}

impl LandmarkObservationFactor {
    pub fn new(
        pose_key: Key,
        landmark_key: Key,
        measured: Vector2<f64>,
        noise_model: NoiseModel,
    ) -> Self {
        LandmarkObservationFactor {
            keys: [pose_key, landmark_key],
            measured,
            noise_model,
        }
    }

    pub fn measured(&self) -> &Vector2<f64> {
        &self.measured
    }
}

impl Factor for LandmarkObservationFactor {
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
        let pose: &SE2 = values.at(self.keys[0])?;
        let landmark: &Rn = values.at(self.keys[1])?;
        if landmark.len() != 2 {
            return Err(CoreError::DimensionMismatch(format!(
                "landmark {} has dimension {}, expected 2",
                self.keys[1],
                landmark.len()
            ))
            .into());
        }

        let point = Vector2::new(landmark.data()[0], landmark.data()[1]);
        let predicted = pose.transform_to(&point);
        let error = predicted - self.measured;
        let residual = DVector::from_column_slice(error.as_slice());

        if !compute_jacobian {
            return Ok((residual, None));
        }

        let rt = pose.rotation_matrix().transpose();
        let mut jacobian = DMatrix::zeros(2, 5);
        jacobian[(0, 0)] = -1.0;
        jacobian[(1, 1)] = -1.0;
        jacobian[(0, 2)] = predicted.y;
        jacobian[(1, 2)] = -predicted.x;
        jacobian.view_mut((0, 3), (2, 2)).copy_from(&rt);
        Ok((residual, Some(jacobian)))
    }
}
