//! SO(4) factors in the ambient matrix space.
//!
//! Both residuals are differences of column-major vectorized 4×4 matrices, so
//! their dimension is 16 and no logarithm is involved. Perturbations follow
//! `Q ↦ Q · Retract(ξ)`, whose first-order term is `Q · Hat(ξ)`.

use super::hstack;
use crate::core::factor::Factor;
use crate::core::key::Key;
use crate::core::noise_model::NoiseModel;
use crate::core::values::Values;
use crate::error::LieOptResult;
use crate::manifold::so4::{Matrix16x6, SO4, Vector16};
use nalgebra::{DMatrix, DVector};

fn to_dvector(v: &Vector16) -> DVector<f64> {
    DVector::from_column_slice(v.as_slice())
}

fn to_dmatrix(m: &Matrix16x6) -> DMatrix<f64> {
    DMatrix::from_column_slice(16, 6, m.as_slice())
}

/// `r = vec(Q) - vec(M)` for a known rotation `M`.
#[derive(Debug, Clone)]
pub struct FrobeniusPriorFactor {
    keys: [Key; 1],
    measured: Vector16,
    noise_model: NoiseModel,
}

impl FrobeniusPriorFactor {
    pub fn new(key: Key, measured: &SO4, noise_model: NoiseModel) -> Self {
        FrobeniusPriorFactor {
            keys: [key],
            measured: measured.vec(None),
            noise_model,
        }
    }
}

impl Factor for FrobeniusPriorFactor {
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
        let q: &SO4 = values.at(self.keys[0])?;
        if !compute_jacobian {
            return Ok((to_dvector(&(q.vec(None) - self.measured)), None));
        }
        let mut h = Matrix16x6::zeros();
        let residual = q.vec(Some(&mut h)) - self.measured;
        Ok((to_dvector(&residual), Some(to_dmatrix(&h))))
    }
}

/// `r = vec(Q₁ · Z) - vec(Q₂)` for a measured relative rotation `Z`.
#[derive(Debug, Clone)]
pub struct FrobeniusBetweenFactor {
    keys: [Key; 2],
    measured: SO4,
    noise_model: NoiseModel,
}

impl FrobeniusBetweenFactor {
    pub fn new(key_1: Key, key_2: Key, measured: SO4, noise_model: NoiseModel) -> Self {
        FrobeniusBetweenFactor {
            keys: [key_1, key_2],
            measured,
            noise_model,
        }
    }

    pub fn measured(&self) -> &SO4 {
        &self.measured
    }
}

impl Factor for FrobeniusBetweenFactor {
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
        let q1: &SO4 = values.at(self.keys[0])?;
        let q2: &SO4 = values.at(self.keys[1])?;
        let predicted = q1.matrix() * self.measured.matrix();
        let predicted_vec = Vector16::from_column_slice(predicted.as_slice());

        if !compute_jacobian {
            return Ok((to_dvector(&(predicted_vec - q2.vec(None))), None));
        }

        // column i: vec(Q₁ · Gᵢ · Z)
        let mut h1 = Matrix16x6::zeros();
        for (i, g) in SO4::generators().iter().enumerate() {
            let column = q1.matrix() * g * self.measured.matrix();
            h1.set_column(i, &Vector16::from_column_slice(column.as_slice()));
        }
        let mut h2 = Matrix16x6::zeros();
        let residual = predicted_vec - q2.vec(Some(&mut h2));

        let jacobian = hstack(&[&to_dmatrix(&h1), &to_dmatrix(&-h2)]);
        Ok((to_dvector(&residual), Some(jacobian)))
    }
}
