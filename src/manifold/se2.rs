//! SE(2) - Special Euclidean Group in 2D
//!
//! This module implements the Special Euclidean group SE(2), which represents
//! rigid body transformations in 2D space (rotation + translation), the usual
//! state of a planar robot.
//!
//! SE(2) elements are stored as a 2D translation and a unit complex rotation.
//! Tangent vectors are [x, y, θ]: the translational part first, then the angle.
//!
//! The conventions follow the [manif](https://github.com/artivis/manif) C++ library:
//! Jacobians are right Jacobians, `X ⊕ τ = X ∘ Exp(τ)`.

use crate::manifold::{LieGroup, Manifold, ManifoldResult, check_tangent_dim};
use nalgebra::{DMatrix, DVector, Matrix2, Matrix3, UnitComplex, Vector2, Vector3};
use std::fmt;

/// Below this angle the series expansions of sin(θ)/θ and (1-cos θ)/θ are used.
const SMALL_ANGLE: f64 = 1e-8;

/// SE(2) group element representing rigid body transformations in 2D.
#[derive(Clone, Debug, PartialEq)]
pub struct SE2 {
    /// Translation part
    translation: Vector2<f64>,
    /// Rotation part
    rotation: UnitComplex<f64>,
}

impl fmt::Display for SE2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SE2(translation: [{:.4}, {:.4}], rotation: {:.4})",
            self.translation.x,
            self.translation.y,
            self.angle()
        )
    }
}

impl Default for SE2 {
    fn default() -> Self {
        Self::identity()
    }
}

/// sin(θ)/θ and (1 - cos θ)/θ, the entries of the V matrix.
fn v_coefficients(theta: f64) -> (f64, f64) {
    if theta.abs() < SMALL_ANGLE {
        let theta2 = theta * theta;
        (1.0 - theta2 / 6.0, 0.5 * theta - theta * theta2 / 24.0)
    } else {
        (theta.sin() / theta, (1.0 - theta.cos()) / theta)
    }
}

impl SE2 {
    /// Degrees of freedom.
    pub const DOF: usize = 3;

    /// Get the identity element.
    pub fn identity() -> Self {
        SE2 {
            translation: Vector2::zeros(),
            rotation: UnitComplex::identity(),
        }
    }

    /// Create a new SE(2) element from translation and rotation.
    pub fn new(translation: Vector2<f64>, rotation: UnitComplex<f64>) -> Self {
        SE2 {
            translation,
            rotation,
        }
    }

    /// Create SE(2) from x, y and angle components.
    pub fn from_xy_angle(x: f64, y: f64, theta: f64) -> Self {
        SE2::new(Vector2::new(x, y), UnitComplex::new(theta))
    }

    /// Get the translation part.
    pub fn translation(&self) -> &Vector2<f64> {
        &self.translation
    }

    /// Get the rotation as a 2×2 matrix.
    pub fn rotation_matrix(&self) -> Matrix2<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    /// Rotation angle in (-π, π].
    pub fn angle(&self) -> f64 {
        self.rotation.angle()
    }

    /// Compose two SE(2) elements.
    ///
    /// Jacobians: `J_self = Ad(other⁻¹)`, `J_other = I`.
    pub fn compose(
        &self,
        other: &SE2,
        jacobian_self: Option<&mut Matrix3<f64>>,
        jacobian_other: Option<&mut Matrix3<f64>>,
    ) -> SE2 {
        if let Some(jac) = jacobian_self {
            *jac = other.inverse(None).adjoint();
        }
        if let Some(jac) = jacobian_other {
            *jac = Matrix3::identity();
        }
        SE2 {
            translation: self.translation + self.rotation * other.translation,
            rotation: self.rotation * other.rotation,
        }
    }

    /// Get the inverse, with Jacobian `-Ad(self)`.
    pub fn inverse(&self, jacobian: Option<&mut Matrix3<f64>>) -> SE2 {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }
        let rotation = self.rotation.inverse();
        SE2 {
            translation: -(rotation * self.translation),
            rotation,
        }
    }

    /// Exponential map; the Jacobian is the right Jacobian at `tangent`.
    pub fn exp(tangent: &Vector3<f64>, jacobian: Option<&mut Matrix3<f64>>) -> SE2 {
        let theta = tangent.z;
        let (a, b) = v_coefficients(theta);
        let translation = Vector2::new(
            a * tangent.x - b * tangent.y,
            b * tangent.x + a * tangent.y,
        );
        if let Some(jac) = jacobian {
            *jac = Self::right_jacobian(tangent);
        }
        SE2::new(translation, UnitComplex::new(theta))
    }

    /// Logarithmic map; the Jacobian is the inverse right Jacobian at the result.
    pub fn log(&self, jacobian: Option<&mut Matrix3<f64>>) -> Vector3<f64> {
        let theta = self.angle();
        let (a, b) = v_coefficients(theta);
        let det = a * a + b * b;
        let t = &self.translation;
        let tangent = Vector3::new(
            (a * t.x + b * t.y) / det,
            (-b * t.x + a * t.y) / det,
            theta,
        );
        if let Some(jac) = jacobian {
            *jac = Self::right_jacobian_inv(&tangent);
        }
        tangent
    }

    /// Adjoint matrix.
    pub fn adjoint(&self) -> Matrix3<f64> {
        let r = self.rotation_matrix();
        let mut adj = Matrix3::identity();
        adj.fixed_view_mut::<2, 2>(0, 0).copy_from(&r);
        adj[(0, 2)] = self.translation.y;
        adj[(1, 2)] = -self.translation.x;
        adj
    }

    /// Transform a point: R·p + t.
    pub fn act(&self, point: &Vector2<f64>) -> Vector2<f64> {
        self.rotation * point + self.translation
    }

    /// Express a world point in this frame: Rᵀ·(p - t).
    pub fn transform_to(&self, point: &Vector2<f64>) -> Vector2<f64> {
        self.rotation.inverse() * (point - self.translation)
    }

    /// Right Jacobian Jr(τ).
    pub fn right_jacobian(tangent: &Vector3<f64>) -> Matrix3<f64> {
        let (x, y, theta) = (tangent.x, tangent.y, tangent.z);
        let (a, b) = v_coefficients(theta);
        let mut jac = Matrix3::identity();
        jac[(0, 0)] = a;
        jac[(0, 1)] = b;
        jac[(1, 0)] = -b;
        jac[(1, 1)] = a;
        if theta.abs() < SMALL_ANGLE {
            jac[(0, 2)] = -0.5 * y + theta * x / 6.0;
            jac[(1, 2)] = 0.5 * x + theta * y / 6.0;
        } else {
            let (sin_theta, cos_theta) = theta.sin_cos();
            let theta2 = theta * theta;
            jac[(0, 2)] = (theta * x - y + y * cos_theta - x * sin_theta) / theta2;
            jac[(1, 2)] = (x + theta * y - x * cos_theta - y * sin_theta) / theta2;
        }
        jac
    }

    /// Inverse of the right Jacobian.
    ///
    /// Jr has the block form [M c; 0 1], so its inverse is [M⁻¹ -M⁻¹c; 0 1].
    pub fn right_jacobian_inv(tangent: &Vector3<f64>) -> Matrix3<f64> {
        let jr = Self::right_jacobian(tangent);
        let (a, b) = (jr[(0, 0)], jr[(0, 1)]);
        let det = a * a + b * b;
        let m_inv = Matrix2::new(a, -b, b, a) / det;
        let c = Vector2::new(jr[(0, 2)], jr[(1, 2)]);

        let mut jac = Matrix3::identity();
        jac.fixed_view_mut::<2, 2>(0, 0).copy_from(&m_inv);
        jac.fixed_view_mut::<2, 1>(0, 2).copy_from(&-(m_inv * c));
        jac
    }
}

fn to_vector3(delta: &DVector<f64>) -> ManifoldResult<Vector3<f64>> {
    check_tangent_dim(SE2::DOF, delta.len())?;
    Ok(Vector3::new(delta[0], delta[1], delta[2]))
}

fn to_dmatrix(m: &Matrix3<f64>) -> DMatrix<f64> {
    DMatrix::from_column_slice(3, 3, m.as_slice())
}

impl Manifold for SE2 {
    fn dim(&self) -> usize {
        Self::DOF
    }

    fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<Self> {
        let tau = to_vector3(delta)?;
        Ok(self.compose(&SE2::exp(&tau, None), None, None))
    }

    fn local_coordinates(&self, other: &Self) -> ManifoldResult<DVector<f64>> {
        let tau = self.inverse(None).compose(other, None, None).log(None);
        Ok(DVector::from_column_slice(tau.as_slice()))
    }

    fn equals(&self, other: &Self, tolerance: f64) -> bool {
        (self.translation - other.translation).amax() <= tolerance
            && self.rotation.angle_to(&other.rotation).abs() <= tolerance
    }
}

impl LieGroup for SE2 {
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut DMatrix<f64>>,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> Self {
        if let Some(jac) = jacobian_self {
            *jac = to_dmatrix(&other.inverse(None).adjoint());
        }
        if let Some(jac) = jacobian_other {
            *jac = DMatrix::identity(3, 3);
        }
        SE2::compose(self, other, None, None)
    }

    fn inverse(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self {
        if let Some(jac) = jacobian {
            *jac = to_dmatrix(&-self.adjoint());
        }
        SE2::inverse(self, None)
    }

    fn expmap(tangent: &DVector<f64>, jacobian: Option<&mut DMatrix<f64>>) -> ManifoldResult<Self> {
        let tau = to_vector3(tangent)?;
        if let Some(jac) = jacobian {
            *jac = to_dmatrix(&SE2::right_jacobian(&tau));
        }
        Ok(SE2::exp(&tau, None))
    }

    fn logmap(&self, jacobian: Option<&mut DMatrix<f64>>) -> ManifoldResult<DVector<f64>> {
        let tau = self.log(None);
        if let Some(jac) = jacobian {
            *jac = to_dmatrix(&SE2::right_jacobian_inv(&tau));
        }
        Ok(DVector::from_column_slice(tau.as_slice()))
    }

    fn adjoint_map(&self) -> DMatrix<f64> {
        to_dmatrix(&self.adjoint())
    }
}
