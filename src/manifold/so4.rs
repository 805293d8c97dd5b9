//! SO(4) - Special Orthogonal Group in 4D
//!
//! Elements are 4×4 orthogonal matrices with unit determinant. The tangent space
//! so(4) is six dimensional; a tangent vector ξ = [ξ0 … ξ5] maps to the skew
//! matrix
//!
//! ```text
//!         ⎡  0   -ξ2   ξ1  -ξ3 ⎤
//! ξ^  =   ⎢  ξ2   0   -ξ0  -ξ4 ⎥
//!         ⎢ -ξ1   ξ0   0   -ξ5 ⎥
//!         ⎣  ξ3   ξ4   ξ5   0  ⎦
//! ```
//!
//! so the upper-left 3×3 block is the so(3) subalgebra.
//!
//! Two maps connect the algebra and the group:
//! - the exact exponential [`SO4::expmap`], computed in closed form from the
//!   eigenvalues ±ai, ±bi of ξ^ (Rohan, "Some remarks on the exponential map on
//!   the groups SO(n) and SE(n)"),
//! - the Cayley chart [`SO4::retract_at_origin`] / [`SO4::local_at_origin`],
//!   which is what the optimizer uses to apply updates.
//!
//! The logarithm and the Jacobians of the exponential and of the chart have no
//! implementation; asking for them returns
//! [`ManifoldError::UnimplementedOperation`].

use crate::manifold::{LieGroup, Manifold, ManifoldError, ManifoldResult, check_tangent_dim};
use nalgebra::{DMatrix, DVector, Matrix3, Matrix4, Matrix4x3, Matrix6, SMatrix, SVector, Vector6};
use rand::Rng;
use std::f64::consts::PI;
use std::fmt;
use std::sync::LazyLock;

/// Column-major vectorization of a 4×4 matrix.
pub type Vector16 = SVector<f64, 16>;
/// Jacobian of [`SO4::vec`].
pub type Matrix16x6 = SMatrix<f64, 16, 6>;
/// Jacobian of [`SO4::top_left`].
pub type Matrix9x6 = SMatrix<f64, 9, 6>;
/// Jacobian of [`SO4::stiefel`].
pub type Matrix12x6 = SMatrix<f64, 12, 6>;

/// Orthogonality tolerance accepted by [`SO4::from_matrix`].
const ORTHOGONALITY_TOLERANCE: f64 = 1e-9;
/// Rotation angles below this are treated as zero.
const ZERO_ANGLE_TOLERANCE: f64 = 1e-12;
/// Relative gap under which the two rotation angles are treated as equal.
const EQUAL_ANGLE_TOLERANCE: f64 = 1e-10;
/// Relative slack allowed on `a² + b² ≥ 2ab` before the invariants are rejected.
const EIGENSTRUCTURE_TOLERANCE: f64 = 1e-9;

/// The six so(4) basis elements Gᵢ = Hat(eᵢ).
static GENERATORS: LazyLock<[Matrix4<f64>; 6]> =
    LazyLock::new(|| std::array::from_fn(|i| SO4::hat(&Vector6::ith(i, 1.0))));

/// P = [vec(G0) … vec(G5)], used by the Jacobian of [`SO4::vec`].
static GENERATOR_PROJECTION: LazyLock<Matrix16x6> = LazyLock::new(|| {
    let mut p = Matrix16x6::zeros();
    for (i, g) in GENERATORS.iter().enumerate() {
        p.set_column(i, &Vector16::from_column_slice(g.as_slice()));
    }
    p
});

/// SO(4) group element.
#[derive(Clone, Debug, PartialEq)]
pub struct SO4 {
    matrix: Matrix4<f64>,
}

impl fmt::Display for SO4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SO4(")?;
        for r in 0..4 {
            let row = self.matrix.row(r);
            if r > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "[{:.4}, {:.4}, {:.4}, {:.4}]",
                row[0], row[1], row[2], row[3]
            )?;
        }
        write!(f, ")")
    }
}

impl Default for SO4 {
    fn default() -> Self {
        Self::identity()
    }
}

impl SO4 {
    /// Degrees of freedom.
    pub const DOF: usize = 6;

    /// Identity rotation.
    pub fn identity() -> Self {
        SO4 {
            matrix: Matrix4::identity(),
        }
    }

    /// Create an element from a 4×4 matrix, checking that it is a proper rotation.
    pub fn from_matrix(matrix: Matrix4<f64>) -> ManifoldResult<Self> {
        let error = (matrix.transpose() * matrix - Matrix4::identity()).amax();
        if error > ORTHOGONALITY_TOLERANCE {
            return Err(ManifoldError::InvalidElement(format!(
                "matrix is not orthogonal (|QᵀQ - I|∞ = {error:.3e})"
            )));
        }
        if matrix.determinant() <= 0.0 {
            return Err(ManifoldError::InvalidElement(
                "matrix has negative determinant".to_string(),
            ));
        }
        Ok(SO4 { matrix })
    }

    /// Create an element without checking orthogonality.
    pub fn from_matrix_unchecked(matrix: Matrix4<f64>) -> Self {
        SO4 { matrix }
    }

    /// Random rotation: the exponential of two random 3D axis-angle vectors.
    ///
    /// Each half is a uniformly random unit axis scaled by an angle drawn
    /// uniformly from [-π, π].
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> ManifoldResult<Self> {
        let mut xi = Vector6::zeros();
        for half in 0..2 {
            let axis = loop {
                let candidate = nalgebra::Vector3::new(
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                );
                let norm = candidate.norm();
                if norm > 1e-3 && norm <= 1.0 {
                    break candidate / norm;
                }
            };
            let angle = rng.random_range(-PI..=PI);
            xi.fixed_rows_mut::<3>(3 * half).copy_from(&(axis * angle));
        }
        Self::expmap(&xi, None)
    }

    /// The underlying 4×4 matrix.
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Map a tangent vector to its skew-symmetric matrix.
    pub fn hat(xi: &Vector6<f64>) -> Matrix4<f64> {
        let mut y = Matrix4::zeros();
        y[(0, 1)] = -xi[2];
        y[(0, 2)] = xi[1];
        y[(1, 2)] = -xi[0];
        y[(0, 3)] = -xi[3];
        y[(1, 3)] = -xi[4];
        y[(2, 3)] = -xi[5];
        y - y.transpose()
    }

    /// Inverse of [`SO4::hat`]. Only the strict upper triangle of `x` is read.
    pub fn vee(x: &Matrix4<f64>) -> Vector6<f64> {
        Vector6::new(
            -x[(1, 2)],
            x[(0, 2)],
            -x[(0, 1)],
            -x[(0, 3)],
            -x[(1, 3)],
            -x[(2, 3)],
        )
    }

    /// The so(4) basis elements Gᵢ = Hat(eᵢ).
    pub fn generators() -> &'static [Matrix4<f64>; 6] {
        &GENERATORS
    }

    /// Group composition `self · other`.
    ///
    /// Jacobians: `J_self = Ad(other⁻¹)`, `J_other = I`.
    pub fn compose(
        &self,
        other: &SO4,
        jacobian_self: Option<&mut Matrix6<f64>>,
        jacobian_other: Option<&mut Matrix6<f64>>,
    ) -> SO4 {
        if let Some(jac) = jacobian_self {
            *jac = other.inverse(None).adjoint();
        }
        if let Some(jac) = jacobian_other {
            *jac = Matrix6::identity();
        }
        SO4 {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Group inverse (the transpose), with Jacobian `-Ad(self)`.
    pub fn inverse(&self, jacobian: Option<&mut Matrix6<f64>>) -> SO4 {
        if let Some(jac) = jacobian {
            *jac = -self.adjoint();
        }
        SO4 {
            matrix: self.matrix.transpose(),
        }
    }

    /// Exponential map exp(ξ^), in closed form.
    ///
    /// With the eigenvalues of ξ^ written ±ai, ±bi (a ≥ b ≥ 0) the result is
    /// c0·I + c1·X + c2·X² + c3·X³ where the coefficients depend on whether b
    /// vanishes and whether a equals b.
    ///
    /// # Errors
    /// - `UnimplementedOperation` when a Jacobian is requested
    /// - `InvalidEigenstructure` when ξ is not finite or its invariants do not
    ///   describe two rotation angles
    pub fn expmap(xi: &Vector6<f64>, jacobian: Option<&mut Matrix6<f64>>) -> ManifoldResult<SO4> {
        if jacobian.is_some() {
            return Err(ManifoldError::UnimplementedOperation(
                "SO4::expmap Jacobian".to_string(),
            ));
        }

        let x = Self::hat(xi);
        let identity = Matrix4::<f64>::identity();
        if xi.norm() <= ZERO_ANGLE_TOLERANCE {
            return Ok(SO4 {
                matrix: identity + x,
            });
        }
        let (a, b) = rotation_angles(xi, &x)?;

        let x2 = x * x;
        let x3 = x2 * x;
        let (c0, c1, c2, c3) = if b <= ZERO_ANGLE_TOLERANCE {
            // c2 = (1 - cos a)/a², c3 = (a - sin a)/a³
            (1.0, 1.0, 0.5 * sinc(0.5 * a).powi(2), a_minus_sin_over_cube(a))
        } else if (a - b) <= EQUAL_ANGLE_TOLERANCE * a {
            equal_angle_coefficients(0.5 * (a + b))
        } else {
            distinct_angle_coefficients(a, b)
        };

        Ok(SO4 {
            matrix: identity * c0 + x * c1 + x2 * c2 + x3 * c3,
        })
    }

    /// Logarithm map. Not implemented: always returns `UnimplementedOperation`.
    pub fn logmap(&self, jacobian: Option<&mut Matrix6<f64>>) -> ManifoldResult<Vector6<f64>> {
        if jacobian.is_some() {
            return Err(ManifoldError::UnimplementedOperation(
                "SO4::logmap Jacobian".to_string(),
            ));
        }
        Err(ManifoldError::UnimplementedOperation(
            "SO4::logmap".to_string(),
        ))
    }

    /// Cayley retraction at the identity: (I + Hat(v/2)) · (I - Hat(v/2))⁻¹.
    pub fn retract_at_origin(
        v: &Vector6<f64>,
        jacobian: Option<&mut Matrix6<f64>>,
    ) -> ManifoldResult<SO4> {
        if jacobian.is_some() {
            return Err(ManifoldError::UnimplementedOperation(
                "SO4::retract_at_origin Jacobian".to_string(),
            ));
        }
        let x = Self::hat(&(v * 0.5));
        let identity = Matrix4::<f64>::identity();
        let inv = (identity - x).try_inverse().ok_or_else(|| {
            ManifoldError::NumericalInstability("I - Hat(v/2) is singular".to_string())
        })?;
        Ok(SO4 {
            matrix: (identity + x) * inv,
        })
    }

    /// Inverse of the Cayley retraction: -2 · Vee((I - Q) · (I + Q)⁻¹).
    pub fn local_at_origin(
        q: &SO4,
        jacobian: Option<&mut Matrix6<f64>>,
    ) -> ManifoldResult<Vector6<f64>> {
        if jacobian.is_some() {
            return Err(ManifoldError::UnimplementedOperation(
                "SO4::local_at_origin Jacobian".to_string(),
            ));
        }
        let identity = Matrix4::<f64>::identity();
        let inv = (identity + q.matrix).try_inverse().ok_or_else(|| {
            ManifoldError::NumericalInstability(
                "I + Q is singular (rotation by π is outside the chart)".to_string(),
            )
        })?;
        Ok(Self::vee(&((identity - q.matrix) * inv)) * -2.0)
    }

    /// Adjoint map. Column i is Vee(Q · Gᵢ · Qᵀ).
    pub fn adjoint(&self) -> Matrix6<f64> {
        let qt = self.matrix.transpose();
        let mut ad = Matrix6::zeros();
        for (i, g) in GENERATORS.iter().enumerate() {
            ad.set_column(i, &Self::vee(&(self.matrix * g * qt)));
        }
        ad
    }

    /// Column-major vectorization of the matrix.
    ///
    /// The Jacobian is (I₄ ⊗ Q)·P: its 4-row block j is `Q · P[4j..4j+4, :]`.
    pub fn vec(&self, jacobian: Option<&mut Matrix16x6>) -> Vector16 {
        if let Some(jac) = jacobian {
            for j in 0..4 {
                let block = self.matrix * GENERATOR_PROJECTION.fixed_rows::<4>(4 * j);
                jac.fixed_rows_mut::<4>(4 * j).copy_from(&block);
            }
        }
        Vector16::from_column_slice(self.matrix.as_slice())
    }

    /// Top-left 3×3 block, with optional 9×6 Jacobian.
    pub fn top_left(&self, jacobian: Option<&mut Matrix9x6>) -> Matrix3<f64> {
        let m = self.matrix.fixed_view::<3, 3>(0, 0).into_owned();
        if let Some(jac) = jacobian {
            let m1 = m.column(0).into_owned();
            let m2 = m.column(1).into_owned();
            let m3 = m.column(2).into_owned();
            let q = self.matrix.fixed_view::<3, 1>(0, 3).into_owned();
            jac.fill(0.0);
            jac.fixed_view_mut::<3, 1>(0, 1).copy_from(&-m3);
            jac.fixed_view_mut::<3, 1>(0, 2).copy_from(&m2);
            jac.fixed_view_mut::<3, 1>(0, 3).copy_from(&q);
            jac.fixed_view_mut::<3, 1>(3, 0).copy_from(&m3);
            jac.fixed_view_mut::<3, 1>(3, 2).copy_from(&-m1);
            jac.fixed_view_mut::<3, 1>(3, 4).copy_from(&q);
            jac.fixed_view_mut::<3, 1>(6, 0).copy_from(&-m2);
            jac.fixed_view_mut::<3, 1>(6, 1).copy_from(&m1);
            jac.fixed_view_mut::<3, 1>(6, 5).copy_from(&q);
        }
        m
    }

    /// Left three columns (a point on the Stiefel manifold V₃(R⁴)), with optional
    /// 12×6 Jacobian.
    pub fn stiefel(&self, jacobian: Option<&mut Matrix12x6>) -> Matrix4x3<f64> {
        let m = self.matrix.fixed_columns::<3>(0).into_owned();
        if let Some(jac) = jacobian {
            let m1 = self.matrix.column(0).into_owned();
            let m2 = self.matrix.column(1).into_owned();
            let m3 = self.matrix.column(2).into_owned();
            let q = self.matrix.column(3).into_owned();
            jac.fill(0.0);
            jac.fixed_view_mut::<4, 1>(0, 1).copy_from(&-m3);
            jac.fixed_view_mut::<4, 1>(0, 2).copy_from(&m2);
            jac.fixed_view_mut::<4, 1>(0, 3).copy_from(&q);
            jac.fixed_view_mut::<4, 1>(4, 0).copy_from(&m3);
            jac.fixed_view_mut::<4, 1>(4, 2).copy_from(&-m1);
            jac.fixed_view_mut::<4, 1>(4, 4).copy_from(&q);
            jac.fixed_view_mut::<4, 1>(8, 0).copy_from(&-m2);
            jac.fixed_view_mut::<4, 1>(8, 1).copy_from(&m1);
            jac.fixed_view_mut::<4, 1>(8, 5).copy_from(&q);
        }
        m
    }

    /// Check that the stored matrix is a rotation to within `tolerance`.
    pub fn is_valid(&self, tolerance: f64) -> bool {
        (self.matrix.transpose() * self.matrix - Matrix4::identity()).amax() <= tolerance
            && self.matrix.determinant() > 0.0
    }
}

/// Rotation angles (a, b), a ≥ b ≥ 0, where ±ai, ±bi are the eigenvalues of X.
///
/// Both follow from two invariants of the skew matrix: a² + b² = ‖ξ‖² and
/// ab = |Pf(X)|. Then (a + b)² and (a - b)² are their sum and difference, so no
/// eigen-decomposition is needed.
fn rotation_angles(xi: &Vector6<f64>, x: &Matrix4<f64>) -> ManifoldResult<(f64, f64)> {
    if let Some(v) = xi.iter().find(|v| !v.is_finite()) {
        return Err(ManifoldError::InvalidEigenstructure(format!(
            "tangent has a non-finite entry {v}"
        )));
    }

    let sum_of_squares = xi.norm_squared();
    let pfaffian = x[(0, 1)] * x[(2, 3)] - x[(0, 2)] * x[(1, 3)] + x[(0, 3)] * x[(1, 2)];
    let twice_product = 2.0 * pfaffian.abs();

    let gap_squared = sum_of_squares - twice_product;
    if gap_squared < -EIGENSTRUCTURE_TOLERANCE * sum_of_squares {
        return Err(ManifoldError::InvalidEigenstructure(format!(
            "invariants give (a - b)² = {gap_squared:e}"
        )));
    }

    let sum = (sum_of_squares + twice_product).sqrt();
    let gap = gap_squared.max(0.0).sqrt();
    let a = 0.5 * (sum + gap);
    if !a.is_finite() {
        return Err(ManifoldError::InvalidEigenstructure(format!(
            "rotation angle {a} is not finite"
        )));
    }
    // ab = |Pf(X)| recovers a small b without the cancellation in sum - gap
    let b = if a > 0.0 {
        (pfaffian.abs() / a).min(a)
    } else {
        0.0
    };
    Ok((a, b))
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-4 {
        1.0 - x * x / 6.0
    } else {
        x.sin() / x
    }
}

/// (a - sin a) / a³
fn a_minus_sin_over_cube(a: f64) -> f64 {
    if a < 1e-3 {
        let a2 = a * a;
        1.0 / 6.0 - a2 / 120.0 + a2 * a2 / 5040.0
    } else {
        (a - a.sin()) / (a * a * a)
    }
}

/// Coefficients when both pairs share the angle a.
fn equal_angle_coefficients(a: f64) -> (f64, f64, f64, f64) {
    let (sin_a, cos_a) = a.sin_cos();
    let c0 = (a * sin_a + 2.0 * cos_a) / 2.0;
    let c1 = (3.0 * sin_a - a * cos_a) / (2.0 * a);
    let c2 = sin_a / (2.0 * a);
    let c3 = (sin_a - a * cos_a) / (2.0 * a * a * a);
    (c0, c1, c2, c3)
}

/// Coefficients for two distinct non-zero angles.
///
/// Algebraically equal to
/// c0 = (b² cos a - a² cos b)/(b² - a²), c1 = (b³ sin a - a³ sin b)/(ab(b² - a²)),
/// c2 = (cos a - cos b)/(b² - a²), c3 = (b sin a - a sin b)/(ab(b² - a²)),
/// rearranged so that only c3 divides by b² - a². Rounding in c3 enters c1 as
/// a²·c3 and cancels on the a eigenspace, leaving an O(ε) error on the b
/// eigenspace even for nearly equal angles.
fn distinct_angle_coefficients(a: f64, b: f64) -> (f64, f64, f64, f64) {
    let a2 = a * a;
    let c2 = 0.5 * sinc(0.5 * (a + b)) * sinc(0.5 * (a - b));
    let c3 = (sinc(b) - sinc(a)) / ((a + b) * (a - b));
    let c0 = a.cos() + a2 * c2;
    let c1 = sinc(a) + a2 * c3;
    (c0, c1, c2, c3)
}

fn to_vector6(delta: &DVector<f64>) -> ManifoldResult<Vector6<f64>> {
    check_tangent_dim(SO4::DOF, delta.len())?;
    Ok(Vector6::from_column_slice(delta.as_slice()))
}

fn to_dmatrix(m: &Matrix6<f64>) -> DMatrix<f64> {
    DMatrix::from_column_slice(6, 6, m.as_slice())
}

impl Manifold for SO4 {
    fn dim(&self) -> usize {
        Self::DOF
    }

    /// `self · Retract(delta)` through the Cayley chart.
    fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<Self> {
        let v = to_vector6(delta)?;
        Ok(self.compose(&SO4::retract_at_origin(&v, None)?, None, None))
    }

    /// `Local(self⁻¹ · other)` through the Cayley chart.
    fn local_coordinates(&self, other: &Self) -> ManifoldResult<DVector<f64>> {
        let relative = self.inverse(None).compose(other, None, None);
        let v = SO4::local_at_origin(&relative, None)?;
        Ok(DVector::from_column_slice(v.as_slice()))
    }

    fn equals(&self, other: &Self, tolerance: f64) -> bool {
        (self.matrix - other.matrix).amax() <= tolerance
    }
}

impl LieGroup for SO4 {
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
            *jac = DMatrix::identity(6, 6);
        }
        SO4::compose(self, other, None, None)
    }

    fn inverse(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self {
        if let Some(jac) = jacobian {
            *jac = to_dmatrix(&-self.adjoint());
        }
        SO4::inverse(self, None)
    }

    fn expmap(tangent: &DVector<f64>, jacobian: Option<&mut DMatrix<f64>>) -> ManifoldResult<Self> {
        let xi = to_vector6(tangent)?;
        if jacobian.is_some() {
            return Err(ManifoldError::UnimplementedOperation(
                "SO4::expmap Jacobian".to_string(),
            ));
        }
        SO4::expmap(&xi, None)
    }

    fn logmap(&self, jacobian: Option<&mut DMatrix<f64>>) -> ManifoldResult<DVector<f64>> {
        if jacobian.is_some() {
            return Err(ManifoldError::UnimplementedOperation(
                "SO4::logmap Jacobian".to_string(),
            ));
        }
        SO4::logmap(self, None).map(|v| DVector::from_column_slice(v.as_slice()))
    }

    fn adjoint_map(&self) -> DMatrix<f64> {
        to_dmatrix(&self.adjoint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const TOLERANCE: f64 = 1e-9;

    fn random_tangent(rng: &mut StdRng, scale: f64) -> Vector6<f64> {
        Vector6::from_fn(|_, _| rng.random_range(-scale..scale))
    }

    /// exp(X) by truncated Taylor series, accurate for moderate |X|.
    fn taylor_exp(x: &Matrix4<f64>) -> Matrix4<f64> {
        let mut result = Matrix4::identity();
        let mut term = Matrix4::identity();
        for k in 1..60 {
            term = term * x / k as f64;
            result += term;
        }
        result
    }

    fn assert_orthogonal(q: &SO4) {
        let error = (q.matrix() * q.matrix().transpose() - Matrix4::identity()).amax();
        assert!(error < TOLERANCE, "orthogonality error {error:e}");
    }

    #[test]
    fn test_so4_hat_vee_roundtrip() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let v = random_tangent(&mut rng, 3.0);
            let x = SO4::hat(&v);
            assert_eq!(x, -x.transpose());
            assert_eq!(SO4::vee(&x), v);
        }
    }

    #[test]
    fn test_so4_hat_so3_block() {
        let x = SO4::hat(&Vector6::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0));
        let expected = Matrix4::new(
            0.0, -3.0, 2.0, -4.0, //
            3.0, 0.0, -1.0, -5.0, //
            -2.0, 1.0, 0.0, -6.0, //
            4.0, 5.0, 6.0, 0.0,
        );
        assert_eq!(x, expected);
    }

    #[test]
    fn test_so4_vee_reads_upper_triangle() {
        let mut x = SO4::hat(&Vector6::new(0.1, 0.2, 0.3, 0.4, 0.5, 0.6));
        x[(3, 0)] = 100.0;
        assert_eq!(SO4::vee(&x), Vector6::new(0.1, 0.2, 0.3, 0.4, 0.5, 0.6));
    }

    #[test]
    fn test_so4_expmap_zero_is_identity() {
        let q = SO4::expmap(&Vector6::zeros(), None).unwrap();
        assert_eq!(q.matrix(), &Matrix4::identity());
    }

    #[test]
    fn test_so4_expmap_single_plane() {
        // b = 0: rotation in the (1, 2) plane by 0.7
        let q = SO4::expmap(&Vector6::new(0.7, 0.0, 0.0, 0.0, 0.0, 0.0), None).unwrap();
        let (s, c) = 0.7f64.sin_cos();
        assert!((q.matrix()[(1, 1)] - c).abs() < 1e-12);
        assert!((q.matrix()[(2, 1)] - s).abs() < 1e-12);
        assert!((q.matrix()[(1, 2)] + s).abs() < 1e-12);
        assert!((q.matrix()[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((q.matrix()[(3, 3)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_so4_expmap_so3_subgroup_matches_taylor() {
        let xi = Vector6::new(0.3, -0.2, 0.5, 0.0, 0.0, 0.0);
        let q = SO4::expmap(&xi, None).unwrap();
        let expected = taylor_exp(&SO4::hat(&xi));
        assert!((q.matrix() - expected).amax() < TOLERANCE);
    }

    #[test]
    fn test_so4_expmap_isoclinic_matches_taylor() {
        // Equal rotation angles in two orthogonal planes: (0,1) and (2,3)
        let xi = Vector6::new(0.0, 0.0, 0.8, 0.0, 0.0, 0.8);
        let q = SO4::expmap(&xi, None).unwrap();
        let expected = taylor_exp(&SO4::hat(&xi));
        assert!((q.matrix() - expected).amax() < TOLERANCE);
        assert_orthogonal(&q);
    }

    #[test]
    fn test_so4_expmap_general_matches_taylor() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let xi = random_tangent(&mut rng, 1.5);
            let q = SO4::expmap(&xi, None).unwrap();
            let expected = taylor_exp(&SO4::hat(&xi));
            assert!((q.matrix() - expected).amax() < 1e-8);
        }
    }

    #[test]
    fn test_so4_expmap_is_orthogonal() {
        let mut rng = StdRng::seed_from_u64(3);
        for scale in [1e-6, 0.1, 1.0, 3.0, 10.0] {
            for _ in 0..20 {
                let q = SO4::expmap(&random_tangent(&mut rng, scale), None).unwrap();
                assert_orthogonal(&q);
                assert!(q.is_valid(TOLERANCE));
            }
        }
    }

    /// exp of Hat(0, 0, a, 0, 0, b): rotation by a in the (0, 1) plane and by b
    /// in the (2, 3) plane.
    fn block_rotation(a: f64, b: f64) -> Matrix4<f64> {
        let (sa, ca) = a.sin_cos();
        let (sb, cb) = b.sin_cos();
        Matrix4::new(
            ca, -sa, 0.0, 0.0, //
            sa, ca, 0.0, 0.0, //
            0.0, 0.0, cb, -sb, //
            0.0, 0.0, sb, cb,
        )
    }

    #[test]
    fn test_so4_expmap_negligible_tangent() {
        let xi = Vector6::from_element(1e-13);
        let q = SO4::expmap(&xi, None).unwrap();
        assert!(q.equals(&SO4::identity(), 1e-12));
        assert_orthogonal(&q);

        // just above the zero threshold the closed form still applies
        let xi = Vector6::new(0.0, 0.0, 1e-11, 0.0, 0.0, 5e-12);
        let q = SO4::expmap(&xi, None).unwrap();
        assert!((q.matrix() - taylor_exp(&SO4::hat(&xi))).amax() < 1e-15);
    }

    #[test]
    fn test_so4_expmap_shared_axis_planes() {
        // rotations in the (1, 2) and (2, 3) planes share an axis and combine
        // into a single plane of angle |ξ|
        for xi in [
            Vector6::new(1.0, 0.0, 0.0, 0.0, 0.0, 1.0),
            Vector6::new(0.3, 0.0, 0.0, 0.0, 0.0, 0.3),
        ] {
            let q = SO4::expmap(&xi, None).unwrap();
            let expected = taylor_exp(&SO4::hat(&xi));
            assert!((q.matrix() - expected).amax() < TOLERANCE, "ξ = {xi:?}");
            assert_orthogonal(&q);
        }
    }

    #[test]
    fn test_so4_expmap_near_equal_angles() {
        // relative gaps on both sides of the equal-angle band, out to a = 30
        for a in [1.0, 10.0, 30.0] {
            for gap in [0.0, 5e-11, 2e-10, 1e-7, 9e-6, 1.1e-5, 1e-3] {
                let b = a * (1.0 - gap);
                let xi = Vector6::new(0.0, 0.0, a, 0.0, 0.0, b);
                let q = SO4::expmap(&xi, None).unwrap();
                let error = (q.matrix() - block_rotation(a, b)).amax();
                assert!(error < TOLERANCE, "a = {a}, gap = {gap:e}: error {error:e}");
                assert_orthogonal(&q);
            }
        }
    }

    #[test]
    fn test_so4_expmap_conjugated_isoclinic() {
        let mut rng = StdRng::seed_from_u64(17);
        for i in 0..200 {
            let r = SO4::random(&mut rng).unwrap();
            let a = 0.05 + 3.0 * (i as f64) / 200.0;
            let x = r.matrix() * SO4::hat(&Vector6::new(0.0, 0.0, a, 0.0, 0.0, a))
                * r.matrix().transpose();
            let q = SO4::expmap(&SO4::vee(&x), None).unwrap();
            let expected = r.matrix() * block_rotation(a, a) * r.matrix().transpose();
            let error = (q.matrix() - expected).amax();
            assert!(error < TOLERANCE, "a = {a}: error {error:e}");
        }
    }

    #[test]
    fn test_so4_expmap_large_random_tangents() {
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..2000 {
            let xi = random_tangent(&mut rng, 3.0);
            let q = SO4::expmap(&xi, None).unwrap();
            assert_orthogonal(&q);
        }
    }

    #[test]
    fn test_so4_expmap_rejects_non_finite() {
        let xi = Vector6::new(f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(matches!(
            SO4::expmap(&xi, None),
            Err(ManifoldError::InvalidEigenstructure(_))
        ));
        let xi = Vector6::new(0.0, 0.0, f64::INFINITY, 0.0, 0.0, 1.0);
        assert!(SO4::expmap(&xi, None).is_err());
    }

    #[test]
    fn test_so4_expmap_jacobian_unimplemented() {
        let mut jac = Matrix6::zeros();
        let result = SO4::expmap(&Vector6::zeros(), Some(&mut jac));
        assert!(matches!(
            result,
            Err(ManifoldError::UnimplementedOperation(_))
        ));
    }

    #[test]
    fn test_so4_logmap_unimplemented() {
        let q = SO4::identity();
        assert!(matches!(
            q.logmap(None),
            Err(ManifoldError::UnimplementedOperation(_))
        ));
        let mut jac = Matrix6::zeros();
        assert!(matches!(
            q.logmap(Some(&mut jac)),
            Err(ManifoldError::UnimplementedOperation(_))
        ));
        assert!(matches!(
            LieGroup::logmap(&q, None),
            Err(ManifoldError::UnimplementedOperation(_))
        ));
    }

    #[test]
    fn test_so4_chart_jacobians_unimplemented() {
        let mut jac = Matrix6::zeros();
        let v = Vector6::new(0.1, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(matches!(
            SO4::retract_at_origin(&v, Some(&mut jac)),
            Err(ManifoldError::UnimplementedOperation(_))
        ));
        assert!(matches!(
            SO4::local_at_origin(&SO4::identity(), Some(&mut jac)),
            Err(ManifoldError::UnimplementedOperation(_))
        ));
    }

    #[test]
    fn test_so4_local_retract_roundtrip() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let v = random_tangent(&mut rng, 0.1);
            let q = SO4::retract_at_origin(&v, None).unwrap();
            assert_orthogonal(&q);
            let back = SO4::local_at_origin(&q, None).unwrap();
            assert!((back - v).amax() < TOLERANCE);
        }
    }

    #[test]
    fn test_so4_retract_first_order_matches_expmap() {
        let v = Vector6::new(1e-4, -2e-4, 3e-4, 0.5e-4, 1e-4, -1e-4);
        let cayley = SO4::retract_at_origin(&v, None).unwrap();
        let exact = SO4::expmap(&v, None).unwrap();
        // Cayley agrees with exp to second order
        assert!((cayley.matrix() - exact.matrix()).amax() < 1e-10);
    }

    #[test]
    fn test_so4_local_at_pi_is_unstable() {
        // Rotation by π in the (0,1) plane: I + Q is singular
        let q = SO4::from_matrix(Matrix4::new(
            -1.0, 0.0, 0.0, 0.0, //
            0.0, -1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ))
        .unwrap();
        assert!(matches!(
            SO4::local_at_origin(&q, None),
            Err(ManifoldError::NumericalInstability(_))
        ));
    }

    #[test]
    fn test_so4_manifold_chart_at_element() {
        let mut rng = StdRng::seed_from_u64(5);
        let p = SO4::random(&mut rng).unwrap();
        let v = DVector::from_vec(vec![0.01, -0.02, 0.03, 0.04, -0.05, 0.06]);
        let q = p.retract(&v).unwrap();
        assert!(q.is_valid(TOLERANCE));
        let back = p.local_coordinates(&q).unwrap();
        assert!((back - v).amax() < TOLERANCE);

        let bad = DVector::from_vec(vec![0.0; 3]);
        assert_eq!(
            p.retract(&bad).unwrap_err(),
            ManifoldError::InvalidTangentDimension {
                expected: 6,
                actual: 3
            }
        );
    }

    #[test]
    fn test_so4_adjoint_definition() {
        let mut rng = StdRng::seed_from_u64(9);
        let q = SO4::random(&mut rng).unwrap();
        let ad = q.adjoint();
        // Recomputing gives the same map
        assert_eq!(ad, q.adjoint());

        let xi = random_tangent(&mut rng, 1.0);
        let lhs = q.matrix() * SO4::hat(&xi) * q.matrix().transpose();
        assert!((SO4::hat(&(ad * xi)) - lhs).amax() < TOLERANCE);
    }

    #[test]
    fn test_so4_adjoint_identity() {
        assert!((SO4::identity().adjoint() - Matrix6::identity()).amax() < 1e-15);
    }

    #[test]
    fn test_so4_compose_inverse() {
        let mut rng = StdRng::seed_from_u64(13);
        let q = SO4::random(&mut rng).unwrap();
        let r = q.compose(&q.inverse(None), None, None);
        assert!(r.equals(&SO4::identity(), TOLERANCE));
    }

    #[test]
    fn test_so4_compose_jacobian_numerical() {
        let mut rng = StdRng::seed_from_u64(17);
        let a = SO4::random(&mut rng).unwrap();
        let b = SO4::random(&mut rng).unwrap();
        let mut j_a = Matrix6::zeros();
        let mut j_b = Matrix6::zeros();
        let ab = a.compose(&b, Some(&mut j_a), Some(&mut j_b));

        let h = 1e-6;
        let ab_inv = ab.inverse(None);
        let local = |a_perturbed: &SO4| {
            let relative = ab_inv.compose(&a_perturbed.compose(&b, None, None), None, None);
            SO4::local_at_origin(&relative, None).unwrap()
        };
        for i in 0..6 {
            let d = Vector6::ith(i, h);
            let a_plus = a.compose(&SO4::retract_at_origin(&d, None).unwrap(), None, None);
            let a_minus = a.compose(&SO4::retract_at_origin(&-d, None).unwrap(), None, None);
            let column = (local(&a_plus) - local(&a_minus)) / (2.0 * h);
            assert!((column - j_a.column(i)).amax() < 1e-6);
        }
        assert_eq!(j_b, Matrix6::identity());
    }

    #[test]
    fn test_so4_inverse_jacobian() {
        let mut rng = StdRng::seed_from_u64(19);
        let q = SO4::random(&mut rng).unwrap();
        let mut jac = Matrix6::zeros();
        let _ = q.inverse(Some(&mut jac));
        assert!((jac + q.adjoint()).amax() < 1e-15);
    }

    #[test]
    fn test_so4_vec_and_jacobian() {
        let mut rng = StdRng::seed_from_u64(23);
        let q = SO4::random(&mut rng).unwrap();
        let mut h_vec = Matrix16x6::zeros();
        let v = q.vec(Some(&mut h_vec));
        assert_eq!(v[1], q.matrix()[(1, 0)]);
        assert_eq!(v[4], q.matrix()[(0, 1)]);

        let h = 1e-6;
        for i in 0..6 {
            let d = Vector6::ith(i, h);
            let plus = q.compose(&SO4::retract_at_origin(&d, None).unwrap(), None, None);
            let minus = q.compose(&SO4::retract_at_origin(&-d, None).unwrap(), None, None);
            let column = (plus.vec(None) - minus.vec(None)) / (2.0 * h);
            assert!((column - h_vec.column(i)).amax() < 1e-8);
        }
    }

    #[test]
    fn test_so4_projection_jacobians() {
        let mut rng = StdRng::seed_from_u64(29);
        let q = SO4::random(&mut rng).unwrap();

        let mut h_top = Matrix9x6::zeros();
        let mut h_stiefel = Matrix12x6::zeros();
        let top = q.top_left(Some(&mut h_top));
        let st = q.stiefel(Some(&mut h_stiefel));
        assert_eq!(top, q.matrix().fixed_view::<3, 3>(0, 0).into_owned());
        assert_eq!(st, q.matrix().fixed_columns::<3>(0).into_owned());

        let h = 1e-6;
        for i in 0..6 {
            let d = Vector6::ith(i, h);
            let plus = q.compose(&SO4::retract_at_origin(&d, None).unwrap(), None, None);
            let minus = q.compose(&SO4::retract_at_origin(&-d, None).unwrap(), None, None);

            let d_top = (plus.top_left(None) - minus.top_left(None)) / (2.0 * h);
            let d_top = SMatrix::<f64, 9, 1>::from_column_slice(d_top.as_slice());
            assert!((d_top - h_top.column(i)).amax() < 1e-8);

            let d_st = (plus.stiefel(None) - minus.stiefel(None)) / (2.0 * h);
            let d_st = SMatrix::<f64, 12, 1>::from_column_slice(d_st.as_slice());
            assert!((d_st - h_stiefel.column(i)).amax() < 1e-8);
        }
    }

    #[test]
    fn test_so4_projection_without_jacobian_leaves_output_untouched() {
        let q = SO4::identity();
        let top = q.top_left(None);
        assert_eq!(top, Matrix3::identity());
    }

    #[test]
    fn test_so4_from_matrix_rejects_non_orthogonal() {
        let m = Matrix4::identity() * 2.0;
        assert!(matches!(
            SO4::from_matrix(m),
            Err(ManifoldError::InvalidElement(_))
        ));
        let reflection = Matrix4::from_diagonal(&nalgebra::Vector4::new(-1.0, 1.0, 1.0, 1.0));
        assert!(SO4::from_matrix(reflection).is_err());
    }

    #[test]
    fn test_so4_random_is_valid() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let q = SO4::random(&mut rng).unwrap();
            assert!(q.is_valid(TOLERANCE), "seed {seed}");
        }
    }

    #[test]
    fn test_so4_display() {
        let s = format!("{}", SO4::identity());
        assert!(s.starts_with("SO4("));
        assert!(s.contains("[1.0000, 0.0000, 0.0000, 0.0000]"));
    }
}
