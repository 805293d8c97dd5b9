//! Rⁿ - Euclidean vector space
//!
//! The additive group of n-dimensional vectors. Landmarks, velocities and
//! calibration parameters live here. Every chart is plain addition and every
//! Jacobian is ±I.

use crate::manifold::{LieGroup, Manifold, ManifoldError, ManifoldResult, check_tangent_dim};
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// Euclidean vector of runtime dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct Rn {
    data: DVector<f64>,
}

impl fmt::Display for Rn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rn(")?;
        for (i, value) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value:.4}")?;
        }
        write!(f, ")")
    }
}

impl From<DVector<f64>> for Rn {
    fn from(data: DVector<f64>) -> Self {
        Rn::new(data)
    }
}

impl Rn {
    pub fn new(data: DVector<f64>) -> Self {
        Rn { data }
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Rn::new(DVector::from_column_slice(values))
    }

    /// The zero vector (group identity) of dimension `n`.
    pub fn zeros(n: usize) -> Self {
        Rn::new(DVector::zeros(n))
    }

    pub fn data(&self) -> &DVector<f64> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn same_dim(&self, other: &Rn) -> ManifoldResult<()> {
        if self.len() == other.len() {
            Ok(())
        } else {
            Err(ManifoldError::InvalidElement(format!(
                "dimension mismatch: R{} vs R{}",
                self.len(),
                other.len()
            )))
        }
    }
}

impl Manifold for Rn {
    fn dim(&self) -> usize {
        self.data.len()
    }

    fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<Self> {
        check_tangent_dim(self.len(), delta.len())?;
        Ok(Rn::new(&self.data + delta))
    }

    fn local_coordinates(&self, other: &Self) -> ManifoldResult<DVector<f64>> {
        self.same_dim(other)?;
        Ok(&other.data - &self.data)
    }

    fn equals(&self, other: &Self, tolerance: f64) -> bool {
        self.len() == other.len() && (&self.data - &other.data).amax() <= tolerance
    }
}

impl LieGroup for Rn {
    /// Vector addition. Mismatched dimensions are a caller error and panic inside nalgebra.
    fn compose(
        &self,
        other: &Self,
        jacobian_self: Option<&mut DMatrix<f64>>,
        jacobian_other: Option<&mut DMatrix<f64>>,
    ) -> Self {
        let n = self.len();
        if let Some(jac) = jacobian_self {
            *jac = DMatrix::identity(n, n);
        }
        if let Some(jac) = jacobian_other {
            *jac = DMatrix::identity(n, n);
        }
        Rn::new(&self.data + &other.data)
    }

    fn inverse(&self, jacobian: Option<&mut DMatrix<f64>>) -> Self {
        let n = self.len();
        if let Some(jac) = jacobian {
            *jac = -DMatrix::identity(n, n);
        }
        Rn::new(-&self.data)
    }

    fn expmap(tangent: &DVector<f64>, jacobian: Option<&mut DMatrix<f64>>) -> ManifoldResult<Self> {
        let n = tangent.len();
        if let Some(jac) = jacobian {
            *jac = DMatrix::identity(n, n);
        }
        Ok(Rn::new(tangent.clone()))
    }

    fn logmap(&self, jacobian: Option<&mut DMatrix<f64>>) -> ManifoldResult<DVector<f64>> {
        let n = self.len();
        if let Some(jac) = jacobian {
            *jac = DMatrix::identity(n, n);
        }
        Ok(self.data.clone())
    }

    fn adjoint_map(&self) -> DMatrix<f64> {
        let n = self.len();
        DMatrix::identity(n, n)
    }
}
