//! Heterogeneous variable storage.
//!
//! [`Values`] maps keys to variables living on different manifolds. Since no
//! single type fits every variable, each one is wrapped in [`VariableEnum`], a sum
//! type over the supported manifolds. Typed access goes through [`ValueType`].
//!
//! [`VectorValues`] holds one tangent increment per key; the optimizer produces
//! one per iteration and applies it with [`Values::retract`].

use crate::core::CoreError;
use crate::core::key::Key;
use crate::error::LieOptResult;
use crate::manifold::{
    LieGroup, Manifold, ManifoldError, ManifoldResult, ManifoldType, rn::Rn, se2::SE2, so4::SO4,
};
use nalgebra::DVector;
use std::collections::HashMap;
use std::fmt;

/// Enum to handle mixed manifold variable types
#[derive(Clone, Debug, PartialEq)]
pub enum VariableEnum {
    Rn(Rn),
    SE2(SE2),
    SO4(SO4),
}

impl VariableEnum {
    pub fn manifold_type(&self) -> ManifoldType {
        match self {
            VariableEnum::Rn(_) => ManifoldType::RN,
            VariableEnum::SE2(_) => ManifoldType::SE2,
            VariableEnum::SO4(_) => ManifoldType::SO4,
        }
    }

    /// Tangent space dimension of the wrapped variable
    pub fn dim(&self) -> usize {
        match self {
            VariableEnum::Rn(v) => v.dim(),
            VariableEnum::SE2(v) => v.dim(),
            VariableEnum::SO4(v) => v.dim(),
        }
    }

    /// Apply the variable's own chart.
    pub fn retract(&self, delta: &DVector<f64>) -> ManifoldResult<VariableEnum> {
        Ok(match self {
            VariableEnum::Rn(v) => VariableEnum::Rn(v.retract(delta)?),
            VariableEnum::SE2(v) => VariableEnum::SE2(v.retract(delta)?),
            VariableEnum::SO4(v) => VariableEnum::SO4(v.retract(delta)?),
        })
    }

    pub fn local_coordinates(&self, other: &VariableEnum) -> ManifoldResult<DVector<f64>> {
        match (self, other) {
            (VariableEnum::Rn(a), VariableEnum::Rn(b)) => a.local_coordinates(b),
            (VariableEnum::SE2(a), VariableEnum::SE2(b)) => a.local_coordinates(b),
            (VariableEnum::SO4(a), VariableEnum::SO4(b)) => a.local_coordinates(b),
            _ => Err(ManifoldError::InvalidElement(format!(
                "cannot compare {} with {}",
                self.manifold_type(),
                other.manifold_type()
            ))),
        }
    }

    pub fn equals(&self, other: &VariableEnum, tolerance: f64) -> bool {
        match (self, other) {
            (VariableEnum::Rn(a), VariableEnum::Rn(b)) => a.equals(b, tolerance),
            (VariableEnum::SE2(a), VariableEnum::SE2(b)) => a.equals(b, tolerance),
            (VariableEnum::SO4(a), VariableEnum::SO4(b)) => a.equals(b, tolerance),
            _ => false,
        }
    }
}

impl fmt::Display for VariableEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableEnum::Rn(v) => write!(f, "{v}"),
            VariableEnum::SE2(v) => write!(f, "{v}"),
            VariableEnum::SO4(v) => write!(f, "{v}"),
        }
    }
}

/// A manifold type that can be stored in [`Values`].
pub trait ValueType: LieGroup {
    const MANIFOLD_TYPE: ManifoldType;

    fn from_variable(variable: &VariableEnum) -> Option<&Self>;

    fn into_variable(self) -> VariableEnum;
}

impl ValueType for Rn {
    const MANIFOLD_TYPE: ManifoldType = ManifoldType::RN;

    fn from_variable(variable: &VariableEnum) -> Option<&Self> {
        match variable {
            VariableEnum::Rn(v) => Some(v),
            _ => None,
        }
    }

    fn into_variable(self) -> VariableEnum {
        VariableEnum::Rn(self)
    }
}

impl ValueType for SE2 {
    const MANIFOLD_TYPE: ManifoldType = ManifoldType::SE2;

    fn from_variable(variable: &VariableEnum) -> Option<&Self> {
        match variable {
            VariableEnum::SE2(v) => Some(v),
            _ => None,
        }
    }

    fn into_variable(self) -> VariableEnum {
        VariableEnum::SE2(self)
    }
}

impl ValueType for SO4 {
    const MANIFOLD_TYPE: ManifoldType = ManifoldType::SO4;

    fn from_variable(variable: &VariableEnum) -> Option<&Self> {
        match variable {
            VariableEnum::SO4(v) => Some(v),
            _ => None,
        }
    }

    fn into_variable(self) -> VariableEnum {
        VariableEnum::SO4(self)
    }
}

/// Key-indexed current estimates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Values {
    variables: HashMap<Key, VariableEnum>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new variable. Fails if the key is already present.
    pub fn insert<T: ValueType>(&mut self, key: Key, value: T) -> Result<(), CoreError> {
        self.insert_variable(key, value.into_variable())
    }

    pub fn insert_variable(&mut self, key: Key, variable: VariableEnum) -> Result<(), CoreError> {
        if self.variables.contains_key(&key) {
            return Err(CoreError::DuplicateKey(key));
        }
        self.variables.insert(key, variable);
        Ok(())
    }

    /// Replace an existing variable, keeping its manifold type.
    pub fn update<T: ValueType>(&mut self, key: Key, value: T) -> Result<(), CoreError> {
        let slot = self
            .variables
            .get_mut(&key)
            .ok_or(CoreError::MissingVariable(key))?;
        if slot.manifold_type() != T::MANIFOLD_TYPE {
            return Err(CoreError::TypeMismatch {
                key,
                expected: slot.manifold_type(),
                actual: T::MANIFOLD_TYPE,
            });
        }
        *slot = value.into_variable();
        Ok(())
    }

    pub fn get(&self, key: Key) -> Option<&VariableEnum> {
        self.variables.get(&key)
    }

    /// Typed access to a variable.
    pub fn at<T: ValueType>(&self, key: Key) -> Result<&T, CoreError> {
        let variable = self.get(key).ok_or(CoreError::MissingVariable(key))?;
        T::from_variable(variable).ok_or(CoreError::TypeMismatch {
            key,
            expected: T::MANIFOLD_TYPE,
            actual: variable.manifold_type(),
        })
    }

    pub fn contains(&self, key: Key) -> bool {
        self.variables.contains_key(&key)
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self.variables.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &VariableEnum)> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Total tangent dimension.
    pub fn dim(&self) -> usize {
        self.variables.values().map(|v| v.dim()).sum()
    }

    /// Tangent dimension per key.
    pub fn dims(&self) -> HashMap<Key, usize> {
        self.variables.iter().map(|(k, v)| (*k, v.dim())).collect()
    }

    /// Retract every variable by its increment. Keys without an increment are
    /// copied unchanged.
    pub fn retract(&self, delta: &VectorValues) -> LieOptResult<Values> {
        if let Some(key) = delta.keys().find(|k| !self.contains(**k)) {
            return Err(CoreError::MissingVariable(*key).into());
        }
        let mut variables = HashMap::with_capacity(self.variables.len());
        for (key, variable) in &self.variables {
            let updated = match delta.get(*key) {
                Some(d) => variable.retract(d)?,
                None => variable.clone(),
            };
            variables.insert(*key, updated);
        }
        Ok(Values { variables })
    }

    /// Increments taking `self` to `other`, for every key of `self`.
    pub fn local_coordinates(&self, other: &Values) -> LieOptResult<VectorValues> {
        let mut result = VectorValues::new();
        for (key, variable) in &self.variables {
            let target = other.get(*key).ok_or(CoreError::MissingVariable(*key))?;
            result.insert(*key, variable.local_coordinates(target)?);
        }
        Ok(result)
    }

    /// Same keys and every variable within `tolerance`.
    pub fn equals(&self, other: &Values, tolerance: f64) -> bool {
        self.len() == other.len()
            && self.variables.iter().all(|(key, variable)| {
                other
                    .get(*key)
                    .is_some_and(|o| variable.equals(o, tolerance))
            })
    }
}

impl fmt::Display for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Values with {} variables:", self.len())?;
        for key in self.keys() {
            if let Some(v) = self.get(key) {
                writeln!(f, "  {key}: {v}")?;
            }
        }
        Ok(())
    }
}

/// Tangent-space increments, one vector per key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VectorValues {
    vectors: HashMap<Key, DVector<f64>>,
}

impl VectorValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero increment for every variable of `values`.
    pub fn zero_like(values: &Values) -> Self {
        VectorValues {
            vectors: values
                .iter()
                .map(|(k, v)| (*k, DVector::zeros(v.dim())))
                .collect(),
        }
    }

    pub fn insert(&mut self, key: Key, vector: DVector<f64>) {
        self.vectors.insert(key, vector);
    }

    pub fn get(&self, key: Key) -> Option<&DVector<f64>> {
        self.vectors.get(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.vectors.keys()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Euclidean norm of all increments stacked.
    pub fn norm(&self) -> f64 {
        self.vectors
            .values()
            .map(|v| v.norm_squared())
            .sum::<f64>()
            .sqrt()
    }
}
