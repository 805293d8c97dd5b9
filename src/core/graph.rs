//! Factor graph container.

use crate::core::factor::Factor;
use crate::core::key::Key;
use crate::core::values::Values;
use crate::error::LieOptResult;
use std::collections::BTreeSet;

/// An ordered collection of factors.
#[derive(Default)]
pub struct FactorGraph {
    factors: Vec<Box<dyn Factor>>,
}

impl FactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F: Factor + 'static>(&mut self, factor: F) {
        self.factors.push(Box::new(factor));
    }

    pub fn add_boxed(&mut self, factor: Box<dyn Factor>) {
        self.factors.push(factor);
    }

    pub fn factors(&self) -> &[Box<dyn Factor>] {
        &self.factors
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Total residual dimension.
    pub fn dim(&self) -> usize {
        self.factors.iter().map(|f| f.dim()).sum()
    }

    /// Every key referenced by some factor, ascending.
    pub fn keys(&self) -> BTreeSet<Key> {
        self.factors
            .iter()
            .flat_map(|f| f.keys().iter().copied())
            .collect()
    }

    /// Sum of factor errors, `½ Σ ‖r̃ᵢ‖²`.
    ///
    /// Evaluated serially in insertion order so the value is reproducible.
    pub fn error(&self, values: &Values) -> LieOptResult<f64> {
        let mut total = 0.0;
        for factor in &self.factors {
            total += factor.error(values)?;
        }
        Ok(total)
    }
}

impl std::fmt::Debug for FactorGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactorGraph")
            .field("factors", &self.factors.len())
            .field("dim", &self.dim())
            .finish()
    }
}
