//! Linearization of a factor graph around the current values.
//!
//! Every factor is linearized in parallel, then the whitened blocks are
//! scattered into a global sparse system following a [`VariableLayout`]. The
//! layout is derived from the caller's [`Ordering`]: the first key of the
//! ordering owns the first columns, and so on.

use crate::core::CoreError;
use crate::core::graph::FactorGraph;
use crate::core::key::Key;
use crate::core::ordering::Ordering;
use crate::core::values::{Values, VectorValues};
use crate::error::LieOptResult;
use crate::linalg::LinearSystem;
use crate::optimizer::OptimizerError;
use faer::sparse::Triplet;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::collections::HashMap;

/// Column offsets of every variable in the global tangent vector.
#[derive(Debug, Clone)]
pub struct VariableLayout {
    ordering: Ordering,
    blocks: HashMap<Key, (usize, usize)>,
    dim: usize,
}

impl VariableLayout {
    /// Build the layout for `values` in `ordering` order.
    ///
    /// The ordering must name every variable exactly once and nothing else.
    pub fn new(ordering: &Ordering, values: &Values) -> LieOptResult<Self> {
        if ordering.len() != values.len() {
            return Err(OptimizerError::OrderingMismatch(format!(
                "ordering has {} keys, values has {}",
                ordering.len(),
                values.len()
            ))
            .into());
        }

        let mut blocks = HashMap::with_capacity(ordering.len());
        let mut offset = 0;
        for key in ordering.iter() {
            let variable = values.get(*key).ok_or_else(|| {
                OptimizerError::OrderingMismatch(format!("key {key} is not in values"))
            })?;
            let dim = variable.dim();
            blocks.insert(*key, (offset, dim));
            offset += dim;
        }

        Ok(VariableLayout {
            ordering: ordering.clone(),
            blocks,
            dim: offset,
        })
    }

    /// `(offset, dim)` of a variable.
    pub fn block(&self, key: Key) -> Option<(usize, usize)> {
        self.blocks.get(&key).copied()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn ordering(&self) -> &Ordering {
        &self.ordering
    }

    /// Cut a global increment into per-variable increments.
    pub fn split(&self, delta: &DVector<f64>) -> VectorValues {
        let mut result = VectorValues::new();
        for key in self.ordering.iter() {
            if let Some((offset, dim)) = self.block(*key) {
                result.insert(*key, delta.rows(offset, dim).into_owned());
            }
        }
        result
    }
}

/// Whitened residual and Jacobian of one factor.
struct WhitenedBlock {
    residual: DVector<f64>,
    jacobian: DMatrix<f64>,
}

/// Linearize every factor at `values` and assemble the global system.
pub fn linearize(
    graph: &FactorGraph,
    values: &Values,
    layout: &VariableLayout,
) -> LieOptResult<LinearSystem> {
    let blocks: Vec<WhitenedBlock> = graph
        .factors()
        .par_iter()
        .map(|factor| -> LieOptResult<WhitenedBlock> {
            let (residual, jacobian) = factor.linearize(values, true)?;
            let jacobian = jacobian.ok_or_else(|| {
                CoreError::DimensionMismatch("factor returned no Jacobian".to_string())
            })?;
            let noise = factor.noise_model();
            Ok(WhitenedBlock {
                residual: noise.whiten(&residual)?,
                jacobian: noise.whiten_jacobian(&jacobian)?,
            })
        })
        .collect::<LieOptResult<Vec<_>>>()?;

    let n = layout.dim();
    let rows: usize = blocks.iter().map(|block| block.residual.len()).sum();
    let mut residual = DVector::zeros(rows);
    let mut gradient = DVector::zeros(n);
    let mut hessian_diagonal = DVector::zeros(n);
    let mut jacobian_triplets = Vec::new();
    let mut hessian_triplets = Vec::new();

    let mut row_start = 0;
    for (factor, block) in graph.factors().iter().zip(&blocks) {
        let factor_rows = block.residual.len();

        // column blocks of this factor: (global offset, local offset, width)
        let mut columns = Vec::with_capacity(factor.keys().len());
        let mut local = 0;
        for key in factor.keys() {
            let (offset, dim) = layout
                .block(*key)
                .ok_or(CoreError::MissingVariable(*key))?;
            columns.push((offset, local, dim));
            local += dim;
        }
        if local != block.jacobian.ncols() || factor_rows != block.jacobian.nrows() {
            return Err(CoreError::DimensionMismatch(format!(
                "factor on {:?} returned a {}x{} Jacobian, expected {}x{}",
                factor.keys(),
                block.jacobian.nrows(),
                block.jacobian.ncols(),
                factor_rows,
                local
            ))
            .into());
        }

        residual.rows_mut(row_start, factor_rows).copy_from(&block.residual);

        for &(offset_a, local_a, dim_a) in &columns {
            let j_a = block.jacobian.columns(local_a, dim_a);

            for c in 0..dim_a {
                for r in 0..factor_rows {
                    let value = j_a[(r, c)];
                    if value != 0.0 {
                        jacobian_triplets.push(Triplet::new(row_start + r, offset_a + c, value));
                    }
                }
            }

            let g_a = j_a.transpose() * &block.residual;
            let mut g_slot = gradient.rows_mut(offset_a, dim_a);
            g_slot += &g_a;

            for &(offset_b, local_b, dim_b) in &columns {
                let j_b = block.jacobian.columns(local_b, dim_b);
                let h_ab = j_a.transpose() * j_b;
                for c in 0..dim_b {
                    for r in 0..dim_a {
                        let value = h_ab[(r, c)];
                        if value != 0.0 {
                            hessian_triplets.push(Triplet::new(offset_a + r, offset_b + c, value));
                        }
                    }
                }
                if offset_a == offset_b {
                    for i in 0..dim_a {
                        hessian_diagonal[offset_a + i] += h_ab[(i, i)];
                    }
                }
            }
        }

        row_start += factor_rows;
    }

    Ok(LinearSystem {
        dim: n,
        rows,
        error: 0.5 * residual.norm_squared(),
        residual,
        jacobian: jacobian_triplets,
        hessian: hessian_triplets,
        gradient,
        hessian_diagonal,
    })
}
