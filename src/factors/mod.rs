//! Factor implementations for the factor graph
//!
//! - [`PriorFactor`]: anchors a variable of any Lie group to a known value
//! - [`BetweenFactor`]: relative measurement between two variables of the same group
//! - [`LandmarkObservationFactor`]: a 2D landmark seen from an SE(2) pose
//! - [`FrobeniusPriorFactor`] / [`FrobeniusBetweenFactor`]: SO(4) constraints
//!   measured in the ambient 4×4 matrix space, which need no logarithm
//!
//! Every factor reports the raw residual; the graph applies the noise model.

use nalgebra::DMatrix;

pub mod between_factor;
pub mod frobenius_factor;
pub mod landmark_factor;
pub mod prior_factor;

pub use between_factor::BetweenFactor;
pub use frobenius_factor::{FrobeniusBetweenFactor, FrobeniusPriorFactor};
pub use landmark_factor::LandmarkObservationFactor;
pub use prior_factor::PriorFactor;

/// Concatenate Jacobian blocks side by side.
pub(crate) fn hstack(blocks: &[&DMatrix<f64>]) -> DMatrix<f64> {
    let rows = blocks.first().map_or(0, |b| b.nrows());
    let cols = blocks.iter().map(|b| b.ncols()).sum();
    let mut result = DMatrix::zeros(rows, cols);
    let mut offset = 0;
    for block in blocks {
        result.columns_mut(offset, block.ncols()).copy_from(block);
        offset += block.ncols();
    }
    result
}
