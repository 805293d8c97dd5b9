use faer::{
    Mat,
    linalg::solvers::SolveLstsqCore,
    sparse::{SparseColMat, Triplet, linalg::solvers},
};
use nalgebra::DVector;

use super::{LinAlgError, LinAlgResult, LinearSolver, LinearSystem, check_damping, finite_solution};

/// Sparse QR on the augmented least-squares problem.
///
/// `(JᵀJ + D) δ = -Jᵀr` is the normal equation of
///
/// ```text
/// [ J  ]     [ -r ]
/// [ √D ] δ ≈ [  0 ]
/// ```
///
/// which is factorized directly, without forming `JᵀJ`. The damping rows are
/// always present, so the augmented pattern only changes with `J` and the
/// symbolic analysis is reused across λ trials.
#[derive(Debug, Clone, Default)]
pub struct SparseQRSolver {
    symbolic_pattern: Option<CachedSymbolic>,
}

#[derive(Debug, Clone)]
struct CachedSymbolic {
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    symbolic: solvers::SymbolicQr<usize>,
}

impl SparseQRSolver {
    pub fn new() -> Self {
        SparseQRSolver {
            symbolic_pattern: None,
        }
    }

    fn symbolic_for(
        &mut self,
        matrix: &SparseColMat<usize, f64>,
    ) -> LinAlgResult<solvers::SymbolicQr<usize>> {
        let pattern = matrix.symbolic();
        if let Some(cached) = &self.symbolic_pattern
            && cached.col_ptr == pattern.col_ptr()
            && cached.row_idx == pattern.row_idx()
        {
            return Ok(cached.symbolic.clone());
        }

        let symbolic = solvers::SymbolicQr::try_new(pattern)
            .map_err(|e| LinAlgError::FactorizationFailed(format!("symbolic QR: {e:?}")))?;
        self.symbolic_pattern = Some(CachedSymbolic {
            col_ptr: pattern.col_ptr().to_vec(),
            row_idx: pattern.row_idx().to_vec(),
            symbolic: symbolic.clone(),
        });
        Ok(symbolic)
    }
}

impl LinearSolver for SparseQRSolver {
    fn solve(
        &mut self,
        system: &LinearSystem,
        damping: &DVector<f64>,
    ) -> LinAlgResult<DVector<f64>> {
        check_damping(system, damping)?;
        let m = system.rows;
        let n = system.dim;

        let mut triplets = Vec::with_capacity(system.jacobian.len() + n);
        triplets.extend_from_slice(&system.jacobian);
        for (i, d) in damping.iter().enumerate() {
            if *d < 0.0 {
                return Err(LinAlgError::InvalidInput(format!(
                    "negative damping {d} at column {i}"
                )));
            }
            triplets.push(Triplet::new(m + i, i, d.sqrt()));
        }
        let augmented = SparseColMat::<usize, f64>::try_new_from_triplets(m + n, n, &triplets)
            .map_err(|e| LinAlgError::MatrixConversion(format!("{e:?}")))?;

        let mut rhs = Mat::<f64>::zeros(m + n, 1);
        for i in 0..m {
            rhs[(i, 0)] = -system.residual[i];
        }

        let symbolic = self.symbolic_for(&augmented)?;
        let qr = solvers::Qr::try_new_with_symbolic(symbolic, augmented.as_ref())
            .map_err(|e| LinAlgError::FactorizationFailed(format!("sparse QR: {e:?}")))?;
        qr.solve_lstsq_in_place_with_conj(faer::Conj::No, rhs.as_mut());

        // the solution sits in the top n rows
        finite_solution(&rhs, n)
    }
}
