use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers;
use faer::sparse::{SparseColMat, Triplet};
use nalgebra::DVector;

use super::{LinAlgError, LinAlgResult, LinearSolver, LinearSystem, check_damping, finite_solution};

/// Sparse LLᵀ on the damped normal equations.
///
/// The symbolic factorization only depends on the sparsity pattern, which stays
/// fixed across LM iterations, so it is computed once and reused until the
/// pattern changes.
#[derive(Debug, Clone, Default)]
pub struct SparseCholeskySolver {
    symbolic_pattern: Option<CachedSymbolic>,
}

#[derive(Debug, Clone)]
struct CachedSymbolic {
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    symbolic: solvers::SymbolicLlt<usize>,
}

impl SparseCholeskySolver {
    pub fn new() -> Self {
        SparseCholeskySolver {
            symbolic_pattern: None,
        }
    }

    fn symbolic_for(
        &mut self,
        matrix: &SparseColMat<usize, f64>,
    ) -> LinAlgResult<solvers::SymbolicLlt<usize>> {
        let pattern = matrix.symbolic();
        if let Some(cached) = &self.symbolic_pattern
            && cached.col_ptr == pattern.col_ptr()
            && cached.row_idx == pattern.row_idx()
        {
            return Ok(cached.symbolic.clone());
        }

        let symbolic = solvers::SymbolicLlt::try_new(pattern, faer::Side::Lower)
            .map_err(|e| LinAlgError::FactorizationFailed(format!("symbolic LLT: {e:?}")))?;
        self.symbolic_pattern = Some(CachedSymbolic {
            col_ptr: pattern.col_ptr().to_vec(),
            row_idx: pattern.row_idx().to_vec(),
            symbolic: symbolic.clone(),
        });
        Ok(symbolic)
    }
}

impl LinearSolver for SparseCholeskySolver {
    fn solve(
        &mut self,
        system: &LinearSystem,
        damping: &DVector<f64>,
    ) -> LinAlgResult<DVector<f64>> {
        check_damping(system, damping)?;
        let n = system.dim;

        let mut triplets = Vec::with_capacity(system.hessian.len() + n);
        triplets.extend_from_slice(&system.hessian);
        triplets.extend((0..n).map(|i| Triplet::new(i, i, damping[i])));
        let hessian = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &triplets)
            .map_err(|e| LinAlgError::MatrixConversion(format!("{e:?}")))?;

        let symbolic = self.symbolic_for(&hessian)?;
        let cholesky =
            solvers::Llt::try_new_with_symbolic(symbolic, hessian.as_ref(), faer::Side::Lower)
                .map_err(|e| {
                    LinAlgError::SingularMatrix(format!(
                        "damped Hessian is not positive definite: {e:?}"
                    ))
                })?;

        let rhs = faer::Mat::<f64>::from_fn(n, 1, |i, _| -system.gradient[i]);
        let solution = cholesky.solve(rhs);
        finite_solution(&solution, n)
    }
}
