use nalgebra::{DMatrix, DVector, SVD};
use tracing::debug;

use super::{OffsetSolution, OffsetSolver, OffsetSolverType};
use crate::core::assembler::AssembledSystem;
use crate::error::{LocalizerError, LocalizerResult};

/// Degenerate shapes that need no decomposition.
///
/// No columns: nothing to correct. No rows: every offset explains the
/// empty system equally well, the minimum-norm one is zero.
fn trivial_solution(jacobian: &DMatrix<f64>) -> Option<OffsetSolution> {
    if jacobian.ncols() == 0 {
        return Some(OffsetSolution::empty());
    }
    if jacobian.nrows() == 0 {
        return Some(OffsetSolution {
            offset: DVector::zeros(jacobian.ncols()),
            rank: 0,
        });
    }
    None
}

/// Iteration cap of the SVD.
const SVD_MAX_ITERATIONS: usize = 1000;

fn decompose(system: &AssembledSystem) -> LocalizerResult<SVD<f64, nalgebra::Dyn, nalgebra::Dyn>> {
    let finite = system.jacobian.iter().all(|v| v.is_finite())
        && system.residual.iter().all(|v| v.is_finite());
    if !finite {
        return Err(LocalizerError::LinearAlgebra(
            "assembled system contains non-finite entries".to_string(),
        ));
    }
    let jacobian = system.jacobian.clone();
    SVD::try_new(jacobian, true, true, f64::EPSILON, SVD_MAX_ITERATIONS).ok_or_else(|| {
        LocalizerError::LinearAlgebra(format!(
            "SVD did not converge within {SVD_MAX_ITERATIONS} iterations"
        ))
    })
}

fn numerical_rank(singular_values: &DVector<f64>, tolerance: f64) -> usize {
    singular_values.iter().filter(|&&s| s > tolerance).count()
}

/// Minimum-norm least-squares solver based on the SVD pseudo-inverse.
///
/// Singular values at or below `tolerance` are treated as zero, so a
/// rank-deficient Jacobian yields the minimum-norm solution rather than
/// an error.
#[derive(Debug, Clone)]
pub struct PseudoInverseSolver {
    tolerance: f64,
}

impl PseudoInverseSolver {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}

impl Default for PseudoInverseSolver {
    fn default() -> Self {
        Self::new(1e-9)
    }
}

impl OffsetSolver for PseudoInverseSolver {
    fn solve(&self, system: &AssembledSystem) -> LocalizerResult<OffsetSolution> {
        if let Some(solution) = trivial_solution(&system.jacobian) {
            return Ok(solution);
        }

        let svd = decompose(system)?;
        let rank = numerical_rank(&svd.singular_values, self.tolerance);
        let offset = svd
            .solve(&system.residual, self.tolerance)
            .map_err(|e| LocalizerError::LinearAlgebra(e.to_string()))?;

        if rank < system.jacobian.ncols() {
            debug!(
                rank,
                cols = system.jacobian.ncols(),
                "rank-deficient system, using minimum-norm solution"
            );
        }
        Ok(OffsetSolution { offset, rank })
    }

    fn solver_type(&self) -> OffsetSolverType {
        OffsetSolverType::PseudoInverse
    }
}

/// Damped least squares: `x = Σ σᵢ / (σᵢ² + λ) · (uᵢᵀ r) · vᵢ`.
///
/// With `damping == 0` this is the pseudo-inverse. Singular values at or
/// below `tolerance` are dropped in both cases.
#[derive(Debug, Clone)]
pub struct DampedLeastSquaresSolver {
    damping: f64,
    tolerance: f64,
}

impl DampedLeastSquaresSolver {
    pub fn new(damping: f64, tolerance: f64) -> Self {
        Self { damping, tolerance }
    }

    pub fn damping(&self) -> f64 {
        self.damping
    }
}

impl OffsetSolver for DampedLeastSquaresSolver {
    fn solve(&self, system: &AssembledSystem) -> LocalizerResult<OffsetSolution> {
        if let Some(solution) = trivial_solution(&system.jacobian) {
            return Ok(solution);
        }

        let svd = decompose(system)?;
        let (u, v_t) = match (&svd.u, &svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => {
                return Err(LocalizerError::LinearAlgebra(
                    "SVD singular vectors were not computed".to_string(),
                ));
            }
        };

        let mut offset = DVector::<f64>::zeros(system.jacobian.ncols());
        for (i, &sigma) in svd.singular_values.iter().enumerate() {
            if sigma <= self.tolerance {
                continue;
            }
            let projection = u.column(i).dot(&system.residual);
            let gain = sigma / (sigma * sigma + self.damping);
            offset += v_t.row(i).transpose() * (gain * projection);
        }

        let rank = numerical_rank(&svd.singular_values, self.tolerance);
        Ok(OffsetSolution { offset, rank })
    }

    fn solver_type(&self) -> OffsetSolverType {
        OffsetSolverType::DampedLeastSquares
    }
}
