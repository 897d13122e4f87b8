//! Linear least-squares solvers for the assembled localization system.
//!
//! The Jacobian is dense, has at most three columns and may be rank
//! deficient (several landmarks seen through the same sensor produce
//! collinear blocks). Both solvers therefore work from a singular value
//! decomposition instead of the normal equations:
//! - [`PseudoInverseSolver`]: minimum-norm least squares, `x = J⁺ r`
//! - [`DampedLeastSquaresSolver`]: Tikhonov-filtered, `x = (JᵀJ + λI)⁻¹ Jᵀ r`

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::config::LocalizerConfig;
use crate::core::assembler::AssembledSystem;
use crate::error::LocalizerResult;

pub mod svd;

pub use svd::{DampedLeastSquaresSolver, PseudoInverseSolver};

/// Solver backend used by the localizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OffsetSolverType {
    /// Moore-Penrose pseudo-inverse (minimum-norm least squares)
    #[default]
    PseudoInverse,
    /// Singular values filtered by a damping factor
    DampedLeastSquares,
}

/// Result of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetSolution {
    /// Pose offset, one entry per Jacobian column
    pub offset: DVector<f64>,
    /// Numerical rank of the Jacobian
    pub rank: usize,
}

impl OffsetSolution {
    pub fn empty() -> Self {
        Self {
            offset: DVector::zeros(0),
            rank: 0,
        }
    }

    pub fn is_rank_deficient(&self) -> bool {
        self.rank < self.offset.len()
    }
}

/// Common interface for pose-offset solvers
pub trait OffsetSolver: Send + Sync {
    /// Solve `jacobian · offset ≈ residual` in the least-squares sense.
    fn solve(&self, system: &AssembledSystem) -> LocalizerResult<OffsetSolution>;

    fn solver_type(&self) -> OffsetSolverType;
}

/// Create the solver selected by `config`.
pub fn create_solver(config: &LocalizerConfig) -> Box<dyn OffsetSolver> {
    match config.solver_type {
        OffsetSolverType::PseudoInverse => {
            Box::new(PseudoInverseSolver::new(config.singular_value_tolerance))
        }
        OffsetSolverType::DampedLeastSquares => Box::new(DampedLeastSquaresSolver::new(
            config.damping,
            config.singular_value_tolerance,
        )),
    }
}
