//! Global weighted system assembly.
//!
//! Every observation contributes a contiguous row range, in collection
//! order, to both the residual vector and the Jacobian:
//!
//! ```text
//!   residual rows  r_i = w_i ⊙ (observed_i − reference_i)
//!   jacobian rows  J_i = diag(w_i) · select(Jf_i · Js_i, mask_i)
//! ```
//!
//! Each block `J_i` is written starting at column 0 of the global Jacobian.
//! The width of the global Jacobian is the number of DOFs selected by the
//! union of all masks. Observations selecting different DOF subsets
//! therefore share columns; the result is only meaningful when all masks
//! agree, and a warning is emitted when they do not.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::core::observation::{Dof, DofMask, ObservationSample};
use crate::core::observation_set::ObservationSet;
use crate::error::LocalizerResult;
use crate::signal::{SignalSource, Tick};

/// Stacked residual and Jacobian for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledSystem {
    pub residual: DVector<f64>,
    pub jacobian: DMatrix<f64>,
    /// DOFs selected by at least one observation, in pose order
    pub selected_dofs: Vec<Dof>,
}

impl AssembledSystem {
    pub fn empty() -> Self {
        Self {
            residual: DVector::zeros(0),
            jacobian: DMatrix::zeros(0, 0),
            selected_dofs: Vec::new(),
        }
    }

    /// Number of residual rows.
    pub fn problem_size(&self) -> usize {
        self.residual.len()
    }

    /// Number of Jacobian columns.
    pub fn dof_count(&self) -> usize {
        self.jacobian.ncols()
    }
}

/// Builds the weighted least-squares system from an observation set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAssembler;

impl SystemAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the system for `tick`.
    ///
    /// All observations are read and validated before anything is written,
    /// so a failing observation never yields a partial system.
    pub fn assemble<S: SignalSource + ?Sized>(
        &self,
        observations: &ObservationSet,
        source: &S,
        tick: Tick,
    ) -> LocalizerResult<AssembledSystem> {
        let samples = observations
            .iter()
            .map(|obs| obs.sample(source, tick))
            .collect::<LocalizerResult<Vec<_>>>()?;

        let system = self.assemble_samples(&samples);
        debug!(
            tick,
            observations = samples.len(),
            rows = system.problem_size(),
            cols = system.dof_count(),
            "assembled localization system"
        );
        Ok(system)
    }

    /// Assemble already-validated samples, in order.
    pub fn assemble_samples(&self, samples: &[ObservationSample]) -> AssembledSystem {
        if samples.is_empty() {
            return AssembledSystem::empty();
        }

        let problem_size: usize = samples.iter().map(|s| s.feature_dimension()).sum();
        let union = samples
            .iter()
            .fold(DofMask::NONE, |acc, s| acc.union(&s.corrected_dofs));
        if samples
            .iter()
            .any(|s| s.corrected_dofs != samples[0].corrected_dofs)
        {
            warn!(
                union = %union,
                "observations correct different DOF subsets; their Jacobian blocks share leading columns"
            );
        }

        let mut residual = DVector::<f64>::zeros(problem_size);
        let mut jacobian = DMatrix::<f64>::zeros(problem_size, union.count());

        let mut row = 0;
        for sample in samples {
            let nf = sample.feature_dimension();
            if nf == 0 {
                continue;
            }

            residual
                .rows_mut(row, nf)
                .copy_from(&sample.weighted_residual());

            let block = sample.weighted_jacobian();
            jacobian
                .view_mut((row, 0), (nf, block.ncols()))
                .copy_from(&block);

            row += nf;
        }

        AssembledSystem {
            residual,
            jacobian,
            selected_dofs: union.selected(),
        }
    }
}
