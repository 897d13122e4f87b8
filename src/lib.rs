//! # Landmark Localizer
//!
//! Corrects a mobile robot's planar pose (x, y, heading) by fusing several
//! landmark sightings into one weighted least-squares problem, solved once
//! per control tick.
//!
//! ## Pipeline
//!
//! - Each [`LandmarkObservation`] names six time-indexed inputs: sensor and
//!   feature Jacobians, reference and observed feature positions, per-row
//!   weights and the mask of pose DOFs it may correct.
//! - The [`SystemAssembler`] stacks weighted residuals and DOF-masked,
//!   weighted Jacobian blocks of every observation into one system.
//! - An [`OffsetSolver`] computes the minimum-norm least-squares offset from
//!   a singular value decomposition.
//! - The [`Localizer`] orchestrates both on demand and caches the result per
//!   tick until one of its declared inputs changes.
//!
//! Inputs come from any [`SignalSource`]; [`SignalTable`] is an in-memory
//! implementation with sample-and-hold semantics.

pub mod config;
pub mod core;
pub mod error;
pub mod estimator;
pub mod linalg;
pub mod logger;
pub mod signal;

pub use config::LocalizerConfig;
pub use crate::core::{
    AssembledSystem, Dof, DofMask, LandmarkObservation, Localizer, ObservationInput,
    ObservationSample, ObservationSet, SystemAssembler,
};
pub use error::{LocalizerError, LocalizerResult};
pub use estimator::{ErrorEstimator, PlanarPose, pose_error};
pub use linalg::{
    DampedLeastSquaresSolver, OffsetSolution, OffsetSolver, OffsetSolverType, PseudoInverseSolver,
};
pub use logger::{init_logger, init_logger_with_level};
pub use signal::{DependencyTracker, Revision, SignalId, SignalSource, SignalTable, SignalValue, Tick};
