//! Multi-landmark correction engine.
//!
//! - [`observation`]: one sensor/landmark correspondence and its six inputs
//! - [`observation_set`]: the ordered, grow-only collection of observations
//! - [`assembler`]: stacking of the weighted, DOF-masked system for a tick
//! - [`localizer`]: orchestration and per-tick caching of the offset

pub mod assembler;
pub mod localizer;
pub mod observation;
pub mod observation_set;

pub use assembler::{AssembledSystem, SystemAssembler};
pub use localizer::Localizer;
pub use observation::{
    Dof, DofMask, LandmarkObservation, ObservationInput, ObservationSample, POSE_DOF,
};
pub use observation_set::ObservationSet;
