//! Error types for the landmark-localizer library
//!
//! Every failure of a tick is reported through [`LocalizerError`]. A
//! rank-deficient system is not an error: the solver returns the
//! minimum-norm solution instead.

use thiserror::Error;

use crate::signal::{SignalId, Tick};

/// Main result type used throughout the landmark-localizer library
pub type LocalizerResult<T> = Result<T, LocalizerError>;

/// Main error type for the landmark-localizer library
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocalizerError {
    /// Inputs of one observation disagree in size at a tick
    #[error("Dimension mismatch in observation '{observation}': {details}")]
    DimensionMismatch {
        observation: String,
        details: String,
    },

    /// An input of one observation holds a NaN or infinite entry
    #[error("Non-finite value in '{input}' of observation '{observation}'")]
    NonFiniteInput { observation: String, input: String },

    /// The signal collaborator has no value for an input at a tick
    #[error("Missing input '{signal}' at tick {tick}")]
    MissingInput { signal: SignalId, tick: Tick },

    /// An observation with a colliding name is already registered
    #[error("Duplicate observation name: {0}")]
    DuplicateName(String),

    /// Observation name is not a usable identifier
    #[error("Invalid observation name: '{0}'")]
    InvalidName(String),

    /// Linear algebra related errors
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(String),

    /// Invalid configuration parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LocalizerError {
    pub(crate) fn dimension_mismatch(observation: &str, details: impl Into<String>) -> Self {
        LocalizerError::DimensionMismatch {
            observation: observation.to_owned(),
            details: details.into(),
        }
    }
}
