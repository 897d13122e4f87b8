//! Localizer configuration.

use serde::{Deserialize, Serialize};

use crate::error::{LocalizerError, LocalizerResult};
use crate::linalg::OffsetSolverType;

/// Configuration parameters for the localizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizerConfig {
    /// Solver backend used for the pose offset
    pub solver_type: OffsetSolverType,
    /// Singular values at or below this value are treated as zero
    pub singular_value_tolerance: f64,
    /// Damping factor λ, only used by the damped least-squares backend
    pub damping: f64,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            solver_type: OffsetSolverType::default(),
            singular_value_tolerance: 1e-9,
            damping: 0.0,
        }
    }
}

impl LocalizerConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the solver backend
    pub fn with_solver_type(mut self, solver_type: OffsetSolverType) -> Self {
        self.solver_type = solver_type;
        self
    }

    /// Set the singular value tolerance
    pub fn with_singular_value_tolerance(mut self, tolerance: f64) -> Self {
        self.singular_value_tolerance = tolerance;
        self
    }

    /// Set the damping factor
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn validate(&self) -> LocalizerResult<()> {
        if !self.singular_value_tolerance.is_finite() || self.singular_value_tolerance < 0.0 {
            return Err(LocalizerError::InvalidConfig(format!(
                "singular_value_tolerance must be finite and non-negative, got {}",
                self.singular_value_tolerance
            )));
        }
        if !self.damping.is_finite() || self.damping < 0.0 {
            return Err(LocalizerError::InvalidConfig(format!(
                "damping must be finite and non-negative, got {}",
                self.damping
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = LocalizerConfig::default();
        assert_eq!(config.solver_type, OffsetSolverType::PseudoInverse);
        assert_eq!(config.singular_value_tolerance, 1e-9);
        assert_eq!(config.damping, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = LocalizerConfig::new()
            .with_solver_type(OffsetSolverType::DampedLeastSquares)
            .with_singular_value_tolerance(1e-6)
            .with_damping(0.25);
        assert_eq!(config.solver_type, OffsetSolverType::DampedLeastSquares);
        assert_eq!(config.singular_value_tolerance, 1e-6);
        assert_eq!(config.damping, 0.25);
    }

    #[test]
    fn test_config_validation() {
        assert!(LocalizerConfig::new().with_damping(-1.0).validate().is_err());
        assert!(
            LocalizerConfig::new()
                .with_singular_value_tolerance(f64::NAN)
                .validate()
                .is_err()
        );
    }
}
