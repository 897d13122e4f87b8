//! Planned-versus-estimated pose discrepancy.
//!
//! Given the planned robot transform `wMp` and the estimated planar pose
//! `wMe`, the error is the planar part of `wMe · wMp⁻¹`.

use std::fmt;

use nalgebra::{Matrix3, Matrix4, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{LocalizerError, LocalizerResult};
use crate::signal::{SignalId, SignalSource, SignalValue, Tick};

/// Planar pose (x, y, heading)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanarPose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl PlanarPose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    pub fn identity() -> Self {
        Self::default()
    }

    /// Rotation of `theta` about z with translation `(x, y, 0)`.
    pub fn to_homogeneous(&self) -> Matrix4<f64> {
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), self.theta);
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation.matrix());
        m[(0, 3)] = self.x;
        m[(1, 3)] = self.y;
        m
    }

    /// Project a homogeneous transform onto the ground plane.
    pub fn from_homogeneous(m: &Matrix4<f64>) -> Self {
        Self {
            x: m[(0, 3)],
            y: m[(1, 3)],
            theta: m[(1, 0)].atan2(m[(0, 0)]),
        }
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.theta)
    }
}

impl fmt::Display for PlanarPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PlanarPose [x: {:.6}, y: {:.6}, theta: {:.6}]",
            self.x, self.y, self.theta
        )
    }
}

/// Inverse of a rigid homogeneous transform, `[Rᵀ, -Rᵀt]`.
///
/// Falls back to a general inverse when the rotation block is not
/// orthonormal.
fn inverse_transform(m: &Matrix4<f64>) -> LocalizerResult<Matrix4<f64>> {
    let rotation: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    let is_rigid = (rotation.transpose() * rotation - Matrix3::identity()).norm() < 1e-9
        && m[(3, 0)] == 0.0
        && m[(3, 1)] == 0.0
        && m[(3, 2)] == 0.0
        && m[(3, 3)] == 1.0;
    if is_rigid {
        let translation: Vector3<f64> = m.fixed_view::<3, 1>(0, 3).into_owned();
        let mut inverse = Matrix4::identity();
        inverse
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation.transpose());
        inverse
            .fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&(-(rotation.transpose() * translation)));
        return Ok(inverse);
    }
    m.try_inverse().ok_or_else(|| {
        LocalizerError::LinearAlgebra("planned transform is not invertible".to_string())
    })
}

/// Planar part of `estimated · planned⁻¹`.
pub fn pose_error(estimated: &PlanarPose, planned: &Matrix4<f64>) -> LocalizerResult<PlanarPose> {
    let error = estimated.to_homogeneous() * inverse_transform(planned)?;
    Ok(PlanarPose::from_homogeneous(&error))
}

/// Signal-driven pose error entity.
///
/// Reads the estimated pose from `"{name}::position"` (a vector of three
/// entries) and the planned transform from the reference trajectory signal
/// (a 4×4 matrix). Until a reference trajectory is set the error is zero.
#[derive(Debug, Clone)]
pub struct ErrorEstimator {
    name: String,
    position: SignalId,
    reference: Option<SignalId>,
}

impl ErrorEstimator {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let position = SignalId::new(format!("{name}::position"));
        Self {
            name,
            position,
            reference: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position_id(&self) -> &SignalId {
        &self.position
    }

    pub fn set_reference_trajectory(&mut self, planned: impl Into<SignalId>) {
        self.reference = Some(planned.into());
    }

    pub fn reference_trajectory(&self) -> Option<&SignalId> {
        self.reference.as_ref()
    }

    /// Error between the estimated and the planned pose at `tick`.
    pub fn error<S: SignalSource + ?Sized>(
        &self,
        source: &S,
        tick: Tick,
    ) -> LocalizerResult<PlanarPose> {
        let Some(reference) = &self.reference else {
            return Ok(PlanarPose::identity());
        };

        let planned = match read(source, reference, tick)? {
            SignalValue::Matrix(m) if m.nrows() == 4 && m.ncols() == 4 => {
                Matrix4::from_iterator(m.iter().copied())
            }
            other => return Err(self.shape_error(reference, "a 4x4 matrix", &other)),
        };
        let estimated = match read(source, &self.position, tick)? {
            SignalValue::Vector(v) if v.len() == 3 => PlanarPose::new(v[0], v[1], v[2]),
            other => return Err(self.shape_error(&self.position, "a vector of 3", &other)),
        };

        pose_error(&estimated, &planned)
    }

    fn shape_error(&self, id: &SignalId, expected: &str, got: &SignalValue) -> LocalizerError {
        let shape = match got {
            SignalValue::Vector(v) => format!("vector of {}", v.len()),
            SignalValue::Matrix(m) => format!("{}x{} matrix", m.nrows(), m.ncols()),
        };
        LocalizerError::dimension_mismatch(&self.name, format!("{id} is a {shape}, expected {expected}"))
    }
}

fn read<S: SignalSource + ?Sized>(
    source: &S,
    id: &SignalId,
    tick: Tick,
) -> LocalizerResult<SignalValue> {
    source
        .read(id, tick)
        .ok_or_else(|| LocalizerError::MissingInput {
            signal: id.clone(),
            tick,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalTable;
    use nalgebra::DMatrix;
    use std::f64::consts::FRAC_PI_2;

    const TOLERANCE: f64 = 1e-12;

    fn assert_pose_eq(a: &PlanarPose, b: &PlanarPose) {
        assert!((a.x - b.x).abs() < TOLERANCE, "{a} != {b}");
        assert!((a.y - b.y).abs() < TOLERANCE, "{a} != {b}");
        assert!((a.theta - b.theta).abs() < TOLERANCE, "{a} != {b}");
    }

    #[test]
    fn test_homogeneous_round_trip() {
        let pose = PlanarPose::new(1.5, -0.25, 0.7);
        assert_pose_eq(&PlanarPose::from_homogeneous(&pose.to_homogeneous()), &pose);
    }

    #[test]
    fn test_error_is_zero_when_on_plan() {
        let pose = PlanarPose::new(2.0, 1.0, 0.3);
        let error = pose_error(&pose, &pose.to_homogeneous()).unwrap();
        assert_pose_eq(&error, &PlanarPose::identity());
    }

    #[test]
    fn test_error_composes_in_world_frame() {
        // Planned at the origin facing +y, estimated one meter further along x.
        let planned = PlanarPose::new(0.0, 0.0, FRAC_PI_2).to_homogeneous();
        let estimated = PlanarPose::new(1.0, 0.0, FRAC_PI_2);
        let error = pose_error(&estimated, &planned).unwrap();
        assert_pose_eq(&error, &PlanarPose::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_singular_planned_transform() {
        let mut planned = Matrix4::identity();
        planned[(3, 3)] = 0.0;
        assert!(matches!(
            pose_error(&PlanarPose::identity(), &planned),
            Err(LocalizerError::LinearAlgebra(_))
        ));
    }

    #[test]
    fn test_estimator_without_reference_is_zero() {
        let estimator = ErrorEstimator::new("estimator");
        let error = estimator.error(&SignalTable::new(), 0).unwrap();
        assert_eq!(error, PlanarPose::identity());
    }

    #[test]
    fn test_estimator_reads_signals() {
        let mut table = SignalTable::new();
        let mut estimator = ErrorEstimator::new("estimator");
        estimator.set_reference_trajectory("plan::left_ankle");

        let planned = PlanarPose::new(1.0, 2.0, 0.0).to_homogeneous();
        table.set(
            "plan::left_ankle",
            0,
            DMatrix::from_iterator(4, 4, planned.iter().copied()),
        );
        table.set_vector(estimator.position_id().clone(), 0, &[1.5, 2.0, 0.1]);

        let error = estimator.error(&table, 0).unwrap();
        let expected = pose_error(&PlanarPose::new(1.5, 2.0, 0.1), &planned).unwrap();
        assert_pose_eq(&error, &expected);

        table.set_vector(estimator.position_id().clone(), 1, &[1.5, 2.0]);
        assert!(matches!(
            estimator.error(&table, 1),
            Err(LocalizerError::DimensionMismatch { .. })
        ));
    }
}
