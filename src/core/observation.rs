//! One sensor-to-landmark correspondence.
//!
//! A [`LandmarkObservation`] owns no data. It names six input signals in the
//! localizer namespace and reads them at a given tick into an
//! [`ObservationSample`]:
//!
//! | input                | shape        | meaning                                          |
//! | -------------------- | ------------ | ------------------------------------------------ |
//! | `sensor_jacobian`    | k × c, c ≥ 3 | d(sensor position) / d(configuration)            |
//! | `reference_position` | Nf           | expected feature position from the motion plan   |
//! | `feature_jacobian`   | Nf × k       | d(feature position) / d(sensor position)         |
//! | `observed_position`  | Nf           | feature position measured by the sensor          |
//! | `weight`             | Nf           | per-dimension confidence, zero disables a row    |
//! | `corrected_dofs`     | 3            | 1.0 selects x, y, heading for correction         |
//!
//! Only the leading three configuration columns (x, y, heading) of the
//! sensor Jacobian take part in the correction.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::error::{LocalizerError, LocalizerResult};
use crate::signal::{SignalId, SignalSource, SignalValue, Tick};

/// Number of planar pose degrees of freedom
pub const POSE_DOF: usize = 3;

/// Planar pose degree of freedom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dof {
    X,
    Y,
    Heading,
}

impl Dof {
    pub const ALL: [Dof; POSE_DOF] = [Dof::X, Dof::Y, Dof::Heading];

    pub fn index(self) -> usize {
        match self {
            Dof::X => 0,
            Dof::Y => 1,
            Dof::Heading => 2,
        }
    }
}

impl fmt::Display for Dof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dof::X => write!(f, "x"),
            Dof::Y => write!(f, "y"),
            Dof::Heading => write!(f, "heading"),
        }
    }
}

/// Selection of the pose DOFs an observation may correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DofMask([bool; POSE_DOF]);

impl DofMask {
    pub const ALL: DofMask = DofMask([true; POSE_DOF]);
    pub const NONE: DofMask = DofMask([false; POSE_DOF]);

    pub fn new(x: bool, y: bool, heading: bool) -> Self {
        Self([x, y, heading])
    }

    /// Build a mask from its signal encoding, where `1.0` selects a DOF.
    pub fn from_signal(values: &DVector<f64>) -> Option<Self> {
        if values.len() != POSE_DOF {
            return None;
        }
        let mut mask = [false; POSE_DOF];
        for (selected, value) in mask.iter_mut().zip(values.iter()) {
            *selected = *value == 1.0;
        }
        Some(Self(mask))
    }

    pub fn is_selected(&self, dof: Dof) -> bool {
        self.0[dof.index()]
    }

    /// Number of selected DOFs.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&s| s).count()
    }

    /// Selected DOFs in mask order.
    pub fn selected(&self) -> Vec<Dof> {
        Dof::ALL
            .into_iter()
            .filter(|dof| self.is_selected(*dof))
            .collect()
    }

    pub fn union(&self, other: &DofMask) -> DofMask {
        DofMask([
            self.0[0] || other.0[0],
            self.0[1] || other.0[1],
            self.0[2] || other.0[2],
        ])
    }

    /// Keep the columns of `matrix` matching the selected DOFs, in mask order.
    ///
    /// `matrix` must have at least [`POSE_DOF`] columns.
    pub fn select_columns(&self, matrix: &DMatrix<f64>) -> DMatrix<f64> {
        let indices: Vec<usize> = self.selected().into_iter().map(Dof::index).collect();
        matrix.select_columns(indices.iter())
    }
}

impl fmt::Display for DofMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.selected().iter().map(Dof::to_string).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// The six inputs of an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationInput {
    SensorJacobian,
    ReferencePosition,
    FeatureJacobian,
    ObservedPosition,
    Weight,
    CorrectedDofs,
}

impl ObservationInput {
    pub const ALL: [ObservationInput; 6] = [
        ObservationInput::SensorJacobian,
        ObservationInput::ReferencePosition,
        ObservationInput::FeatureJacobian,
        ObservationInput::ObservedPosition,
        ObservationInput::Weight,
        ObservationInput::CorrectedDofs,
    ];

    /// Suffix appended to the observation name to form the signal name.
    pub fn suffix(self) -> &'static str {
        match self {
            ObservationInput::SensorJacobian => "sensor_jacobian",
            ObservationInput::ReferencePosition => "reference_position",
            ObservationInput::FeatureJacobian => "feature_jacobian",
            ObservationInput::ObservedPosition => "observed_position",
            ObservationInput::Weight => "weight",
            ObservationInput::CorrectedDofs => "corrected_dofs",
        }
    }
}

/// Signal-backed description of one landmark sighting.
#[derive(Debug, Clone)]
pub struct LandmarkObservation {
    name: String,
    sensor_jacobian: SignalId,
    reference_position: SignalId,
    feature_jacobian: SignalId,
    observed_position: SignalId,
    weight: SignalId,
    corrected_dofs: SignalId,
}

impl LandmarkObservation {
    /// Bind an observation called `name` to the namespace of `owner`.
    pub fn new(owner: &str, name: &str) -> Self {
        let id = |input: ObservationInput| Self::signal_name(owner, name, input);
        Self {
            name: name.to_owned(),
            sensor_jacobian: id(ObservationInput::SensorJacobian),
            reference_position: id(ObservationInput::ReferencePosition),
            feature_jacobian: id(ObservationInput::FeatureJacobian),
            observed_position: id(ObservationInput::ObservedPosition),
            weight: id(ObservationInput::Weight),
            corrected_dofs: id(ObservationInput::CorrectedDofs),
        }
    }

    /// `"{owner}::{name}_{suffix}"`
    pub fn signal_name(owner: &str, name: &str, input: ObservationInput) -> SignalId {
        SignalId::new(format!("{owner}::{name}_{}", input.suffix()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signal(&self, input: ObservationInput) -> &SignalId {
        match input {
            ObservationInput::SensorJacobian => &self.sensor_jacobian,
            ObservationInput::ReferencePosition => &self.reference_position,
            ObservationInput::FeatureJacobian => &self.feature_jacobian,
            ObservationInput::ObservedPosition => &self.observed_position,
            ObservationInput::Weight => &self.weight,
            ObservationInput::CorrectedDofs => &self.corrected_dofs,
        }
    }

    /// All six input signals, in [`ObservationInput::ALL`] order.
    pub fn signals(&self) -> impl Iterator<Item = &SignalId> {
        ObservationInput::ALL
            .into_iter()
            .map(move |input| self.signal(input))
    }

    /// Length of the reference position at `tick`.
    pub fn feature_dimension<S: SignalSource + ?Sized>(
        &self,
        source: &S,
        tick: Tick,
    ) -> LocalizerResult<usize> {
        Ok(self.read_vector(source, ObservationInput::ReferencePosition, tick)?.len())
    }

    /// Read all six inputs at `tick` and check their shapes.
    pub fn sample<S: SignalSource + ?Sized>(
        &self,
        source: &S,
        tick: Tick,
    ) -> LocalizerResult<ObservationSample> {
        let mask_values = self.read_vector(source, ObservationInput::CorrectedDofs, tick)?;
        let corrected_dofs = DofMask::from_signal(&mask_values).ok_or_else(|| {
            LocalizerError::dimension_mismatch(
                &self.name,
                format!(
                    "corrected_dofs has {} entries, expected {POSE_DOF}",
                    mask_values.len()
                ),
            )
        })?;

        let sample = ObservationSample {
            sensor_jacobian: self.read_matrix(source, ObservationInput::SensorJacobian, tick)?,
            reference_position: self.read_vector(
                source,
                ObservationInput::ReferencePosition,
                tick,
            )?,
            feature_jacobian: self.read_matrix(source, ObservationInput::FeatureJacobian, tick)?,
            observed_position: self.read_vector(source, ObservationInput::ObservedPosition, tick)?,
            weight: self.read_vector(source, ObservationInput::Weight, tick)?,
            corrected_dofs,
        };
        sample.validate(&self.name)?;
        Ok(sample)
    }

    fn read<S: SignalSource + ?Sized>(
        &self,
        source: &S,
        input: ObservationInput,
        tick: Tick,
    ) -> LocalizerResult<SignalValue> {
        let id = self.signal(input);
        source
            .read(id, tick)
            .ok_or_else(|| LocalizerError::MissingInput {
                signal: id.clone(),
                tick,
            })
    }

    fn read_vector<S: SignalSource + ?Sized>(
        &self,
        source: &S,
        input: ObservationInput,
        tick: Tick,
    ) -> LocalizerResult<DVector<f64>> {
        match self.read(source, input, tick)? {
            SignalValue::Vector(v) => Ok(v),
            other => Err(LocalizerError::dimension_mismatch(
                &self.name,
                format!("{} is a {}, expected a vector", input.suffix(), other.kind()),
            )),
        }
    }

    fn read_matrix<S: SignalSource + ?Sized>(
        &self,
        source: &S,
        input: ObservationInput,
        tick: Tick,
    ) -> LocalizerResult<DMatrix<f64>> {
        match self.read(source, input, tick)? {
            SignalValue::Matrix(m) => Ok(m),
            other => Err(LocalizerError::dimension_mismatch(
                &self.name,
                format!("{} is a {}, expected a matrix", input.suffix(), other.kind()),
            )),
        }
    }
}

/// Values of one observation's inputs at a single tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSample {
    pub sensor_jacobian: DMatrix<f64>,
    pub reference_position: DVector<f64>,
    pub feature_jacobian: DMatrix<f64>,
    pub observed_position: DVector<f64>,
    pub weight: DVector<f64>,
    pub corrected_dofs: DofMask,
}

impl ObservationSample {
    /// Feature-space dimension (Nf).
    pub fn feature_dimension(&self) -> usize {
        self.reference_position.len()
    }

    /// Check that every input agrees with the feature dimension and holds
    /// only finite values.
    pub fn validate(&self, observation: &str) -> LocalizerResult<()> {
        let nf = self.feature_dimension();
        let mismatch = |details: String| Err(LocalizerError::dimension_mismatch(observation, details));

        if self.observed_position.len() != nf {
            return mismatch(format!(
                "observed_position has {} entries, reference_position has {nf}",
                self.observed_position.len()
            ));
        }
        if self.weight.len() != nf {
            return mismatch(format!(
                "weight has {} entries, reference_position has {nf}",
                self.weight.len()
            ));
        }
        if self.feature_jacobian.nrows() != nf {
            return mismatch(format!(
                "feature_jacobian has {} rows, expected {nf}",
                self.feature_jacobian.nrows()
            ));
        }
        if self.feature_jacobian.ncols() != self.sensor_jacobian.nrows() {
            return mismatch(format!(
                "feature_jacobian is {}x{} but sensor_jacobian has {} rows",
                self.feature_jacobian.nrows(),
                self.feature_jacobian.ncols(),
                self.sensor_jacobian.nrows()
            ));
        }
        if self.sensor_jacobian.ncols() < POSE_DOF {
            return mismatch(format!(
                "sensor_jacobian has {} columns, expected at least {POSE_DOF}",
                self.sensor_jacobian.ncols()
            ));
        }

        let inputs = [
            (ObservationInput::SensorJacobian, self.sensor_jacobian.as_slice()),
            (ObservationInput::ReferencePosition, self.reference_position.as_slice()),
            (ObservationInput::FeatureJacobian, self.feature_jacobian.as_slice()),
            (ObservationInput::ObservedPosition, self.observed_position.as_slice()),
            (ObservationInput::Weight, self.weight.as_slice()),
        ];
        for (input, values) in inputs {
            if values.iter().any(|v| !v.is_finite()) {
                return Err(LocalizerError::NonFiniteInput {
                    observation: observation.to_owned(),
                    input: input.suffix().to_owned(),
                });
            }
        }
        Ok(())
    }

    /// `weight ⊙ (observed - reference)`
    pub fn weighted_residual(&self) -> DVector<f64> {
        (&self.observed_position - &self.reference_position).component_mul(&self.weight)
    }

    /// `feature_jacobian × sensor_jacobian`, restricted to the selected DOFs,
    /// with row `r` scaled by `weight[r]`.
    pub fn weighted_jacobian(&self) -> DMatrix<f64> {
        let full = &self.feature_jacobian * &self.sensor_jacobian;
        let mut block = self.corrected_dofs.select_columns(&full);
        for (mut row, w) in block.row_iter_mut().zip(self.weight.iter()) {
            row *= *w;
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalTable;

    const TOLERANCE: f64 = 1e-12;

    fn write_observation(table: &mut SignalTable, obs: &LandmarkObservation, tick: Tick) {
        table.set_matrix(
            obs.signal(ObservationInput::SensorJacobian).clone(),
            tick,
            3,
            3,
            &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        );
        table.set_vector(
            obs.signal(ObservationInput::ReferencePosition).clone(),
            tick,
            &[1.0, 2.0, 3.0],
        );
        table.set_matrix(
            obs.signal(ObservationInput::FeatureJacobian).clone(),
            tick,
            3,
            3,
            &[2.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 4.0],
        );
        table.set_vector(
            obs.signal(ObservationInput::ObservedPosition).clone(),
            tick,
            &[1.5, 2.0, 2.0],
        );
        table.set_vector(obs.signal(ObservationInput::Weight).clone(), tick, &[2.0, 1.0, 0.5]);
        table.set_vector(
            obs.signal(ObservationInput::CorrectedDofs).clone(),
            tick,
            &[1.0, 0.0, 1.0],
        );
    }

    #[test]
    fn test_signal_names() {
        let obs = LandmarkObservation::new("loc", "blob");
        assert_eq!(
            obs.signal(ObservationInput::Weight).as_str(),
            "loc::blob_weight"
        );
        assert_eq!(
            obs.signal(ObservationInput::SensorJacobian).as_str(),
            "loc::blob_sensor_jacobian"
        );
        assert_eq!(obs.signals().count(), 6);
    }

    #[test]
    fn test_dof_mask_from_signal() {
        let mask = DofMask::from_signal(&DVector::from_vec(vec![1.0, 0.0, 1.0])).unwrap();
        assert_eq!(mask, DofMask::new(true, false, true));
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.selected(), vec![Dof::X, Dof::Heading]);
        assert_eq!(mask.to_string(), "[x, heading]");

        // Only an exact 1.0 selects a DOF.
        let mask = DofMask::from_signal(&DVector::from_vec(vec![0.5, 2.0, 1.0])).unwrap();
        assert_eq!(mask, DofMask::new(false, false, true));

        assert!(DofMask::from_signal(&DVector::from_vec(vec![1.0, 1.0])).is_none());
    }

    #[test]
    fn test_dof_mask_select_columns_keeps_mask_order() {
        let m = DMatrix::from_row_slice(2, 4, &[1.0, 2.0, 3.0, 9.0, 4.0, 5.0, 6.0, 9.0]);

        let block = DofMask::new(false, true, true).select_columns(&m);
        assert_eq!(block, DMatrix::from_row_slice(2, 2, &[2.0, 3.0, 5.0, 6.0]));

        let empty = DofMask::NONE.select_columns(&m);
        assert_eq!(empty.nrows(), 2);
        assert_eq!(empty.ncols(), 0);
    }

    #[test]
    fn test_dof_mask_union() {
        let a = DofMask::new(true, false, false);
        let b = DofMask::new(false, false, true);
        assert_eq!(a.union(&b), DofMask::new(true, false, true));
        assert_eq!(DofMask::NONE.union(&DofMask::NONE).count(), 0);
        assert_eq!(DofMask::ALL.count(), POSE_DOF);
    }

    #[test]
    fn test_sample_weighted_blocks() {
        let mut table = SignalTable::new();
        let obs = LandmarkObservation::new("loc", "blob");
        write_observation(&mut table, &obs, 0);

        let sample = obs.sample(&table, 0).unwrap();
        assert_eq!(sample.feature_dimension(), 3);

        let residual = sample.weighted_residual();
        assert!((residual[0] - 1.0).abs() < TOLERANCE);
        assert!(residual[1].abs() < TOLERANCE);
        assert!((residual[2] + 0.5).abs() < TOLERANCE);

        // diag(2, 3, 4) restricted to columns {x, heading}, rows scaled by (2, 1, 0.5)
        let jacobian = sample.weighted_jacobian();
        assert_eq!(jacobian.nrows(), 3);
        assert_eq!(jacobian.ncols(), 2);
        assert!((jacobian[(0, 0)] - 4.0).abs() < TOLERANCE);
        assert!(jacobian[(1, 0)].abs() < TOLERANCE);
        assert!(jacobian[(1, 1)].abs() < TOLERANCE);
        assert!((jacobian[(2, 1)] - 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_sample_missing_input() {
        let table = SignalTable::new();
        let obs = LandmarkObservation::new("loc", "blob");
        match obs.sample(&table, 3) {
            Err(LocalizerError::MissingInput { tick, .. }) => assert_eq!(tick, 3),
            other => panic!("Expected missing input, got {other:?}"),
        }
    }

    #[test]
    fn test_sample_rejects_short_weight() {
        let mut table = SignalTable::new();
        let obs = LandmarkObservation::new("loc", "blob");
        write_observation(&mut table, &obs, 0);
        table.set_vector(obs.signal(ObservationInput::Weight).clone(), 1, &[1.0, 1.0]);

        assert!(obs.sample(&table, 0).is_ok());
        match obs.sample(&table, 1) {
            Err(LocalizerError::DimensionMismatch {
                observation,
                details,
            }) => {
                assert_eq!(observation, "blob");
                assert!(details.contains("weight"));
            }
            other => panic!("Expected dimension mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_sample_rejects_non_finite_values() {
        let mut table = SignalTable::new();
        let obs = LandmarkObservation::new("loc", "blob");
        write_observation(&mut table, &obs, 0);
        table.set_vector(
            obs.signal(ObservationInput::ReferencePosition).clone(),
            1,
            &[1.0, f64::NEG_INFINITY, 3.0],
        );

        assert!(obs.sample(&table, 0).is_ok());
        assert_eq!(
            obs.sample(&table, 1),
            Err(LocalizerError::NonFiniteInput {
                observation: "blob".to_string(),
                input: "reference_position".to_string(),
            })
        );
    }

    #[test]
    fn test_sample_rejects_wrong_kind() {
        let mut table = SignalTable::new();
        let obs = LandmarkObservation::new("loc", "blob");
        write_observation(&mut table, &obs, 0);
        table.set_vector(
            obs.signal(ObservationInput::FeatureJacobian).clone(),
            0,
            &[1.0, 2.0, 3.0],
        );

        assert!(matches!(
            obs.sample(&table, 0),
            Err(LocalizerError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_sample_rejects_incompatible_jacobians() {
        let mut table = SignalTable::new();
        let obs = LandmarkObservation::new("loc", "blob");
        write_observation(&mut table, &obs, 0);
        table.set_matrix(
            obs.signal(ObservationInput::SensorJacobian).clone(),
            0,
            2,
            3,
            &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        );

        assert!(matches!(
            obs.sample(&table, 0),
            Err(LocalizerError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_extra_configuration_columns_are_ignored() {
        let mut table = SignalTable::new();
        let obs = LandmarkObservation::new("loc", "blob");
        write_observation(&mut table, &obs, 0);
        // 3x5 sensor Jacobian: two extra joints beyond the planar pose
        table.set_matrix(
            obs.signal(ObservationInput::SensorJacobian).clone(),
            0,
            3,
            5,
            &[
                1.0, 0.0, 0.0, 7.0, 7.0, //
                0.0, 1.0, 0.0, 7.0, 7.0, //
                0.0, 0.0, 1.0, 7.0, 7.0,
            ],
        );
        table.set_vector(
            obs.signal(ObservationInput::CorrectedDofs).clone(),
            0,
            &[1.0, 1.0, 1.0],
        );

        let jacobian = obs.sample(&table, 0).unwrap().weighted_jacobian();
        assert_eq!(jacobian.ncols(), 3);
        assert!((jacobian[(1, 1)] - 3.0).abs() < TOLERANCE);
    }
}
