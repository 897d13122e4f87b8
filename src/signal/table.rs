use std::collections::{BTreeMap, HashMap};

use nalgebra::{DMatrix, DVector};

use super::{DependencyTracker, Revision, SignalId, SignalSource, SignalValue, Tick};

/// In-memory signal graph with sample-and-hold semantics.
///
/// A read at tick `t` returns the most recent sample written at a tick
/// `<= t`. Every write bumps a global revision and stamps each output that
/// declared a dependency on the written signal.
#[derive(Debug, Clone, Default)]
pub struct SignalTable {
    samples: HashMap<SignalId, BTreeMap<Tick, SignalValue>>,
    dependents: HashMap<SignalId, Vec<SignalId>>,
    dependencies: HashMap<SignalId, Vec<SignalId>>,
    output_revisions: HashMap<SignalId, Revision>,
    revision: Revision,
}

impl SignalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` for `id` starting at `tick`.
    pub fn set(&mut self, id: impl Into<SignalId>, tick: Tick, value: impl Into<SignalValue>) {
        let id = id.into();
        self.samples
            .entry(id.clone())
            .or_default()
            .insert(tick, value.into());

        self.revision += 1;
        if let Some(outputs) = self.dependents.get(&id) {
            for output in outputs {
                self.output_revisions.insert(output.clone(), self.revision);
            }
        }
    }

    pub fn set_vector(&mut self, id: impl Into<SignalId>, tick: Tick, values: &[f64]) {
        self.set(id, tick, DVector::from_column_slice(values));
    }

    /// Store a matrix given in row-major order.
    ///
    /// # Panics
    /// Panics if `row_major.len() != nrows * ncols`.
    pub fn set_matrix(
        &mut self,
        id: impl Into<SignalId>,
        tick: Tick,
        nrows: usize,
        ncols: usize,
        row_major: &[f64],
    ) {
        self.set(id, tick, DMatrix::from_row_slice(nrows, ncols, row_major));
    }

    /// Inputs declared for `output`, in declaration order.
    pub fn dependencies_of(&self, output: &SignalId) -> &[SignalId] {
        self.dependencies
            .get(output)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether at least one sample exists for `id`.
    pub fn contains(&self, id: &SignalId) -> bool {
        self.samples.contains_key(id)
    }
}

impl SignalSource for SignalTable {
    fn read(&self, id: &SignalId, tick: Tick) -> Option<SignalValue> {
        self.samples
            .get(id)?
            .range(..=tick)
            .next_back()
            .map(|(_, value)| value.clone())
    }
}

impl DependencyTracker for SignalTable {
    fn declare_dependency(&mut self, output: &SignalId, input: &SignalId) {
        let inputs = self.dependencies.entry(output.clone()).or_default();
        if inputs.contains(input) {
            return;
        }
        inputs.push(input.clone());
        self.dependents
            .entry(input.clone())
            .or_default()
            .push(output.clone());

        // The dependency set changed, so anything cached against it is stale.
        self.revision += 1;
        self.output_revisions.insert(output.clone(), self.revision);
    }

    fn revision(&self, output: &SignalId) -> Revision {
        self.output_revisions.get(output).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_and_hold() {
        let mut table = SignalTable::new();
        table.set_vector("w", 5, &[1.0, 2.0]);
        table.set_vector("w", 10, &[3.0, 4.0]);

        assert_eq!(table.read(&"w".into(), 4), None);
        assert_eq!(
            table.read(&"w".into(), 5),
            Some(SignalValue::Vector(DVector::from_vec(vec![1.0, 2.0])))
        );
        assert_eq!(
            table.read(&"w".into(), 9),
            Some(SignalValue::Vector(DVector::from_vec(vec![1.0, 2.0])))
        );
        assert_eq!(
            table.read(&"w".into(), 42),
            Some(SignalValue::Vector(DVector::from_vec(vec![3.0, 4.0])))
        );
    }

    #[test]
    fn test_unknown_signal_reads_none() {
        let table = SignalTable::new();
        assert_eq!(table.read(&"nothing".into(), 0), None);
        assert!(!table.contains(&"nothing".into()));
    }

    #[test]
    fn test_set_matrix_is_row_major() {
        let mut table = SignalTable::new();
        table.set_matrix("j", 0, 2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        match table.read(&"j".into(), 0) {
            Some(SignalValue::Matrix(m)) => {
                assert_eq!(m.nrows(), 2);
                assert_eq!(m.ncols(), 3);
                assert_eq!(m[(0, 2)], 3.0);
                assert_eq!(m[(1, 0)], 4.0);
            }
            other => panic!("Expected matrix, got {other:?}"),
        }
    }

    #[test]
    #[should_panic]
    fn test_set_matrix_panics_on_short_data() {
        let mut table = SignalTable::new();
        table.set_matrix("j", 0, 2, 2, &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_write_bumps_dependent_revision() {
        let mut table = SignalTable::new();
        let output = SignalId::new("loc::configuration_offset");
        let input = SignalId::new("loc::blob_weight");
        let unrelated = SignalId::new("other::weight");

        table.declare_dependency(&output, &input);
        let after_declare = table.revision(&output);
        assert!(after_declare > 0);

        table.set_vector(unrelated, 0, &[1.0]);
        assert_eq!(table.revision(&output), after_declare);

        table.set_vector(input, 0, &[1.0]);
        assert!(table.revision(&output) > after_declare);
    }

    #[test]
    fn test_declare_dependency_is_idempotent() {
        let mut table = SignalTable::new();
        let output = SignalId::new("out");
        let input = SignalId::new("in");

        table.declare_dependency(&output, &input);
        let first = table.revision(&output);
        table.declare_dependency(&output, &input);

        assert_eq!(table.dependencies_of(&output), &[input]);
        assert_eq!(table.revision(&output), first);
        assert!(table.dependencies_of(&"unknown".into()).is_empty());
    }
}
