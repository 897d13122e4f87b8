use tracing::info;

use crate::core::observation::LandmarkObservation;
use crate::error::{LocalizerError, LocalizerResult};
use crate::signal::{SignalSource, Tick};

/// Insertion-ordered, grow-only collection of landmark observations.
///
/// The insertion order fixes the row order of the assembled system.
#[derive(Debug, Clone, Default)]
pub struct ObservationSet {
    observations: Vec<LandmarkObservation>,
}

impl ObservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observation called `name` in the namespace of `owner`.
    ///
    /// Nothing is modified when the name is invalid or collides with an
    /// existing observation.
    pub fn add(&mut self, owner: &str, name: &str) -> LocalizerResult<&LandmarkObservation> {
        validate_name(name)?;

        let candidate = LandmarkObservation::new(owner, name);
        let collides = self.observations.iter().any(|existing| {
            existing.name() == name
                || existing
                    .signals()
                    .any(|id| candidate.signals().any(|new_id| new_id == id))
        });
        if collides {
            return Err(LocalizerError::DuplicateName(name.to_owned()));
        }

        info!(observation = name, "registered landmark observation");
        self.observations.push(candidate);
        Ok(&self.observations[self.observations.len() - 1])
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LandmarkObservation> {
        self.observations.iter()
    }

    pub fn get(&self, name: &str) -> Option<&LandmarkObservation> {
        self.observations.iter().find(|obs| obs.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.observations.iter().map(LandmarkObservation::name).collect()
    }

    /// Total number of residual rows at `tick`.
    pub fn problem_size<S: SignalSource + ?Sized>(
        &self,
        source: &S,
        tick: Tick,
    ) -> LocalizerResult<usize> {
        self.observations
            .iter()
            .map(|obs| obs.feature_dimension(source, tick))
            .sum()
    }
}

impl<'a> IntoIterator for &'a ObservationSet {
    type Item = &'a LandmarkObservation;
    type IntoIter = std::slice::Iter<'a, LandmarkObservation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn validate_name(name: &str) -> LocalizerResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(LocalizerError::InvalidName(name.to_owned()))
    }
}
