//! Time-indexed signal access and dependency tracking.
//!
//! The localizer never owns its inputs. Every Jacobian, position, weight and
//! mask is pulled from a [`SignalSource`] at the tick being evaluated, and
//! cache invalidation is delegated to a [`DependencyTracker`]: each input an
//! observation reads is declared once as a dependency of the localizer
//! output, and the tracker bumps the output [`Revision`] whenever one of
//! those inputs is written.
//!
//! [`SignalTable`] is an in-memory implementation of both traits.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

pub mod table;

pub use table::SignalTable;

/// Discrete control-loop instant
pub type Tick = i64;

/// Monotonic change stamp handed out by a [`DependencyTracker`]
pub type Revision = u64;

/// Name of a signal in the host graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(String);

impl SignalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SignalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SignalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Value carried by a signal at one tick
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    Vector(DVector<f64>),
    Matrix(DMatrix<f64>),
}

impl SignalValue {
    /// Short name of the value kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            SignalValue::Vector(_) => "vector",
            SignalValue::Matrix(_) => "matrix",
        }
    }
}

impl From<DVector<f64>> for SignalValue {
    fn from(v: DVector<f64>) -> Self {
        SignalValue::Vector(v)
    }
}

impl From<DMatrix<f64>> for SignalValue {
    fn from(m: DMatrix<f64>) -> Self {
        SignalValue::Matrix(m)
    }
}

/// Read side of the host signal graph.
pub trait SignalSource {
    /// Value of `id` at `tick`, or `None` when the source cannot produce one.
    fn read(&self, id: &SignalId, tick: Tick) -> Option<SignalValue>;
}

/// Dependency registration and change propagation.
pub trait DependencyTracker {
    /// Declare that `output` must be recomputed whenever `input` changes.
    fn declare_dependency(&mut self, output: &SignalId, input: &SignalId);

    /// Current change stamp of `output`.
    ///
    /// Two equal revisions mean no declared input of `output` was written
    /// in between.
    fn revision(&self, output: &SignalId) -> Revision;
}
