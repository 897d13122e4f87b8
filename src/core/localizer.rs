//! Multi-landmark pose correction entity.
//!
//! The [`Localizer`] owns an [`ObservationSet`] and exposes a single
//! time-dependent output, `configuration_offset`, computed on demand:
//!
//! 1. assemble the weighted system from every observation at tick `t`
//! 2. solve it for the pose offset
//! 3. cache the offset until the tick changes or an input is rewritten
//!
//! # Example
//!
//! ```
//! use landmark_localizer::{Localizer, SignalTable};
//!
//! let mut graph = SignalTable::new();
//! let mut localizer = Localizer::new("localizer");
//!
//! // No observation yet: nothing to correct.
//! let offset = localizer.configuration_offset(&graph, 0).unwrap();
//! assert_eq!(offset.len(), 0);
//!
//! localizer.add_observation("blob", &mut graph).unwrap();
//! assert_eq!(localizer.observations().len(), 1);
//! ```

use nalgebra::DVector;
use tracing::debug;

use crate::config::LocalizerConfig;
use crate::core::assembler::SystemAssembler;
use crate::core::observation_set::ObservationSet;
use crate::error::LocalizerResult;
use crate::linalg::{OffsetSolver, create_solver};
use crate::signal::{DependencyTracker, Revision, SignalId, SignalSource, Tick};

#[derive(Debug, Clone)]
struct CachedOffset {
    tick: Tick,
    revision: Revision,
    offset: DVector<f64>,
}

pub struct Localizer {
    name: String,
    config: LocalizerConfig,
    output: SignalId,
    observations: ObservationSet,
    assembler: SystemAssembler,
    solver: Box<dyn OffsetSolver>,
    cache: Option<CachedOffset>,
}

impl Localizer {
    /// Create a localizer with the default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        let config = LocalizerConfig::default();
        let solver = create_solver(&config);
        Self::build(name.into(), config, solver)
    }

    pub fn with_config(name: impl Into<String>, config: LocalizerConfig) -> LocalizerResult<Self> {
        config.validate()?;
        let solver = create_solver(&config);
        Ok(Self::build(name.into(), config, solver))
    }

    /// Use a custom solver instead of the one selected by the configuration.
    pub fn with_solver(mut self, solver: Box<dyn OffsetSolver>) -> Self {
        self.solver = solver;
        self.cache = None;
        self
    }

    fn build(name: String, config: LocalizerConfig, solver: Box<dyn OffsetSolver>) -> Self {
        let output = SignalId::new(format!("{name}::configuration_offset"));
        Self {
            name,
            config,
            output,
            observations: ObservationSet::new(),
            assembler: SystemAssembler::new(),
            solver,
            cache: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LocalizerConfig {
        &self.config
    }

    /// Identifier of the `configuration_offset` output.
    pub fn output_id(&self) -> &SignalId {
        &self.output
    }

    pub fn observations(&self) -> &ObservationSet {
        &self.observations
    }

    /// Register a landmark observation and declare its six inputs as
    /// dependencies of the output.
    ///
    /// Must not be called while a tick is being evaluated.
    pub fn add_observation<D: DependencyTracker + ?Sized>(
        &mut self,
        name: &str,
        registry: &mut D,
    ) -> LocalizerResult<()> {
        let observation = self.observations.add(&self.name, name)?;
        for input in observation.signals() {
            registry.declare_dependency(&self.output, input);
        }
        self.cache = None;
        Ok(())
    }

    /// Drop the cached offset; the next evaluation recomputes it.
    pub fn invalidate_cache(&mut self) {
        self.cache = None;
    }

    /// Total number of residual rows at `tick`.
    pub fn problem_size<S: SignalSource + ?Sized>(
        &self,
        source: &S,
        tick: Tick,
    ) -> LocalizerResult<usize> {
        self.observations.problem_size(source, tick)
    }

    /// Pose offset at `tick`, one entry per corrected DOF.
    ///
    /// Served from the cache when neither the tick nor any declared input
    /// changed since the last evaluation. A failure discards the cache and
    /// returns no partial result.
    ///
    /// The cache is keyed on the tick and the output revision only, so a
    /// localizer is bound to the graph its observations were registered
    /// with. Call [`Localizer::invalidate_cache`] before evaluating against
    /// another graph.
    pub fn configuration_offset<G: SignalSource + DependencyTracker + ?Sized>(
        &mut self,
        graph: &G,
        tick: Tick,
    ) -> LocalizerResult<DVector<f64>> {
        let revision = graph.revision(&self.output);
        if let Some(cached) = &self.cache
            && cached.tick == tick
            && cached.revision == revision
        {
            return Ok(cached.offset.clone());
        }

        self.cache = None;
        let system = self.assembler.assemble(&self.observations, graph, tick)?;
        let solution = self.solver.solve(&system)?;
        debug!(
            localizer = %self.name,
            tick,
            rank = solution.rank,
            offset = ?solution.offset.as_slice(),
            "computed configuration offset"
        );

        self.cache = Some(CachedOffset {
            tick,
            revision,
            offset: solution.offset.clone(),
        });
        Ok(solution.offset)
    }
}
