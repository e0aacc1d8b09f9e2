use ndarray::Array1;
use pixant_core::{FieldOracle, GridSpec, IterationRecord, ShapeError, metrics};
use tracing::debug;

use crate::{
    adam::{StepKind, StepOptimizer},
    adjoint::{self, AdjointError},
    convergence::Verdict,
    filter::DensityFilter,
    mapping::clip_primal,
};

use super::{Config, state::State};

/// The fixed parts of a run shared by every iteration.
pub(super) struct Context<'a, O> {
    pub(super) oracle: &'a O,
    pub(super) grid: &'a GridSpec,
    pub(super) config: &'a Config,
    pub(super) filter: DensityFilter,
    pub(super) optimizer: StepOptimizer,
}

/// What one iteration produced.
pub(super) struct Outcome {
    pub(super) state: State,
    pub(super) record: IterationRecord,
    pub(super) kind: StepKind,
    pub(super) verdict: Verdict,
}

impl<'a, O: FieldOracle> Context<'a, O> {
    pub(super) fn new(oracle: &'a O, grid: &'a GridSpec, config: &'a Config) -> Self {
        Self {
            oracle,
            grid,
            config,
            filter: DensityFilter::new(grid),
            optimizer: StepOptimizer::new(*config.adam(), config.plateau_tolerance()),
        }
    }

    /// Smoothed conductivity of a primal design at the given radius.
    pub(super) fn design(
        &self,
        primal: &Array1<f64>,
        radius: f64,
    ) -> Result<Array1<f64>, ShapeError> {
        let conductivity = self.config.map().map(&clip_primal(primal));
        self.filter.smooth(&conductivity, radius)
    }

    /// Runs one iteration.
    ///
    /// The input state is consumed and the next state returned, so a failed
    /// iteration leaves nothing half-updated.
    pub(super) fn iterate(&self, state: State) -> Result<Outcome, AdjointError> {
        let map = self.config.map();
        let radius = state.continuation.radius();

        let primal = clip_primal(&state.primal);
        let conductivity = self.filter.smooth(&map.map(&primal), radius)?;

        let sensitivity = adjoint::assemble(
            self.oracle,
            self.grid,
            &conductivity,
            self.config.excitation(),
        )?;

        // Chain rule through the filter (self-adjoint) and the map.
        let raw = self.filter.smooth(&sensitivity.gradient, radius)? * map.derivative(&primal);

        let t = state.adam_t();
        let (step, steps) = self.optimizer.compute_step(
            &raw,
            t,
            state.continuation.is_fine(),
            state.steps,
        );
        debug!(index = state.index, t, kind = ?step.kind, "computed step");

        let next_primal = &primal + &(self.config.learning_rate() * &step.values);

        let mut monitor = state.monitor;
        let verdict = monitor.evaluate(&state.last_step, &step.values);

        let record = IterationRecord {
            index: state.index,
            rms_gradient: metrics::rms(&sensitivity.gradient),
            rms_step: metrics::rms(&step.values),
            conductivity,
            primal,
            gradient: sensitivity.gradient,
            step: step.values.clone(),
            filter_radius: radius,
            total_power: sensitivity.total_power,
            adam: step.diagnostics,
        };

        let next = State {
            index: state.index + 1,
            primal: next_primal,
            continuation: state.continuation.shrink(),
            steps,
            last_step: step.values,
            monitor,
            ..state
        };

        Ok(Outcome {
            state: next,
            record,
            kind: step.kind,
            verdict,
        })
    }
}
