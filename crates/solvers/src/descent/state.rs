use ndarray::Array1;
use pixant_core::{GridSpec, ResumePoint};

use crate::{
    adam::StepState,
    convergence::ConvergenceMonitor,
    filter::Continuation,
};

use super::{Config, Solution, Status};

/// Everything that carries over from one iteration to the next.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct State {
    pub(super) index: usize,
    pub(super) primal: Array1<f64>,
    pub(super) continuation: Continuation,
    pub(super) steps: StepState,
    pub(super) last_step: Array1<f64>,
    pub(super) monitor: ConvergenceMonitor,
    pub(super) started_at: usize,
}

impl State {
    /// A fresh run at index 0 and the coarsest radius.
    pub(super) fn fresh(grid: &GridSpec, primal: Array1<f64>, config: &Config) -> Self {
        Self::starting(
            0,
            primal,
            Continuation::new(grid, config.decay()),
            grid.len(),
            config,
        )
    }

    /// A run continuing from a ledger. Adam restarts from zero moments.
    pub(super) fn resume(grid: &GridSpec, point: ResumePoint, config: &Config) -> Self {
        let continuation = Continuation::resume(grid, point.filter_radius, config.decay());
        Self::starting(point.index, point.primal, continuation, grid.len(), config)
    }

    fn starting(
        index: usize,
        primal: Array1<f64>,
        continuation: Continuation,
        cells: usize,
        config: &Config,
    ) -> Self {
        Self {
            index,
            primal,
            continuation,
            steps: StepState::zeros(cells),
            last_step: Array1::zeros(cells),
            monitor: ConvergenceMonitor::new(*config.convergence()),
            started_at: index,
        }
    }

    /// Adam's time index for the current iteration.
    pub(super) fn adam_t(&self) -> usize {
        self.index - self.started_at + 1
    }

    pub(super) fn into_solution(
        self,
        status: Status,
        iters: usize,
        conductivity: Array1<f64>,
        final_total_power: Option<f64>,
    ) -> Solution {
        Solution {
            status,
            primal: self.primal,
            conductivity,
            filter_radius: self.continuation.radius(),
            next_index: self.index,
            iters,
            final_total_power,
        }
    }
}
