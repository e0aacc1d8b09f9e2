use pixant_core::Observer;
use pixant_solvers::{
    adam::StepKind,
    convergence::Convergence,
    descent::{Action, Event},
};
use tracing::debug;

/// Scalar summary of one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub index: usize,
    pub filter_radius: f64,
    pub rms_gradient: f64,
    pub rms_step: f64,
    pub total_power: f64,
    pub kind: StepKind,
}

/// Records a [`Progress`] entry per iteration, plus how the run ended.
///
/// The recorder never acts on the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressRecorder {
    history: Vec<Progress>,
    reversals: usize,
    converged: Option<Convergence>,
}

impl ProgressRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn history(&self) -> &[Progress] {
        &self.history
    }

    /// Returns the number of direction reversals seen.
    #[must_use]
    pub fn reversals(&self) -> usize {
        self.reversals
    }

    /// Returns why the run converged, if it did.
    #[must_use]
    pub fn converged(&self) -> Option<Convergence> {
        self.converged
    }

    /// Returns the highest total power recorded and its iteration index.
    #[must_use]
    pub fn best_power(&self) -> Option<(usize, f64)> {
        self.history
            .iter()
            .map(|p| (p.index, p.total_power))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

impl Observer<Event<'_>, Action> for ProgressRecorder {
    fn observe(&mut self, event: &Event<'_>) -> Option<Action> {
        match *event {
            Event::Iterated { record, kind } => {
                debug!(index = record.index, ?kind, "recorded progress");
                self.history.push(Progress {
                    index: record.index,
                    filter_radius: record.filter_radius,
                    rms_gradient: record.rms_gradient,
                    rms_step: record.rms_step,
                    total_power: record.total_power,
                    kind,
                });
            }
            Event::Oscillation { .. } => self.reversals += 1,
            Event::Converged { reason, .. } => self.converged = Some(reason),
            Event::Exhausted { .. } => {}
        }
        None
    }
}
