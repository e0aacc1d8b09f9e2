use pixant_core::Observer;
use tracing::warn;

use crate::traits::{CanStopEarly, HasRmsStep};

/// Stops a run once a step's RMS exceeds a limit or stops being finite.
///
/// A NaN step counts as diverged. Events that carry no step are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergenceGuard {
    limit: f64,
    tripped: bool,
}

impl DivergenceGuard {
    #[must_use]
    pub fn new(limit: f64) -> Self {
        Self {
            limit,
            tripped: false,
        }
    }

    /// Returns whether the guard has stopped the run.
    #[must_use]
    pub fn tripped(&self) -> bool {
        self.tripped
    }
}

impl<E: HasRmsStep, A: CanStopEarly> Observer<E, A> for DivergenceGuard {
    fn observe(&mut self, event: &E) -> Option<A> {
        let rms_step = event.rms_step()?;
        if !rms_step.is_finite() || rms_step > self.limit {
            warn!(rms_step, limit = self.limit, "step diverged, stopping");
            self.tripped = true;
            return Some(A::stop_early());
        }
        None
    }
}
