use pixant_core::IterationRecord;

use crate::{adam::StepKind, convergence::Convergence};

/// Events emitted by the descent driver.
///
/// Each iteration emits [`Event::Iterated`] once its record has been appended,
/// followed by at most one status event.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// An iteration completed.
    Iterated {
        /// The record just appended to the ledger.
        record: &'a IterationRecord,

        /// Whether Adam or the plateau guard produced the step.
        kind: StepKind,
    },

    /// The step reversed direction; the run continues.
    Oscillation {
        index: usize,

        /// `dot(last_step, step)`.
        dot: f64,

        /// Reversals counted so far.
        count: usize,
    },

    /// The run converged at this iteration.
    Converged { index: usize, reason: Convergence },

    /// The iteration cap was reached without converging.
    Exhausted { iters: usize },
}

impl Event<'_> {
    /// Returns the iteration index the event refers to, if any.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Iterated { record, .. } => Some(record.index),
            Self::Oscillation { index, .. } | Self::Converged { index, .. } => Some(*index),
            Self::Exhausted { .. } => None,
        }
    }
}
