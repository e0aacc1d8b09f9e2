//! Capability traits for generic observers.
//!
//! These traits abstract over the driver's event and action types, so an
//! observer can be written once against the capabilities it needs.
//!
//! # Example
//!
//! ```rust
//! use pixant_core::Observer;
//! use pixant_observers::traits::{CanStopEarly, HasRmsStep};
//!
//! struct SmallEnough {
//!     tolerance: f64,
//! }
//!
//! impl<E: HasRmsStep, A: CanStopEarly> Observer<E, A> for SmallEnough {
//!     fn observe(&mut self, event: &E) -> Option<A> {
//!         let rms_step = event.rms_step()?;
//!         (rms_step < self.tolerance).then(A::stop_early)
//!     }
//! }
//! ```

use pixant_solvers::descent;

/// An event that carries the RMS of an iteration's step.
pub trait HasRmsStep {
    /// Returns the step RMS, or `None` when the event does not describe an
    /// iteration.
    fn rms_step(&self) -> Option<f64>;
}

/// An action type that can signal early termination.
pub trait CanStopEarly {
    /// Returns the action that stops the run early.
    fn stop_early() -> Self;
}

impl HasRmsStep for descent::Event<'_> {
    fn rms_step(&self) -> Option<f64> {
        match self {
            descent::Event::Iterated { record, .. } => Some(record.rms_step),
            descent::Event::Oscillation { .. }
            | descent::Event::Converged { .. }
            | descent::Event::Exhausted { .. } => None,
        }
    }
}

impl CanStopEarly for descent::Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}
