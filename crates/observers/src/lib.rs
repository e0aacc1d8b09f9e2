//! Reusable observers for the pixant optimizer.
//!
//! This crate provides [`Observer`] implementations and capability traits for
//! monitoring and steering a descent run.
//!
//! # Modules
//!
//! - [`traits`]: capability traits for generic observers
//!   ([`HasRmsStep`], [`CanStopEarly`])
//! - [`DivergenceGuard`]: stops a run whose steps blow up
//! - [`ProgressRecorder`]: keeps a per-iteration summary for reporting
//!
//! [`Observer`]: pixant_core::Observer
//! [`HasRmsStep`]: traits::HasRmsStep
//! [`CanStopEarly`]: traits::CanStopEarly

pub mod traits;

mod guard;
mod progress;

pub use guard::DivergenceGuard;
pub use progress::{Progress, ProgressRecorder};
