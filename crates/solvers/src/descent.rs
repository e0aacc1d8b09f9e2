//! Adjoint-driven gradient descent over a pixelated design.
//!
//! # Algorithm
//!
//! Each iteration:
//!
//! 1. Clips the primal values and maps them to conductivity.
//! 2. Smooths the conductivity at the current continuation radius.
//! 3. Assembles the conductivity gradient from one forward and one backward
//!    oracle run.
//! 4. Pulls the gradient back through the filter and the map.
//! 5. Computes a step (Adam, or the raw gradient once the plateau guard holds)
//!    and updates `primal += learning_rate * step`.
//! 6. Checks for oscillation or a small step.
//! 7. Shrinks the radius and appends the iteration record to the ledger.
//!
//! The run state is an explicit value threaded through the loop; nothing is
//! shared or mutated behind the driver's back.
//!
//! # Observer Events
//!
//! After the ledger append, the driver emits [`Event::Iterated`], then
//! [`Event::Oscillation`] or [`Event::Converged`] when the convergence check
//! reports one. When the iteration cap is hit, [`Event::Exhausted`] follows
//! the last iteration.
//!
//! Observers can return [`Action::StopEarly`] from any event to end the run
//! after the current iteration.

mod action;
mod config;
mod error;
mod event;
mod iterate;
mod solution;
mod state;


pub use action::Action;
pub use config::{Config, ConfigError};
pub use error::Error;
pub use event::Event;
pub use solution::{Solution, Status};

use ndarray::Array1;
use pixant_core::{FieldOracle, GridSpec, IterationLedger, Observer, ResumePoint};
use tracing::{debug, info, warn};

use crate::{
    adjoint,
    convergence::{Convergence, Verdict},
};

use iterate::Context;
use state::State;

/// Optimizes a design starting from `initial` primal values.
///
/// Every completed iteration is appended to `ledger` before the next one
/// starts.
///
/// # Errors
///
/// Returns an error if `initial` does not match the grid, if an oracle run
/// fails or returns inconsistent data, or if the ledger rejects a record.
pub fn solve<O, L, Obs>(
    oracle: &O,
    grid: &GridSpec,
    initial: Array1<f64>,
    config: &Config,
    ledger: L,
    observer: Obs,
) -> Result<Solution, Error>
where
    O: FieldOracle,
    L: IterationLedger,
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    grid.check("initial primal", initial.len())?;
    let state = State::fresh(grid, initial, config);
    run(oracle, grid, state, config, ledger, observer)
}

/// Optimizes a design without observer support.
///
/// This is a convenience wrapper around [`solve`] that uses a no-op observer.
///
/// # Errors
///
/// Returns an error if `initial` does not match the grid, if an oracle run
/// fails or returns inconsistent data, or if the ledger rejects a record.
pub fn solve_unobserved<O, L>(
    oracle: &O,
    grid: &GridSpec,
    initial: Array1<f64>,
    config: &Config,
    ledger: L,
) -> Result<Solution, Error>
where
    O: FieldOracle,
    L: IterationLedger,
{
    solve(oracle, grid, initial, config, ledger, ())
}

/// Continues a run from a point recovered from its ledger.
///
/// Iteration indices and the filter radius pick up where the ledger left off.
/// Adam restarts from zero moments, with its time index counting from the
/// resumed iteration.
///
/// # Errors
///
/// Returns an error if the resume point does not match the grid, if an oracle
/// run fails or returns inconsistent data, or if the ledger rejects a record.
pub fn resume<O, L, Obs>(
    oracle: &O,
    grid: &GridSpec,
    point: ResumePoint,
    config: &Config,
    ledger: L,
    observer: Obs,
) -> Result<Solution, Error>
where
    O: FieldOracle,
    L: IterationLedger,
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    grid.check("resume primal", point.primal.len())?;
    info!(
        index = point.index,
        filter_radius = point.filter_radius,
        "resuming run"
    );
    let state = State::resume(grid, point, config);
    run(oracle, grid, state, config, ledger, observer)
}

fn run<O, L, Obs>(
    oracle: &O,
    grid: &GridSpec,
    mut state: State,
    config: &Config,
    mut ledger: L,
    mut observer: Obs,
) -> Result<Solution, Error>
where
    O: FieldOracle,
    L: IterationLedger,
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let context = Context::new(oracle, grid, config);
    let mut iters = 0;

    let status = loop {
        if state.index >= config.max_iters() {
            warn!(iters = state.index, "iteration cap reached without converging");
            let event = Event::Exhausted { iters: state.index };
            let _ = observer.observe(&event);
            break Status::Exhausted;
        }

        let outcome = context.iterate(state)?;
        ledger.append(&outcome.record).map_err(Error::ledger)?;
        iters += 1;
        state = outcome.state;

        let record = &outcome.record;
        info!(
            index = record.index,
            filter_radius = record.filter_radius,
            rms_gradient = record.rms_gradient,
            rms_step = record.rms_step,
            total_power = record.total_power,
            "iteration complete"
        );

        let iterated = Event::Iterated {
            record,
            kind: outcome.kind,
        };
        let mut stop = observer.observe(&iterated) == Some(Action::StopEarly);

        match outcome.verdict {
            Verdict::Running => {}
            Verdict::Reversed { dot, count } => {
                info!(index = record.index, dot, count, "step reversed direction");
                let event = Event::Oscillation {
                    index: record.index,
                    dot,
                    count,
                };
                stop |= observer.observe(&event) == Some(Action::StopEarly);
            }
            Verdict::Converged(reason) => {
                match reason {
                    Convergence::Oscillation { dot, count } => {
                        info!(index = record.index, dot, count, "converged by oscillation");
                    }
                    Convergence::SmallStep { rms_step } => {
                        info!(index = record.index, rms_step, "converged by small step");
                    }
                }
                let event = Event::Converged {
                    index: record.index,
                    reason,
                };
                let _ = observer.observe(&event);
                break Status::Converged;
            }
        }

        if stop {
            info!(index = record.index, "stopped by observer");
            break Status::StoppedByObserver;
        }
    };

    // The returned design: primal after the last update, smoothed at the
    // radius after the last shrink.
    let conductivity = context.design(&state.primal, state.continuation.radius())?;
    let final_total_power = if config.final_evaluation() {
        debug!("evaluating the final design");
        let sensitivity = adjoint::assemble(oracle, grid, &conductivity, config.excitation())
            .map_err(Error::FinalEvaluation)?;
        info!(total_power = sensitivity.total_power, "evaluated the final design");
        Some(sensitivity.total_power)
    } else {
        None
    };

    Ok(state.into_solution(status, iters, conductivity, final_total_power))
}
