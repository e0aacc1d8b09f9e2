//! Adjoint gradient assembly by time reversal.
//!
//! One gradient costs two oracle runs:
//!
//! 1. A forward run under plane-wave excitation records the received field
//!    over the grid and the power flowing through the feed.
//! 2. The feed power is reversed in time and replayed at the feed in a
//!    backward run, which records the excited field.
//!
//! The sensitivity of the implicit objective to the conductivity of each cell
//! is then
//!
//! ```text
//! gradient[c] = -Σ_t received[T-1-t, c] * excited[t, c]
//! ```

use std::{error::Error as StdError, fmt};

use ndarray::{Array1, Axis, s};
use pixant_core::{
    FieldOracle, FieldSeries, GridSpec, PowerSeries, SeriesError, ShapeError, Waveform, metrics,
};
use thiserror::Error;
use tracing::debug;

/// Relative tolerance when comparing time steps of two field series.
const TIME_STEP_TOLERANCE: f64 = 1e-9;

/// The two oracle runs behind one gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Forward,
    Backward,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => f.write_str("forward"),
            Self::Backward => f.write_str("backward"),
        }
    }
}

/// Errors that can occur while assembling a gradient.
///
/// All of these are fatal for the run. Missing or mismatched data is never
/// patched up.
#[derive(Debug, Error)]
pub enum AdjointError {
    #[error("{pass} simulation failed")]
    Oracle {
        pass: Pass,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("{pass} field has {actual} cells but the grid has {expected}")]
    CellCount {
        pass: Pass,
        expected: usize,
        actual: usize,
    },

    #[error("received field has {received} samples but excited field has {excited}")]
    SampleCount { received: usize, excited: usize },

    #[error("received field time step {received} differs from excited field time step {excited}")]
    TimeStep { received: f64, excited: f64 },

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("invalid time series: {0}")]
    Series(#[from] SeriesError),
}

/// The feed power replayed backwards, ready to drive the backward run.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeReversal {
    /// Reversed power values on the original, increasing time axis.
    pub waveform: Waveform,

    /// `Σ |p_i|` over the forward feed power.
    pub total_power: f64,
}

/// The result of one adjoint gradient assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensitivity {
    /// Per-cell sensitivity with respect to conductivity.
    pub gradient: Array1<f64>,

    /// Total absolute power received at the feed during the forward run.
    ///
    /// Reported for diagnostics only; it is not part of the optimization.
    pub total_power: f64,
}

/// Reverses the sample order of a power series.
///
/// The values `[p0, p1, ..., pn]` become `[pn, ..., p1, p0]` while the time
/// axis stays `[0, dt, ..., n dt]`.
///
/// # Errors
///
/// Returns an error if the time axis cannot form a waveform.
pub fn time_reverse(power: &PowerSeries) -> Result<TimeReversal, AdjointError> {
    let reversed = power.values().slice(s![..;-1]).to_owned();
    let waveform = Waveform::new(power.times(), reversed)?;
    Ok(TimeReversal {
        waveform,
        total_power: metrics::abs_sum(power.values()),
    })
}

/// Combines received and excited fields into a per-cell sensitivity.
///
/// # Errors
///
/// Returns an error if either field does not cover `cells` cells, or if the
/// two fields differ in sample count or time step.
pub fn sensitivity(
    received: &FieldSeries,
    excited: &FieldSeries,
    cells: usize,
) -> Result<Array1<f64>, AdjointError> {
    for (pass, field) in [(Pass::Forward, received), (Pass::Backward, excited)] {
        if field.cells() != cells {
            return Err(AdjointError::CellCount {
                pass,
                expected: cells,
                actual: field.cells(),
            });
        }
    }
    if received.samples() != excited.samples() {
        return Err(AdjointError::SampleCount {
            received: received.samples(),
            excited: excited.samples(),
        });
    }
    let (dt_r, dt_e) = (received.time_step(), excited.time_step());
    if (dt_r - dt_e).abs() > TIME_STEP_TOLERANCE * dt_r.max(dt_e) {
        return Err(AdjointError::TimeStep {
            received: dt_r,
            excited: dt_e,
        });
    }

    let product = &received.values().slice(s![..;-1, ..]) * excited.values();
    Ok(-product.sum_axis(Axis(0)))
}

/// Runs the forward and backward simulations and assembles the gradient.
///
/// `excitation` is the plane-wave signal for the forward run, or `None` for
/// the oracle's default.
///
/// # Errors
///
/// Returns an error if either simulation fails or if the returned data does
/// not match the grid or each other.
pub fn assemble<O: FieldOracle>(
    oracle: &O,
    grid: &GridSpec,
    conductivity: &Array1<f64>,
    excitation: Option<&Waveform>,
) -> Result<Sensitivity, AdjointError> {
    grid.check("conductivity", conductivity.len())?;

    debug!(cells = grid.len(), "running forward simulation");
    let forward = oracle
        .simulate_forward(conductivity, excitation)
        .map_err(|e| AdjointError::Oracle {
            pass: Pass::Forward,
            source: Box::new(e),
        })?;

    let reversal = time_reverse(&forward.feed_power)?;
    debug!(
        samples = reversal.waveform.len(),
        total_power = reversal.total_power,
        "reversed feed power"
    );

    debug!("running backward simulation");
    let excited = oracle
        .simulate_backward(conductivity, &reversal.waveform)
        .map_err(|e| AdjointError::Oracle {
            pass: Pass::Backward,
            source: Box::new(e),
        })?;

    let gradient = sensitivity(&forward.received, &excited, grid.len())?;

    Ok(Sensitivity {
        gradient,
        total_power: reversal.total_power,
    })
}
