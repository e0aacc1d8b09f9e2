use ndarray::Array1;

use crate::{FieldSeries, PowerSeries, Waveform};

/// Output of a forward (plane wave) simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardFields {
    /// Field received over the grid.
    pub received: FieldSeries,

    /// Power flow at the feed point.
    pub feed_power: PowerSeries,
}

/// An external field simulation.
///
/// The oracle is the only component that performs physical simulation. Given
/// a conductivity field over the grid and an excitation, it returns
/// time-series field data on the grid. Oracles must be deterministic: the same
/// conductivity and excitation always produce the same fields.
///
/// A run that fails must be reported as an error. Solvers never substitute
/// missing or partial data.
pub trait FieldOracle {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Simulates a broadside plane wave incident on the structure.
    ///
    /// `excitation` is the plane wave's time signal, or `None` for the
    /// simulator's default signal.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the simulation fails or its exports cannot be
    /// decoded.
    fn simulate_forward(
        &self,
        conductivity: &Array1<f64>,
        excitation: Option<&Waveform>,
    ) -> Result<ForwardFields, Self::Error>;

    /// Simulates the structure excited at the feed with `excitation`.
    ///
    /// Returns the excited field over the grid.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the simulation fails or its exports cannot be
    /// decoded.
    fn simulate_backward(
        &self,
        conductivity: &Array1<f64>,
        excitation: &Waveform,
    ) -> Result<FieldSeries, Self::Error>;
}
