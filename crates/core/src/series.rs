//! Time-series data exchanged with the field oracle.
//!
//! Times are plain `f64` values in nanoseconds, the unit used by the oracle's
//! text exports. All series are sampled at a fixed `time_step` starting at
//! `t = 0`.

use ndarray::{Array1, Array2};
use thiserror::Error;

/// Errors that can occur when constructing a time series.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeriesError {
    #[error("time step must be finite and positive, got {0}")]
    TimeStep(f64),

    #[error("series has no samples")]
    Empty,

    #[error("time axis has {time} samples but value axis has {value}")]
    LengthMismatch { time: usize, value: usize },

    #[error("time axis is not strictly increasing at sample {0}")]
    NotIncreasing(usize),
}

fn check_time_step(time_step: f64) -> Result<(), SeriesError> {
    if time_step.is_finite() && time_step > 0.0 {
        Ok(())
    } else {
        Err(SeriesError::TimeStep(time_step))
    }
}

/// A field sampled over the grid, shaped `[time, cell]`.
///
/// Row `t` holds the field value of every cell at time `t * time_step`, in the
/// grid's flattening order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSeries {
    time_step: f64,
    values: Array2<f64>,
}

impl FieldSeries {
    /// Creates a field series.
    ///
    /// # Errors
    ///
    /// Returns an error if `time_step` is not finite and positive, or if the
    /// table has no samples.
    pub fn new(time_step: f64, values: Array2<f64>) -> Result<Self, SeriesError> {
        check_time_step(time_step)?;
        if values.nrows() == 0 {
            return Err(SeriesError::Empty);
        }
        Ok(Self { time_step, values })
    }

    #[must_use]
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Returns the number of time samples.
    #[must_use]
    pub fn samples(&self) -> usize {
        self.values.nrows()
    }

    /// Returns the number of grid cells per sample.
    #[must_use]
    pub fn cells(&self) -> usize {
        self.values.ncols()
    }

    #[must_use]
    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }
}

/// Power flow at the feed, one value per time sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSeries {
    time_step: f64,
    values: Array1<f64>,
}

impl PowerSeries {
    /// Creates a power series.
    ///
    /// # Errors
    ///
    /// Returns an error if `time_step` is not finite and positive, or if the
    /// series is empty.
    pub fn new(time_step: f64, values: Array1<f64>) -> Result<Self, SeriesError> {
        check_time_step(time_step)?;
        if values.is_empty() {
            return Err(SeriesError::Empty);
        }
        Ok(Self { time_step, values })
    }

    #[must_use]
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    #[must_use]
    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    /// Returns the sample times `k * time_step`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn times(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.values.len(), |k| k as f64 * self.time_step)
    }
}

/// An excitation signal as `(time, value)` pairs with increasing time.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    time: Array1<f64>,
    value: Array1<f64>,
}

impl Waveform {
    /// Creates a waveform from paired time and value axes.
    ///
    /// # Errors
    ///
    /// Returns an error if the axes differ in length, are empty, or if the
    /// time axis is not strictly increasing.
    pub fn new(time: Array1<f64>, value: Array1<f64>) -> Result<Self, SeriesError> {
        if time.len() != value.len() {
            return Err(SeriesError::LengthMismatch {
                time: time.len(),
                value: value.len(),
            });
        }
        if time.is_empty() {
            return Err(SeriesError::Empty);
        }
        if let Some(index) = time
            .windows(2)
            .into_iter()
            .position(|pair| !(pair[1] > pair[0]))
        {
            return Err(SeriesError::NotIncreasing(index + 1));
        }
        Ok(Self { time, value })
    }

    #[must_use]
    pub fn time(&self) -> &Array1<f64> {
        &self.time
    }

    #[must_use]
    pub fn value(&self) -> &Array1<f64> {
        &self.value
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Always `false`; a waveform has at least one sample.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates over `(time, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.time.iter().copied().zip(self.value.iter().copied())
    }
}
