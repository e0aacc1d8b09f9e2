//! Multi-band Gaussian sine pulse synthesis.
//!
//! An excitation is a sum of Gaussian-windowed sines, one per band, centered
//! on the middle of the signal. Each band is weighted by
//! `amplitude * f * ratio`, so wider bands carry proportionally more energy.
//!
//! Times are in nanoseconds and frequencies in gigahertz.

use std::f64::consts::PI;

use ndarray::Array1;
use pixant_core::{SeriesError, Waveform};
use thiserror::Error;
use uom::si::{f64::Frequency, frequency::gigahertz};

use crate::{Sampling, SamplingError};

/// Number of Gaussian widths spanned by the signal.
const SIGMAS_PER_DURATION: f64 = 8.0;

/// One frequency component of an excitation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub amplitude: f64,
    pub frequency: Frequency,

    /// Bandwidth as a fraction of the center frequency.
    pub bandwidth_ratio: f64,
}

impl Band {
    #[must_use]
    pub fn new(amplitude: f64, frequency: Frequency, bandwidth_ratio: f64) -> Self {
        Self {
            amplitude,
            frequency,
            bandwidth_ratio,
        }
    }

    /// Creates a band centered at `frequency` GHz.
    #[must_use]
    pub fn gigahertz(amplitude: f64, frequency: f64, bandwidth_ratio: f64) -> Self {
        Self::new(
            amplitude,
            Frequency::new::<gigahertz>(frequency),
            bandwidth_ratio,
        )
    }

    fn ghz(&self) -> f64 {
        self.frequency.get::<gigahertz>()
    }

    /// Gaussian width of the band's pulse, in nanoseconds.
    fn sigma(&self) -> f64 {
        1.0 / (2.0 * PI * self.ghz() * self.bandwidth_ratio)
    }
}

/// Errors that can occur when synthesizing an excitation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrequencyError {
    #[error("an excitation needs at least one band")]
    NoBands,

    #[error("band frequencies and bandwidth ratios must be finite and positive")]
    NonPositive,

    #[error("highest frequency {frequency} GHz is at or above the 500 GHz limit")]
    TooHigh { frequency: f64 },

    #[error("pulse duration {duration} ns is shorter than one time step")]
    TooShort { duration: f64 },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// A synthesized excitation signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Excitation {
    /// Sampling step in nanoseconds.
    pub time_step: f64,

    /// Signal length in whole nanoseconds.
    pub duration: f64,

    pub waveform: Waveform,
}

impl Excitation {
    /// The time axis the simulator should export on when driven by this
    /// excitation.
    ///
    /// # Errors
    ///
    /// Returns an error if the step or duration was altered into an invalid
    /// axis after synthesis.
    pub fn sampling(&self) -> Result<Sampling, SamplingError> {
        Sampling::new(self.time_step, self.duration)
    }
}

/// Picks a sampling step that resolves `frequency` GHz with a short decimal
/// representation.
///
/// # Errors
///
/// Returns an error if `frequency` is not positive or is 500 GHz or higher.
pub fn time_step_for(frequency: f64) -> Result<f64, FrequencyError> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(FrequencyError::NonPositive);
    }
    let step = if frequency < 2.5 {
        round_to(1.0 / (4.0 * frequency), 1)
    } else if frequency < 25.0 {
        round_to(1.0 / (4.0 * frequency), 2)
    } else if frequency < 500.0 {
        round_to(1.0 / (2.0 * frequency), 3)
    } else {
        return Err(FrequencyError::TooHigh { frequency });
    };
    Ok(step)
}

/// Rounds half to even at `decimals` places.
fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Synthesizes the superposition of `bands`.
///
/// The time step comes from the highest band frequency. The duration is
/// `floor(8 * σ_max)` nanoseconds, where `σ = 1 / (2π f ratio)`, and the
/// signal is sampled on `floor(duration / time_step) + 1` evenly spaced points.
///
/// # Errors
///
/// Returns an error if there are no bands, if a band is invalid, if the
/// highest frequency is too high to sample, or if the pulse is too short.
pub fn synthesize(bands: &[Band]) -> Result<Excitation, FrequencyError> {
    if bands.is_empty() {
        return Err(FrequencyError::NoBands);
    }
    if bands.iter().any(|band| {
        !(band.ghz().is_finite() && band.ghz() > 0.0)
            || !(band.bandwidth_ratio.is_finite() && band.bandwidth_ratio > 0.0)
    }) {
        return Err(FrequencyError::NonPositive);
    }

    let max_frequency = bands.iter().map(Band::ghz).fold(f64::MIN, f64::max);
    let time_step = time_step_for(max_frequency)?;

    let max_sigma = bands.iter().map(Band::sigma).fold(f64::MIN, f64::max);
    let duration = (SIGMAS_PER_DURATION * max_sigma).floor();
    let sampling =
        Sampling::new(time_step, duration).map_err(|_| FrequencyError::TooShort { duration })?;

    let time = Array1::linspace(0.0, duration, sampling.samples());
    let center = duration / 2.0;

    let value = time.mapv(|t| {
        let shifted = t - center;
        bands
            .iter()
            .map(|band| {
                let f = band.ghz();
                let sigma = band.sigma();
                let envelope = band.amplitude
                    * f
                    * band.bandwidth_ratio
                    * (-(shifted * shifted) / (2.0 * sigma * sigma)).exp();
                envelope * (2.0 * PI * f * shifted).sin()
            })
            .sum::<f64>()
    });

    Ok(Excitation {
        time_step,
        duration,
        waveform: Waveform::new(time, value)?,
    })
}
