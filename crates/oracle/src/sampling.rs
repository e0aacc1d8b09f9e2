use thiserror::Error;

/// Errors that can occur when describing an export time axis.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum SamplingError {
    #[error("time step must be finite and positive, got {0}")]
    TimeStep(f64),

    #[error("end time {time_end} must be finite and at least one time step ({time_step})")]
    TimeEnd { time_end: f64, time_step: f64 },
}

/// The time axis the simulator exports on, in nanoseconds.
///
/// Exports hold one sample at each multiple of `time_step` from `0` through
/// `time_end`.
///
/// # Examples
///
/// ```
/// use pixant_oracle::Sampling;
///
/// let sampling = Sampling::new(0.1, 3.5).unwrap();
/// assert_eq!(sampling.samples(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    time_step: f64,
    time_end: f64,
}

impl Sampling {
    /// Creates a sampling from a time step and an end time.
    ///
    /// # Errors
    ///
    /// Returns an error if `time_step` is not finite and positive, or if
    /// `time_end` is not finite or shorter than one time step.
    pub fn new(time_step: f64, time_end: f64) -> Result<Self, SamplingError> {
        if !(time_step.is_finite() && time_step > 0.0) {
            return Err(SamplingError::TimeStep(time_step));
        }
        if !(time_end.is_finite() && time_end >= time_step) {
            return Err(SamplingError::TimeEnd {
                time_end,
                time_step,
            });
        }
        Ok(Self {
            time_step,
            time_end,
        })
    }

    #[must_use]
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    #[must_use]
    pub fn time_end(&self) -> f64 {
        self.time_end
    }

    /// Returns the sample count, `floor(time_end / time_step) + 1`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn samples(&self) -> usize {
        // Absorbs quotients such as 0.3 / 0.1 landing just below an integer.
        (self.time_end / self.time_step + 1e-9).floor() as usize + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_samples_including_both_ends() {
        assert_eq!(Sampling::new(0.1, 0.1).unwrap().samples(), 2);
        assert_eq!(Sampling::new(0.1, 0.3).unwrap().samples(), 4);
        assert_eq!(Sampling::new(0.1, 5.0).unwrap().samples(), 51);
        assert_eq!(Sampling::new(0.03, 31.0).unwrap().samples(), 1034);
        assert_eq!(Sampling::new(0.2, 0.5).unwrap().samples(), 3);
    }

    #[test]
    fn rejects_invalid_axes() {
        assert_eq!(Sampling::new(0.0, 1.0), Err(SamplingError::TimeStep(0.0)));
        assert!(matches!(
            Sampling::new(f64::NAN, 1.0),
            Err(SamplingError::TimeStep(_))
        ));
        assert!(matches!(
            Sampling::new(0.1, 0.05),
            Err(SamplingError::TimeEnd { .. })
        ));
        assert!(matches!(
            Sampling::new(0.1, f64::INFINITY),
            Err(SamplingError::TimeEnd { .. })
        ));
    }
}
