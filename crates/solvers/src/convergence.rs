//! Oscillation and small-step convergence detection.

use ndarray::Array1;
use pixant_core::metrics;
use thiserror::Error;

/// Thresholds for the convergence heuristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceConfig {
    step_tolerance: f64,
    max_oscillations: usize,
}

/// Errors that can occur when validating a convergence config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceConfigError {
    #[error("step_tolerance must be finite and non-negative")]
    StepTolerance,

    #[error("max_oscillations must be at least 1")]
    MaxOscillations,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            step_tolerance: 0.1,
            max_oscillations: 2,
        }
    }
}

impl ConvergenceConfig {
    /// Creates a validated convergence config.
    ///
    /// # Errors
    ///
    /// Returns an error if `step_tolerance` is negative or non-finite, or if
    /// `max_oscillations` is zero.
    pub fn new(
        step_tolerance: f64,
        max_oscillations: usize,
    ) -> Result<Self, ConvergenceConfigError> {
        if !step_tolerance.is_finite() || step_tolerance < 0.0 {
            return Err(ConvergenceConfigError::StepTolerance);
        }
        if max_oscillations == 0 {
            return Err(ConvergenceConfigError::MaxOscillations);
        }
        Ok(Self {
            step_tolerance,
            max_oscillations,
        })
    }

    /// Returns the RMS step below which the run converges.
    #[must_use]
    pub fn step_tolerance(&self) -> f64 {
        self.step_tolerance
    }

    /// Returns the number of direction reversals that ends the run.
    #[must_use]
    pub fn max_oscillations(&self) -> usize {
        self.max_oscillations
    }
}

/// Why a run converged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Convergence {
    /// The step reversed direction often enough.
    Oscillation { dot: f64, count: usize },

    /// The step became small.
    SmallStep { rms_step: f64 },
}

/// The outcome of one convergence check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Keep iterating.
    Running,

    /// The step reversed direction but the run continues.
    Reversed { dot: f64, count: usize },

    /// Stop; the design has converged.
    Converged(Convergence),
}

/// Tracks direction reversals between consecutive steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceMonitor {
    config: ConvergenceConfig,
    oscillations: usize,
}

impl ConvergenceMonitor {
    #[must_use]
    pub fn new(config: ConvergenceConfig) -> Self {
        Self {
            config,
            oscillations: 0,
        }
    }

    /// Returns the number of reversals counted so far.
    #[must_use]
    pub fn oscillations(&self) -> usize {
        self.oscillations
    }

    /// Compares this iteration's step with the previous one.
    ///
    /// A reversal (`dot(last_step, step) < 0`) takes precedence over the small
    /// step check, so a small but reversed step only counts as a reversal.
    pub fn evaluate(&mut self, last_step: &Array1<f64>, step: &Array1<f64>) -> Verdict {
        let dot = last_step.dot(step);
        if dot < 0.0 {
            self.oscillations += 1;
            let count = self.oscillations;
            if count >= self.config.max_oscillations {
                return Verdict::Converged(Convergence::Oscillation { dot, count });
            }
            return Verdict::Reversed { dot, count };
        }

        let rms_step = metrics::rms(step);
        if rms_step < self.config.step_tolerance {
            self.oscillations += 1;
            return Verdict::Converged(Convergence::SmallStep { rms_step });
        }

        Verdict::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::array;

    #[test]
    fn converges_after_exactly_two_reversals() {
        let mut monitor = ConvergenceMonitor::new(ConvergenceConfig::default());
        let steps = [
            array![1.0, 1.0],
            array![-1.0, -1.0],
            array![1.0, 1.0],
            array![-1.0, -1.0],
        ];

        let mut last = Array1::zeros(2);
        let mut verdicts = Vec::new();
        for step in steps {
            verdicts.push(monitor.evaluate(&last, &step));
            last = step;
        }

        assert_eq!(verdicts[0], Verdict::Running);
        assert_eq!(verdicts[1], Verdict::Reversed { dot: -2.0, count: 1 });
        assert_eq!(
            verdicts[2],
            Verdict::Converged(Convergence::Oscillation { dot: -2.0, count: 2 })
        );
        assert_eq!(monitor.oscillations(), 3);
    }

    #[test]
    fn small_first_step_converges_immediately() {
        let mut monitor = ConvergenceMonitor::new(ConvergenceConfig::default());

        let verdict = monitor.evaluate(&Array1::zeros(3), &array![0.01, -0.02, 0.0]);

        assert!(matches!(
            verdict,
            Verdict::Converged(Convergence::SmallStep { rms_step }) if rms_step < 0.1
        ));
        assert_eq!(monitor.oscillations(), 1);
    }

    #[test]
    fn reversal_takes_precedence_over_small_step() {
        let mut monitor = ConvergenceMonitor::new(ConvergenceConfig::default());

        let verdict = monitor.evaluate(&array![1.0], &array![-0.01]);

        assert_eq!(verdict, Verdict::Reversed { dot: -0.01, count: 1 });
    }

    #[test]
    fn orthogonal_steps_are_not_reversals() {
        let mut monitor = ConvergenceMonitor::new(ConvergenceConfig::default());

        let verdict = monitor.evaluate(&array![1.0, 0.0], &array![0.0, 1.0]);

        assert_eq!(verdict, Verdict::Running);
        assert_eq!(monitor.oscillations(), 0);
    }

    #[test]
    fn rejects_invalid_config() {
        assert_eq!(
            ConvergenceConfig::new(-0.1, 2),
            Err(ConvergenceConfigError::StepTolerance)
        );
        assert_eq!(
            ConvergenceConfig::new(0.1, 0),
            Err(ConvergenceConfigError::MaxOscillations)
        );
    }
}
