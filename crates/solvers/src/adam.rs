//! Step computation: Adam with a plateau guard.
//!
//! Adam rescales the primal gradient per pixel. Once the density filter has
//! become fine and the raw gradient has stopped changing, the plateau guard
//! skips Adam and uses the raw gradient directly, so Adam's momentum does not
//! amplify noise around a nearly converged design.
//!
//! The bias correction divides by `1 - β^t + ε`, with `ε` inside the
//! denominator. This differs slightly from textbook Adam and is kept so
//! results reproduce exactly.

use ndarray::Array1;
use pixant_core::{AdamDiagnostics, metrics};
use thiserror::Error;

/// Adam hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamConfig {
    beta1: f64,
    beta2: f64,
    epsilon: f64,
}

/// Errors that can occur when validating Adam hyperparameters.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AdamConfigError {
    #[error("beta1 must be in [0, 1)")]
    Beta1,

    #[error("beta2 must be in [0, 1)")]
    Beta2,

    #[error("epsilon must be finite and positive")]
    Epsilon,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl AdamConfig {
    /// Creates validated hyperparameters.
    ///
    /// # Errors
    ///
    /// Returns an error if a decay rate is outside `[0, 1)` or if `epsilon`
    /// is not finite and positive.
    pub fn new(beta1: f64, beta2: f64, epsilon: f64) -> Result<Self, AdamConfigError> {
        if !(0.0..1.0).contains(&beta1) {
            return Err(AdamConfigError::Beta1);
        }
        if !(0.0..1.0).contains(&beta2) {
            return Err(AdamConfigError::Beta2);
        }
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(AdamConfigError::Epsilon);
        }
        Ok(Self {
            beta1,
            beta2,
            epsilon,
        })
    }

    #[must_use]
    pub fn beta1(&self) -> f64 {
        self.beta1
    }

    #[must_use]
    pub fn beta2(&self) -> f64 {
        self.beta2
    }

    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Advances Adam by one step at time index `t` (starting at 1).
    ///
    /// Returns the scaled step and the updated moments.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn update(
        &self,
        gradient: &Array1<f64>,
        t: usize,
        state: AdamState,
    ) -> (Array1<f64>, AdamState) {
        let Self {
            beta1,
            beta2,
            epsilon,
        } = *self;
        let t = t as f64;

        let m = beta1 * state.m + (1.0 - beta1) * gradient;
        let v = beta2 * state.v + (1.0 - beta2) * gradient.mapv(|g| g * g);
        let m_hat = &m / (1.0 - beta1.powf(t) + epsilon);
        let v_hat = &v / (1.0 - beta2.powf(t) + epsilon);
        let step = &m_hat / &v_hat.mapv(|v| v.sqrt() + epsilon);

        (step, AdamState { m, v, m_hat, v_hat })
    }
}

/// Adam moments: raw and bias-corrected.
#[derive(Debug, Clone, PartialEq)]
pub struct AdamState {
    pub m: Array1<f64>,
    pub v: Array1<f64>,
    pub m_hat: Array1<f64>,
    pub v_hat: Array1<f64>,
}

impl AdamState {
    /// Zero moments for `len` pixels.
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self {
            m: Array1::zeros(len),
            v: Array1::zeros(len),
            m_hat: Array1::zeros(len),
            v_hat: Array1::zeros(len),
        }
    }
}

/// Where a step came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Adam scaled the gradient.
    Adam,

    /// The plateau guard passed the raw gradient through.
    Raw,
}

/// A computed step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub values: Array1<f64>,
    pub kind: StepKind,

    /// Adam internals when `kind` is [`StepKind::Adam`].
    pub diagnostics: Option<AdamDiagnostics>,
}

/// State carried by the step optimizer between iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct StepState {
    pub adam: AdamState,

    /// The previous iteration's raw (pre-Adam) step.
    pub previous_raw: Array1<f64>,
}

impl StepState {
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self {
            adam: AdamState::zeros(len),
            previous_raw: Array1::zeros(len),
        }
    }
}

/// Turns primal gradients into update steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOptimizer {
    adam: AdamConfig,
    plateau_tolerance: f64,
}

impl StepOptimizer {
    #[must_use]
    pub fn new(adam: AdamConfig, plateau_tolerance: f64) -> Self {
        Self {
            adam,
            plateau_tolerance,
        }
    }

    /// Computes this iteration's step from the raw primal gradient.
    ///
    /// `t` is Adam's time index (iteration index + 1). `fine` reports whether
    /// the continuation radius has shrunk below its initial scale; the plateau
    /// guard only applies once it has.
    ///
    /// When the guard holds, the raw gradient is the step and the Adam moments
    /// are carried over untouched.
    #[must_use]
    pub fn compute_step(
        &self,
        raw: &Array1<f64>,
        t: usize,
        fine: bool,
        state: StepState,
    ) -> (Step, StepState) {
        let plateau = fine && metrics::rms_diff(raw, &state.previous_raw) < self.plateau_tolerance;

        if plateau {
            let step = Step {
                values: raw.clone(),
                kind: StepKind::Raw,
                diagnostics: None,
            };
            let state = StepState {
                adam: state.adam,
                previous_raw: raw.clone(),
            };
            return (step, state);
        }

        let (values, adam) = self.adam.update(raw, t, state.adam);
        let diagnostics = AdamDiagnostics {
            t,
            gradient: raw.clone(),
            m_hat: adam.m_hat.clone(),
            v_hat: adam.v_hat.clone(),
        };
        let step = Step {
            values,
            kind: StepKind::Adam,
            diagnostics: Some(diagnostics),
        };
        (
            step,
            StepState {
                adam,
                previous_raw: raw.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn default_hyperparameters() {
        let config = AdamConfig::default();
        assert_relative_eq!(config.beta1(), 0.9);
        assert_relative_eq!(config.beta2(), 0.999);
        assert_relative_eq!(config.epsilon(), 1e-8);
    }

    #[test]
    fn rejects_invalid_hyperparameters() {
        assert_eq!(AdamConfig::new(1.0, 0.999, 1e-8), Err(AdamConfigError::Beta1));
        assert_eq!(AdamConfig::new(0.9, -0.1, 1e-8), Err(AdamConfigError::Beta2));
        assert_eq!(AdamConfig::new(0.9, 0.999, 0.0), Err(AdamConfigError::Epsilon));
    }

    #[test]
    fn first_step_uses_epsilon_inside_bias_correction() {
        let config = AdamConfig::default();
        let g = array![2.0, -4.0];

        let (step, state) = config.update(&g, 1, AdamState::zeros(2));

        assert_relative_eq!(state.m[0], 0.2);
        assert_relative_eq!(state.v[1], 0.016, epsilon = 1e-15);
        assert_relative_eq!(state.m_hat[0], 0.2 / (0.1 + 1e-8));
        assert_relative_eq!(state.v_hat[0], 0.004 / (0.001 + 1e-8), epsilon = 1e-12);

        let expected = (0.2 / (0.1 + 1e-8)) / ((0.004_f64 / (0.001 + 1e-8)).sqrt() + 1e-8);
        assert_relative_eq!(step[0], expected, epsilon = 1e-12);
        assert!(step[1] < 0.0);
    }

    #[test]
    fn constant_gradient_moments_converge_monotonically() {
        let config = AdamConfig::default();
        let g = array![0.5, -3.0];
        let mut state = AdamState::zeros(2);
        let mut last_error = [f64::INFINITY; 2];

        for t in 1..=5000 {
            let (step, next) = config.update(&g, t, state);
            state = next;

            let errors = [
                (state.m_hat[1] - g[1]).abs(),
                (state.v_hat[1] - g[1] * g[1]).abs(),
            ];
            assert!(errors[0] <= last_error[0] + 1e-9, "m_hat diverged at t={t}");
            assert!(errors[1] <= last_error[1] + 1e-9, "v_hat diverged at t={t}");
            last_error = errors;

            if t == 5000 {
                assert_relative_eq!(step[0], 1.0, epsilon = 1e-4);
                assert_relative_eq!(step[1], -1.0, epsilon = 1e-4);
            }
        }

        assert_relative_eq!(state.m_hat[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(state.v_hat[0], 0.25, epsilon = 1e-4);
    }

    #[test]
    fn plateau_guard_needs_fine_filter() {
        let optimizer = StepOptimizer::new(AdamConfig::default(), 0.1);
        let raw = array![0.01, 0.01];
        let state = StepState {
            adam: AdamState::zeros(2),
            previous_raw: raw.clone(),
        };

        let (coarse, _) = optimizer.compute_step(&raw, 1, false, state.clone());
        assert_eq!(coarse.kind, StepKind::Adam);
        assert!(coarse.diagnostics.is_some());

        let (fine, next) = optimizer.compute_step(&raw, 1, true, state.clone());
        assert_eq!(fine.kind, StepKind::Raw);
        assert_eq!(fine.values, raw);
        assert!(fine.diagnostics.is_none());
        assert_eq!(next.adam, state.adam);
    }

    #[test]
    fn plateau_guard_compares_against_previous_raw_step() {
        let optimizer = StepOptimizer::new(AdamConfig::default(), 0.1);
        let state = StepState {
            adam: AdamState::zeros(2),
            previous_raw: array![1.0, 1.0],
        };

        let (step, next) = optimizer.compute_step(&array![2.0, 2.0], 3, true, state);

        assert_eq!(step.kind, StepKind::Adam);
        assert_eq!(step.diagnostics.map(|d| d.t), Some(3));
        assert_eq!(next.previous_raw, array![2.0, 2.0]);
    }
}
