use pixant_core::Waveform;
use thiserror::Error;

use crate::{adam::AdamConfig, convergence::ConvergenceConfig, mapping::ConductivityMap};

/// Configuration for the descent driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    max_iters: usize,
    learning_rate: f64,
    decay: f64,
    plateau_tolerance: f64,
    map: ConductivityMap,
    adam: AdamConfig,
    convergence: ConvergenceConfig,
    excitation: Option<Waveform>,
    final_evaluation: bool,
}

/// Errors that can occur when validating a descent config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("learning_rate must be finite and positive")]
    LearningRate,

    #[error("decay must be in (0, 1]")]
    Decay,

    #[error("plateau_tolerance must be finite and non-negative")]
    PlateauTolerance,
}

impl Default for Config {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        Self::new(200, 0.5, 0.9, 0.1).unwrap()
    }
}

impl Config {
    /// Creates a new config with the default map, Adam, and convergence
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the learning rate is not finite and positive, if
    /// `decay` is outside `(0, 1]`, or if the plateau tolerance is negative
    /// or non-finite.
    pub fn new(
        max_iters: usize,
        learning_rate: f64,
        decay: f64,
        plateau_tolerance: f64,
    ) -> Result<Self, ConfigError> {
        if !learning_rate.is_finite() || learning_rate <= 0.0 {
            return Err(ConfigError::LearningRate);
        }
        if !(decay > 0.0 && decay <= 1.0) {
            return Err(ConfigError::Decay);
        }
        if !plateau_tolerance.is_finite() || plateau_tolerance < 0.0 {
            return Err(ConfigError::PlateauTolerance);
        }

        Ok(Self {
            max_iters,
            learning_rate,
            decay,
            plateau_tolerance,
            map: ConductivityMap::default(),
            adam: AdamConfig::default(),
            convergence: ConvergenceConfig::default(),
            excitation: None,
            final_evaluation: true,
        })
    }

    #[must_use]
    pub fn with_map(self, map: ConductivityMap) -> Self {
        Self { map, ..self }
    }

    #[must_use]
    pub fn with_adam(self, adam: AdamConfig) -> Self {
        Self { adam, ..self }
    }

    #[must_use]
    pub fn with_convergence(self, convergence: ConvergenceConfig) -> Self {
        Self {
            convergence,
            ..self
        }
    }

    /// Sets the plane-wave signal for forward runs.
    #[must_use]
    pub fn with_excitation(self, excitation: Waveform) -> Self {
        Self {
            excitation: Some(excitation),
            ..self
        }
    }

    /// Enables or disables the forward run of the final design.
    #[must_use]
    pub fn with_final_evaluation(self, final_evaluation: bool) -> Self {
        Self {
            final_evaluation,
            ..self
        }
    }

    /// Returns the iteration cap, counted by iteration index.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Returns the per-iteration filter radius factor.
    #[must_use]
    pub fn decay(&self) -> f64 {
        self.decay
    }

    #[must_use]
    pub fn plateau_tolerance(&self) -> f64 {
        self.plateau_tolerance
    }

    #[must_use]
    pub fn map(&self) -> &ConductivityMap {
        &self.map
    }

    #[must_use]
    pub fn adam(&self) -> &AdamConfig {
        &self.adam
    }

    #[must_use]
    pub fn convergence(&self) -> &ConvergenceConfig {
        &self.convergence
    }

    /// Returns the plane-wave signal, or `None` for the oracle's default.
    #[must_use]
    pub fn excitation(&self) -> Option<&Waveform> {
        self.excitation.as_ref()
    }

    #[must_use]
    pub fn final_evaluation(&self) -> bool {
        self.final_evaluation
    }
}
