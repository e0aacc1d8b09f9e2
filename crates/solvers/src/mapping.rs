//! Mapping from unconstrained primal values to physical conductivity.

use ndarray::Array1;
use uom::si::{electrical_conductivity::siemens_per_meter, f64::ElectricalConductivity};

/// Bound applied to primal values before mapping.
///
/// `e^21 ≈ 1.3e9`, so the sigmoid stays well inside `f64` range.
pub const PRIMAL_BOUND: f64 = 21.0;

/// Conductivity of annealed copper, in S/m.
pub const COPPER_CONDUCTIVITY: f64 = 5.8e7;

/// The shape of the primal-to-conductivity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mapping {
    /// `sigma_max * sigmoid(p)`.
    #[default]
    Sigmoid,

    /// `sigma_max * clip(p, 0, 1)`, for ablation and testing.
    Linear,
}

/// A monotonic, differentiable map from primal values to conductivity.
///
/// The map is applied element-wise and does not clip its input. Callers must
/// clip primal values with [`clip_primal`] first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConductivityMap {
    mapping: Mapping,
    sigma_max: f64,
}

impl Default for ConductivityMap {
    fn default() -> Self {
        Self {
            mapping: Mapping::Sigmoid,
            sigma_max: COPPER_CONDUCTIVITY,
        }
    }
}

impl ConductivityMap {
    /// Creates a map scaled to the given maximum conductivity.
    #[must_use]
    pub fn new(mapping: Mapping, sigma_max: ElectricalConductivity) -> Self {
        Self {
            mapping,
            sigma_max: sigma_max.get::<siemens_per_meter>(),
        }
    }

    /// Creates a map scaled to copper.
    #[must_use]
    pub fn copper(mapping: Mapping) -> Self {
        Self {
            mapping,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn mapping(&self) -> Mapping {
        self.mapping
    }

    /// Returns the maximum conductivity in S/m.
    #[must_use]
    pub fn sigma_max(&self) -> f64 {
        self.sigma_max
    }

    /// Maps primal values to conductivity.
    #[must_use]
    pub fn map(&self, primal: &Array1<f64>) -> Array1<f64> {
        match self.mapping {
            Mapping::Sigmoid => primal.mapv(|p| self.sigma_max * sigmoid(p)),
            Mapping::Linear => primal.mapv(|p| self.sigma_max * p.clamp(0.0, 1.0)),
        }
    }

    /// Returns `d conductivity / d primal` for each value.
    #[must_use]
    pub fn derivative(&self, primal: &Array1<f64>) -> Array1<f64> {
        match self.mapping {
            Mapping::Sigmoid => primal.mapv(|p| {
                let s = sigmoid(p);
                self.sigma_max * s * (1.0 - s)
            }),
            Mapping::Linear => Array1::from_elem(primal.len(), self.sigma_max),
        }
    }

    /// Lifts a binary `[0, 1]` pixel pattern into primal space.
    ///
    /// For the sigmoid map, `0` and `1` become `-21` and `21` so the initial
    /// design starts saturated. The linear map uses the pattern as is.
    #[must_use]
    pub fn primal_from_pattern(&self, pattern: &Array1<f64>) -> Array1<f64> {
        match self.mapping {
            Mapping::Sigmoid => pattern.mapv(|x| 2.0 * PRIMAL_BOUND * (x - 0.5)),
            Mapping::Linear => pattern.clone(),
        }
    }
}

/// Clips primal values to `[-PRIMAL_BOUND, PRIMAL_BOUND]`.
#[must_use]
pub fn clip_primal(primal: &Array1<f64>) -> Array1<f64> {
    primal.mapv(|p| p.clamp(-PRIMAL_BOUND, PRIMAL_BOUND))
}

fn sigmoid(p: f64) -> f64 {
    1.0 / (1.0 + (-p).exp())
}
