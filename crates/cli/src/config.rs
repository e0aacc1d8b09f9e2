//! The TOML run file.
//!
//! ```toml
//! [grid]
//! length_mm = 42.0
//! width_mm = 42.0
//! pitch_mm = 6.0
//!
//! [optimizer]
//! max_iters = 200
//! learning_rate = 0.5
//!
//! [[excitation.bands]]
//! frequency_ghz = 2.4
//! bandwidth_ratio = 0.1
//!
//! [oracle]
//! command = "./simulate.sh"
//! exchange_dir = "exchange"
//!
//! [ledger]
//! dir = "history"
//!
//! [pattern]
//! shape = "circle"
//! ```
//!
//! Relative paths are resolved against the run file's directory.

use std::{
    fs,
    path::{Path, PathBuf},
};

use pixant_core::GridSpec;
use pixant_oracle::{
    Sampling,
    excitation::{self, Band, Excitation},
};
use pixant_solvers::{
    adam::AdamConfig,
    convergence::ConvergenceConfig,
    descent::Config,
    mapping::{COPPER_CONDUCTIVITY, ConductivityMap, Mapping},
};
use serde::Deserialize;
use uom::si::{electrical_conductivity::siemens_per_meter, f64::ElectricalConductivity};

use crate::{CliError, pattern::PatternConfig};

/// A complete run description.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub grid: GridSection,

    #[serde(default)]
    pub optimizer: OptimizerSection,

    pub excitation: Option<ExcitationSection>,

    pub oracle: OracleSection,

    pub ledger: LedgerSection,

    #[serde(default)]
    pub pattern: PatternConfig,
}

/// Design domain extents, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSection {
    pub length_mm: f64,
    pub width_mm: f64,
    pub pitch_mm: f64,
}

/// Optimizer settings. Every field is optional.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerSection {
    pub max_iters: usize,
    pub learning_rate: f64,

    /// Filter radius decay per iteration.
    pub decay: f64,

    /// Use the linear conductivity map instead of the sigmoid.
    pub linear: bool,

    /// Conductivity of fully metal cells, in S/m.
    pub sigma_max: f64,

    pub plateau_tolerance: f64,
    pub step_tolerance: f64,
    pub max_oscillations: usize,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,

    /// Simulate the final design once more after the loop.
    pub final_evaluation: bool,

    /// Stop the run if a step's RMS exceeds this value.
    pub divergence_limit: Option<f64>,
}

impl Default for OptimizerSection {
    fn default() -> Self {
        let config = Config::default();
        let adam = AdamConfig::default();
        let convergence = ConvergenceConfig::default();
        Self {
            max_iters: config.max_iters(),
            learning_rate: config.learning_rate(),
            decay: config.decay(),
            linear: false,
            sigma_max: COPPER_CONDUCTIVITY,
            plateau_tolerance: config.plateau_tolerance(),
            step_tolerance: convergence.step_tolerance(),
            max_oscillations: convergence.max_oscillations(),
            beta1: adam.beta1(),
            beta2: adam.beta2(),
            epsilon: adam.epsilon(),
            final_evaluation: config.final_evaluation(),
            divergence_limit: None,
        }
    }
}

/// Plane wave excitation for forward runs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcitationSection {
    pub bands: Vec<BandSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BandSection {
    #[serde(default = "unit_amplitude")]
    pub amplitude: f64,
    pub frequency_ghz: f64,
    pub bandwidth_ratio: f64,
}

fn unit_amplitude() -> f64 {
    1.0
}

/// The external simulator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OracleSection {
    pub command: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,

    pub exchange_dir: PathBuf,

    /// Sampling step of the simulator's exports in nanoseconds.
    pub time_step_ns: Option<f64>,

    /// Time of the simulator's last export sample in nanoseconds.
    pub time_end_ns: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerSection {
    pub dir: PathBuf,
}

impl RunConfig {
    /// Reads a run file, resolving relative paths against its directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid run file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CliError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| CliError::io(path, e))?;
        let mut config: Self = toml::from_str(&text).map_err(|source| CliError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.oracle.exchange_dir);
        resolve(&mut self.ledger.dir);
        if let PatternConfig::File { path } = &mut self.pattern {
            resolve(path);
        }
        // Bare program names are looked up on PATH.
        if self.oracle.command.components().count() > 1 {
            resolve(&mut self.oracle.command);
        }
    }

    /// Builds the validated grid.
    ///
    /// # Errors
    ///
    /// Returns an error if the extents do not form a valid grid.
    pub fn grid(&self) -> Result<GridSpec, CliError> {
        let GridSection {
            length_mm,
            width_mm,
            pitch_mm,
        } = self.grid;
        Ok(GridSpec::from_millimeters(length_mm, width_mm, pitch_mm)?)
    }

    /// Synthesizes the excitation, if one is defined.
    ///
    /// # Errors
    ///
    /// Returns an error if the bands cannot be synthesized.
    pub fn excitation(&self) -> Result<Option<Excitation>, CliError> {
        let Some(section) = &self.excitation else {
            return Ok(None);
        };
        let bands: Vec<Band> = section
            .bands
            .iter()
            .map(|b| Band::gigahertz(b.amplitude, b.frequency_ghz, b.bandwidth_ratio))
            .collect();
        Ok(Some(excitation::synthesize(&bands)?))
    }

    /// Returns the export time axis.
    ///
    /// A defined excitation sets both the step and the end time, overriding
    /// `time_step_ns` and `time_end_ns`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no excitation and the oracle section
    /// lacks either setting, or if the resulting axis is invalid.
    pub fn sampling(&self, excitation: Option<&Excitation>) -> Result<Sampling, CliError> {
        if let Some(excitation) = excitation {
            return Ok(excitation.sampling()?);
        }
        match (self.oracle.time_step_ns, self.oracle.time_end_ns) {
            (Some(time_step), Some(time_end)) => Ok(Sampling::new(time_step, time_end)?),
            _ => Err(CliError::MissingSampling),
        }
    }

    /// Builds the validated optimizer configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any optimizer setting is invalid.
    pub fn descent_config(&self, excitation: Option<&Excitation>) -> Result<Config, CliError> {
        let o = &self.optimizer;

        let mapping = if o.linear {
            Mapping::Linear
        } else {
            Mapping::Sigmoid
        };
        let map = ConductivityMap::new(
            mapping,
            ElectricalConductivity::new::<siemens_per_meter>(o.sigma_max),
        );

        let mut config = Config::new(o.max_iters, o.learning_rate, o.decay, o.plateau_tolerance)?
            .with_map(map)
            .with_adam(AdamConfig::new(o.beta1, o.beta2, o.epsilon)?)
            .with_convergence(ConvergenceConfig::new(o.step_tolerance, o.max_oscillations)?)
            .with_final_evaluation(o.final_evaluation);
        if let Some(excitation) = excitation {
            config = config.with_excitation(excitation.waveform.clone());
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    const MINIMAL: &str = r#"
[grid]
length_mm = 42.0
width_mm = 42.0
pitch_mm = 6.0

[oracle]
command = "simulate"
exchange_dir = "exchange"
time_step_ns = 0.1
time_end_ns = 3.5

[ledger]
dir = "history"
"#;

    #[test]
    fn minimal_file_takes_defaults() {
        let config: RunConfig = toml::from_str(MINIMAL).unwrap();

        assert_eq!(config.optimizer, OptimizerSection::default());
        assert_eq!(config.pattern, PatternConfig::Full);
        assert!(config.excitation.is_none());
        assert_eq!(config.grid().unwrap().len(), 49);

        let descent = config.descent_config(None).unwrap();
        assert_eq!(descent.max_iters(), 200);
        assert_relative_eq!(descent.learning_rate(), 0.5);
        assert_relative_eq!(descent.decay(), 0.9);
        assert_eq!(descent.map().mapping(), Mapping::Sigmoid);
        assert_eq!(config.sampling(None).unwrap(), Sampling::new(0.1, 3.5).unwrap());
    }

    #[test]
    fn full_file() {
        let text = r#"
[grid]
length_mm = 42.0
width_mm = 30.0
pitch_mm = 6.0

[optimizer]
max_iters = 50
learning_rate = 0.25
linear = true
step_tolerance = 0.05
max_oscillations = 3
divergence_limit = 1e3

[[excitation.bands]]
frequency_ghz = 1.5
bandwidth_ratio = 0.18

[[excitation.bands]]
amplitude = 0.5
frequency_ghz = 2.4
bandwidth_ratio = 0.1

[oracle]
command = "./bin/simulate.sh"
args = ["--quiet"]
exchange_dir = "exchange"

[ledger]
dir = "/var/pixant/history"

[pattern]
shape = "circle"
radius = 2.0
"#;
        let mut config: RunConfig = toml::from_str(text).unwrap();
        config.resolve_paths(Path::new("/runs/a"));

        assert_eq!(config.oracle.command, PathBuf::from("/runs/a/./bin/simulate.sh"));
        assert_eq!(config.oracle.exchange_dir, PathBuf::from("/runs/a/exchange"));
        assert_eq!(config.ledger.dir, PathBuf::from("/var/pixant/history"));
        assert_eq!(config.pattern, PatternConfig::Circle { radius: Some(2.0) });

        let excitation = config.excitation().unwrap().unwrap();
        assert_relative_eq!(excitation.time_step, 0.1);
        let sampling = config.sampling(Some(&excitation)).unwrap();
        assert_relative_eq!(sampling.time_step(), 0.1);
        assert_relative_eq!(sampling.time_end(), excitation.duration);
        assert_eq!(sampling.samples(), excitation.waveform.len());

        let descent = config.descent_config(Some(&excitation)).unwrap();
        assert_eq!(descent.max_iters(), 50);
        assert_eq!(descent.map().mapping(), Mapping::Linear);
        assert_eq!(descent.convergence().max_oscillations(), 3);
        assert!(descent.excitation().is_some());
        assert_eq!(config.optimizer.divergence_limit, Some(1e3));
    }

    #[test]
    fn bare_command_stays_on_path() {
        let mut config: RunConfig = toml::from_str(MINIMAL).unwrap();
        config.resolve_paths(Path::new("/runs/a"));

        assert_eq!(config.oracle.command, PathBuf::from("simulate"));
    }

    #[test]
    fn invalid_settings_are_reported() {
        let mut config: RunConfig = toml::from_str(MINIMAL).unwrap();
        config.optimizer.learning_rate = 0.0;
        assert!(matches!(config.descent_config(None), Err(CliError::Config(_))));

        let mut config: RunConfig = toml::from_str(MINIMAL).unwrap();
        config.optimizer.max_oscillations = 0;
        assert!(matches!(
            config.descent_config(None),
            Err(CliError::Convergence(_))
        ));

        let mut config: RunConfig = toml::from_str(MINIMAL).unwrap();
        config.grid.pitch_mm = 5.0;
        assert!(matches!(config.grid(), Err(CliError::Grid(_))));

        let mut config: RunConfig = toml::from_str(MINIMAL).unwrap();
        config.oracle.time_step_ns = None;
        assert!(matches!(config.sampling(None), Err(CliError::MissingSampling)));

        let mut config: RunConfig = toml::from_str(MINIMAL).unwrap();
        config.oracle.time_end_ns = None;
        assert!(matches!(config.sampling(None), Err(CliError::MissingSampling)));

        let mut config: RunConfig = toml::from_str(MINIMAL).unwrap();
        config.oracle.time_end_ns = Some(0.05);
        assert!(matches!(config.sampling(None), Err(CliError::Sampling(_))));
    }

    #[test]
    fn excitation_overrides_oracle_time_axis() {
        let bands = "[[excitation.bands]]\nfrequency_ghz = 2.4\nbandwidth_ratio = 0.1\n";
        let text = format!("{MINIMAL}\n{bands}");
        let config: RunConfig = toml::from_str(&text).unwrap();
        let excitation = config.excitation().unwrap();

        let sampling = config.sampling(excitation.as_ref()).unwrap();

        assert_eq!(sampling, Sampling::new(0.1, 5.0).unwrap());
        assert_eq!(sampling.samples(), 51);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let text = format!("{MINIMAL}\n[extra]\nkey = 1\n");
        assert!(toml::from_str::<RunConfig>(&text).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = RunConfig::load("/nonexistent/run.toml").unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }
}
