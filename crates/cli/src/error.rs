use std::{io, path::PathBuf};

use pixant_core::GridError;
use pixant_ledger::LedgerError;
use pixant_oracle::{SamplingError, excitation::FrequencyError};
use pixant_solvers::{
    adam::AdamConfigError,
    convergence::ConvergenceConfigError,
    descent::{self, ConfigError},
};
use thiserror::Error;

use crate::pattern::PatternError;

/// Errors that can occur while configuring or running an optimization.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid run file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid grid: {0}")]
    Grid(#[from] GridError),

    #[error("invalid optimizer settings: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid Adam settings: {0}")]
    Adam(#[from] AdamConfigError),

    #[error("invalid convergence settings: {0}")]
    Convergence(#[from] ConvergenceConfigError),

    #[error("invalid excitation: {0}")]
    Excitation(#[from] FrequencyError),

    #[error(
        "no export time axis: set oracle.time_step_ns and oracle.time_end_ns or define an excitation"
    )]
    MissingSampling,

    #[error("invalid export time axis: {0}")]
    Sampling(#[from] SamplingError),

    #[error("run file defines no excitation")]
    MissingExcitation,

    #[error("invalid initial pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("ledger in {dir} has no complete iteration to resume from")]
    NothingToResume { dir: PathBuf },

    #[error("optimization failed: {0}")]
    Solve(#[from] descent::Error),
}

impl CliError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
