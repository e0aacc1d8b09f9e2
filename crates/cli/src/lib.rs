//! Command-line runner for the pixant optimizer.
//!
//! A run is described by a TOML file ([`RunConfig`]) naming the grid, the
//! optimizer settings, the excitation, the external simulator, the ledger
//! directory, and the initial pattern. [`run`] wires these into a
//! [`ExchangeOracle`] and a [`FileLedger`] and drives the descent.
//!
//! [`ExchangeOracle`]: pixant_oracle::ExchangeOracle
//! [`FileLedger`]: pixant_ledger::FileLedger

pub mod config;
pub mod pattern;

mod error;
mod run;

pub use config::RunConfig;
pub use error::CliError;
pub use run::{Summary, run, write_excitation};
