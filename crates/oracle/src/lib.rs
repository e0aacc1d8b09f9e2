//! Field oracle adapters.
//!
//! The optimizer talks to the field simulation through the
//! [`FieldOracle`] trait. This crate implements that trait for simulators
//! driven by plain text files and an external command:
//!
//! - [`codec`]: the text formats for field exports, power exports,
//!   waveforms, and conductivity layouts
//! - [`excitation`]: synthesis of multi-band Gaussian sine pulses
//! - [`Sampling`]: the time axis the simulator exports on
//! - [`ExchangeOracle`]: writes inputs, runs the command, decodes outputs
//!
//! [`FieldOracle`]: pixant_core::FieldOracle

pub mod codec;
pub mod excitation;

mod exchange;
mod sampling;

pub use exchange::{Direction, ExchangeError, ExchangeFile, ExchangeOracle};
pub use sampling::{Sampling, SamplingError};
