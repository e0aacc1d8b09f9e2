//! Core traits and types for adjoint topology optimization.
//!
//! This crate defines the shared abstractions that the optimizer, the oracle
//! adapters, the ledger, and the observers build on:
//!
//! - [`GridSpec`]: the discretized design domain and its flattening order
//! - [`FieldOracle`]: the external field simulation, reached through forward
//!   (plane wave) and backward (feed) runs
//! - [`FieldSeries`], [`PowerSeries`], [`Waveform`]: time-series data exchanged
//!   with the oracle
//! - [`IterationLedger`] and [`IterationRecord`]: append-only per-iteration
//!   bookkeeping
//! - [`Observer`]: receives solver events and optionally returns control actions

mod grid;
mod ledger;
mod observer;
mod oracle;
mod series;

pub mod metrics;

pub use grid::{CellBounds, GridError, GridSpec, ShapeError};
pub use ledger::{AdamDiagnostics, IterationLedger, IterationRecord, MemoryLedger, ResumePoint};
pub use observer::Observer;
pub use oracle::{FieldOracle, ForwardFields};
pub use series::{FieldSeries, PowerSeries, SeriesError, Waveform};
