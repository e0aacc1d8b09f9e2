//! The adjoint topology optimizer.
//!
//! A design is a vector of unconstrained primal values, one per grid cell.
//! The optimizer maps it to conductivity, smooths it, asks a
//! [`FieldOracle`] for the adjoint sensitivity, and walks the primal downhill
//! until the steps oscillate or become small.
//!
//! # Modules
//!
//! - [`mapping`]: primal to conductivity, and its derivative
//! - [`filter`]: Gaussian density filter and the continuation schedule
//! - [`adjoint`]: gradient assembly by time reversal
//! - [`adam`]: Adam with a plateau guard
//! - [`convergence`]: oscillation and small-step detection
//! - [`descent`]: the driver tying it together
//!
//! [`FieldOracle`]: pixant_core::FieldOracle

pub mod adam;
pub mod adjoint;
pub mod convergence;
pub mod descent;
pub mod filter;
pub mod mapping;
