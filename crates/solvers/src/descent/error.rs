use std::error::Error as StdError;

use pixant_core::ShapeError;

use crate::adjoint::AdjointError;

/// Errors that can occur during a descent run.
///
/// Every variant aborts the run. Records appended before the error remain in
/// the ledger.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid start: {0}")]
    Shape(#[from] ShapeError),

    #[error("gradient assembly failed: {0}")]
    Adjoint(#[from] AdjointError),

    #[error("ledger error: {0}")]
    Ledger(#[source] Box<dyn StdError + Send + Sync>),

    #[error("final evaluation failed: {0}")]
    FinalEvaluation(#[source] AdjointError),
}

impl Error {
    pub(crate) fn ledger<E: StdError + Send + Sync + 'static>(err: E) -> Self {
        Self::Ledger(Box::new(err))
    }
}
