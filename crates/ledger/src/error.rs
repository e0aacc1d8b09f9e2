use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that can occur while writing or reading a ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{path}: iteration {index} has {actual} values but the grid has {expected} cells")]
    Length {
        path: PathBuf,
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{path}: iteration {index} has no {key}")]
    MissingKey {
        path: PathBuf,
        index: usize,
        key: &'static str,
    },
}

impl LedgerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
