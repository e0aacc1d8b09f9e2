//! Initial binary pixel patterns.
//!
//! A pattern is a flattened `[0, 1]` field over the grid, `1` for metal. The
//! optimizer lifts it into primal space before the first iteration.

use std::{fs, io, path::PathBuf};

use ndarray::Array1;
use pixant_core::{GridSpec, ShapeError};
use serde::Deserialize;
use thiserror::Error;

/// How to build the initial pattern.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum PatternConfig {
    /// Every cell is metal.
    #[default]
    Full,

    /// A filled disc centered on the grid.
    Circle {
        /// Radius in cells; defaults to a third of the shorter side.
        radius: Option<f64>,
    },

    /// Whitespace-separated cell values read from a text file, `x` fastest.
    File { path: PathBuf },
}

/// Errors that can occur when building a pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("value {position} is not a number: `{token}`")]
    Value { position: usize, token: String },

    #[error("value {position} is {value}, outside [0, 1]")]
    OutOfRange { position: usize, value: f64 },

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

impl PatternConfig {
    /// Builds the pattern for `grid`.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern file cannot be read or parsed, or does
    /// not have one value per cell.
    pub fn build(&self, grid: &GridSpec) -> Result<Array1<f64>, PatternError> {
        match self {
            Self::Full => Ok(full(grid)),
            Self::Circle { radius } => {
                let radius = radius.unwrap_or_else(|| default_radius(grid));
                Ok(circle(grid, radius))
            }
            Self::File { path } => {
                let text = fs::read_to_string(path).map_err(|source| PatternError::Io {
                    path: path.clone(),
                    source,
                })?;
                parse(grid, &text)
            }
        }
    }
}

/// A pattern with every cell set to metal.
#[must_use]
pub fn full(grid: &GridSpec) -> Array1<f64> {
    Array1::ones(grid.len())
}

/// A disc of `radius` cells centered at `(nx / 2, ny / 2)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn circle(grid: &GridSpec, radius: f64) -> Array1<f64> {
    let (nx, ny) = grid.shape();
    let (cx, cy) = ((nx / 2) as f64, (ny / 2) as f64);

    Array1::from_shape_fn(grid.len(), |index| {
        let (xi, yi) = ((index % nx) as f64, (index / nx) as f64);
        if (xi - cx).hypot(yi - cy) <= radius {
            1.0
        } else {
            0.0
        }
    })
}

#[allow(clippy::cast_precision_loss)]
fn default_radius(grid: &GridSpec) -> f64 {
    (grid.nx().min(grid.ny()) / 3) as f64
}

/// Parses whitespace-separated cell values.
///
/// # Errors
///
/// Returns an error if a token is not a number in `[0, 1]` or if the count
/// does not match the grid.
pub fn parse(grid: &GridSpec, text: &str) -> Result<Array1<f64>, PatternError> {
    let values = text
        .split_whitespace()
        .enumerate()
        .map(|(position, token)| {
            let value = token.parse::<f64>().map_err(|_| PatternError::Value {
                position,
                token: token.to_string(),
            })?;
            if (0.0..=1.0).contains(&value) {
                Ok(value)
            } else {
                Err(PatternError::OutOfRange { position, value })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    grid.check("pattern", values.len())?;
    Ok(Array1::from_vec(values))
}
