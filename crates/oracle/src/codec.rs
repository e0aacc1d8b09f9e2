//! Text formats exchanged with the field simulator.
//!
//! Field and power exports start with two title lines, followed by records
//! grouped under `Sample k` header lines. Each record is
//! `x y z Fx Fy Fz`. Times are in nanoseconds.

use std::fmt::{self, Write as _};

use ndarray::{Array1, Array2};
use pixant_core::{FieldSeries, GridSpec, PowerSeries, SeriesError, ShapeError, Waveform};
use thiserror::Error;

/// Header the simulator expects at the top of an imported signal file.
pub const WAVEFORM_HEADER: &str =
    "#\n#'Time / ns'\t'default [Real Part]'\n#---------------------------------\n";

/// Conductivity below which a cell is modeled as a normal (non-metal)
/// material, in S/m.
pub const NORMAL_THRESHOLD: f64 = 9000.0;

const TITLE_LINES: usize = 2;
const SAMPLE_MARKER: &str = "Sample";

/// Errors that can occur when decoding simulator exports.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("export is missing its title lines")]
    MissingTitle,

    #[error("line {line}: {message}")]
    Record { line: usize, message: String },

    #[error("sample {sample} has {actual} records but sample 0 has {expected}")]
    Ragged {
        sample: usize,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

impl DecodeError {
    fn record(line: usize, message: impl Into<String>) -> Self {
        Self::Record {
            line,
            message: message.into(),
        }
    }
}

/// Lines after the title block, numbered from 1 as in the file.
fn body(text: &str) -> Result<impl Iterator<Item = (usize, &str)>, DecodeError> {
    if text.lines().count() < TITLE_LINES {
        return Err(DecodeError::MissingTitle);
    }
    Ok(text
        .lines()
        .enumerate()
        .skip(TITLE_LINES)
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty()))
}

/// Parses a finite number.
///
/// `nan` and `inf` parse as `f64` but are never valid simulator output.
fn number(line: usize, token: &str) -> Result<f64, DecodeError> {
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(DecodeError::record(line, format!("non-finite number `{token}`"))),
        Err(_) => Err(DecodeError::record(line, format!("invalid number `{token}`"))),
    }
}

/// Parses an `x y z Fx Fy Fz` record into its vector components.
fn components(line: usize, record: &str) -> Result<[f64; 3], DecodeError> {
    let values = record
        .split_whitespace()
        .map(|token| number(line, token))
        .collect::<Result<Vec<_>, _>>()?;

    match values.as_slice() {
        [_, _, _, fx, fy, fz, ..] => Ok([*fx, *fy, *fz]),
        _ => Err(DecodeError::record(
            line,
            format!("expected 6 columns, found {}", values.len()),
        )),
    }
}

/// The field magnitude carrying the sign of its x component.
///
/// A zero x component yields zero.
fn signed_magnitude([ex, ey, ez]: [f64; 3]) -> f64 {
    let magnitude = (ex * ex + ey * ey + ez * ez).sqrt();
    if ex > 0.0 {
        magnitude
    } else if ex < 0.0 {
        -magnitude
    } else {
        0.0
    }
}

/// Decodes a field export into a `[time, cell]` series.
///
/// Each `Sample` block is one time sample with one record per cell, and the
/// last block runs to the end of the file. Every block must have the same
/// number of records.
///
/// # Errors
///
/// Returns an error if the title block is missing, if a record is malformed
/// or precedes the first `Sample` header, if blocks differ in length, or if
/// the export has no samples.
pub fn decode_field(text: &str, time_step: f64) -> Result<FieldSeries, DecodeError> {
    let mut blocks: Vec<Vec<f64>> = Vec::new();

    for (line, record) in body(text)? {
        if record.starts_with(SAMPLE_MARKER) {
            blocks.push(Vec::new());
            continue;
        }
        let Some(block) = blocks.last_mut() else {
            return Err(DecodeError::record(line, "record before the first Sample header"));
        };
        block.push(signed_magnitude(components(line, record)?));
    }

    let cells = blocks.first().map_or(0, Vec::len);
    if let Some((sample, block)) = blocks
        .iter()
        .enumerate()
        .find(|(_, block)| block.len() != cells)
    {
        return Err(DecodeError::Ragged {
            sample,
            expected: cells,
            actual: block.len(),
        });
    }

    let samples = blocks.len();
    let mut values = Array2::zeros((samples, cells));
    for (mut row, block) in values.rows_mut().into_iter().zip(blocks) {
        row.assign(&Array1::from_vec(block));
    }
    Ok(FieldSeries::new(time_step, values)?)
}

/// Decodes a power export into one `Px` value per time sample.
///
/// `Sample` header lines are skipped; every record is the next sample.
///
/// # Errors
///
/// Returns an error if the title block is missing, if a record is malformed,
/// or if the export has no records.
pub fn decode_power(text: &str, time_step: f64) -> Result<PowerSeries, DecodeError> {
    let mut values = Vec::new();
    for (line, record) in body(text)? {
        if record.starts_with(SAMPLE_MARKER) {
            continue;
        }
        let [px, _, _] = components(line, record)?;
        values.push(px);
    }
    Ok(PowerSeries::new(time_step, Array1::from_vec(values))?)
}

/// Encodes a waveform as an importable signal file.
#[must_use]
pub fn encode_waveform(waveform: &Waveform) -> String {
    let mut out = String::from(WAVEFORM_HEADER);
    for (t, v) in waveform.iter() {
        let _ = writeln!(out, "{t} {v}");
    }
    out
}

/// Decodes a signal file written by [`encode_waveform`].
///
/// Lines starting with `#` are comments.
///
/// # Errors
///
/// Returns an error if a line is not a `time value` pair or if the resulting
/// waveform is invalid.
pub fn decode_waveform(text: &str) -> Result<Waveform, DecodeError> {
    let mut time = Vec::new();
    let mut value = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(t), Some(v), None) => {
                time.push(number(i + 1, t)?);
                value.push(number(i + 1, v)?);
            }
            _ => return Err(DecodeError::record(i + 1, "expected `time value`")),
        }
    }

    Ok(Waveform::new(
        Array1::from_vec(time),
        Array1::from_vec(value),
    )?)
}

/// How the simulator models a cell's material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    Normal,
    LossyMetal,
}

impl MaterialKind {
    /// Classifies a conductivity in S/m.
    #[must_use]
    pub fn for_conductivity(sigma: f64) -> Self {
        if sigma < NORMAL_THRESHOLD {
            Self::Normal
        } else {
            Self::LossyMetal
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("Normal"),
            Self::LossyMetal => f.write_str("Lossy metal"),
        }
    }
}

/// Encodes a conductivity field as one line per cell:
/// `index x_min x_max y_min y_max sigma "kind"`, with bounds in millimeters.
///
/// # Errors
///
/// Returns an error if `conductivity` does not have one value per cell.
pub fn encode_conductivity(
    grid: &GridSpec,
    conductivity: &Array1<f64>,
) -> Result<String, ShapeError> {
    grid.check("conductivity", conductivity.len())?;

    let mut out = String::from("# index x_min x_max y_min y_max sigma material\n");
    for (index, &sigma) in conductivity.iter().enumerate() {
        let b = grid.cell_bounds(index);
        let kind = MaterialKind::for_conductivity(sigma);
        let _ = writeln!(
            out,
            "{index} {} {} {} {} {sigma} \"{kind}\"",
            b.x_min, b.x_max, b.y_min, b.y_max
        );
    }
    Ok(out)
}
