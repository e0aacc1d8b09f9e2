use thiserror::Error;
use uom::si::{f64::Length, length::millimeter};

/// Relative tolerance used when checking that the pitch divides an extent.
const PITCH_TOLERANCE: f64 = 1e-9;

/// The discretized design domain.
///
/// A `GridSpec` describes a rectangular domain of `length × width` split into
/// square pixels of side `pitch`. The pixel counts are
/// `nx = floor(length / pitch)` and `ny = floor(width / pitch)`.
///
/// Every per-pixel field in the workspace is a flattened sequence of
/// `nx * ny` values with `x` advancing fastest: the pixel in column `xi`
/// and row `yi` lives at index `yi * nx + xi`.
///
/// # Examples
///
/// ```
/// use pixant_core::GridSpec;
///
/// let grid = GridSpec::from_millimeters(42.0, 42.0, 6.0).unwrap();
/// assert_eq!(grid.nx(), 7);
/// assert_eq!(grid.ny(), 7);
/// assert_eq!(grid.len(), 49);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    length: Length,
    width: Length,
    pitch: Length,
    nx: usize,
    ny: usize,
}

/// Errors that can occur when validating a grid.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum GridError {
    #[error("grid length, width and pitch must be finite and positive")]
    NonPositive,

    #[error("pitch does not divide the domain {axis} evenly ({pitches} pitches)")]
    UnevenPitch { axis: &'static str, pitches: f64 },

    #[error("grid has no cells")]
    Empty,
}

/// A per-pixel field whose length does not match the grid.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{what} has {actual} values but the grid has {expected} cells")]
pub struct ShapeError {
    pub what: &'static str,
    pub expected: usize,
    pub actual: usize,
}

/// The physical extent of one pixel, in millimeters, centered on the domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl GridSpec {
    /// Creates a validated grid.
    ///
    /// # Errors
    ///
    /// Returns an error if any extent is non-positive or non-finite, if the
    /// pitch does not divide the length or width evenly, or if the grid
    /// would have no cells.
    pub fn new(length: Length, width: Length, pitch: Length) -> Result<Self, GridError> {
        let (l, w, p) = (
            length.get::<millimeter>(),
            width.get::<millimeter>(),
            pitch.get::<millimeter>(),
        );
        if [l, w, p].iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(GridError::NonPositive);
        }

        let nx = pixel_count("length", l / p)?;
        let ny = pixel_count("width", w / p)?;
        if nx * ny == 0 {
            return Err(GridError::Empty);
        }

        Ok(Self {
            length,
            width,
            pitch,
            nx,
            ny,
        })
    }

    /// Creates a validated grid from extents given in millimeters.
    ///
    /// # Errors
    ///
    /// See [`GridSpec::new`].
    pub fn from_millimeters(length: f64, width: f64, pitch: f64) -> Result<Self, GridError> {
        Self::new(
            Length::new::<millimeter>(length),
            Length::new::<millimeter>(width),
            Length::new::<millimeter>(pitch),
        )
    }

    /// Returns the number of pixels along the length.
    #[must_use]
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Returns the number of pixels along the width.
    #[must_use]
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Returns the total number of pixels, `nx * ny`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    /// Always `false`; a validated grid has at least one cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns the `(nx, ny)` pixel counts.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    #[must_use]
    pub fn length(&self) -> Length {
        self.length
    }

    #[must_use]
    pub fn width(&self) -> Length {
        self.width
    }

    #[must_use]
    pub fn pitch(&self) -> Length {
        self.pitch
    }

    /// Checks that a flattened field has one value per cell.
    ///
    /// # Errors
    ///
    /// Returns a [`ShapeError`] naming `what` if the lengths differ.
    pub fn check(&self, what: &'static str, actual: usize) -> Result<(), ShapeError> {
        if actual == self.len() {
            Ok(())
        } else {
            Err(ShapeError {
                what,
                expected: self.len(),
                actual,
            })
        }
    }

    /// Returns the physical bounds of the cell at a flat index.
    ///
    /// Cells are laid out with `x` advancing fastest and the domain centered
    /// on the origin, matching the brick layout used by the field solver.
    #[must_use]
    pub fn cell_bounds(&self, index: usize) -> CellBounds {
        let pitch = self.pitch.get::<millimeter>();
        let x0 = self.length.get::<millimeter>() / 2.0;
        let y0 = self.width.get::<millimeter>() / 2.0;

        #[allow(clippy::cast_precision_loss)]
        let (xi, yi) = ((index % self.nx) as f64, (index / self.nx) as f64);
        let x_min = xi * pitch - x0;
        let y_min = yi * pitch - y0;

        CellBounds {
            x_min,
            x_max: x_min + pitch,
            y_min,
            y_max: y_min + pitch,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pixel_count(axis: &'static str, pitches: f64) -> Result<usize, GridError> {
    let rounded = pitches.round();
    if (pitches - rounded).abs() > PITCH_TOLERANCE * pitches.max(1.0) {
        return Err(GridError::UnevenPitch { axis, pitches });
    }
    Ok(rounded as usize)
}
