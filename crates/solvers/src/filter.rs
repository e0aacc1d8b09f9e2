//! Gaussian density filtering and its continuation schedule.
//!
//! The filter smooths a flattened per-pixel field over the 2D grid, laid out
//! row by row with `x` advancing fastest (see [`GridSpec::cell_bounds`]). It
//! is linear and its matrix is symmetric, so the same operator back-propagates
//! gradients through itself.
//!
//! Boundaries are mirrored about the half-sample point
//! (`d c b a | a b c d | d c b a`). With that extension the one-dimensional
//! operator has entries `w(i - j) + w(i + j + 1) + ...`, all symmetric in
//! `i` and `j`, and the separable 2D operator is their Kronecker product.

use ndarray::Array1;
use pixant_core::{GridSpec, ShapeError};
use rayon::prelude::*;

/// Kernel half-width in standard deviations.
const TRUNCATE: f64 = 4.0;

/// A separable Gaussian smoothing operator over a fixed grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityFilter {
    nx: usize,
    ny: usize,
}

impl DensityFilter {
    #[must_use]
    pub fn new(grid: &GridSpec) -> Self {
        let (nx, ny) = grid.shape();
        Self { nx, ny }
    }

    /// Smooths a flattened field with a Gaussian of standard deviation `radius`.
    ///
    /// A `radius` that is not positive leaves the field unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if `field` does not have one value per grid cell.
    pub fn smooth(&self, field: &Array1<f64>, radius: f64) -> Result<Array1<f64>, ShapeError> {
        let cells = self.nx * self.ny;
        if field.len() != cells {
            return Err(ShapeError {
                what: "filtered field",
                expected: cells,
                actual: field.len(),
            });
        }
        if !(radius > 0.0) {
            return Ok(field.clone());
        }

        let kernel = gaussian_kernel(radius);
        let source = field.to_vec();
        let (nx, ny) = (self.nx, self.ny);

        // Along x, within each row (contiguous, length nx).
        let mut rows = vec![0.0; source.len()];
        rows.par_chunks_mut(nx)
            .zip(source.par_chunks(nx))
            .for_each(|(out, line)| {
                for (xi, value) in out.iter_mut().enumerate() {
                    *value = convolve_at(&kernel, xi, nx, |k| line[k]);
                }
            });

        // Along y, across rows (stride nx, length ny).
        let mut smoothed = vec![0.0; source.len()];
        smoothed
            .par_chunks_mut(nx)
            .enumerate()
            .for_each(|(yi, out)| {
                for (xi, value) in out.iter_mut().enumerate() {
                    *value = convolve_at(&kernel, yi, ny, |k| rows[k * nx + xi]);
                }
            });

        Ok(Array1::from_vec(smoothed))
    }
}

/// The continuation (homotopy) schedule for the filter radius.
///
/// The radius starts at `nx / 4` and shrinks by a fixed factor each
/// iteration, so early iterations see a coarse design and later iterations
/// sharpen it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Continuation {
    radius: f64,
    decay: f64,
    coarse: f64,
}

impl Continuation {
    /// Starts the schedule at `nx / 4`.
    #[must_use]
    pub fn new(grid: &GridSpec, decay: f64) -> Self {
        let coarse = initial_radius(grid);
        Self {
            radius: coarse,
            decay,
            coarse,
        }
    }

    /// Resumes the schedule at a given radius.
    #[must_use]
    pub fn resume(grid: &GridSpec, radius: f64, decay: f64) -> Self {
        Self {
            radius,
            decay,
            coarse: initial_radius(grid),
        }
    }

    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Whether the radius has shrunk below its initial `nx / 4` scale.
    #[must_use]
    pub fn is_fine(&self) -> bool {
        self.radius < self.coarse
    }

    /// Returns the schedule advanced by one iteration.
    #[must_use]
    pub fn shrink(self) -> Self {
        Self {
            radius: self.radius * self.decay,
            ..self
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn initial_radius(grid: &GridSpec) -> f64 {
    grid.nx() as f64 / 4.0
}

/// Normalized Gaussian weights over `[-half, half]`, `half = ⌊4σ + 0.5⌋`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let half = (TRUNCATE * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-half..=half)
        .map(|x| (-0.5 * (x * x) as f64 / (sigma * sigma)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Weighted sum around `center` on a line of length `n` with mirrored ends.
#[allow(clippy::cast_possible_wrap)]
fn convolve_at(kernel: &[f64], center: usize, n: usize, sample: impl Fn(usize) -> f64) -> f64 {
    let half = (kernel.len() / 2) as isize;
    kernel
        .iter()
        .enumerate()
        .map(|(k, w)| w * sample(reflect(center as isize + k as isize - half, n)))
        .sum()
}

/// Maps any index onto `0..n` by half-sample mirroring with period `2n`.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn reflect(index: isize, n: usize) -> usize {
    let n = n as isize;
    let m = index.rem_euclid(2 * n);
    if m < n { m as usize } else { (2 * n - 1 - m) as usize }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[allow(clippy::cast_precision_loss)]
    fn grid(nx: usize, ny: usize) -> GridSpec {
        GridSpec::from_millimeters(nx as f64, ny as f64, 1.0).unwrap()
    }

    /// A deterministic, non-trivial test field.
    #[allow(clippy::cast_precision_loss)]
    fn field(len: usize, seed: f64) -> Array1<f64> {
        Array1::from_shape_fn(len, |i| ((i as f64 + seed) * 1.7).sin() + 0.1 * i as f64)
    }

    #[test]
    fn reflect_mirrors_half_sample() {
        let n = 4;
        let mapped: Vec<_> = (-5..10).map(|i| reflect(i, n)).collect();
        assert_eq!(
            mapped,
            vec![3, 3, 2, 1, 0, 0, 1, 2, 3, 3, 2, 1, 0, 0, 1]
        );
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(1.75);
        assert_eq!(kernel.len(), 15);
        assert_relative_eq!(kernel.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        for (a, b) in kernel.iter().zip(kernel.iter().rev()) {
            assert_relative_eq!(a, b);
        }
    }

    #[test]
    fn zero_radius_is_identity() {
        let filter = DensityFilter::new(&grid(7, 5));
        let x = field(35, 0.0);

        assert_eq!(filter.smooth(&x, 0.0).unwrap(), x);
        assert_eq!(filter.smooth(&x, -1.0).unwrap(), x);
    }

    #[test]
    fn tiny_radius_is_nearly_identity() {
        let filter = DensityFilter::new(&grid(6, 6));
        let x = field(36, 2.0);
        let y = filter.smooth(&x, 0.05).unwrap();
        for (a, b) in x.iter().zip(&y) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn preserves_uniform_fields() {
        let filter = DensityFilter::new(&grid(7, 7));
        let x = Array1::from_elem(49, 3.5);
        for value in filter.smooth(&x, 1.75).unwrap() {
            assert_relative_eq!(value, 3.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn smoothing_is_linear() {
        let filter = DensityFilter::new(&grid(7, 5));
        let (x, y) = (field(35, 0.0), field(35, 3.0));
        let (a, b) = (2.5, -0.75);

        let lhs = filter.smooth(&(a * &x + b * &y), 1.3).unwrap();
        let rhs = a * filter.smooth(&x, 1.3).unwrap() + b * filter.smooth(&y, 1.3).unwrap();
        for (l, r) in lhs.iter().zip(&rhs) {
            assert_relative_eq!(l, r, epsilon = 1e-10);
        }
    }

    #[test]
    fn smoothing_is_self_adjoint() {
        // <A x, y> == <x, A y>, including kernels wider than the grid.
        let filter = DensityFilter::new(&grid(7, 4));
        let (x, y) = (field(28, 1.0), field(28, 5.0));

        for radius in [0.6, 1.75, 3.0] {
            let lhs = filter.smooth(&x, radius).unwrap().dot(&y);
            let rhs = x.dot(&filter.smooth(&y, radius).unwrap());
            assert_relative_eq!(lhs, rhs, epsilon = 1e-10);
        }
    }

    #[test]
    fn smoothing_spreads_a_point() {
        let filter = DensityFilter::new(&grid(5, 5));
        let mut x = Array1::zeros(25);
        x[12] = 1.0;

        let y = filter.smooth(&x, 1.0).unwrap();
        assert!(y[12] < 1.0);
        assert!(y[11] > 0.0 && y[13] > 0.0 && y[7] > 0.0 && y[17] > 0.0);
        assert_relative_eq!(y[11], y[13], epsilon = 1e-12);
        assert_relative_eq!(y[7], y[11], epsilon = 1e-12);
        assert_relative_eq!(y.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn field_of_another_size_is_rejected() {
        let filter = DensityFilter::new(&grid(7, 5));

        for radius in [0.0, 1.75] {
            let err = filter.smooth(&Array1::zeros(34), radius).unwrap_err();
            assert_eq!(err.expected, 35);
            assert_eq!(err.actual, 34);
        }
    }

    #[test]
    fn continuation_shrinks_geometrically() {
        let schedule = Continuation::new(&grid(7, 7), 0.9);
        assert_relative_eq!(schedule.radius(), 1.75);
        assert!(!schedule.is_fine());

        let next = schedule.shrink();
        assert_relative_eq!(next.radius(), 1.575);
        assert!(next.is_fine());

        let later = next.shrink().shrink();
        assert_relative_eq!(later.radius(), 1.75 * 0.9_f64.powi(3), epsilon = 1e-12);
    }
}
