//! Scalar summaries of per-pixel fields.

use ndarray::{Array1, ArrayBase, Data, Ix1};

/// Root-mean-square of a field. Returns `0.0` for an empty field.
#[must_use]
pub fn rms<S: Data<Elem = f64>>(field: &ArrayBase<S, Ix1>) -> f64 {
    if field.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = field.len() as f64;
    (field.dot(field) / n).sqrt()
}

/// Root-mean-square of the difference between two fields.
#[must_use]
pub fn rms_diff(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    rms(&(a - b))
}

/// Sum of absolute values.
#[must_use]
pub fn abs_sum<S: Data<Elem = f64>>(field: &ArrayBase<S, Ix1>) -> f64 {
    field.iter().map(|v| v.abs()).sum()
}
