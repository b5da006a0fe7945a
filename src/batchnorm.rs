//! Batch normalization as a standalone transform.
//!
//! It is not part of the forward pass: there is no matching backward step, so applying it inside
//! the chain would make the gradients wrong.

use faer::prelude::*;

/// Added to the variance before the square root.
pub const BATCHNORM_EPSILON: f64 = f64::EPSILON;

/// Normalizes each row of `a` (one unit across the batch) to zero mean and unit variance.
pub fn apply_batchnorm(a: MatRef<f64>) -> Mat<f64> {
    let m = a.ncols();
    if m == 0 {
        return a.to_owned();
    }
    let mut normalized = a.to_owned();
    for i in 0..a.nrows() {
        let mu = (0..m).map(|j| a[(i, j)]).sum::<f64>() / m as f64;
        let sigma2 = (0..m).map(|j| (a[(i, j)] - mu).powi(2)).sum::<f64>() / m as f64;
        let denominator = f64::sqrt(sigma2 + BATCHNORM_EPSILON);
        for j in 0..m {
            normalized[(i, j)] = (a[(i, j)] - mu) / denominator;
        }
    }
    normalized
}
