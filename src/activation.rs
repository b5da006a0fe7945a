use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Activation applied after a layer's linear step.
///
/// Every hidden layer uses `Relu` and the output layer uses `Softmax`; no other assignment can be
/// built (see [`Topology`](crate::Topology)).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[display("relu")]
    Relu,
    #[display("softmax")]
    Softmax,
}

pub mod activation_functions {
    use faer::prelude::*;

    pub fn relu(x: f64) -> f64 {
        if x > 0.0 { x } else { 0.0 }
    }

    /// 1 where `x > 0`, else 0 (including at exactly 0).
    pub fn relu_deriv(x: f64) -> f64 {
        if x > 0.0 { 1.0 } else { 0.0 }
    }

    pub fn relu_matrix(z: MatRef<f64>) -> Mat<f64> {
        Mat::from_fn(z.nrows(), z.ncols(), |i, j| relu(z[(i, j)]))
    }

    /// Subtracts each column's maximum from that column, so the largest logit becomes 0.
    pub fn shift_by_column_max(mut z: MatMut<f64>) {
        for j in 0..z.ncols() {
            let max = (0..z.nrows())
                .map(|i| z[(i, j)])
                .fold(f64::NEG_INFINITY, f64::max);
            for i in 0..z.nrows() {
                z[(i, j)] -= max;
            }
        }
    }

    /// Column-wise softmax of a matrix already passed through [`shift_by_column_max`].
    pub fn softmax_shifted(z: MatRef<f64>) -> Mat<f64> {
        let mut a = Mat::from_fn(z.nrows(), z.ncols(), |i, j| f64::exp(z[(i, j)]));
        for j in 0..a.ncols() {
            let sum: f64 = (0..a.nrows()).map(|i| a[(i, j)]).sum();
            for i in 0..a.nrows() {
                a[(i, j)] /= sum;
            }
        }
        a
    }

    /// Column-wise softmax. Columns are max-shifted first so large logits cannot overflow `exp`.
    pub fn softmax(z: MatRef<f64>) -> Mat<f64> {
        let mut shifted = z.to_owned();
        shift_by_column_max(shifted.as_mut());
        softmax_shifted(shifted.as_ref())
    }
}
