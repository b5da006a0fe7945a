use faer::{linalg::matmul::matmul, prelude::*};

use crate::{
    Activation, Result,
    activation_functions::{relu_matrix, shift_by_column_max, softmax_shifted},
    core::{LayerCache, ParamBuffer, ResultBuffer, param_buffer},
    error::{check_finite, check_shape, shape_of},
};

/// `z = W * a_prev + b`, with `b` broadcast across the columns (samples) of `a_prev`.
pub fn linear_forward(
    a_prev: MatRef<f64>,
    w: MatRef<f64>,
    b: ColRef<f64>,
) -> Result<Mat<f64>> {
    let n_k = w.nrows();
    let n_g = w.ncols();
    check_shape("linear_forward", (n_g, a_prev.ncols()), shape_of(a_prev))?;
    check_shape("linear_forward", (n_k, 1), (b.nrows(), 1))?;
    let mut z = Mat::<f64>::zeros(n_k, a_prev.ncols());
    // z = W * a_prev;
    matmul(
        // A = α*L*R + β*A
        z.as_mut(),           // A = z
        faer::Accum::Replace, // β = 0.0
        w,                    // L = W
        a_prev,               // R = a_prev
        1.0,                  // α = 1.0
        Par::Seq,
    );
    // z += b;
    for j in 0..z.ncols() {
        for k in 0..n_k {
            z[(k, j)] += b[k];
        }
    }
    Ok(z)
}

/// Forward pass of a single layer.
///
/// Consumes `a_prev`, which moves into the returned cache.
pub fn layer_forward(
    a_prev: Mat<f64>,
    layer: param_buffer::LayerRef<'_>,
) -> Result<(Mat<f64>, LayerCache<'_>)> {
    let mut z = linear_forward(a_prev.as_ref(), layer.w, layer.b)?;
    let a = match layer.phi {
        Activation::Relu => relu_matrix(z.as_ref()),
        Activation::Softmax => {
            shift_by_column_max(z.as_mut());
            softmax_shifted(z.as_ref())
        }
    };
    check_finite("layer_forward", a.as_ref())?;
    let cache = LayerCache {
        a_prev,
        w: layer.w,
        b: layer.b,
        z,
        phi: layer.phi,
    };
    Ok((a, cache))
}

/// Forward pass through every layer.
///
/// Returns the output layer's activation (class probabilities, one column per sample) and the
/// caches of all layers, first layer first.
pub fn forward<'a>(
    x: MatRef<f64>,
    param_buffer: &'a ParamBuffer,
) -> Result<(Mat<f64>, ResultBuffer<'a>)> {
    let mut caches = ResultBuffer::with_capacity(param_buffer.n_layers());
    let mut a = x.to_owned();
    for layer in param_buffer.layers() {
        let (a_next, cache) = layer_forward(a, layer)?;
        caches.push(cache);
        a = a_next;
    }
    Ok((a, caches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use approx::assert_relative_eq;

    fn tiny_params() -> ParamBuffer {
        // Layer 1: identity-ish 2 -> 2 with bias, layer 2: 2 -> 2.
        let w1 = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
        let b1 = Col::from_fn(2, |k| [0.5, -10.0][k]);
        let w2 = Mat::from_fn(2, 2, |i, j| [[1.0, 0.0], [0.0, 1.0]][i][j]);
        let b2 = Col::zeros(2);
        ParamBuffer::from_layers(vec![(w1, b1), (w2, b2)]).unwrap()
    }

    #[test]
    fn linear_forward_broadcasts_bias() {
        let a_prev = Mat::from_fn(2, 3, |i, j| (i + j) as f64);
        let w = Mat::from_fn(1, 2, |_, j| [2.0, -1.0][j]);
        let b = Col::from_fn(1, |_| 0.25);
        let z = linear_forward(a_prev.as_ref(), w.as_ref(), b.as_ref()).unwrap();
        assert_eq!(shape_of(z.as_ref()), (1, 3));
        for j in 0..3 {
            let expected = 2.0 * (j as f64) - (1 + j) as f64 + 0.25;
            assert_relative_eq!(z[(0, j)], expected);
        }
    }

    #[test]
    fn linear_forward_rejects_wrong_input_rows() {
        let a_prev = Mat::<f64>::zeros(3, 4);
        let w = Mat::<f64>::zeros(2, 2);
        let b = Col::<f64>::zeros(2);
        let err = linear_forward(a_prev.as_ref(), w.as_ref(), b.as_ref()).unwrap_err();
        assert_eq!(
            err,
            Error::ShapeMismatch {
                op: "linear_forward",
                expected: (2, 4),
                got: (3, 4)
            }
        );
    }

    #[test]
    fn caches_hold_inputs_and_pre_activations() {
        let params = tiny_params();
        let x = Mat::from_fn(2, 2, |i, j| [[1.0, -1.0], [2.0, 3.0]][i][j]);
        let (a, caches) = forward(x.as_ref(), &params).unwrap();
        assert_eq!(caches.n_layers(), 2);
        let hidden = caches.layer(1).unwrap();
        assert_eq!(hidden.phi, Activation::Relu);
        assert_eq!(hidden.batch_size(), 2);
        assert_eq!(hidden.a_prev[(1, 1)], 3.0);
        // z = x + b1, second row pushed negative by the bias.
        assert_relative_eq!(hidden.z[(0, 0)], 1.5);
        assert_relative_eq!(hidden.z[(1, 1)], -7.0);
        let output = caches.output_layer().unwrap();
        assert_eq!(output.phi, Activation::Softmax);
        // ReLU zeroed the second row before it reached the output layer.
        assert_eq!(output.a_prev[(1, 0)], 0.0);
        assert_eq!(output.a_prev[(0, 0)], 1.5);
        for j in 0..2 {
            assert_relative_eq!(a[(0, j)] + a[(1, j)], 1.0, epsilon = 1e-12);
        }
    }
}
