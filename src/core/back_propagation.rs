use std::mem;

use faer::{linalg::matmul::matmul, prelude::*};

use crate::{
    Activation, Result,
    activation_functions::{relu_deriv, softmax_shifted},
    core::{DerivBuffer, LayerCache, LayerDerivs, ParamBuffer, ResultBuffer},
    error::{Error, check_shape, shape_of},
};

/// Gradient flowing into a layer from the layer above it.
#[derive(Debug, Clone, Copy)]
pub enum Upstream<'a> {
    /// dL / da of this layer, computed by the next layer. Feeds ReLU layers.
    Grad(MatRef<'a, f64>),
    /// True labels. The softmax output layer folds softmax and cross-entropy into `a - y`.
    Labels(MatRef<'a, f64>),
}

/// Linear part of a layer's backward pass, shared by both activations.
///
/// - `dw = 1/m * dz * a_prev^T`
/// - `db = 1/m * Σ_columns dz`
/// - `da_prev = W^T * dz`
pub fn linear_backward(dz: MatRef<f64>, cache: &LayerCache) -> Result<LayerDerivs> {
    let n_k = cache.w.nrows();
    let n_g = cache.w.ncols();
    let m = cache.batch_size();
    check_shape("linear_backward", (n_k, m), shape_of(dz))?;
    check_shape("linear_backward", (n_g, m), shape_of(cache.a_prev.as_ref()))?;
    let scale = 1.0 / m as f64;
    let mut dw = Mat::<f64>::zeros(n_k, n_g);
    matmul(
        dw.as_mut(),
        faer::Accum::Replace,
        dz,
        cache.a_prev.as_ref().transpose(),
        scale,
        Par::Seq,
    );
    let db = Col::from_fn(n_k, |k| (0..m).map(|j| dz[(k, j)]).sum::<f64>() * scale);
    let mut da_prev = Mat::<f64>::zeros(n_g, m);
    matmul(
        da_prev.as_mut(),
        faer::Accum::Replace,
        cache.w.transpose(),
        dz,
        1.0,
        Par::Seq,
    );
    Ok(LayerDerivs { da_prev, dw, db })
}

/// `dz = da ⊙ 1[z > 0]`.
pub fn relu_backward(da: MatRef<f64>, z: MatRef<f64>) -> Result<Mat<f64>> {
    check_shape("relu_backward", shape_of(z), shape_of(da))?;
    Ok(Mat::from_fn(z.nrows(), z.ncols(), |i, j| {
        da[(i, j)] * relu_deriv(z[(i, j)])
    }))
}

/// `dz = softmax(z) - y`, the gradient of cross-entropy through softmax.
///
/// `z` is the max-shifted pre-activation kept in the output layer's cache.
pub fn softmax_backward(z: MatRef<f64>, y: MatRef<f64>) -> Result<Mat<f64>> {
    check_shape("softmax_backward", shape_of(z), shape_of(y))?;
    let a = softmax_shifted(z);
    Ok(Mat::from_fn(z.nrows(), z.ncols(), |i, j| a[(i, j)] - y[(i, j)]))
}

/// Backward pass of a single layer.
pub fn layer_backward(upstream: Upstream, cache: &LayerCache) -> Result<LayerDerivs> {
    let dz = match (cache.phi, upstream) {
        (Activation::Relu, Upstream::Grad(da)) => relu_backward(da, cache.z.as_ref())?,
        (Activation::Softmax, Upstream::Labels(y)) => softmax_backward(cache.z.as_ref(), y)?,
        (Activation::Relu, Upstream::Labels(_)) => {
            return Err(Error::configuration(
                "a relu layer cannot be the loss layer",
            ));
        }
        (Activation::Softmax, Upstream::Grad(_)) => {
            return Err(Error::configuration(
                "a softmax layer is only supported as the output layer",
            ));
        }
    };
    linear_backward(dz.as_ref(), cache)
}

/// Backward pass through every layer, output layer first.
///
/// `a_l` is the output of the forward pass that produced `caches`, `y` the one-hot labels of the
/// same batch.
pub fn backward(a_l: MatRef<f64>, y: MatRef<f64>, caches: &ResultBuffer) -> Result<DerivBuffer> {
    check_shape("backward", shape_of(a_l), shape_of(y))?;
    let mut caches_rev = caches.iter().rev();
    let Some(output_cache) = caches_rev.next() else {
        return Err(Error::configuration("no layer caches to back-propagate"));
    };
    let mut derivs_rev = Vec::with_capacity(caches.n_layers());
    let mut layer_derivs = layer_backward(Upstream::Labels(y), output_cache)?;
    for cache in caches_rev {
        // The next layer's da_prev is this layer's da.
        let derivs_prev = layer_backward(Upstream::Grad(layer_derivs.da_prev.as_ref()), cache)?;
        derivs_rev.push(mem::replace(&mut layer_derivs, derivs_prev));
    }
    derivs_rev.push(layer_derivs);
    derivs_rev.reverse();
    Ok(DerivBuffer::from_layers(derivs_rev))
}

/// Gradient descent step: `W -= eta * dW`, `b -= eta * db` for every layer, in place.
pub fn apply_derivs(
    param_buffer: &mut ParamBuffer,
    deriv_buffer: &DerivBuffer,
    eta: f64,
) -> Result<()> {
    if !(eta.is_finite() && eta > 0.0) {
        return Err(Error::configuration(format!(
            "learning rate must be positive, got {eta}"
        )));
    }
    if param_buffer.n_layers() != deriv_buffer.n_layers() {
        return Err(Error::configuration(format!(
            "{} layers of gradients for {} layers of parameters",
            deriv_buffer.n_layers(),
            param_buffer.n_layers(),
        )));
    }
    for (mut layer, derivs) in param_buffer.layers_mut().zip(deriv_buffer.layers()) {
        check_shape(
            "apply_derivs",
            (layer.n, layer.n_previous),
            shape_of(derivs.dw.as_ref()),
        )?;
        check_shape("apply_derivs", (layer.n, 1), (derivs.db.nrows(), 1))?;
        for g in 0..layer.n_previous {
            for k in 0..layer.n {
                layer.w[(k, g)] -= eta * derivs.dw[(k, g)];
            }
        }
        for k in 0..layer.n {
            layer.b[k] -= eta * derivs.db[k];
        }
    }
    Ok(())
}
