// Back-propagation against central finite differences of the cross-entropy cost.

use approx::assert_abs_diff_eq;
use ffnet::{
    DerivBuffer, ParamBuffer, Topology,
    core::{backward, cross_entropy, forward},
    faer::prelude::*,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

const H: f64 = 1e-6;
const TOLERANCE: f64 = 1e-6;

fn cost(x: MatRef<f64>, y: MatRef<f64>, params: &ParamBuffer) -> f64 {
    let (a, _) = forward(x, params).unwrap();
    cross_entropy(a.as_ref(), y).unwrap()
}

fn analytic(x: MatRef<f64>, y: MatRef<f64>, params: &ParamBuffer) -> DerivBuffer {
    let (a, caches) = forward(x, params).unwrap();
    backward(a.as_ref(), y, &caches).unwrap()
}

/// A small network, a batch of inputs away from ReLU kinks, and labels cycling through classes.
fn setup(layer_dims: &[usize], batch_size: usize, seed: u64) -> (ParamBuffer, Mat<f64>, Mat<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let topology = Topology::from_layer_dims(layer_dims).unwrap();
    let params = ParamBuffer::initialize(&topology, &mut rng);
    let x = Mat::from_fn(topology.n_inputs(), batch_size, |_, _| {
        rng.random_range(-1.0..1.0)
    });
    let y = Mat::from_fn(topology.n_outputs(), batch_size, |k, j| {
        match j % topology.n_outputs() == k {
            true => 1.0,
            false => 0.0,
        }
    });
    (params, x, y)
}

fn check_gradients(layer_dims: &[usize], batch_size: usize, seed: u64) {
    let (mut params, x, y) = setup(layer_dims, batch_size, seed);
    let derivs = analytic(x.as_ref(), y.as_ref(), &params);
    assert_eq!(derivs.n_layers(), params.n_layers());

    for i_layer in 1..=params.n_layers() {
        let layer = params.layer(i_layer).unwrap();
        let (n, n_previous) = (layer.n, layer.n_previous);
        let expected = derivs.layer(i_layer).unwrap();

        for k in 0..n {
            for g in 0..n_previous {
                let original = params.layer(i_layer).unwrap().w[(k, g)];
                set_weight(&mut params, i_layer, k, g, original + H);
                let plus = cost(x.as_ref(), y.as_ref(), &params);
                set_weight(&mut params, i_layer, k, g, original - H);
                let minus = cost(x.as_ref(), y.as_ref(), &params);
                set_weight(&mut params, i_layer, k, g, original);

                let numeric = (plus - minus) / (2.0 * H);
                assert_abs_diff_eq!(expected.dw[(k, g)], numeric, epsilon = TOLERANCE);
            }

            let original = params.layer(i_layer).unwrap().b[k];
            set_bias(&mut params, i_layer, k, original + H);
            let plus = cost(x.as_ref(), y.as_ref(), &params);
            set_bias(&mut params, i_layer, k, original - H);
            let minus = cost(x.as_ref(), y.as_ref(), &params);
            set_bias(&mut params, i_layer, k, original);

            let numeric = (plus - minus) / (2.0 * H);
            assert_abs_diff_eq!(expected.db[k], numeric, epsilon = TOLERANCE);
        }
    }
}

fn set_weight(params: &mut ParamBuffer, i_layer: usize, k: usize, g: usize, value: f64) {
    let mut layer = params.layer_mut(i_layer).unwrap();
    layer.w[(k, g)] = value;
}

fn set_bias(params: &mut ParamBuffer, i_layer: usize, k: usize, value: f64) {
    let mut layer = params.layer_mut(i_layer).unwrap();
    layer.b[k] = value;
}

#[test]
fn gradients_of_one_hidden_layer() {
    check_gradients(&[4, 3, 2], 5, 42);
}

#[test]
fn gradients_of_a_deeper_network() {
    check_gradients(&[3, 5, 4, 3], 7, 3);
}

#[test]
fn gradients_of_softmax_only() {
    check_gradients(&[3, 4], 6, 8);
}

#[test]
fn gradient_shapes_match_parameters() {
    let (params, x, y) = setup(&[6, 5, 4, 3], 9, 0);
    let derivs = analytic(x.as_ref(), y.as_ref(), &params);
    for i_layer in 1..=params.n_layers() {
        let layer = params.layer(i_layer).unwrap();
        let d = derivs.layer(i_layer).unwrap();
        assert_eq!((d.dw.nrows(), d.dw.ncols()), (layer.n, layer.n_previous));
        assert_eq!(d.db.nrows(), layer.n);
        assert_eq!((d.da_prev.nrows(), d.da_prev.ncols()), (layer.n_previous, 9));
    }
}
