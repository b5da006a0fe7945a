// ReLU and softmax behaviour, including the stability shift for large logits.

use approx::assert_abs_diff_eq;
use ffnet::{activation_functions::*, faer::prelude::*};
use rand::{Rng, SeedableRng, rngs::StdRng};

#[test]
fn softmax_columns_are_distributions() {
    let mut rng = StdRng::seed_from_u64(7);
    let z = Mat::from_fn(6, 20, |_, _| rng.random_range(-30.0..30.0));
    let a = softmax(z.as_ref());
    for j in 0..a.ncols() {
        let sum: f64 = (0..a.nrows()).map(|i| a[(i, j)]).sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
        for i in 0..a.nrows() {
            assert!(a[(i, j)] > 0.0 && a[(i, j)] <= 1.0, "a[({i}, {j})] = {}", a[(i, j)]);
        }
    }
}

#[test]
fn softmax_survives_large_logits() {
    let z = Mat::from_fn(3, 2, |i, j| [[1000.0, -1000.0], [999.0, -999.0], [998.0, -1001.0]][i][j]);
    let a = softmax(z.as_ref());
    for j in 0..2 {
        for i in 0..3 {
            assert!(a[(i, j)].is_finite());
        }
    }
    // Same as softmax([2, 1, 0]) and softmax([1, 2, 0]).
    let e = [1.0f64.exp(), 0.0f64.exp(), (-1.0f64).exp()];
    let total: f64 = e.iter().sum();
    assert_abs_diff_eq!(a[(0, 0)], e[0] / total, epsilon = 1e-12);
    assert_abs_diff_eq!(a[(1, 1)], e[0] / total, epsilon = 1e-12);
}

#[test]
fn softmax_is_shift_invariant() {
    let z = Mat::from_fn(4, 3, |i, j| (i * j) as f64 * 0.3);
    let shifted = Mat::from_fn(4, 3, |i, j| z[(i, j)] + 50.0 * j as f64);
    let (a, b) = (softmax(z.as_ref()), softmax(shifted.as_ref()));
    for j in 0..3 {
        for i in 0..4 {
            assert_abs_diff_eq!(a[(i, j)], b[(i, j)], epsilon = 1e-12);
        }
    }
}

#[test]
fn relu_and_its_derivative() {
    for x in [-3.5, -1e-12, 0.0, 1e-12, 2.0, 100.0] {
        let expected = if x > 0.0 { x } else { 0.0 };
        assert_eq!(relu(x), expected);
        assert_eq!(relu_deriv(x), if x > 0.0 { 1.0 } else { 0.0 });
    }
    let z = Mat::from_fn(2, 2, |i, j| [[-1.0, 2.0], [0.0, 0.5]][i][j]);
    let a = relu_matrix(z.as_ref());
    assert_eq!([a[(0, 0)], a[(0, 1)], a[(1, 0)], a[(1, 1)]], [0.0, 2.0, 0.0, 0.5]);
}
