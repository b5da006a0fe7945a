use faer::prelude::*;

use crate::{
    Result,
    core::{ParamBuffer, forward},
    error::{Error, check_shape},
};

/// Row index of the largest entry of each column. Ties go to the first index.
pub fn argmax_columns(a: MatRef<f64>) -> Vec<usize> {
    (0..a.ncols())
        .map(|j| {
            let mut i_max = 0usize;
            for i in 1..a.nrows() {
                if a[(i, j)] > a[(i_max, j)] {
                    i_max = i;
                }
            }
            i_max
        })
        .collect()
}

/// Fraction of the columns of `x` whose most probable class is the class marked in `y`.
pub fn predict(x: MatRef<f64>, y: MatRef<f64>, params: &ParamBuffer) -> Result<f64> {
    check_shape(
        "predict",
        (params.n_outputs(), x.ncols()),
        (y.nrows(), y.ncols()),
    )?;
    if x.ncols() == 0 {
        return Err(Error::configuration("cannot evaluate accuracy on zero samples"));
    }
    let (a, _caches) = forward(x, params)?;
    let n_correct = std::iter::zip(argmax_columns(a.as_ref()), argmax_columns(y))
        .filter(|(predicted, expected)| predicted == expected)
        .count();
    Ok(n_correct as f64 / x.ncols() as f64)
}
