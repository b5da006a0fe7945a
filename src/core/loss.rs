use faer::prelude::*;

use crate::{
    Result,
    error::{Error, check_shape, shape_of},
};

/// Probabilities below this are raised to it before taking the log, so a saturated softmax gives
/// a large but finite cost.
pub const PROBABILITY_FLOOR: f64 = f64::MIN_POSITIVE;

/// Categorical cross-entropy, averaged over the columns (samples).
///
/// `cost = -1/m * Σ y * ln(a)`, summed over the entries where `y > 0`. With one-hot labels that is
/// exactly one entry per column.
pub fn cross_entropy(a_l: MatRef<f64>, y: MatRef<f64>) -> Result<f64> {
    check_shape("cross_entropy", shape_of(y), shape_of(a_l))?;
    let m = a_l.ncols();
    if m == 0 {
        return Err(Error::numerical("cross_entropy", "empty batch"));
    }
    let mut sum = 0.0f64;
    for j in 0..m {
        for k in 0..a_l.nrows() {
            let y_kj = y[(k, j)];
            if y_kj <= 0.0 {
                continue;
            }
            let a_kj = a_l[(k, j)];
            if !a_kj.is_finite() {
                return Err(Error::numerical(
                    "cross_entropy",
                    format!("predicted probability {a_kj} at ({k}, {j})"),
                ));
            }
            sum += y_kj * a_kj.max(PROBABILITY_FLOOR).ln();
        }
    }
    let cost = -sum / m as f64;
    match cost.is_finite() {
        true => Ok(cost),
        false => Err(Error::numerical("cross_entropy", format!("cost is {cost}"))),
    }
}
