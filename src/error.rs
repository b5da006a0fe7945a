use derive_more::{Display, Error};
use faer::prelude::*;

/// Shape of a matrix as `(nrows, ncols)`.
pub type Shape = (usize, usize);

#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum Error {
    /// Invalid layer dimensions or hyperparameters.
    #[display("invalid configuration: {reason}")]
    Configuration { reason: String },
    /// An operand's dimensions violate the layer shape invariants.
    #[display("shape mismatch in {op}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        op: &'static str,
        expected: Shape,
        got: Shape,
    },
    /// A non-finite value came out of an activation or the cost.
    #[display("numerical error in {op}: {reason}")]
    Numerical { op: &'static str, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn numerical(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Numerical {
            op,
            reason: reason.into(),
        }
    }
}

pub(crate) fn shape_of(m: MatRef<f64>) -> Shape {
    (m.nrows(), m.ncols())
}

/// Fails with `ShapeMismatch` unless `got == expected`.
pub(crate) fn check_shape(op: &'static str, expected: Shape, got: Shape) -> Result<()> {
    match expected == got {
        true => Ok(()),
        false => Err(Error::ShapeMismatch { op, expected, got }),
    }
}

/// Fails with `Numerical` if any entry of `m` is NaN or infinite.
pub(crate) fn check_finite(op: &'static str, m: MatRef<f64>) -> Result<()> {
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            let x = m[(i, j)];
            if !x.is_finite() {
                return Err(Error::numerical(
                    op,
                    format!("non-finite value {x} at ({i}, {j})"),
                ));
            }
        }
    }
    Ok(())
}
